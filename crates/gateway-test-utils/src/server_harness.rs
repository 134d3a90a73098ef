//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.
//! The server uses the in-memory user store, so no database is needed.

use crate::crypto_fixtures::{jwks_json, TestRsaKey, TEST_GOOGLE_CLIENT_ID, TEST_SESSION_SECRET};
use common::clock::{Clock, SystemClock};
use gateway_service::auth::jwks::{KeySet, KeySetSource, StaticKeySetSource};
use gateway_service::config::{Config, MIN_BCRYPT_COST};
use gateway_service::models::{RegisterRequest, User};
use gateway_service::repositories::{InMemoryUserRepository, UserRepository};
use gateway_service::routes::{self, AppState};
use gateway_service::services::{user_service, TokenService};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test configuration: fixed secret, test audience, cheapest allowed bcrypt
/// cost. `overrides` replace or add environment variables.
pub fn test_config(overrides: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
    let mut vars = HashMap::from([
        (
            "JWT_SECRET_KEY".to_string(),
            TEST_SESSION_SECRET.to_string(),
        ),
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        (
            "GOOGLE_CLIENT_ID".to_string(),
            TEST_GOOGLE_CLIENT_ID.to_string(),
        ),
        ("BCRYPT_COST".to_string(), MIN_BCRYPT_COST.to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert((*key).to_string(), (*value).to_string());
    }

    Config::from_vars(&vars).map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))
}

/// Key set source that serves the primary test key only.
pub fn test_key_source() -> Arc<dyn KeySetSource> {
    let key_set: KeySet = serde_json::from_value(jwks_json(&[&TestRsaKey::primary()]))
        .expect("test JWKS deserializes");
    Arc::new(StaticKeySetSource::new(key_set))
}

/// Test harness for spawning the gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let server = TestGatewayServer::spawn().await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    users: Arc<InMemoryUserRepository>,
    token_service: Arc<TokenService>,
    _handle: JoinHandle<()>,
}

impl TestGatewayServer {
    /// Spawn with [`test_config`], the primary test key and the system clock.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(test_config(&[])?, test_key_source(), Arc::new(SystemClock)).await
    }

    /// Spawn with explicit configuration, key source and clock.
    ///
    /// The server binds to 127.0.0.1:0 regardless of `config.bind_address`.
    pub async fn spawn_with(
        config: Config,
        key_source: Arc<dyn KeySetSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, anyhow::Error> {
        let users = Arc::new(InMemoryUserRepository::new());
        let token_service = Arc::new(
            TokenService::from_config(&config, key_source, clock)
                .map_err(|e| anyhow::anyhow!("Failed to create token service: {}", e))?,
        );

        let state = Arc::new(AppState {
            config: config.clone(),
            users: users.clone(),
            token_service: token_service.clone(),
        });

        // A global recorder may already be installed by another test in this
        // process; a standalone one keeps /metrics working either way.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            users,
            token_service,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The server's user store.
    pub fn users(&self) -> &InMemoryUserRepository {
        &self.users
    }

    /// Register a password account directly in the store and return a
    /// session token for it.
    pub async fn register_user(&self, email: &str, password: &str) -> Result<String, anyhow::Error> {
        let user = self.create_user(email, password).await?;
        self.issue_token(&user.email)
    }

    /// Register a password account directly in the store.
    pub async fn create_user(&self, email: &str, password: &str) -> Result<User, anyhow::Error> {
        let request = RegisterRequest {
            name: "Test Shopper".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            contact: None,
            address: None,
        };
        let users: &dyn UserRepository = self.users.as_ref();
        user_service::register(users, request, self.config.bcrypt_cost)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to register test user: {}", e))
    }

    /// Issue a session token for any subject, registered or not.
    pub fn issue_token(&self, subject: &str) -> Result<String, anyhow::Error> {
        self.token_service
            .issue_first_party_token(subject)
            .map_err(|e| anyhow::anyhow!("Failed to issue test token: {}", e))
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

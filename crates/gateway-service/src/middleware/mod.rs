//! HTTP middleware.
//!
//! - `gate` - CORS, preflight, allow-list and bearer-token authentication
//! - `http_metrics` - request metrics for every response

pub mod gate;
pub mod http_metrics;

pub use gate::{authentication_gate, GateState, Rejection, UNAUTHORIZED_MESSAGE};
pub use http_metrics::http_metrics_middleware;

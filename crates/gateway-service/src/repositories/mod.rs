//! Repository layer for database operations.

pub mod users;

pub use users::{InMemoryUserRepository, PgUserRepository, UserRepository, DUPLICATE_USER_MESSAGE};

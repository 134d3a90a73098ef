pub mod token_service;
pub mod user_service;

pub use token_service::{TokenError, TokenService};

//! Authentication and role-based authorization.
//!
//! A bearer token is verified into [`Claims`](agora_types::api::Claims),
//! the claims are resolved into an [`Identity`](agora_types::models::Identity)
//! through the identity store, and the identity's permissions are computed
//! from its role on every check.

pub mod config;
pub mod error;
pub mod gate;
pub mod password;
pub mod resolver;
pub mod token;

pub use config::AccessConfig;
pub use error::AccessError;
pub use gate::AccessGate;
pub use resolver::PermissionResolver;
pub use token::TokenVerifier;

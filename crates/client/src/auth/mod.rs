//! Authentication module for ProLink

pub mod jwt;
pub mod session;
pub mod tokens;

pub use jwt::{inspect_token, validate_expiry, JwtError, TokenClaims};
pub use session::{AuthContext, AuthState, SessionManager};
pub use tokens::{TokenStore, TOKEN_KEY};

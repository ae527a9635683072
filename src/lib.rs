//! JWT authentication gate for axum.
//!
//! Extracts a bearer token from the `Authorization` header (or a query parameter),
//! decodes it with a pluggable strategy and attaches the token and its claims to the
//! request as [`AuthCtx`]. Requests without a valid token get a plain-text 401.
//!
//! ```ignore
//! use jwt_gate::{AuthGate, DecodeArgs};
//!
//! let gate = AuthGate::builder()
//!     .decode_args(DecodeArgs::from_secret(b"secret"))
//!     .token_required(true)
//!     .build()?;
//! let app = jwt_gate::middleware::auth::apply(router, gate);
//! ```
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;

pub use api::v1::extractors::{AuthCtx, AuthCtxExtractor};
pub use error::{AppError, unauthorized};
pub use services::auth::{
    AuthGate, AuthGateBuilder, CallbackDecoder, Claims, ConfigError, DecodeArgs, DecodeError,
    Decision, LibraryDecoder, Rejection, TokenDecoder,
};

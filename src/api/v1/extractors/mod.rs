/*
 * Responsibility
 * - v1 handler 用 extractor (re-export)
 */
pub mod auth_ctx;

pub use auth_ctx::{AuthCtx, AuthCtxExtractor};

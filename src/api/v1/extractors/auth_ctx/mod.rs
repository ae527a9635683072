/*!
 * 認証コンテキスト extractor
 *
 * Responsibility:
 * - 認証済みコンテキスト (AuthCtx) を handler に渡す
 * - axum との接続は core、型そのものは types
 *
 * Public API:
 * - AuthCtx
 * - AuthCtxExtractor
 */

mod core;
mod types;

pub use self::core::AuthCtxExtractor;
pub use self::types::AuthCtx;

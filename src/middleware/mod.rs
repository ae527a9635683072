/*
 * Responsibility
 * - middleware の公開インターフェース (re-export)
 * - auth: JWT ゲート、http: transport レベルの layer
 */
pub mod auth;
pub mod http;

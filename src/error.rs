/*
 * Responsibility
 * - middleware / extractor 共通の AppError 定義
 * - IntoResponse 実装 (text/plain の 401、`unauthorized` を参照)
 */
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub const DEFAULT_UNAUTHORIZED_MESSAGE: &str = "Authorization required";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
}

impl AppError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized(DEFAULT_UNAUTHORIZED_MESSAGE.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized(message) => unauthorized(Some(message)),
        }
    }
}

/// 401 with `Content-Type: text/plain` and an explicit `Content-Length`.
///
/// `None` uses `"Authorization required"`.
pub fn unauthorized(message: Option<String>) -> Response {
    let body = message.unwrap_or_else(|| DEFAULT_UNAUTHORIZED_MESSAGE.to_string());

    (
        StatusCode::UNAUTHORIZED,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain")),
            (header::CONTENT_LENGTH, HeaderValue::from(body.len())),
        ],
        body,
    )
        .into_response()
}

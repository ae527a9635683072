use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

use crate::error::AppError;

use super::AuthCtx;

/// handler 用の `AuthCtx` extractor。
/// ゲート middleware が extensions に入れている前提。
/// 無ければ (トークンなし、またはゲート外のルート) 401 を返す。
pub struct AuthCtxExtractor(pub AuthCtx);

impl<S> FromRequestParts<S> for AuthCtxExtractor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthCtx>()
            .cloned()
            .map(AuthCtxExtractor)
            .ok_or_else(AppError::unauthorized)
    }
}

/// `Option<AuthCtxExtractor>` for routes where the token is optional.
impl<S> OptionalFromRequestParts<S> for AuthCtxExtractor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthCtx>().cloned().map(AuthCtxExtractor))
    }
}

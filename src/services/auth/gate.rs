/*
 * Responsibility
 * - AuthGate: 起動時に一度だけ組み立てる (デフォルト適用 + 設定チェック)、リクエスト毎に判定
 * - Decision: 次へ渡す (AuthCtx あり/なし) か 401 で拒否
 * - HTTP の配線は middleware::auth::access 側
 */
use std::sync::Arc;

use axum::{
    http::request::Parts,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::v1::extractors::AuthCtx;
use crate::error::{AppError, DEFAULT_UNAUTHORIZED_MESSAGE};
use crate::services::auth::decoder::{
    CallbackDecoder, Claims, DecodeArgs, DecodeError, DecodeStrategy, LibraryDecoder,
    TokenDecoder,
};
use crate::services::auth::extract::{self, ExtractedToken};

pub const DEFAULT_CLAIMS_KEY: &str = "claims";
pub const DEFAULT_TOKEN_KEY: &str = "token";
pub const DEFAULT_HEADER_SCHEME: &str = "Bearer";
pub const DEFAULT_QUERY_PARAM: &str = "token";

/// Construction-time errors. A gate that fails here never serves a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("either decode_args or decode_callback must be set")]
    MissingDecoder,
    #[error("decode_args and decode_callback are mutually exclusive")]
    ConflictingDecoders,
    #[error("decode_args must accept at least one algorithm")]
    NoAlgorithms,
    #[error("context key '{0}' must not be empty")]
    EmptyKey(&'static str),
    #[error("claims key and token key must differ (both are '{0}')")]
    DuplicateKey(String),
}

/// Request-time failure. Always answered with 401.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("{}", DEFAULT_UNAUTHORIZED_MESSAGE)]
    MissingToken,
    // Malformed tokens are 401 as well, not 400.
    #[error("Cannot decode JWT: {0}")]
    Decode(DecodeError),
}

impl From<Rejection> for AppError {
    fn from(r: Rejection) -> Self {
        AppError::Unauthorized(r.to_string())
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Outcome of a single request.
#[derive(Debug)]
pub enum Decision {
    /// `None`: no token and none required, the request goes through untouched.
    Forward(Option<AuthCtx>),
    Reject(Rejection),
}

#[derive(Debug)]
struct Inner {
    claims_key: Arc<str>,
    token_key: Arc<str>,
    header_scheme: Option<String>,
    query_param: Option<String>,
    token_required: bool,
    strategy: DecodeStrategy,
}

/// JWT authentication gate.
///
/// Cheap to clone; the configuration is immutable once built.
#[derive(Clone, Debug)]
pub struct AuthGate {
    inner: Arc<Inner>,
}

impl AuthGate {
    pub fn builder() -> AuthGateBuilder {
        AuthGateBuilder::default()
    }

    pub fn claims_key(&self) -> &str {
        &self.inner.claims_key
    }

    pub fn token_key(&self) -> &str {
        &self.inner.token_key
    }

    pub fn header_scheme(&self) -> Option<&str> {
        self.inner.header_scheme.as_deref()
    }

    pub fn query_param(&self) -> Option<&str> {
        self.inner.query_param.as_deref()
    }

    pub fn token_required(&self) -> bool {
        self.inner.token_required
    }

    pub fn strategy(&self) -> &DecodeStrategy {
        &self.inner.strategy
    }

    /// Token candidate of the request, if any.
    pub fn extract(&self, parts: &Parts) -> Option<ExtractedToken> {
        extract::extract(parts, self.header_scheme(), self.query_param())
    }

    /// Decode the token with the configured strategy.
    pub async fn decode(&self, token: &str, parts: &Parts) -> Result<Claims, DecodeError> {
        self.inner.strategy.decode(token, parts).await
    }

    /// Extract, decode and decide. Does not touch the request.
    pub async fn decide(&self, parts: &Parts) -> Decision {
        let Some(extracted) = self.extract(parts) else {
            if self.token_required() {
                tracing::debug!(path = %parts.uri.path(), "no token on request, rejecting");
                return Decision::Reject(Rejection::MissingToken);
            }
            tracing::debug!(path = %parts.uri.path(), "no token on request, forwarding");
            return Decision::Forward(None);
        };

        match self.decode(&extracted.value, parts).await {
            Ok(claims) => {
                tracing::debug!(source = ?extracted.source, "token decoded");
                Decision::Forward(Some(AuthCtx::new(
                    self.inner.token_key.clone(),
                    self.inner.claims_key.clone(),
                    extracted.value,
                    claims,
                )))
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    source = ?extracted.source,
                    "token decode failed"
                );
                Decision::Reject(Rejection::Decode(err))
            }
        }
    }
}

/// Collects options; [`AuthGateBuilder::build`] applies defaults and validates.
#[derive(Default)]
pub struct AuthGateBuilder {
    claims_key: Option<String>,
    token_key: Option<String>,
    header_scheme: Option<Option<String>>,
    query_param: Option<Option<String>>,
    token_required: bool,
    decode_args: Option<DecodeArgs>,
    decoder: Option<Arc<dyn TokenDecoder>>,
}

impl AuthGateBuilder {
    pub fn claims_key(mut self, key: impl Into<String>) -> Self {
        self.claims_key = Some(key.into());
        self
    }

    pub fn token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = Some(key.into());
        self
    }

    /// `None` (or an empty string) disables header extraction.
    pub fn header_scheme<T: Into<String>>(mut self, scheme: Option<T>) -> Self {
        self.header_scheme = Some(scheme.map(Into::into));
        self
    }

    pub fn disable_header(self) -> Self {
        self.header_scheme(None::<String>)
    }

    /// `None` (or an empty string) disables query extraction.
    pub fn query_param<T: Into<String>>(mut self, name: Option<T>) -> Self {
        self.query_param = Some(name.map(Into::into));
        self
    }

    pub fn disable_query(self) -> Self {
        self.query_param(None::<String>)
    }

    pub fn token_required(mut self, required: bool) -> Self {
        self.token_required = required;
        self
    }

    pub fn decode_args(mut self, args: DecodeArgs) -> Self {
        self.decode_args = Some(args);
        self
    }

    pub fn decode_callback<F>(self, callback: F) -> Self
    where
        F: Fn(&str, &Parts) -> Result<Claims, DecodeError> + Send + Sync + 'static,
    {
        self.decoder(CallbackDecoder::new(callback))
    }

    /// Register an async decoder as the callback strategy.
    pub fn decoder<D: TokenDecoder + 'static>(mut self, decoder: D) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Apply defaults and validate. This is the only place configuration errors surface.
    pub fn build(self) -> Result<AuthGate, ConfigError> {
        let strategy = match (self.decoder, self.decode_args) {
            (None, None) => return Err(ConfigError::MissingDecoder),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingDecoders),
            (Some(decoder), None) => DecodeStrategy::Callback(decoder),
            (None, Some(args)) => {
                DecodeStrategy::Library(LibraryDecoder::new(args).ok_or(ConfigError::NoAlgorithms)?)
            }
        };

        let claims_key = self
            .claims_key
            .unwrap_or_else(|| DEFAULT_CLAIMS_KEY.to_string());
        let token_key = self
            .token_key
            .unwrap_or_else(|| DEFAULT_TOKEN_KEY.to_string());

        if claims_key.is_empty() {
            return Err(ConfigError::EmptyKey("claims"));
        }
        if token_key.is_empty() {
            return Err(ConfigError::EmptyKey("token"));
        }
        if claims_key == token_key {
            return Err(ConfigError::DuplicateKey(claims_key));
        }

        let header_scheme = self
            .header_scheme
            .unwrap_or_else(|| Some(DEFAULT_HEADER_SCHEME.to_string()))
            .filter(|s| !s.is_empty());
        let query_param = self
            .query_param
            .unwrap_or_else(|| Some(DEFAULT_QUERY_PARAM.to_string()))
            .filter(|s| !s.is_empty());

        Ok(AuthGate {
            inner: Arc::new(Inner {
                claims_key: claims_key.into(),
                token_key: token_key.into(),
                header_scheme,
                query_param,
                token_required: self.token_required,
                strategy,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::{Request, header};
    use serde_json::json;

    fn parts(uri: &str, authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn accept_all() -> AuthGateBuilder {
        AuthGate::builder().decode_callback(|_: &str, _: &Parts| Ok(json!({"sub": "bart"})))
    }

    #[test]
    fn defaults_are_applied() {
        let gate = accept_all().build().unwrap();
        assert_eq!(gate.claims_key(), "claims");
        assert_eq!(gate.token_key(), "token");
        assert_eq!(gate.header_scheme(), Some("Bearer"));
        assert_eq!(gate.query_param(), Some("token"));
        assert!(!gate.token_required());
        assert!(matches!(gate.strategy(), DecodeStrategy::Callback(_)));
    }

    #[test]
    fn missing_decoder_is_a_config_error() {
        let err = AuthGate::builder().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingDecoder);
    }

    #[test]
    fn both_decoders_is_a_config_error() {
        let err = accept_all()
            .decode_args(DecodeArgs::from_secret(b"secret"))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ConflictingDecoders);
    }

    #[test]
    fn decode_args_without_algorithms_is_a_config_error() {
        let err = AuthGate::builder()
            .decode_args(DecodeArgs::from_secret(b"secret").algorithms([]))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::NoAlgorithms);
    }

    #[test]
    fn decode_args_are_resolved_at_build() {
        let mut args = DecodeArgs::from_secret(b"secret");
        args.decode_header = true;

        let gate = AuthGate::builder().decode_args(args).build().unwrap();
        let DecodeStrategy::Library(decoder) = gate.strategy() else {
            panic!("expected library strategy");
        };
        assert!(decoder.args().decode_payload);
        assert!(!decoder.args().decode_header);
        assert_eq!(decoder.args().verify_expiry, Some(true));
        assert_eq!(decoder.args().leeway, Some(5));
    }

    #[test]
    fn key_names_are_validated() {
        assert_eq!(
            accept_all().claims_key("").build().unwrap_err(),
            ConfigError::EmptyKey("claims")
        );
        assert_eq!(
            accept_all().token_key("").build().unwrap_err(),
            ConfigError::EmptyKey("token")
        );
        assert_eq!(
            accept_all().claims_key("jwt").token_key("jwt").build().unwrap_err(),
            ConfigError::DuplicateKey("jwt".to_string())
        );
    }

    #[test]
    fn empty_scheme_or_param_disables_lookup() {
        let gate = accept_all()
            .header_scheme(Some(""))
            .query_param(Some(""))
            .build()
            .unwrap();
        assert_eq!(gate.header_scheme(), None);
        assert_eq!(gate.query_param(), None);
    }

    #[tokio::test]
    async fn no_token_not_required_forwards_untouched() {
        let gate = accept_all().build().unwrap();
        let decision = gate.decide(&parts("/", None)).await;
        assert!(matches!(decision, Decision::Forward(None)));
    }

    #[tokio::test]
    async fn no_token_required_rejects() {
        let gate = accept_all().token_required(true).build().unwrap();
        let decision = gate.decide(&parts("/", None)).await;
        let Decision::Reject(rejection) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(rejection, Rejection::MissingToken);
        assert_eq!(rejection.to_string(), "Authorization required");
    }

    #[tokio::test]
    async fn decoded_token_is_attached() {
        let gate = accept_all().build().unwrap();
        let decision = gate
            .decide(&parts("/", Some("Bearer abc.def.ghi")))
            .await;
        let Decision::Forward(Some(ctx)) = decision else {
            panic!("expected authenticated forward");
        };
        assert_eq!(ctx.token(), "abc.def.ghi");
        assert_eq!(ctx.claims(), &json!({"sub": "bart"}));
    }

    #[tokio::test]
    async fn decode_failure_rejects_with_detail() {
        let gate = AuthGate::builder()
            .decode_callback(|_: &str, _: &Parts| {
                Err(DecodeError::new("signature verification failed"))
            })
            .build()
            .unwrap();

        let decision = gate.decide(&parts("/", Some("Bearer abc"))).await;
        let Decision::Reject(rejection) = decision else {
            panic!("expected rejection");
        };
        assert_eq!(
            rejection.to_string(),
            "Cannot decode JWT: signature verification failed"
        );
    }

    #[tokio::test]
    async fn callback_sees_the_request() {
        let gate = AuthGate::builder()
            .decode_callback(|token: &str, parts: &Parts| {
                if parts.uri.path() == "/admin" {
                    Err(DecodeError::new("admin tokens only"))
                } else {
                    Ok(json!({ "raw": token }))
                }
            })
            .build()
            .unwrap();

        assert!(matches!(
            gate.decide(&parts("/admin", Some("Bearer t"))).await,
            Decision::Reject(Rejection::Decode(_))
        ));
        assert!(matches!(
            gate.decide(&parts("/user", Some("Bearer t"))).await,
            Decision::Forward(Some(_))
        ));
    }

    struct PrefixDecoder;

    #[async_trait]
    impl TokenDecoder for PrefixDecoder {
        async fn decode(&self, token: &str, _parts: &Parts) -> Result<Claims, DecodeError> {
            tokio::task::yield_now().await;
            token
                .strip_prefix("user-")
                .map(|id| json!({ "sub": id }))
                .ok_or_else(|| DecodeError::new("unknown token"))
        }
    }

    #[tokio::test]
    async fn async_decoder_is_used_as_callback_strategy() {
        let gate = AuthGate::builder().decoder(PrefixDecoder).build().unwrap();

        let Decision::Forward(Some(ctx)) = gate.decide(&parts("/?token=user-42", None)).await
        else {
            panic!("expected authenticated forward");
        };
        assert_eq!(ctx.claims(), &json!({"sub": "42"}));
    }
}

use std::{collections::HashSet, fmt, sync::Arc};

use async_trait::async_trait;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

/// Decoded JWT payload. The gate never interprets it.
pub type Claims = serde_json::Value;

pub const DEFAULT_LEEWAY_SECONDS: u64 = 5;

/// Failure reported by a decode strategy.
///
/// `Display` is the bare detail; the gate prefixes it with `Cannot decode JWT: `.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DecodeError {}

impl From<jsonwebtoken::errors::Error> for DecodeError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Turn a raw token into claims.
///
/// Implement this for decoders that need I/O (remote key lookup, introspection, ...).
/// Plain closures go through [`CallbackDecoder`].
#[async_trait]
pub trait TokenDecoder: Send + Sync {
    async fn decode(&self, token: &str, parts: &Parts) -> Result<Claims, DecodeError>;
}

type DecodeFn = dyn Fn(&str, &Parts) -> Result<Claims, DecodeError> + Send + Sync;

/// Application-supplied `(token, request) -> claims` function.
#[derive(Clone)]
pub struct CallbackDecoder {
    callback: Arc<DecodeFn>,
}

impl CallbackDecoder {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&str, &Parts) -> Result<Claims, DecodeError> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for CallbackDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallbackDecoder(..)")
    }
}

#[async_trait]
impl TokenDecoder for CallbackDecoder {
    async fn decode(&self, token: &str, parts: &Parts) -> Result<Claims, DecodeError> {
        (self.callback)(token, parts)
    }
}

/// Verification parameters handed to `jsonwebtoken`.
///
/// `decode_payload` / `decode_header` are accepted for completeness but the gate
/// always resolves them to `true` / `false`: only the payload is ever returned.
#[derive(Clone)]
pub struct DecodeArgs {
    pub key: DecodingKey,
    pub algorithms: Vec<Algorithm>,
    pub verify_expiry: Option<bool>,
    pub verify_not_before: Option<bool>,
    pub leeway: Option<u64>,
    pub issuer: Option<Vec<String>>,
    pub audience: Option<Vec<String>>,
    pub subject: Option<String>,
    pub required_claims: Vec<String>,
    pub decode_payload: bool,
    pub decode_header: bool,
}

impl fmt::Debug for DecodeArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("DecodeArgs")
            .field("algorithms", &self.algorithms)
            .field("verify_expiry", &self.verify_expiry)
            .field("verify_not_before", &self.verify_not_before)
            .field("leeway", &self.leeway)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("subject", &self.subject)
            .field("required_claims", &self.required_claims)
            .field("decode_payload", &self.decode_payload)
            .field("decode_header", &self.decode_header)
            .finish()
    }
}

impl DecodeArgs {
    /// Args accepting `HS256` only; change with [`DecodeArgs::algorithms`].
    pub fn new(key: DecodingKey) -> Self {
        Self {
            key,
            algorithms: vec![Algorithm::HS256],
            verify_expiry: None,
            verify_not_before: None,
            leeway: None,
            issuer: None,
            audience: None,
            subject: None,
            required_claims: Vec::new(),
            decode_payload: true,
            decode_header: false,
        }
    }

    pub fn from_secret(secret: &[u8]) -> Self {
        Self::new(DecodingKey::from_secret(secret))
    }

    pub fn algorithms(mut self, algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        self.algorithms = algorithms.into_iter().collect();
        self
    }

    pub fn verify_expiry(mut self, verify: bool) -> Self {
        self.verify_expiry = Some(verify);
        self
    }

    pub fn verify_not_before(mut self, verify: bool) -> Self {
        self.verify_not_before = Some(verify);
        self
    }

    pub fn leeway(mut self, seconds: u64) -> Self {
        self.leeway = Some(seconds);
        self
    }

    pub fn issuer<T: ToString>(mut self, issuer: &[T]) -> Self {
        self.issuer = Some(issuer.iter().map(ToString::to_string).collect());
        self
    }

    pub fn audience<T: ToString>(mut self, audience: &[T]) -> Self {
        self.audience = Some(audience.iter().map(ToString::to_string).collect());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn require(mut self, claim: impl Into<String>) -> Self {
        self.required_claims.push(claim.into());
        self
    }
}

/// `jsonwebtoken`-backed decoder built from resolved [`DecodeArgs`].
///
/// Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct LibraryDecoder {
    args: DecodeArgs,
    validation: Validation,
}

impl fmt::Debug for LibraryDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryDecoder")
            .field("args", &self.args)
            .field("validation", &self.validation)
            .finish()
    }
}

impl LibraryDecoder {
    /// Resolve the args: force payload-only decoding, default `verify_expiry = true`
    /// and `leeway = 5s`, then build the `Validation` once.
    ///
    /// Returns `None` when no algorithm is accepted.
    pub fn new(mut args: DecodeArgs) -> Option<Self> {
        let first = *args.algorithms.first()?;

        args.decode_payload = true;
        args.decode_header = false;
        let verify_expiry = *args.verify_expiry.get_or_insert(true);
        let verify_not_before = *args.verify_not_before.get_or_insert(true);
        let leeway = *args.leeway.get_or_insert(DEFAULT_LEEWAY_SECONDS);

        let mut validation = Validation::new(first);
        validation.algorithms = args.algorithms.clone();
        validation.leeway = leeway;
        validation.validate_exp = verify_expiry;
        validation.validate_nbf = verify_not_before;

        let mut required: HashSet<String> = args.required_claims.iter().cloned().collect();
        if verify_expiry {
            required.insert("exp".to_string());
        }

        if let Some(issuer) = &args.issuer {
            validation.set_issuer(issuer.as_slice());
            required.insert("iss".to_string());
        }

        // jsonwebtoken rejects any `aud` claim unless an audience is configured
        match &args.audience {
            Some(audience) => {
                validation.set_audience(audience.as_slice());
                required.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }

        if let Some(subject) = &args.subject {
            validation.sub = Some(subject.clone());
            required.insert("sub".to_string());
        }

        validation.required_spec_claims = required;

        Some(Self { args, validation })
    }

    /// The resolved args.
    pub fn args(&self) -> &DecodeArgs {
        &self.args
    }

    pub fn validation(&self) -> &Validation {
        &self.validation
    }

    pub fn verify(&self, token: &str) -> Result<Claims, DecodeError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.args.key, &self.validation)?;
        Ok(data.claims)
    }
}

#[async_trait]
impl TokenDecoder for LibraryDecoder {
    async fn decode(&self, token: &str, _parts: &Parts) -> Result<Claims, DecodeError> {
        self.verify(token)
    }
}

/// The one decode strategy a gate runs.
#[derive(Clone)]
pub enum DecodeStrategy {
    Callback(Arc<dyn TokenDecoder>),
    Library(LibraryDecoder),
}

impl fmt::Debug for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Library(decoder) => f.debug_tuple("Library").field(decoder).finish(),
        }
    }
}

impl DecodeStrategy {
    pub async fn decode(&self, token: &str, parts: &Parts) -> Result<Claims, DecodeError> {
        match self {
            Self::Callback(decoder) => decoder.decode(token, parts).await,
            Self::Library(decoder) => decoder.verify(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret";

    fn parts() -> Parts {
        Request::builder().uri("/").body(()).unwrap().into_parts().0
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn sign(claims: &Claims, alg: Algorithm) -> String {
        jsonwebtoken::encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn decoder(args: DecodeArgs) -> LibraryDecoder {
        LibraryDecoder::new(args).unwrap()
    }

    #[test]
    fn resolves_defaults_and_forces_payload_only() {
        let mut args = DecodeArgs::from_secret(SECRET);
        args.decode_payload = false;
        args.decode_header = true;

        let d = decoder(args);
        assert!(d.args().decode_payload);
        assert!(!d.args().decode_header);
        assert_eq!(d.args().verify_expiry, Some(true));
        assert_eq!(d.args().leeway, Some(DEFAULT_LEEWAY_SECONDS));
        assert_eq!(d.validation().leeway, 5);
        assert!(d.validation().validate_exp);
        assert!(!d.validation().validate_aud);
    }

    #[test]
    fn caller_overrides_are_kept() {
        let d = decoder(
            DecodeArgs::from_secret(SECRET)
                .verify_expiry(false)
                .leeway(30),
        );
        assert_eq!(d.args().verify_expiry, Some(false));
        assert_eq!(d.validation().leeway, 30);
        assert!(!d.validation().validate_exp);
        assert!(!d.validation().required_spec_claims.contains("exp"));
    }

    #[test]
    fn no_algorithms_is_rejected() {
        let args = DecodeArgs::from_secret(SECRET).algorithms([]);
        assert!(LibraryDecoder::new(args).is_none());
    }

    #[test]
    fn valid_token_yields_claims() {
        let claims = json!({"sub": "bart", "exp": now() + 60});
        let token = sign(&claims, Algorithm::HS256);

        let decoded = decoder(DecodeArgs::from_secret(SECRET)).verify(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign(&json!({"sub": "bart", "exp": now() - 60}), Algorithm::HS256);
        assert!(decoder(DecodeArgs::from_secret(SECRET)).verify(&token).is_err());
    }

    #[test]
    fn expiry_within_leeway_is_accepted() {
        let token = sign(&json!({"sub": "bart", "exp": now() - 2}), Algorithm::HS256);
        assert!(decoder(DecodeArgs::from_secret(SECRET)).verify(&token).is_ok());
    }

    #[test]
    fn missing_exp_is_rejected_unless_expiry_check_is_off() {
        let token = sign(&json!({"sub": "bart"}), Algorithm::HS256);

        assert!(decoder(DecodeArgs::from_secret(SECRET)).verify(&token).is_err());
        assert!(
            decoder(DecodeArgs::from_secret(SECRET).verify_expiry(false))
                .verify(&token)
                .is_ok()
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign(&json!({"exp": now() + 60}), Algorithm::HS256);
        let d = decoder(DecodeArgs::from_secret(b"another-secret"));
        assert!(d.verify(&token).is_err());
    }

    #[test]
    fn disallowed_algorithm_is_rejected() {
        let token = sign(&json!({"exp": now() + 60}), Algorithm::HS512);
        let d = decoder(DecodeArgs::from_secret(SECRET));
        assert!(d.verify(&token).is_err());

        let d = decoder(DecodeArgs::from_secret(SECRET).algorithms([Algorithm::HS512]));
        assert!(d.verify(&token).is_ok());
    }

    #[test]
    fn malformed_token_is_rejected_with_detail() {
        let err = decoder(DecodeArgs::from_secret(SECRET))
            .verify("not-a-jwt")
            .unwrap_err();
        assert!(!err.message().is_empty());
    }

    #[test]
    fn audience_is_checked_only_when_configured() {
        let token = sign(
            &json!({"aud": "api", "exp": now() + 60}),
            Algorithm::HS256,
        );

        assert!(decoder(DecodeArgs::from_secret(SECRET)).verify(&token).is_ok());
        assert!(
            decoder(DecodeArgs::from_secret(SECRET).audience(&["api"]))
                .verify(&token)
                .is_ok()
        );
        assert!(
            decoder(DecodeArgs::from_secret(SECRET).audience(&["other"]))
                .verify(&token)
                .is_err()
        );
    }

    #[test]
    fn issuer_is_checked_when_configured() {
        let token = sign(
            &json!({"iss": "https://issuer.example", "exp": now() + 60}),
            Algorithm::HS256,
        );
        let ok = DecodeArgs::from_secret(SECRET).issuer(&["https://issuer.example"]);
        let ng = DecodeArgs::from_secret(SECRET).issuer(&["https://elsewhere.example"]);

        assert!(decoder(ok).verify(&token).is_ok());
        assert!(decoder(ng).verify(&token).is_err());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let out = format!("{:?}", decoder(DecodeArgs::from_secret(SECRET)));
        assert!(!out.contains("test-secret"));
    }

    #[tokio::test]
    async fn callback_receives_token_and_request() {
        let cb = CallbackDecoder::new(|token: &str, parts: &Parts| {
            Ok(json!({"token": token, "path": parts.uri.path()}))
        });

        let claims = cb.decode("abc", &parts()).await.unwrap();
        assert_eq!(claims, json!({"token": "abc", "path": "/"}));
    }

    #[tokio::test]
    async fn strategy_propagates_callback_failure() {
        let strategy = DecodeStrategy::Callback(Arc::new(CallbackDecoder::new(
            |_: &str, _: &Parts| Err(DecodeError::new("signature verification failed")),
        )));

        let err = strategy.decode("abc", &parts()).await.unwrap_err();
        assert_eq!(err.to_string(), "signature verification failed");
    }
}

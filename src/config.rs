/*
 * Responsibility
 * - 環境変数からデモサーバの設定を読み込む (PORT, JWT_*, AUTH_*, HTTP_*)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 * - AuthGate の組み立て
 */
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, errors::ErrorKind};

use crate::middleware::http::HttpLimits;
use crate::services::auth::gate::{
    DEFAULT_CLAIMS_KEY, DEFAULT_HEADER_SCHEME, DEFAULT_QUERY_PARAM, DEFAULT_TOKEN_KEY,
};
use crate::services::auth::{AuthGate, DecodeArgs, decoder::DEFAULT_LEEWAY_SECONDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum EnvError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvError::Missing(key) => write!(f, "missing configuration: {}", key),
            EnvError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for EnvError {}

/// Verification key material.
#[derive(Clone, PartialEq, Eq)]
pub enum JwtKey {
    Secret(String),
    PublicPem(String),
}

impl fmt::Debug for JwtKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        match self {
            JwtKey::Secret(_) => f.write_str("Secret(..)"),
            JwtKey::PublicPem(_) => f.write_str("PublicPem(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub jwt_key: JwtKey,
    pub jwt_algorithms: Vec<Algorithm>,
    pub jwt_leeway_seconds: u64,
    pub jwt_verify_expiry: bool,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,

    pub token_required: bool,
    pub header_scheme: Option<String>,
    pub query_param: Option<String>,
    pub claims_key: String,
    pub token_key: String,

    pub http: HttpLimits,
}

impl Config {
    pub fn from_env() -> Result<Self, EnvError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, EnvError> {
        Self::from_vars(|key| vars.get(key).cloned())
    }

    pub fn from_vars<F>(var: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&var, "PORT", 3000)?;
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| EnvError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV"));

        let secret = var("JWT_SECRET").filter(|s| !s.is_empty());
        let pem = var("JWT_PUBLIC_KEY_PEM")
            .filter(|s| !s.is_empty())
            .map(|s| s.replace("\\n", "\n"));

        let (jwt_key, default_alg) = match (secret, pem) {
            (Some(secret), None) => (JwtKey::Secret(secret), Algorithm::HS256),
            (None, Some(pem)) => (JwtKey::PublicPem(pem), Algorithm::EdDSA),
            (Some(_), Some(_)) => return Err(EnvError::Invalid("JWT_SECRET")),
            (None, None) => return Err(EnvError::Missing("JWT_SECRET")),
        };

        let jwt_algorithms = match var("JWT_ALGORITHMS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Algorithm::from_str)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| EnvError::Invalid("JWT_ALGORITHMS"))?,
            None => vec![default_alg],
        };
        if jwt_algorithms.is_empty() {
            return Err(EnvError::Invalid("JWT_ALGORITHMS"));
        }

        let jwt_leeway_seconds = parse_or(&var, "JWT_LEEWAY_SECONDS", DEFAULT_LEEWAY_SECONDS)?;
        let jwt_verify_expiry = parse_bool_or(&var, "JWT_VERIFY_EXPIRY", true)?;
        let jwt_issuer = var("JWT_ISSUER").filter(|s| !s.is_empty());
        let jwt_audience = var("JWT_AUDIENCE").filter(|s| !s.is_empty());

        let token_required = parse_bool_or(&var, "AUTH_TOKEN_REQUIRED", false)?;
        let header_scheme = optional_name(var("AUTH_HEADER_SCHEME"), DEFAULT_HEADER_SCHEME);
        let query_param = optional_name(var("AUTH_QUERY_PARAM"), DEFAULT_QUERY_PARAM);
        let claims_key = var("AUTH_CLAIMS_KEY").unwrap_or_else(|| DEFAULT_CLAIMS_KEY.to_string());
        let token_key = var("AUTH_TOKEN_KEY").unwrap_or_else(|| DEFAULT_TOKEN_KEY.to_string());

        let defaults = HttpLimits::default();
        let http = HttpLimits {
            body_limit_bytes: parse_or(&var, "HTTP_BODY_LIMIT_BYTES", defaults.body_limit_bytes)?,
            timeout: Duration::from_secs(parse_or(
                &var,
                "HTTP_TIMEOUT_SECONDS",
                defaults.timeout.as_secs(),
            )?),
        };

        Ok(Self {
            addr,
            app_env,
            jwt_key,
            jwt_algorithms,
            jwt_leeway_seconds,
            jwt_verify_expiry,
            jwt_issuer,
            jwt_audience,
            token_required,
            header_scheme,
            query_param,
            claims_key,
            token_key,
            http,
        })
    }

    pub fn decode_args(&self) -> Result<DecodeArgs, EnvError> {
        let key = match &self.jwt_key {
            JwtKey::Secret(secret) => DecodingKey::from_secret(secret.as_bytes()),
            JwtKey::PublicPem(pem) => {
                let alg = self
                    .jwt_algorithms
                    .first()
                    .copied()
                    .ok_or(EnvError::Invalid("JWT_ALGORITHMS"))?;
                decoding_key_from_pem(pem, alg).map_err(|e| {
                    tracing::warn!(error = %e, "failed to parse JWT public key PEM");
                    EnvError::Invalid("JWT_PUBLIC_KEY_PEM")
                })?
            }
        };

        let mut args = DecodeArgs::new(key)
            .algorithms(self.jwt_algorithms.iter().copied())
            .leeway(self.jwt_leeway_seconds)
            .verify_expiry(self.jwt_verify_expiry);
        if let Some(issuer) = &self.jwt_issuer {
            args = args.issuer(&[issuer]);
        }
        if let Some(audience) = &self.jwt_audience {
            args = args.audience(&[audience]);
        }

        Ok(args)
    }

    pub fn gate(&self) -> anyhow::Result<AuthGate> {
        let gate = AuthGate::builder()
            .claims_key(&self.claims_key)
            .token_key(&self.token_key)
            .header_scheme(self.header_scheme.as_deref())
            .query_param(self.query_param.as_deref())
            .token_required(self.token_required)
            .decode_args(self.decode_args()?)
            .build()?;

        Ok(gate)
    }
}

fn decoding_key_from_pem(
    pem: &str,
    alg: Algorithm,
) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
    match alg {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem.as_bytes()),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes()),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem.as_bytes()),
        _ => Err(ErrorKind::InvalidAlgorithm.into()),
    }
}

fn parse_or<F, T>(var: &F, key: &'static str, default: T) -> Result<T, EnvError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match var(key) {
        Some(v) => v.trim().parse().map_err(|_| EnvError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bool_or<F>(var: &F, key: &'static str, default: bool) -> Result<bool, EnvError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(EnvError::Invalid(key)),
        },
    }
}

// unset → default, empty / "none" → disabled
fn optional_name(value: Option<String>, default: &str) -> Option<String> {
    match value {
        None => Some(default.to_string()),
        Some(v) if v.is_empty() || v.eq_ignore_ascii_case("none") => None,
        Some(v) => Some(v),
    }
}

/*
 * Responsibility
 * - handler から見える認証済みコンテキスト: 生トークン + デコード済み claims
 * - ゲートが extensions に入れ、handler は読むだけ
 *
 * Notes
 * - 各エントリはゲートに設定したキー名で引ける
 * - claims は解釈しない (serde_json::Value)。型付きで欲しければ `claims_as`
 */
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::services::auth::decoder::Claims;

/// Token and claims of an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthCtx {
    token_key: Arc<str>,
    claims_key: Arc<str>,
    token: String,
    claims: Claims,
}

impl AuthCtx {
    pub fn new(token_key: Arc<str>, claims_key: Arc<str>, token: String, claims: Claims) -> Self {
        Self {
            token_key,
            claims_key,
            token,
            claims,
        }
    }

    /// The token exactly as extracted from the request.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn token_key(&self) -> &str {
        &self.token_key
    }

    pub fn claims_key(&self) -> &str {
        &self.claims_key
    }

    /// Look an entry up by its configured key name.
    ///
    /// `token_key` yields the raw token as a JSON string, `claims_key` the claims.
    pub fn get(&self, key: &str) -> Option<Value> {
        if key == &*self.token_key {
            Some(Value::String(self.token.clone()))
        } else if key == &*self.claims_key {
            Some(self.claims.clone())
        } else {
            None
        }
    }

    /// A single claim, when the claims are a JSON object.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.as_object()?.get(name)
    }

    pub fn claims_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.claims.clone())
    }
}

/*
 * Responsibility
 * - GET /me: ゲートがリクエストに付与した内容をそのまま返す
 * - トークン任意で未認証のリクエストは `authenticated: false`
 *
 * Notes
 * - キー名は設定次第なので `context` の下に入れる (`authenticated` を上書きさせない)
 */
use axum::Json;
use serde_json::{Map, Value, json};

use crate::api::v1::extractors::AuthCtxExtractor;

pub async fn me(auth: Option<AuthCtxExtractor>) -> Json<Value> {
    let Some(AuthCtxExtractor(ctx)) = auth else {
        return Json(json!({ "authenticated": false }));
    };

    let mut context = Map::new();
    for key in [ctx.token_key(), ctx.claims_key()] {
        if let Some(value) = ctx.get(key) {
            context.insert(key.to_string(), value);
        }
    }

    Json(json!({
        "authenticated": true,
        "context": context,
    }))
}

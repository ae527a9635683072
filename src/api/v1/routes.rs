/*
 * Responsibility
 * - v1 の URL 構成
 * - ここで返すルートはすべてゲートの内側 (app::build_router を参照)
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::me::me;

pub fn routes() -> Router {
    Router::new().route("/me", get(me))
}

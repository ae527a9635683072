//! JWT ゲート middleware: 抽出 → デコード → AuthCtx を extensions に入れる (失敗なら 401)
//!
//! 判定そのものは `AuthGate::decide` に置く。ここではリクエストを分解し、
//! context を入れて次の handler を呼ぶだけ。

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::{AuthGate, Decision};

/// Put every route of `router` behind the gate.
///
/// ```ignore
/// let gate = AuthGate::builder()
///     .decode_args(DecodeArgs::from_secret(b"secret"))
///     .build()?;
/// let v1 = middleware::auth::apply(api::v1::routes(), gate);
/// app = app.nest("/api/v1", v1);
/// ```
pub fn apply<S>(router: Router<S>, gate: AuthGate) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // the gate is the middleware's own state, independent of the router state
    router.layer(middleware::from_fn_with_state(gate, handle))
}

/// Run the gate for one request.
///
/// The downstream response is returned as-is.
pub async fn handle(
    State(gate): State<AuthGate>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    match gate.decide(&parts).await {
        Decision::Forward(None) => {}
        Decision::Forward(Some(auth_ctx)) => {
            // read back by AuthCtxExtractor
            parts.extensions.insert(auth_ctx);
        }
        Decision::Reject(rejection) => return Err(rejection.into()),
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

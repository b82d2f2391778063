//! Axum middleware that validates the bearer token and injects an immutable
//! [`atrium_core::TenantContext`] into the request's extensions.
//! Any handler reached without going through this middleware has no
//! `TenantContext` to extract — that is a programming error, not a request
//! error. Handlers pull it back out with axum's `Extension<TenantContext>`
//! extractor, which rejects with 500 rather than inventing a context if
//! it's missing.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use atrium_core::{TenantContext, UserId};

use crate::token::{self, TokenError};

#[derive(Clone)]
pub struct AuthState {
    pub hmac_secret: String,
    pub clock_skew_seconds: i64,
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub async fn require_tenant(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(raw) = bearer_token(&req) else {
        return unauthorized("missing bearer token");
    };

    match token::validate(&auth.hmac_secret, raw, chrono::Utc::now(), auth.clock_skew_seconds) {
        Ok(claims) => {
            let ctx = TenantContext::new(UserId::from_uuid(claims.sub));
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(TokenError::Expired) => unauthorized("token expired"),
        Err(TokenError::BadSignature) => unauthorized("invalid token signature"),
        Err(TokenError::Malformed) => unauthorized("malformed token"),
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn router(secret: &str) -> Router {
        let state = AuthState {
            hmac_secret: secret.to_string(),
            clock_skew_seconds: 60,
        };
        Router::new()
            .route("/protected", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(state, require_tenant))
    }

    #[tokio::test]
    async fn request_without_bearer_token_is_rejected() {
        let app = router("secret");
        let resp = app
            .oneshot(Request::builder().uri("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn request_with_valid_token_passes_through() {
        let secret = "secret";
        let app = router(secret);
        let tok = token::issue(secret, uuid::Uuid::new_v4(), 3600, chrono::Utc::now());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header(header::AUTHORIZATION, format!("Bearer {tok}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

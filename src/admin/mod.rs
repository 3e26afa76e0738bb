//! Read-only operator API.
//!
//! Only mounted when `admin.enabled` is set. It does not guard submissions.

pub mod handlers;
pub mod auth;

use axum::{
    routing::get,
    Router,
    middleware,
};
use crate::http::server::AppState;
use self::handlers::*;
use self::auth::admin_auth_middleware;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/handlers", get(get_handlers))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use crate::config::AppConfig;
    use crate::http::{HandlerRequest, HttpServer, ResponseBuffer};
    use crate::lifecycle::Shutdown;
    use crate::routing::RouteHandler;

    struct Nothing;

    impl RouteHandler for Nothing {
        fn serve(&self, _request: &HandlerRequest, _response: &mut ResponseBuffer) {}
    }

    fn admin_router() -> (Router, Arc<crate::routing::LiveRoutes>) {
        let mut config = AppConfig::default();
        config.admin.enabled = true;
        config.admin.api_key = "secret".into();
        let server = HttpServer::new(config, &Shutdown::new()).unwrap();
        let routes = server.routes();
        (server.into_router(), routes)
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let (router, _) = admin_router();

        let response = router
            .clone()
            .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(
                Request::get("/admin/status")
                    .header("Authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_lists_handlers_as_json() {
        let (router, routes) = admin_router();
        routes.register("/x/libhandler.so", "src".into(), Arc::new(Nothing)).unwrap();

        let response = router
            .oneshot(
                Request::get("/admin/handlers")
                    .header("Authorization", "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1 << 16).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!([{ "path": "/x/libhandler.so", "source": "src" }]));
    }
}

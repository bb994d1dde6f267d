use axum::{Router, extract::MatchedPath, http::Request};
use tracing::Span;

use crate::state::SharedState;

pub mod admin;
pub mod docs;
pub mod health;
pub mod team;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(admin::router(state.clone()))
        .merge(team::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

/// Route template of a request, e.g. `/team/{id}/{token}/order`.
///
/// Team URLs carry the capability token, so the raw URI never goes into logs.
pub fn route_label<B>(req: &Request<B>) -> &str {
    req.extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("<unmatched>")
}

/// Span for the HTTP trace layer, keyed by route template instead of URI.
pub fn request_span<B>(req: &Request<B>) -> Span {
    tracing::debug_span!("http_request", method = %req.method(), route = route_label(req))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::AppConfig, dao::session_store::file::FileSessionStore, state::AppState,
    };

    async fn app_with(config: AppConfig, dir: &tempfile::TempDir) -> Router<()> {
        let store = FileSessionStore::open(dir.path(), config.retry.policy())
            .await
            .expect("open store");
        router(AppState::new(config, Arc::new(store)))
    }

    async fn send(app: &Router<()>, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn team_flow_over_http() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(AppConfig::default(), &dir).await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/admin/sessions",
                json!({ "date": "2025-03-14", "location": "Enköping", "player_count": 20 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["summary"]["id"].as_str().expect("id").to_string();
        let links = body["team_links"].as_array().expect("links");
        assert_eq!(links.len(), 5);
        let token = links[0]["token"].as_str().expect("token").to_string();

        let order = json!({ "activities": [{
            "action": "Patrol",
            "purpose": "Deter",
            "target": "own",
            "affected_teams": [],
            "kind": "build",
            "points": 3
        }]});
        let (status, body) = send(
            &app,
            json_request("POST", &format!("/team/{id}/{token}/submit_order"), order.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["final"], true);

        let (status, _) = send(
            &app,
            json_request("POST", &format!("/team/{id}/{token}/save_order"), order),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            Request::builder()
                .uri(format!("/team/{id}/wrong-token/order"))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn export_and_import_over_http() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(AppConfig::default(), &dir).await;

        let (_, created) = send(
            &app,
            json_request(
                "POST",
                "/admin/sessions",
                json!({ "date": "2025-03-14", "location": "Boden", "player_count": 30 }),
            ),
        )
        .await;
        let id = created["summary"]["id"].as_str().expect("id").to_string();
        let document = created["document"].clone();

        let (status, _) = send(&app, json_request("POST", "/admin/sessions/import", document.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            Request::builder()
                .method("DELETE")
                .uri(format!("/admin/sessions/{id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, imported) = send(&app, json_request("POST", "/admin/sessions/import", document)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(imported["team_links"], created["team_links"]);
        assert_eq!(imported["document"]["revision"], 2);

        let (status, preview) = send(
            &app,
            Request::builder()
                .uri("/admin/teams/30")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(preview["teams"].as_array().expect("teams").len(), 9);
    }

    #[tokio::test]
    async fn admin_token_guards_admin_routes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            admin_token: Some("s3cret".into()),
            ..AppConfig::default()
        };
        let app = app_with(config, &dir).await;

        let (status, _) = send(
            &app,
            Request::builder()
                .uri("/admin/sessions")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            Request::builder()
                .uri("/admin/sessions")
                .header("x-admin-token", "s3cret")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _) = send(
            &app,
            Request::builder()
                .uri("/healthcheck")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn route_label_hides_path_parameters() {
        let app: Router<()> = Router::new().route(
            "/team/{id}/{token}/order",
            axum::routing::get(|req: Request<Body>| async move { route_label(&req).to_string() }),
        );
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/team/s1/c2VjcmV0LXRva2Vu.abcdefgh/order")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");

        assert_eq!(&bytes[..], b"/team/{id}/{token}/order");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let app = app_with(AppConfig::default(), &dir).await;
        let (status, body) = send(
            &app,
            Request::builder()
                .uri("/admin/sessions/nope")
                .body(Body::empty())
                .expect("request"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].is_string());
    }
}

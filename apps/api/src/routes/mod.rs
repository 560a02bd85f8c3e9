pub mod auth;
pub mod health;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::header::CONTENT_TYPE,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};

use crate::models::blob::Blob;
use crate::previews;
use crate::raster::object_url::OBJECTS_PATH;
use crate::resumes::handlers;
use crate::session::require_session;
use crate::state::AppState;

/// Room for multipart framing and text fields on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes + FORM_OVERHEAD_BYTES;

    let protected = Router::new()
        .route("/api/v1/auth/sign-out", post(auth::handle_sign_out))
        // Resume API
        .route(
            "/api/v1/resumes",
            post(handlers::handle_upload).get(handlers::handle_list),
        )
        .route("/api/v1/resumes/:id", get(handlers::handle_get))
        .route("/api/v1/resumes/:id/pdf", get(handlers::handle_pdf))
        .route("/api/v1/resumes/:id/image", get(handlers::handle_image))
        // Preview API
        .route("/api/v1/previews", post(previews::handle_create_preview))
        .route(
            "/api/v1/previews/:id",
            delete(previews::handle_release_preview),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/auth/sign-in", post(auth::handle_sign_in))
        .route("/api/v1/auth/session", get(auth::handle_session))
        .route(
            &format!("{OBJECTS_PATH}/:id"),
            get(previews::handle_get_object),
        )
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serves a blob with its recorded content type.
pub fn blob_response(blob: Blob) -> Response {
    ([(CONTENT_TYPE, blob.content_type)], Body::from(blob.bytes)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};
    use bytes::Bytes;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::testing::{fake_pdf, test_state, TEST_ACCESS_KEY};

    const BOUNDARY: &str = "resumind-test-boundary";

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
        Request::post(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    async fn sign_in(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/auth/sign-in")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(format!(r#"{{"access_key":"{TEST_ACCESS_KEY}"}}"#)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(test_state().state);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["engine_loaded"], false);
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        let app = build_router(test_state().state);
        let response = app
            .clone()
            .oneshot(Request::get("/api/v1/resumes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "UNAUTHORIZED");

        let response = app
            .oneshot(
                Request::post("/api/v1/auth/sign-in")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"access_key":"wrong"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sign_in_then_list_and_sign_out() {
        let app = build_router(test_state().state);
        let token = sign_in(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/v1/resumes")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1/auth/sign-out")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::get("/api/v1/auth/session")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["authenticated"], false);
    }

    #[tokio::test]
    async fn test_preview_lifecycle() {
        let test = test_state();
        let objects = test.state.rasterizer.objects().clone();
        let app = build_router(test.state);
        let token = sign_in(&app).await;

        let body = multipart_body(
            &[("scale", "1")],
            Some(("letter.pdf", "application/pdf", &fake_pdf()[..])),
        );
        let response = app
            .clone()
            .oneshot(multipart_request("/api/v1/previews", &token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let preview = body_json(response).await;
        assert_eq!(preview["name"], "letter.png");
        assert_eq!(preview["width"], 612);
        assert_eq!(preview["height"], 792);
        let id = preview["id"].as_str().unwrap().to_string();
        let url = preview["url"].as_str().unwrap();
        assert_eq!(url, format!("http://localhost:8080/objects/{id}"));
        assert_eq!(objects.live_count(), 1);

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/objects/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert!(body_bytes(response).await.starts_with(b"\x89PNG"));

        let release = || {
            Request::delete(format!("/api/v1/previews/{id}"))
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(release()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = app.clone().oneshot(release()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(objects.live_count(), 0);

        let response = app
            .oneshot(
                Request::get(format!("/objects/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preview_rejects_non_pdf() {
        let app = build_router(test_state().state);
        let token = sign_in(&app).await;

        let body = multipart_body(&[], Some(("notes.txt", "text/plain", b"hello".as_slice())));
        let response = app
            .oneshot(multipart_request("/api/v1/previews", &token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "CONVERSION_FAILED");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to convert PDF:"));
    }

    #[tokio::test]
    async fn test_preview_page_out_of_range() {
        let app = build_router(test_state().state);
        let token = sign_in(&app).await;

        let body = multipart_body(
            &[("page", "2")],
            Some(("letter.pdf", "application/pdf", &fake_pdf()[..])),
        );
        let response = app
            .clone()
            .oneshot(multipart_request("/api/v1/previews", &token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = multipart_body(
            &[("page", "0")],
            Some(("letter.pdf", "application/pdf", &fake_pdf()[..])),
        );
        let response = app
            .oneshot(multipart_request("/api/v1/previews", &token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let test = test_state();
        let max = test.state.config.max_upload_bytes;
        let app = build_router(test.state);
        let token = sign_in(&app).await;

        let mut big = fake_pdf().to_vec();
        big.resize(max + 1, b' ');
        let body = multipart_body(&[], Some(("big.pdf", "application/pdf", &big[..])));
        let response = app
            .oneshot(multipart_request("/api/v1/previews", &token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(test.engine.load_count(), 0);
    }

    #[tokio::test]
    async fn test_resume_upload_round_trip() {
        let test = test_state();
        let app = build_router(test.state);
        let token = sign_in(&app).await;

        let body = multipart_body(
            &[
                ("company_name", "Acme"),
                ("job_title", "Backend Engineer"),
                ("job_description", "Rust services"),
            ],
            Some(("cv.pdf", "application/pdf", &fake_pdf()[..])),
        );
        let response = app
            .clone()
            .oneshot(multipart_request("/api/v1/resumes", &token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["companyName"], "Acme");
        assert_eq!(created["feedback"]["overallScore"], 78);
        assert_eq!(created["bands"]["overall"], "moderate");
        assert_eq!(created["bands"]["ats"], "good");
        let id = created["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/resumes/{id}/pdf"))
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/pdf");
        assert_eq!(body_bytes(response).await, fake_pdf());

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/resumes/{}", uuid::Uuid::new_v4()))
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

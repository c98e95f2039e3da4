//! Intake API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::AppContext;
use crate::config::MAX_UPLOAD_BYTES;

/// Headroom for multipart boundaries and the text fields.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn intake_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/upload", post(endpoints::intake::upload))
        .route("/analyze", post(endpoints::analyze::analyze))
        .route("/webhook/invoice", post(endpoints::webhook::format_event))
        .route("/health", get(endpoints::health::check))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::pipeline::extraction::pdfium::MockPdfPageRenderer;
    use crate::pipeline::extraction::{ExtractionAdapter, MockVisionClient};
    use crate::pipeline::sinks::{
        AutomationSink, MockArchiveSink, MockAutomationSink, MockNotificationSink,
    };
    use crate::pipeline::IntakePipeline;
    use crate::settings::{InMemorySettings, SettingsSnapshot, ToggleState};

    const BOUNDARY: &str = "X-INTAKE-TEST";

    const GOOD_RESPONSE: &str = r#"{"invoice_number": "INV-7", "vendor": "Corner Cafe", "amount": "12.50"}"#;

    struct TestApp {
        _root: tempfile::TempDir,
        settings: Arc<InMemorySettings>,
        notifier: Arc<MockNotificationSink>,
        automation: Arc<MockAutomationSink>,
        ctx: AppContext,
    }

    fn test_app(vision_response: &str) -> TestApp {
        let root = tempfile::tempdir().unwrap();
        let notifier = Arc::new(MockNotificationSink::new());
        let automation = Arc::new(MockAutomationSink::new());

        let mut snapshot = SettingsSnapshot::default();
        snapshot
            .routing
            .recipients
            .insert("card-1111".into(), "ap@example.com".into());
        let settings = Arc::new(InMemorySettings::new(snapshot));

        let automation_sink: Option<Arc<dyn AutomationSink>> = Some(automation.clone());
        let pipeline = IntakePipeline::new(
            ExtractionAdapter::new(
                Arc::new(MockVisionClient::new(vision_response)),
                Arc::new(MockPdfPageRenderer::new(1)),
            ),
            Arc::new(MockArchiveSink::new()),
            notifier.clone(),
            automation_sink,
            root.path().join("uploads"),
        );
        let ctx = AppContext::new(Arc::new(pipeline), settings.clone());

        TestApp {
            _root: root,
            settings,
            notifier,
            automation,
            ctx,
        }
    }

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    fn full_form() -> Vec<u8> {
        multipart_body(
            &[
                ("category", "card-1111"),
                ("reason", "Client coffee"),
                ("submitter", "Sam"),
            ],
            Some(("receipt.jpg", JPEG)),
        )
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = test_app(GOOD_RESPONSE);
        let response = intake_router(app.ctx)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
    }

    #[tokio::test]
    async fn upload_runs_pipeline() {
        let app = test_app(GOOD_RESPONSE);
        let response = intake_router(app.ctx.clone())
            .oneshot(multipart_request("/upload", full_form()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "Receipt processed successfully.");
        assert_eq!(json["record"]["vendor"], "Corner Cafe");
        assert_eq!(json["record"]["customer_name"], "N/A");
        assert_eq!(json["archive_reference"], "mock-receipt.jpg");
        assert_eq!(json["notified"], true);
        assert_eq!(json["automation_ran"], true);
        assert_eq!(json["sinks"]["notification"]["status"], "succeeded");
        assert_eq!(app.notifier.call_count(), 1);
        assert_eq!(app.automation.call_count(), 1);
    }

    #[tokio::test]
    async fn upload_reads_toggles_per_request() {
        let app = test_app(GOOD_RESPONSE);
        app.settings
            .set_toggles(ToggleState {
                notifications_enabled: false,
                automation_enabled: true,
            })
            .unwrap();

        let response = intake_router(app.ctx.clone())
            .oneshot(multipart_request("/upload", full_form()))
            .await
            .unwrap();

        let json = json_body(response).await;
        assert_eq!(json["notified"], false);
        assert_eq!(
            json["message"],
            "Receipt processed successfully. (Notifications are disabled)"
        );
        assert_eq!(app.notifier.call_count(), 0);
    }

    #[tokio::test]
    async fn upload_missing_reason_is_400() {
        let app = test_app(GOOD_RESPONSE);
        let body = multipart_body(
            &[("category", "card-1111"), ("submitter", "Sam")],
            Some(("receipt.jpg", JPEG)),
        );
        let response = intake_router(app.ctx)
            .oneshot(multipart_request("/upload", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "MISSING_FIELD");
        assert_eq!(app.notifier.call_count(), 0);
    }

    #[tokio::test]
    async fn upload_without_file_is_no_file() {
        let app = test_app(GOOD_RESPONSE);
        let body = multipart_body(
            &[
                ("category", "card-1111"),
                ("reason", "Client coffee"),
                ("submitter", "Sam"),
            ],
            None,
        );
        let response = intake_router(app.ctx)
            .oneshot(multipart_request("/upload", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "NO_FILE");
    }

    #[tokio::test]
    async fn upload_unknown_category_reports_routing_failure() {
        let app = test_app(GOOD_RESPONSE);
        let body = multipart_body(
            &[
                ("category", "card-0000"),
                ("reason", "Client coffee"),
                ("submitter", "Sam"),
            ],
            Some(("receipt.jpg", JPEG)),
        );
        let response = intake_router(app.ctx)
            .oneshot(multipart_request("/upload", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "ROUTING_FAILED");
        assert_eq!(json["archive_reference"], "mock-receipt.jpg");
        assert_eq!(json["notified"], false);
        assert_eq!(app.notifier.call_count(), 0);
        assert_eq!(app.automation.call_count(), 0);
    }

    #[tokio::test]
    async fn analyze_returns_record_only() {
        let app = test_app(GOOD_RESPONSE);
        let body = multipart_body(&[], Some(("receipt.jpg", JPEG)));
        let response = intake_router(app.ctx)
            .oneshot(multipart_request("/analyze", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["result"]["invoice_number"], "INV-7");
        assert_eq!(app.notifier.call_count(), 0);
    }

    #[tokio::test]
    async fn analyze_degraded_record_keeps_raw_text() {
        let app = test_app("not json at all");
        let body = multipart_body(&[], Some(("receipt.jpg", JPEG)));
        let response = intake_router(app.ctx)
            .oneshot(multipart_request("/analyze", body))
            .await
            .unwrap();

        let json = json_body(response).await;
        assert_eq!(json["result"]["vendor"], "N/A");
        assert_eq!(json["result"]["extraction_error"]["raw_text"], "not json at all");
    }

    #[tokio::test]
    async fn webhook_formats_flat_event() {
        let app = test_app(GOOD_RESPONSE);
        let request = Request::builder()
            .method("POST")
            .uri("/webhook/invoice")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"analysis_result": {"vendor": "Corner Cafe", "amount": "9.00"}, "archive_file_id": "abc"}"#,
            ))
            .unwrap();
        let response = intake_router(app.ctx).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["vendor"], "Corner Cafe");
        assert_eq!(json["invoice_number"], "N/A");
        assert_eq!(json["archive_url"], "https://drive.google.com/file/d/abc/view");
    }

    #[tokio::test]
    async fn webhook_without_file_id_uses_sentinel_url() {
        let app = test_app(GOOD_RESPONSE);
        let request = Request::builder()
            .method("POST")
            .uri("/webhook/invoice")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"analysis_result": null}"#))
            .unwrap();
        let response = intake_router(app.ctx).oneshot(request).await.unwrap();
        assert_eq!(json_body(response).await["archive_url"], "N/A");
    }

    #[tokio::test]
    async fn webhook_rejects_non_object_analysis() {
        let app = test_app(GOOD_RESPONSE);
        let request = Request::builder()
            .method("POST")
            .uri("/webhook/invoice")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"analysis_result": [1, 2]}"#))
            .unwrap();
        let response = intake_router(app.ctx).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_malformed_json_is_structured_400() {
        let app = test_app(GOOD_RESPONSE);
        let request = Request::builder()
            .method("POST")
            .uri("/webhook/invoice")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"analysis_result": "#))
            .unwrap();
        let response = intake_router(app.ctx).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn upload_without_multipart_content_type_is_structured_400() {
        let app = test_app(GOOD_RESPONSE);
        for uri in ["/upload", "/analyze"] {
            let request = Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap();
            let response = intake_router(app.ctx.clone()).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(json_body(response).await["error"]["code"], "BAD_REQUEST");
        }
        assert_eq!(app.notifier.call_count(), 0);
    }
}

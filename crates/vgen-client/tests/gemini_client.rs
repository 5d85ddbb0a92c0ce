//! Gemini client tests against a mock HTTP server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vgen_client::{
    ClientError, GeminiClient, GeminiConfig, VideoBackend, VideoOperation, VideoReference,
    VideoRequest,
};
use vgen_models::ImageData;

// =============================================================================
// Test Helpers
// =============================================================================

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiConfig {
        base_url: format!("{}/v1beta", server.uri()),
        video_model: "veo-test".to_string(),
        text_model: "text-test".to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn image() -> ImageData {
    ImageData::new(b"png-bytes".to_vec(), "image/png").unwrap()
}

// =============================================================================
// Video Generation
// =============================================================================

#[tokio::test]
async fn test_submit_sends_prompt_image_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/veo-test:predictLongRunning"))
        .and(header("x-goog-api-key", "key-1"))
        .and(body_partial_json(json!({
            "instances": [{
                "prompt": "waves at dusk",
                "image": { "mimeType": "image/png", "bytesBase64Encoded": image().to_base64() }
            }]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "models/veo-test/operations/op-1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let op = client
        .submit_video_generation(&VideoRequest::new("waves at dusk", Some(image())), "key-1")
        .await
        .unwrap();

    assert_eq!(op.name, "models/veo-test/operations/op-1");
}

#[tokio::test]
async fn test_submit_error_keeps_status_in_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .submit_video_generation(&VideoRequest::new("a cat", None), "key-1")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Api { status: 429, .. }));
    assert!(err.to_string().contains("429"));
}

#[tokio::test]
async fn test_poll_pending_and_done() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models/veo-test/operations/pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "models/veo-test/operations/pending"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models/veo-test/operations/done"))
        .and(header("x-goog-api-key", "key-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "models/veo-test/operations/done",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [
                        { "video": { "uri": "https://files.example/video-1" } }
                    ]
                }
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let pending = VideoOperation {
        name: "models/veo-test/operations/pending".into(),
    };
    let status = client.poll_video_operation(&pending, "key-2").await.unwrap();
    assert!(!status.done);

    let done = VideoOperation {
        name: "models/veo-test/operations/done".into(),
    };
    let status = client.poll_video_operation(&done, "key-2").await.unwrap();
    assert!(status.done);
    assert_eq!(status.videos.len(), 1);
    assert_eq!(status.videos[0].uri, "https://files.example/video-1");
}

#[tokio::test]
async fn test_poll_reports_operation_error_and_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/operations/failed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/failed",
            "done": true,
            "error": { "code": 3, "message": "invalid image" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1beta/operations/filtered"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "operations/filtered",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "raiMediaFilteredCount": 1,
                    "raiMediaFilteredReasons": ["unsafe content"]
                }
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let failed = VideoOperation {
        name: "operations/failed".into(),
    };
    let status = client.poll_video_operation(&failed, "k").await.unwrap();
    assert!(status.done);
    assert_eq!(status.error.as_deref(), Some("invalid image (code 3)"));

    let filtered = VideoOperation {
        name: "operations/filtered".into(),
    };
    let status = client.poll_video_operation(&filtered, "k").await.unwrap();
    assert!(status.done);
    assert!(status.videos.is_empty());
    assert_eq!(status.filtered_reasons, vec!["unsafe content".to_string()]);
}

#[tokio::test]
async fn test_fetch_video_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/video-1"))
        .and(header("x-goog-api-key", "key-3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4-data".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let video = VideoReference {
        uri: format!("{}/files/video-1", server.uri()),
    };
    let bytes = client.fetch_video_bytes(&video, "key-3").await.unwrap();
    assert_eq!(&bytes[..], b"mp4-data");

    let missing = VideoReference {
        uri: format!("{}/files/missing", server.uri()),
    };
    let err = client.fetch_video_bytes(&missing, "key-3").await.unwrap_err();
    assert!(matches!(err, ClientError::Fetch(_)));
}

// =============================================================================
// Prompt Writing
// =============================================================================

#[tokio::test]
async fn test_describe_image_sends_inline_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-test:generateContent"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "inlineData": { "mimeType": "image/png" } }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "  A lighthouse as waves roll in.  " }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client_for(&server)
        .describe_image_for_video(&image(), "key-1")
        .await
        .unwrap();
    assert_eq!(text, "A lighthouse as waves roll in.");
}

#[tokio::test]
async fn test_rephrase_prompt_and_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-test:generateContent"))
        .and(header("x-goog-api-key", "good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "A cat leaps" }, { "text": " across rooftops." }] } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-test:generateContent"))
        .and(header("x-goog-api-key", "empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let text = client.rephrase_prompt("cat jumping", "good").await.unwrap();
    assert_eq!(text, "A cat leaps across rooftops.");

    let err = client.rephrase_prompt("cat jumping", "empty").await.unwrap_err();
    assert!(matches!(err, ClientError::EmptyResponse(_)));
}

// =============================================================================
// Credential Handling
// =============================================================================

#[tokio::test]
async fn test_transport_errors_do_not_reveal_the_key() {
    let client = GeminiClient::new(GeminiConfig {
        base_url: "http://127.0.0.1:1/v1beta".to_string(),
        video_model: "veo-test".to_string(),
        ..Default::default()
    })
    .unwrap();

    let err = client
        .submit_video_generation(&VideoRequest::new("a cat", None), "SECRET-KEY-123")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Request(_)));
    assert!(!err.to_string().contains("SECRET-KEY-123"));

    let video = VideoReference {
        uri: "http://127.0.0.1:1/v1beta/files/abc:download?alt=media".to_string(),
    };
    let err = client.fetch_video_bytes(&video, "SECRET-KEY-123").await.unwrap_err();
    assert!(!err.to_string().contains("SECRET-KEY-123"));
}

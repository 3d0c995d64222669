use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;
use triage_api_client::RetryPolicy;
use triage_core::AnalyzerConfig;
use triage_core::NO_FINDINGS_MESSAGE;
use triage_core::READ_ERROR_MESSAGE;
use triage_core::run_analysis;
use triage_core::spawn_analysis;
use triage_core::spawn_with_callback;
use triage_core::stream_model_report;
use triage_core::summarize_report;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_partial_json;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn test_config(server: &MockServer) -> AnalyzerConfig {
    AnalyzerConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
        },
        ..AnalyzerConfig::default()
    }
}

fn write_report(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn model_answer(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [ { "message": { "role": "assistant", "content": content } } ]
    })
}

const SAMPLE_REPORT: &str = r#"{
    "Results": [ { "Vulnerabilities": [
        { "VulnerabilityID": "CVE-2024-1111", "PkgName": "openssl",
          "Severity": "CRITICAL", "Title": "heap overflow" }
    ]}]
}"#;

#[tokio::test]
async fn run_analysis_returns_the_model_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_answer("## Report\nfix openssl")))
        .expect(1)
        .mount(&server)
        .await;

    let file = write_report(SAMPLE_REPORT);
    let text = run_analysis(&test_config(&server), file.path()).await;
    assert_eq!(text, "## Report\nfix openssl");
}

#[tokio::test]
async fn read_error_short_circuits_before_the_model_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_answer("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let text = run_analysis(&test_config(&server), Path::new("/no/such/result.json")).await;
    assert_eq!(text, READ_ERROR_MESSAGE);
}

#[tokio::test]
async fn empty_report_still_queries_for_general_guidance() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_answer("general guidance")))
        .expect(1)
        .mount(&server)
        .await;

    let file = write_report(r#"{ "Results": [] }"#);
    let text = run_analysis(&test_config(&server), file.path()).await;
    assert_eq!(text, "general guidance");

    // The prompt carried the fixed no-findings message rather than an empty list.
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains(NO_FINDINGS_MESSAGE));
    assert!(user.contains(r#"{"total":0}"#));
}

#[tokio::test]
async fn exhausted_retries_surface_as_a_diagnostic_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let file = write_report(SAMPLE_REPORT);
    let text = run_analysis(&test_config(&server), file.path()).await;
    assert!(
        text.starts_with("Error querying the model (retries exhausted): "),
        "unexpected diagnostic: {text}"
    );
}

#[tokio::test]
async fn streamed_config_aggregates_the_model_answer() {
    let server = MockServer::start().await;
    let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"streamed \"}}]}\n\n\
               data: {\"choices\":[{\"delta\":{\"content\":\"answer\"}}]}\n\n\
               data: [DONE]\n\n";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(sse, "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.stream = true;
    let file = write_report(SAMPLE_REPORT);
    let text = run_analysis(&config, file.path()).await;
    assert_eq!(text, "streamed answer");
}

#[tokio::test]
async fn stream_model_report_forwards_deltas_to_the_sink() {
    let server = MockServer::start().await;
    let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"live\"}}]}\n\n\
               data: {\"choices\":[{\"delta\":{\"content\":\" text\"}}]}\n\n\
               data: [DONE]\n\n";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(sse, "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let file = write_report(SAMPLE_REPORT);
    let summary = summarize_report(file.path(), 50);
    let mut received = String::new();
    let mut sink = |delta: &str| received.push_str(delta);
    stream_model_report(&test_config(&server), &summary, &mut sink)
        .await
        .unwrap();
    assert_eq!(received, "live text");
}

#[tokio::test]
async fn callback_fires_exactly_once_for_a_valid_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(model_answer("done")))
        .mount(&server)
        .await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_ref = calls.clone();
    let file = write_report(SAMPLE_REPORT);

    let handle = spawn_analysis(test_config(&server), file.path().to_path_buf(), move |text| {
        calls_ref.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(text);
    });

    let text = rx.recv().await.unwrap();
    handle.await.unwrap();
    assert_eq!(text, "done");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn callback_fires_exactly_once_for_a_malformed_report() {
    let server = MockServer::start().await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let file = write_report("{ not json");

    let handle = spawn_analysis(test_config(&server), file.path().to_path_buf(), move |text| {
        let _ = tx.send(text);
    });

    let text = rx.recv().await.unwrap();
    handle.await.unwrap();
    assert_eq!(text, READ_ERROR_MESSAGE);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn callback_fires_exactly_once_when_the_task_panics() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_ref = calls.clone();

    let handle = spawn_with_callback(
        async { panic!("report processing blew up") },
        move |text| {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(text);
        },
    );

    let text = rx.recv().await.unwrap();
    handle.await.unwrap();
    assert_eq!(text, "Error during analysis: report processing blew up");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn callback_fires_exactly_once_when_the_backend_is_unreachable() {
    // Point at a closed port so every attempt fails with a connection error.
    let config = AnalyzerConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
        },
        ..AnalyzerConfig::default()
    };
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let file = write_report(SAMPLE_REPORT);

    let handle = spawn_analysis(config, file.path().to_path_buf(), move |text| {
        let _ = tx.send(text);
    });

    let text = rx.recv().await.unwrap();
    handle.await.unwrap();
    assert!(
        text.starts_with("Error querying the model (retries exhausted): "),
        "unexpected diagnostic: {text}"
    );
    assert!(rx.try_recv().is_err());
}

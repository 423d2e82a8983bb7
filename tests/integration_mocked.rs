/// Integration tests with a mocked validation API
/// Tests the reqwest transport, retry wrapper and job workflow without hitting the real service
use rust_email_validation::api_client::{ApiClient, ApiRequest, ReqwestTransport};
use rust_email_validation::clock::TokioClock;
use rust_email_validation::config::Config;
use rust_email_validation::errors::AppError;
use rust_email_validation::jobs::{CreateJobOptions, JobController, ResultsQuery, WaitOptions};
use rust_email_validation::router::{ExecuteRequest, NodeRouter};
use rust_email_validation::services::ValidationService;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(api_base_url: String) -> Config {
    Config {
        port: 8080,
        api_base_url,
        api_key: "test_key".to_string(),
        api_key_header: "X-API-Key".to_string(),
        request_timeout_secs: 5,
        retry_base_delay_ms: 1,
    }
}

fn api_client(server: &MockServer) -> ApiClient {
    let config = create_test_config(server.uri());
    let transport = ReqwestTransport::new(&config).expect("client builds");
    ApiClient::new(
        Arc::new(transport),
        Arc::new(TokioClock),
        Duration::from_millis(config.retry_base_delay_ms),
    )
}

#[tokio::test]
async fn test_validate_email_sends_key_and_enriches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/validate/email"))
        .and(header("X-API-Key", "test_key"))
        .and(body_json(json!({"email": "joao@test.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email": "joao@test.com",
            "valid": true,
            "status": "deliverable",
            "risk_score": 0.12,
            "quality_score": 0.85,
            "is_disposable": false
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = ValidationService::new(api_client(&mock_server));
    let result = service
        .validate_one("Joao@Test.com", false, false)
        .await
        .unwrap();

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["risk_level"], json!("low"));
    assert_eq!(value["quality_tier"], json!("excellent"));
    assert_eq!(value["is_safe_to_send"], json!(true));
    assert_eq!(value["is_disposable"], json!(false));
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/billing/usage"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"message": "slow down"})))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/billing/usage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"credits_remaining": 42})))
        .mount(&mock_server)
        .await;

    let api = api_client(&mock_server);
    let request = ApiRequest::get("/billing/usage");
    let body = api.call("Get usage", request).await.unwrap();

    assert_eq!(body["credits_remaining"], json!(42));
    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn test_configured_request_timeout_applies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/billing/usage"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"credits_remaining": 1}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let config = Config {
        request_timeout_secs: 1,
        ..create_test_config(mock_server.uri())
    };
    let transport = ReqwestTransport::new(&config).expect("client builds");
    let api = ApiClient::new(
        Arc::new(transport),
        Arc::new(TokioClock),
        Duration::from_millis(config.retry_base_delay_ms),
    );

    let started = std::time::Instant::now();
    let result = api
        .call("Get usage", ApiRequest::get("/billing/usage"))
        .await;

    assert!(matches!(result, Err(AppError::Transport(_))));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_request_timeout_override() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/billing/subscription"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"plan": "pro"}))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&mock_server)
        .await;

    let api = api_client(&mock_server);
    let result = api
        .call(
            "Get plan",
            ApiRequest::get("/billing/subscription").timeout(Duration::from_millis(200)),
        )
        .await;

    assert!(matches!(result, Err(AppError::Transport(_))));
}

#[tokio::test]
async fn test_not_found_maps_to_readable_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Job not found"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let jobs = JobController::new(api_client(&mock_server));
    let err = jobs.get_status("missing").await.unwrap_err();

    match &err {
        AppError::RemoteApi {
            status_code,
            message,
            ..
        } => {
            assert_eq!(*status_code, 404);
            assert_eq!(message, "Job not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("job ID may be invalid"));
}

#[tokio::test]
async fn test_unmapped_status_uses_generic_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/jobs/j1/cancel"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"error": "already finished"})))
        .mount(&mock_server)
        .await;

    let jobs = JobController::new(api_client(&mock_server));
    let err = jobs.cancel_job("j1").await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Cancel job failed: already finished (409)"
    );
}

#[tokio::test]
async fn test_results_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs/job-7/results"))
        .and(query_param("page", "2"))
        .and(query_param("page_size", "25"))
        .and(query_param("status", "risky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 2,
            "page_size": 25,
            "results": [
                {"email": "r@s.com", "valid": true, "status": "risky", "risk_score": 0.75}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let jobs = JobController::new(api_client(&mock_server));
    let page = jobs
        .get_results(
            "job-7",
            &ResultsQuery {
                page: 2,
                page_size: 25,
                status_filter: Some("risky".to_string()),
                include_statistics: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(page.results.len(), 1);
    assert!(page.results[0].is_high_risk);
    assert!(page.statistics.is_none());
}

#[tokio::test]
async fn test_create_and_wait_for_job() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "job_id": "job-42",
            "status": "pending"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/jobs/job-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "job-42",
            "status": "processing",
            "processed": 1,
            "total_emails": 2
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/jobs/job-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "job-42",
            "status": "completed",
            "processed": 2,
            "total_emails": 2
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/jobs/job-42/results"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"email": "a@b.com", "valid": true, "status": "deliverable", "risk_score": 0.1},
                {"email": "c@d.com", "valid": false, "status": "undeliverable", "risk_score": 0.9}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let jobs = JobController::new(api_client(&mock_server));
    let created = jobs
        .create_job(
            vec!["a@b.com".to_string(), "c@d.com".to_string()],
            &CreateJobOptions {
                deduplicate: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created["job_id"], json!("job-42"));

    let completed = jobs
        .wait_for_completion(
            "job-42",
            &WaitOptions {
                max_wait: Duration::from_secs(5),
                poll_interval: Duration::from_millis(20),
                fetch_results: true,
                include_statistics: true,
            },
        )
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(completed.poll_count, 2);
    assert_eq!(completed.status.progress_percent, 100.0);
    assert_eq!(completed.results.as_ref().map(Vec::len), Some(2));
    let stats = completed.statistics.unwrap().breakdown.unwrap();
    assert_eq!(stats.deliverability_rate, 50.0);
    assert_eq!(stats.high_risk, 1);
}

#[tokio::test]
async fn test_router_end_to_end_with_continue_on_fail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"job_id": "1", "status": "completed"},
            {"job_id": "2", "status": "pending"}
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "bad key"})))
        .mount(&mock_server)
        .await;

    let router = NodeRouter::new(api_client(&mock_server));
    let request: ExecuteRequest = serde_json::from_value(json!({
        "resource": "job",
        "operation": "list",
        "continue_on_fail": true,
        "items": [{"limit": 5}, {"limit": 1}]
    }))
    .unwrap();

    let output = router.execute(&request).await.unwrap();

    assert_eq!(output.len(), 3);
    assert_eq!(output[0]["is_completed"], json!(true));
    assert_eq!(output[1]["is_processing"], json!(true));
    assert_eq!(output[2]["success"], json!(false));
    assert_eq!(output[2]["error_code"], json!(401));
}

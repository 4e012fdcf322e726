//! End-to-end tests for the ad-metrics flow over real HTTP.

use std::time::Duration;

use haulage_core::adapters::applovin::REPORT_COLUMNS;
use haulage_core::pipeline::{AD_DATASET, AD_TABLE};
use haulage_core::transform::AD_METRIC_FIELDS;
use haulage_core::{run_ad_metrics, AppLovinClient, PipelineError, ReportWindow, RetryConfig, RunOutcome};
use haulage_tests::{http_client, recording_sleeper, rows, temp_warehouse};
use serde_json::json;
use time::macros::date;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window() -> ReportWindow {
    ReportWindow::ending_before(date!(2025 - 01 - 08))
}

fn full_record() -> serde_json::Value {
    json!({
        "day": "2025-01-07",
        "hour": "00:00",
        "campaign": "Spring",
        "campaign_id": "c-1",
        "ad": "Spring video",
        "ad_id": "a-1",
        "ad_type": "VIDEO",
        "ad_creative_type": "video",
        "creative_set": "Spring set",
        "creative_set_id": "cs-9",
        "impressions": "1200",
        "clicks": "36",
        "ctr": "0.03",
        "conversions": "4",
        "cost": "4.20",
        "sales": "19.96",
        "roas_0d": "3.1",
        "roas_7d": "4.75",
        "chka_0d": "2",
        "chka_7d": "3",
        "chka_usd_0d": "9.98",
        "chka_usd_7d": "14.97",
        "cost_per_chka_0d": "2.10",
        "cost_per_chka_7d": "1.40"
    })
}

fn report_body() -> serde_json::Value {
    json!({"code": 200, "results": [full_record()]})
}

fn table_rows(sql_columns: &str) -> String {
    format!("SELECT {sql_columns} FROM {AD_DATASET}.\"{AD_TABLE}\"")
}

#[tokio::test]
async fn when_the_api_rate_limits_once_the_run_waits_and_loads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("start", "2025-01-01"))
        .and(query_param("end", "2025-01-07"))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_body()))
        .expect(1)
        .mount(&server)
        .await;

    let (_temp, warehouse) = temp_warehouse();
    let (sleeper, recorder) = recording_sleeper();
    let client = AppLovinClient::new("test-key", http_client(), sleeper)
        .with_report_url(format!("{}/report", server.uri()));

    let report = run_ad_metrics(&client, &warehouse, window())
        .await
        .expect("run succeeds after one retry");

    assert_eq!(recorder.pauses(), vec![Duration::from_secs(5)]);
    assert!(matches!(report.outcome, RunOutcome::Loaded { ref load } if load.rows_loaded == 1));

    let record = full_record();
    let select = AD_METRIC_FIELDS
        .iter()
        .map(|(output, _)| format!("\"{output}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let expected = AD_METRIC_FIELDS
        .iter()
        .map(|(_, source)| record[*source].clone())
        .collect::<Vec<_>>();
    assert_eq!(REPORT_COLUMNS.len(), 24);
    assert!(REPORT_COLUMNS.iter().all(|column| record.get(*column).is_some()));
    assert_eq!(rows(&warehouse, &table_rows(&select)), vec![expected]);
}

#[tokio::test]
async fn when_rate_limiting_persists_the_run_fails_without_loading() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let (_temp, warehouse) = temp_warehouse();
    let (sleeper, recorder) = recording_sleeper();
    let client = AppLovinClient::new("test-key", http_client(), sleeper)
        .with_report_url(format!("{}/report", server.uri()))
        .with_retry(RetryConfig::with_max_retries(2));

    let error = run_ad_metrics(&client, &warehouse, window())
        .await
        .expect_err("retry budget exhausted");

    assert!(matches!(
        error,
        PipelineError::RateLimited {
            attempts: 3,
            retry_after_secs: 60
        }
    ));
    assert_eq!(recorder.pauses(), vec![Duration::from_secs(60); 2]);
    assert_eq!(
        rows(&warehouse, "SELECT COUNT(*) FROM _haulage_loads"),
        vec![vec![json!(0)]]
    );
}

#[tokio::test]
async fn a_second_run_replaces_the_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"day": "2025-01-05", "ad_id": "old-1"},
                {"day": "2025-01-06", "ad_id": "old-2"}
            ]
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(200).set_body_json(report_body()))
        .mount(&server)
        .await;

    let (_temp, warehouse) = temp_warehouse();
    let (sleeper, _) = recording_sleeper();
    let client = AppLovinClient::new("test-key", http_client(), sleeper)
        .with_report_url(format!("{}/report", server.uri()));

    run_ad_metrics(&client, &warehouse, window()).await.expect("first run");
    assert_eq!(rows(&warehouse, &table_rows("COUNT(*)")), vec![vec![json!(2)]]);

    run_ad_metrics(&client, &warehouse, window()).await.expect("second run");
    assert_eq!(
        rows(&warehouse, &table_rows("ad_id")),
        vec![vec![json!("a-1")]]
    );
}

#[tokio::test]
async fn a_server_error_surfaces_status_and_truncated_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(5_000)))
        .mount(&server)
        .await;

    let (_temp, warehouse) = temp_warehouse();
    let (sleeper, recorder) = recording_sleeper();
    let client = AppLovinClient::new("test-key", http_client(), sleeper)
        .with_report_url(format!("{}/report", server.uri()));

    let error = run_ad_metrics(&client, &warehouse, window())
        .await
        .expect_err("server error");

    match error {
        PipelineError::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body.chars().count(), 1_000);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(recorder.pauses().is_empty());
}

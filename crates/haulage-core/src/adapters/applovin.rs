use std::sync::Arc;
use std::time::Duration;

use haulage_warehouse::Row;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::domain::ReportWindow;
use crate::error::{truncate_body, PipelineError};
use crate::http_client::{HttpClient, HttpRequest};
use crate::retry::{execute_with_retry, RetryConfig};
use crate::sleep::Sleeper;

pub const REPORT_URL: &str = "https://r.applovin.com/report";
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(120);

/// Upstream error bodies are cut to this many characters.
pub const ERROR_BODY_LIMIT: usize = 1_000;

/// Columns requested from the report endpoint, in request order.
pub const REPORT_COLUMNS: [&str; 24] = [
    "day",
    "hour",
    "campaign",
    "campaign_id",
    "ad",
    "ad_id",
    "ad_type",
    "ad_creative_type",
    "creative_set",
    "creative_set_id",
    "impressions",
    "clicks",
    "ctr",
    "conversions",
    "cost",
    "sales",
    "roas_0d",
    "roas_7d",
    "chka_0d",
    "chka_7d",
    "chka_usd_0d",
    "chka_usd_7d",
    "cost_per_chka_0d",
    "cost_per_chka_7d",
];

/// Keys that may hold the record array, tried in order.
const RECORD_KEYS: [&str; 3] = ["results", "data", "rows"];

/// Ad-report API client.
#[derive(Clone)]
pub struct AppLovinClient {
    http_client: Arc<dyn HttpClient>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryConfig,
    api_key: String,
    report_url: String,
}

impl AppLovinClient {
    pub fn new(
        api_key: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            http_client,
            sleeper,
            retry: RetryConfig::default(),
            api_key: api_key.into(),
            report_url: String::from(REPORT_URL),
        }
    }

    pub fn with_report_url(mut self, report_url: impl Into<String>) -> Self {
        self.report_url = report_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn report_request(&self, window: &ReportWindow) -> HttpRequest {
        HttpRequest::get(self.report_url.as_str())
            .with_secret_query("api_key", &self.api_key)
            .with_query("start", &window.start_iso())
            .with_query("end", &window.end_iso())
            .with_query("format", "json")
            .with_query("columns", &REPORT_COLUMNS.join(","))
            .with_timeout(REPORT_TIMEOUT)
    }

    /// Fetch raw report records for `window`.
    ///
    /// # Errors
    /// Non-2xx statuses other than 429 fail with [`PipelineError::Api`];
    /// 429 is retried per [`RetryConfig`]; a body that is not a JSON object,
    /// or a record that is not an object, is [`PipelineError::MalformedResponse`].
    pub async fn fetch_report(&self, window: &ReportWindow) -> Result<Vec<Row>, PipelineError> {
        let request = self.report_request(window);
        info!(
            start = %window.start_iso(),
            end = %window.end_iso(),
            columns = REPORT_COLUMNS.len(),
            "requesting ad report"
        );

        let response = execute_with_retry(
            self.http_client.as_ref(),
            self.sleeper.as_ref(),
            &self.retry,
            &request,
        )
        .await?;

        if !response.is_success() {
            let body = truncate_body(&response.body, ERROR_BODY_LIMIT);
            error!(
                status = response.status,
                url = %request.redacted_url(),
                body = %body,
                "ad report request failed"
            );
            return Err(PipelineError::Api {
                status: response.status,
                body,
            });
        }

        let records = parse_report(&response.body)?;
        info!(records = records.len(), "ad report fetched");
        if let Some(first) = records.first() {
            debug!(fields = ?first.keys().collect::<Vec<_>>(), "ad report record fields");
        }
        Ok(records)
    }
}

fn parse_report(body: &str) -> Result<Vec<Row>, PipelineError> {
    let payload: Value = serde_json::from_str(body).map_err(|error| {
        PipelineError::MalformedResponse(format!("ad report body is not JSON: {error}"))
    })?;
    let Value::Object(mut payload) = payload else {
        return Err(PipelineError::MalformedResponse(String::from(
            "ad report body is not a JSON object",
        )));
    };

    let records = RECORD_KEYS
        .iter()
        .find_map(|key| match payload.remove(*key) {
            Some(Value::Array(items)) if !items.is_empty() => Some(items),
            _ => None,
        })
        .unwrap_or_default();

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| match record {
            Value::Object(fields) => Ok(fields),
            other => Err(PipelineError::MalformedResponse(format!(
                "ad report record {index} is not an object: {other}"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpResponse;
    use crate::sleep::RecordingSleeper;
    use crate::testing::ScriptedHttpClient;
    use time::macros::date;

    fn client(http: Arc<ScriptedHttpClient>, sleeper: Arc<RecordingSleeper>) -> AppLovinClient {
        AppLovinClient::new("key-123", http, sleeper).with_report_url("https://ads.test/report")
    }

    fn window() -> ReportWindow {
        ReportWindow::ending_before(date!(2025 - 03 - 10))
    }

    #[tokio::test]
    async fn builds_report_request_with_window_and_columns() {
        let http = Arc::new(ScriptedHttpClient::replying(vec![HttpResponse::ok_json(
            r#"{"results":[{"day":"2025-03-09","ad_id":"a1"}]}"#,
        )]));
        let sleeper = Arc::new(RecordingSleeper::new());

        let records = client(Arc::clone(&http), sleeper)
            .fetch_report(&window())
            .await
            .expect("records");

        assert_eq!(records.len(), 1);
        let request = &http.requests()[0];
        assert!(request.url.starts_with("https://ads.test/report?api_key=key-123"));
        assert!(request.url.contains("&start=2025-03-03&end=2025-03-09&format=json"));
        assert!(request.url.contains("columns=day%2Chour%2Ccampaign%2Ccampaign_id"));
        assert_eq!(request.timeout_ms, 120_000);
        assert!(!request.redacted_url().contains("key-123"));
    }

    #[tokio::test]
    async fn rate_limit_sleeps_then_reissues_same_request() {
        let http = Arc::new(ScriptedHttpClient::replying(vec![
            HttpResponse::new(429, "").with_header("Retry-After", "5"),
            HttpResponse::ok_json(r#"{"data":[{"day":"2025-03-09"}]}"#),
        ]));
        let sleeper = Arc::new(RecordingSleeper::new());

        let records = client(Arc::clone(&http), Arc::clone(&sleeper))
            .fetch_report(&window())
            .await
            .expect("records");

        assert_eq!(records.len(), 1);
        assert_eq!(sleeper.pauses(), vec![Duration::from_secs(5)]);
        let requests = http.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test]
    async fn client_errors_fail_fast_with_truncated_body() {
        let body = "x".repeat(2_500);
        let http = Arc::new(ScriptedHttpClient::replying(vec![HttpResponse::new(403, body)]));
        let sleeper = Arc::new(RecordingSleeper::new());

        let error = client(Arc::clone(&http), Arc::clone(&sleeper))
            .fetch_report(&window())
            .await
            .expect_err("403");

        match error {
            PipelineError::Api { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body.len(), 1_000);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(http.requests().len(), 1);
        assert!(sleeper.pauses().is_empty());
    }

    #[test]
    fn first_non_empty_array_wins() {
        let rows = parse_report(r#"{"results":[],"data":[{"ad_id":"d"}],"rows":[{"ad_id":"r"}]}"#)
            .expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["ad_id"], "d");

        assert!(parse_report(r#"{"status":"ok"}"#).expect("rows").is_empty());
    }

    #[test]
    fn non_object_payloads_are_malformed() {
        assert!(matches!(
            parse_report("[1,2]"),
            Err(PipelineError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_report(r#"{"results":[{"day":"d"}, 7]}"#),
            Err(PipelineError::MalformedResponse(_))
        ));
    }
}

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::adapters::queries::{LINE_ITEMS_QUERY, ORDERS_QUERY};
use crate::cursor::Watermark;
use crate::domain::OrderRecord;
use crate::error::{truncate_body, PipelineError};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::retry::{execute_with_retry, RetryConfig};
use crate::sleep::Sleeper;
use crate::throttling::{orders_items_count, CreditState, CreditTracker};

pub const AUTH_URL: &str = "https://public-api.shiphero.com/auth/token";
pub const GRAPHQL_URL: &str = "https://public-api.shiphero.com/graphql";
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(30);
pub const GRAPHQL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_ORDERS_LIMIT: u32 = 500;

const ERROR_BODY_LIMIT: usize = 1_000;

/// Login for the token endpoint.
#[derive(Clone)]
pub struct ShipHeroCredentials {
    pub username: String,
    pub password: String,
}

impl Debug for ShipHeroCredentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShipHeroCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Bearer token, held for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken(len={})", self.0.len())
    }
}

/// Result of one incremental orders fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum OrdersFetch {
    /// Nothing strictly newer than the watermark; state must not move.
    NoNewData { freshest: Option<Watermark> },
    /// Orders with line items attached, plus the maximum `updated_at` seen.
    Fetched {
        orders: Vec<OrderRecord>,
        freshest: Watermark,
    },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
    #[serde(default)]
    extensions: Option<Value>,
}

/// Warehouse-management GraphQL API client.
#[derive(Clone)]
pub struct ShipHeroClient {
    http_client: Arc<dyn HttpClient>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryConfig,
    auth_url: String,
    graphql_url: String,
    orders_limit: u32,
}

impl ShipHeroClient {
    pub fn new(http_client: Arc<dyn HttpClient>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            http_client,
            sleeper,
            retry: RetryConfig::default(),
            auth_url: String::from(AUTH_URL),
            graphql_url: String::from(GRAPHQL_URL),
            orders_limit: DEFAULT_ORDERS_LIMIT,
        }
    }

    pub fn with_endpoints(mut self, auth_url: impl Into<String>, graphql_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.graphql_url = graphql_url.into();
        self
    }

    pub fn with_orders_limit(mut self, orders_limit: u32) -> Self {
        self.orders_limit = orders_limit;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Exchange username and password for a bearer token.
    ///
    /// # Errors
    /// Any transport failure, non-2xx status or token-less body is
    /// [`PipelineError::Auth`].
    pub async fn authenticate(
        &self,
        credentials: &ShipHeroCredentials,
    ) -> Result<AccessToken, PipelineError> {
        info!(username = %credentials.username, "requesting access token");
        let request = HttpRequest::post(self.auth_url.as_str())
            .with_json_body(&json!({
                "username": credentials.username,
                "password": credentials.password,
            }))
            .with_timeout(AUTH_TIMEOUT);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| PipelineError::Auth(format!("token request failed: {error}")))?;

        if !response.is_success() {
            return Err(PipelineError::Auth(format!(
                "token endpoint returned status {}: {}",
                response.status,
                truncate_body(&response.body, ERROR_BODY_LIMIT)
            )));
        }

        let payload: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|error| PipelineError::Auth(format!("token response is not JSON: {error}")))?;
        let token = [payload.access_token, payload.token]
            .into_iter()
            .flatten()
            .find(|token| !token.is_empty())
            .ok_or_else(|| {
                PipelineError::Auth(String::from("token response missing 'access_token'"))
            })?;

        info!(token_len = token.len(), "access token obtained");
        Ok(AccessToken(token))
    }

    /// Fetch orders updated in `[since, until]` and attach their line items.
    ///
    /// Line-item calls are made one order at a time, in response order,
    /// pausing whenever the remaining credits would not cover the next call.
    pub async fn fetch_orders(
        &self,
        token: &AccessToken,
        since: &Watermark,
        until: &str,
    ) -> Result<OrdersFetch, PipelineError> {
        info!(since = %since, until, limit = self.orders_limit, "querying orders");
        let response = self
            .graphql(
                token,
                ORDERS_QUERY,
                json!({
                    "updated_from": since.as_str(),
                    "updated_to": until,
                    "analyze": false,
                    "first": self.orders_limit,
                }),
            )
            .await?;

        let nodes = edge_nodes(response.data.as_ref(), "/orders/data/edges");
        if let Some(items_count) = orders_items_count(response.extensions.as_ref()) {
            info!(items_count, "orders reported by the query cost");
        }
        let credits = CreditState::from_extensions(response.extensions.as_ref())?;

        let mut orders = nodes
            .into_iter()
            .map(OrderRecord::from_node)
            .collect::<Result<Vec<_>, _>>()?;

        let Some(freshest) = orders.iter().map(OrderRecord::updated_at).max().cloned() else {
            info!("no orders returned");
            return Ok(OrdersFetch::NoNewData { freshest: None });
        };
        info!(freshest = %freshest, orders = orders.len(), "orders retrieved");

        if !freshest.is_after(since) {
            info!(since = %since, "no order is newer than the watermark");
            return Ok(OrdersFetch::NoNewData {
                freshest: Some(freshest),
            });
        }

        let mut tracker = CreditTracker::new(credits);
        for order in &mut orders {
            if let Some(pause) = tracker.pause_before_next() {
                warn!(
                    credits_remaining = tracker.credits_remaining(),
                    next_cost = tracker.next_cost(),
                    delay_secs = pause.as_secs_f64(),
                    "credits low, pausing before line-item query"
                );
                self.sleeper.sleep(pause).await;
            }

            let response = self
                .graphql(token, LINE_ITEMS_QUERY, json!({ "id": order.id() }))
                .await?;
            let items = edge_nodes(response.data.as_ref(), "/order/data/line_items/edges");
            tracker.observe(CreditState::from_extensions(response.extensions.as_ref())?);
            debug!(order_id = order.id(), line_items = items.len(), "line items attached");
            order.set_line_items(items);
        }

        Ok(OrdersFetch::Fetched { orders, freshest })
    }

    async fn graphql(
        &self,
        token: &AccessToken,
        query: &str,
        variables: Value,
    ) -> Result<GraphQlResponse, PipelineError> {
        let request = HttpRequest::post(self.graphql_url.as_str())
            .with_auth(&HttpAuth::BearerToken(token.as_str().to_owned()))
            .with_json_body(&json!({ "query": query, "variables": variables }))
            .with_timeout(GRAPHQL_TIMEOUT);

        let response = execute_with_retry(
            self.http_client.as_ref(),
            self.sleeper.as_ref(),
            &self.retry,
            &request,
        )
        .await?;

        if !response.is_success() {
            return Err(PipelineError::Api {
                status: response.status,
                body: truncate_body(&response.body, ERROR_BODY_LIMIT),
            });
        }

        let payload: GraphQlResponse = serde_json::from_str(&response.body).map_err(|error| {
            PipelineError::MalformedResponse(format!("graphql body is not a JSON object: {error}"))
        })?;

        let errors = payload.errors.as_deref().unwrap_or_default();
        if !errors.is_empty() {
            let serialized = Value::Array(errors.to_vec()).to_string();
            if payload.data.as_ref().map_or(true, Value::is_null) {
                return Err(PipelineError::Api {
                    status: response.status,
                    body: truncate_body(&serialized, ERROR_BODY_LIMIT),
                });
            }
            warn!(errors = %serialized, "graphql response carried partial errors");
        }

        Ok(payload)
    }
}

/// Collect `node` objects from the edges array at `pointer`; absent paths yield none.
fn edge_nodes(data: Option<&Value>, pointer: &str) -> Vec<Value> {
    data.and_then(|data| data.pointer(pointer))
        .and_then(Value::as_array)
        .map(|edges| {
            edges
                .iter()
                .filter_map(|edge| edge.get("node").cloned())
                .collect()
        })
        .unwrap_or_default()
}

//! GraphQL credit accounting for the orders flow.
//!
//! Every GraphQL response carries throttling metadata in `extensions`:
//! the cost of the query just served, the credits left in the quota, and
//! how fast credits refill. [`CreditTracker`] turns that into a pause before
//! the next line-item call whenever the remaining credits would not cover it.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::PipelineError;

/// Cost assumed for the first line-item query, before any has been observed.
pub const LINE_ITEMS_COMPLEXITY: f64 = 102.0;

/// Safety factor applied to the refill wait.
pub const PAUSE_BUFFER: f64 = 1.5;

/// Throttling snapshot read from one GraphQL response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditState {
    pub estimated_complexity: f64,
    pub credits_remaining: f64,
    pub increment_rate: f64,
}

#[derive(Debug, Deserialize)]
struct Extensions {
    throttling: Option<Throttling>,
}

#[derive(Debug, Deserialize)]
struct Throttling {
    estimated_complexity: Option<f64>,
    user_quota: Option<UserQuota>,
    cost_detail: Option<CostDetail>,
}

#[derive(Debug, Deserialize)]
struct UserQuota {
    credits_remaining: Option<f64>,
    increment_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CostDetail {
    orders: Option<ItemsCount>,
}

#[derive(Debug, Deserialize)]
struct ItemsCount {
    items_count: Option<u64>,
}

impl CreditState {
    /// Read the credit snapshot from a response's `extensions` object.
    ///
    /// # Errors
    /// Returns [`PipelineError::MalformedResponse`] naming the first missing
    /// path, or when `increment_rate` is not positive.
    pub fn from_extensions(extensions: Option<&Value>) -> Result<Self, PipelineError> {
        let extensions = parse_extensions(extensions)?;
        let throttling = extensions
            .throttling
            .ok_or_else(|| missing("extensions.throttling"))?;
        let estimated_complexity = throttling
            .estimated_complexity
            .ok_or_else(|| missing("extensions.throttling.estimated_complexity"))?;
        let quota = throttling
            .user_quota
            .ok_or_else(|| missing("extensions.throttling.user_quota"))?;
        let credits_remaining = quota
            .credits_remaining
            .ok_or_else(|| missing("extensions.throttling.user_quota.credits_remaining"))?;
        let increment_rate = quota
            .increment_rate
            .ok_or_else(|| missing("extensions.throttling.user_quota.increment_rate"))?;

        if !(increment_rate.is_finite() && increment_rate > 0.0) {
            return Err(PipelineError::MalformedResponse(format!(
                "extensions.throttling.user_quota.increment_rate must be positive, got {increment_rate}"
            )));
        }

        Ok(Self {
            estimated_complexity,
            credits_remaining,
            increment_rate,
        })
    }
}

/// `extensions.throttling.cost_detail.orders.items_count`, when reported.
pub fn orders_items_count(extensions: Option<&Value>) -> Option<u64> {
    parse_extensions(extensions)
        .ok()?
        .throttling?
        .cost_detail?
        .orders?
        .items_count
}

fn parse_extensions(extensions: Option<&Value>) -> Result<Extensions, PipelineError> {
    let value = extensions.ok_or_else(|| missing("extensions"))?;
    Extensions::deserialize(value).map_err(|error| {
        PipelineError::MalformedResponse(format!("unexpected extensions shape: {error}"))
    })
}

fn missing(path: &str) -> PipelineError {
    PipelineError::MalformedResponse(format!("missing '{path}'"))
}

/// Decides pauses between sequential line-item calls.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditTracker {
    next_cost: f64,
    credits_remaining: f64,
    increment_rate: f64,
}

impl CreditTracker {
    /// Seed from the orders query response; the first line-item call is
    /// assumed to cost [`LINE_ITEMS_COMPLEXITY`].
    pub fn new(orders_state: CreditState) -> Self {
        Self {
            next_cost: LINE_ITEMS_COMPLEXITY,
            credits_remaining: orders_state.credits_remaining,
            increment_rate: orders_state.increment_rate,
        }
    }

    /// Pause needed before the next call, if the remaining credits do not cover it.
    pub fn pause_before_next(&self) -> Option<Duration> {
        if self.credits_remaining >= self.next_cost {
            return None;
        }

        let seconds = self.next_cost / self.increment_rate * PAUSE_BUFFER;
        Duration::try_from_secs_f64(seconds).ok()
    }

    /// Replace the snapshot with the one reported by the call just made.
    pub fn observe(&mut self, state: CreditState) {
        self.next_cost = state.estimated_complexity;
        self.credits_remaining = state.credits_remaining;
        self.increment_rate = state.increment_rate;
    }

    pub const fn next_cost(&self) -> f64 {
        self.next_cost
    }

    pub const fn credits_remaining(&self) -> f64 {
        self.credits_remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extensions(complexity: f64, credits: f64, rate: f64) -> Value {
        json!({
            "throttling": {
                "estimated_complexity": complexity,
                "user_quota": {
                    "credits_remaining": credits,
                    "increment_rate": rate
                }
            }
        })
    }

    #[test]
    fn reads_typed_throttling_metadata() {
        let value = extensions(101.0, 4_000.0, 60.0);
        let state = CreditState::from_extensions(Some(&value)).expect("state");
        assert_eq!(
            state,
            CreditState {
                estimated_complexity: 101.0,
                credits_remaining: 4_000.0,
                increment_rate: 60.0,
            }
        );
    }

    #[test]
    fn integer_metadata_is_accepted() {
        let value = json!({
            "throttling": {
                "estimated_complexity": 1,
                "user_quota": {"credits_remaining": 50, "increment_rate": 30}
            }
        });
        let state = CreditState::from_extensions(Some(&value)).expect("state");
        assert_eq!(state.credits_remaining, 50.0);
    }

    #[test]
    fn missing_path_is_named_in_the_error() {
        let value = json!({"throttling": {"estimated_complexity": 5, "user_quota": {"increment_rate": 60}}});
        let error = CreditState::from_extensions(Some(&value)).expect_err("malformed");
        match error {
            PipelineError::MalformedResponse(message) => {
                assert!(message.contains("credits_remaining"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!(matches!(
            CreditState::from_extensions(None),
            Err(PipelineError::MalformedResponse(_))
        ));
    }

    #[test]
    fn zero_increment_rate_is_malformed() {
        let value = extensions(5.0, 10.0, 0.0);
        assert!(matches!(
            CreditState::from_extensions(Some(&value)),
            Err(PipelineError::MalformedResponse(_))
        ));
    }

    #[test]
    fn low_credits_pause_for_refill_with_buffer() {
        let tracker = CreditTracker::new(CreditState {
            estimated_complexity: 1.0,
            credits_remaining: 50.0,
            increment_rate: 60.0,
        });

        let pause = tracker.pause_before_next().expect("must pause");
        assert!((pause.as_secs_f64() - 102.0 / 60.0 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn sufficient_credits_do_not_pause() {
        let tracker = CreditTracker::new(CreditState {
            estimated_complexity: 1.0,
            credits_remaining: 200.0,
            increment_rate: 60.0,
        });
        assert_eq!(tracker.pause_before_next(), None);
    }

    #[test]
    fn observed_complexity_becomes_next_cost() {
        let mut tracker = CreditTracker::new(CreditState {
            estimated_complexity: 1.0,
            credits_remaining: 500.0,
            increment_rate: 10.0,
        });
        tracker.observe(CreditState {
            estimated_complexity: 300.0,
            credits_remaining: 250.0,
            increment_rate: 10.0,
        });

        assert_eq!(tracker.next_cost(), 300.0);
        let pause = tracker.pause_before_next().expect("must pause");
        assert!((pause.as_secs_f64() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn items_count_is_optional() {
        let value = json!({"throttling": {"cost_detail": {"orders": {"items_count": 7}}}});
        assert_eq!(orders_items_count(Some(&value)), Some(7));
        assert_eq!(orders_items_count(Some(&extensions(1.0, 1.0, 1.0))), None);
        assert_eq!(orders_items_count(None), None);
    }
}

//! Cron trigger definitions for the pipelines.
//!
//! Triggers are declared here and run only when started explicitly.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;

use crate::error::ValidationError;
use crate::pipeline::Flow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Running,
    Stopped,
}

/// A named cron trigger for one flow.
#[derive(Debug, Clone)]
pub struct ScheduleDefinition {
    name: String,
    cron: String,
    target: Flow,
    default_status: ScheduleStatus,
    schedule: Schedule,
}

/// Listing view of a [`ScheduleDefinition`].
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleInfo {
    pub name: String,
    pub cron: String,
    pub target: Flow,
    pub status: ScheduleStatus,
    pub next_fire: Option<DateTime<Utc>>,
}

impl ScheduleDefinition {
    /// Declare a trigger from a standard 5-field cron expression (UTC).
    pub fn new(
        name: impl Into<String>,
        cron: &str,
        target: Flow,
        default_status: ScheduleStatus,
    ) -> Result<Self, ValidationError> {
        let fields = cron.split_whitespace().count();
        if fields != 5 {
            return Err(ValidationError::InvalidCron {
                expression: cron.to_owned(),
                reason: format!("expected 5 fields, found {fields}"),
            });
        }

        // The cron crate wants a leading seconds field.
        let schedule = Schedule::from_str(&format!("0 {cron}")).map_err(|error| {
            ValidationError::InvalidCron {
                expression: cron.to_owned(),
                reason: error.to_string(),
            }
        })?;

        Ok(Self {
            name: name.into(),
            cron: cron.to_owned(),
            target,
            default_status,
            schedule,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cron(&self) -> &str {
        &self.cron
    }

    pub const fn target(&self) -> Flow {
        self.target
    }

    pub const fn default_status(&self) -> ScheduleStatus {
        self.default_status
    }

    /// First fire time strictly after `after`.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    pub fn info(&self, now: DateTime<Utc>) -> ScheduleInfo {
        ScheduleInfo {
            name: self.name.clone(),
            cron: self.cron.clone(),
            target: self.target,
            status: self.default_status,
            next_fire: self.next_fire_after(now),
        }
    }
}

/// Every trigger known to the binary.
pub fn definitions() -> Result<Vec<ScheduleDefinition>, ValidationError> {
    Ok(vec![ScheduleDefinition::new(
        "applovin_advertiser_daily",
        "0 3 * * *",
        Flow::AdMetrics,
        ScheduleStatus::Stopped,
    )?])
}

pub fn find(name: &str) -> Result<ScheduleDefinition, ValidationError> {
    definitions()?
        .into_iter()
        .find(|definition| definition.name() == name)
        .ok_or_else(|| ValidationError::UnknownSchedule {
            name: name.to_owned(),
        })
}

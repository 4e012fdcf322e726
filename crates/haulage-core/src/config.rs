//! Runtime settings resolved from the process environment and `.env`.
//!
//! Secrets are optional at load time. Each flow asks for the ones it needs,
//! so the ad flow runs without warehouse-API credentials and the reverse
//! holds too.

use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

use haulage_warehouse::WarehouseConfig;
use serde::Deserialize;
use tracing::info;

use crate::adapters::shiphero::{ShipHeroCredentials, DEFAULT_ORDERS_LIMIT};
use crate::error::{PipelineError, ValidationError};
use crate::retry::{RetryConfig, DEFAULT_MAX_RETRIES};

pub const APPLOVIN_API_KEY: &str = "APPLOVIN_API_KEY";
pub const SHIPHERO_USERNAME: &str = "SOURCES__SHIPHERO__USERNAME";
pub const SHIPHERO_PASSWORD: &str = "SOURCES__SHIPHERO__PASSWORD";
pub const BQ_KEY: &str = "BQ_KEY";
pub const HAULAGE_HOME: &str = "HAULAGE_HOME";
pub const HAULAGE_WAREHOUSE_PATH: &str = "HAULAGE_WAREHOUSE_PATH";
pub const HAULAGE_ORDERS_LIMIT: &str = "HAULAGE_ORDERS_LIMIT";
pub const HAULAGE_MAX_RETRIES: &str = "HAULAGE_MAX_RETRIES";

const WAREHOUSE_FILE: &str = "warehouse.duckdb";

/// Resolved settings for one process.
#[derive(Clone)]
pub struct Settings {
    pub applovin_api_key: Option<String>,
    pub shiphero_username: Option<String>,
    pub shiphero_password: Option<String>,
    pub service_account: Option<ServiceAccountKey>,
    pub home: PathBuf,
    pub warehouse_path: PathBuf,
    pub orders_limit: u32,
    pub max_retries: u32,
    /// The `.env` file that was read, if any.
    pub env_file: Option<PathBuf>,
}

impl Debug for Settings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("applovin_api_key", &self.applovin_api_key.as_ref().map(|_| "***"))
            .field("shiphero_username", &self.shiphero_username)
            .field("shiphero_password", &self.shiphero_password.as_ref().map(|_| "***"))
            .field("service_account", &self.service_account)
            .field("home", &self.home)
            .field("warehouse_path", &self.warehouse_path)
            .field("orders_limit", &self.orders_limit)
            .field("max_retries", &self.max_retries)
            .field("env_file", &self.env_file)
            .finish()
    }
}

impl Settings {
    /// Load `.env` (if present) and read the process environment.
    ///
    /// Runs before logging is set up, so the file used is recorded in
    /// [`Self::env_file`] rather than logged here.
    pub fn from_env() -> Result<Self, ValidationError> {
        let env_file = dotenvy::dotenv().ok();
        let mut settings = Self::from_lookup(|name| std::env::var(name).ok())?;
        settings.env_file = env_file;
        Ok(settings)
    }

    /// Resolve settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let home = get(HAULAGE_HOME)
            .map(PathBuf::from)
            .or_else(|| get("HOME").map(|home| PathBuf::from(home).join(".haulage")))
            .unwrap_or_else(|| PathBuf::from(".haulage"));
        let warehouse_path = get(HAULAGE_WAREHOUSE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(WAREHOUSE_FILE));

        let service_account = get(BQ_KEY)
            .map(|raw| ServiceAccountKey::parse(&raw))
            .transpose()?;

        Ok(Self {
            applovin_api_key: get(APPLOVIN_API_KEY),
            shiphero_username: get(SHIPHERO_USERNAME),
            shiphero_password: get(SHIPHERO_PASSWORD),
            service_account,
            home,
            warehouse_path,
            orders_limit: parse_number(HAULAGE_ORDERS_LIMIT, get(HAULAGE_ORDERS_LIMIT), 1)?
                .unwrap_or(DEFAULT_ORDERS_LIMIT),
            max_retries: parse_number(HAULAGE_MAX_RETRIES, get(HAULAGE_MAX_RETRIES), 0)?
                .unwrap_or(DEFAULT_MAX_RETRIES),
            env_file: None,
        })
    }

    /// Point at another home directory. An explicit warehouse path is kept.
    pub fn with_home(mut self, home: PathBuf) -> Self {
        if self.warehouse_path == self.home.join(WAREHOUSE_FILE) {
            self.warehouse_path = home.join(WAREHOUSE_FILE);
        }
        self.home = home;
        self
    }

    pub fn applovin_api_key(&self) -> Result<&str, PipelineError> {
        self.applovin_api_key
            .as_deref()
            .ok_or_else(|| missing(APPLOVIN_API_KEY))
    }

    pub fn shiphero_credentials(&self) -> Result<ShipHeroCredentials, PipelineError> {
        let username = self
            .shiphero_username
            .clone()
            .ok_or_else(|| missing(SHIPHERO_USERNAME))?;
        let password = self
            .shiphero_password
            .clone()
            .ok_or_else(|| missing(SHIPHERO_PASSWORD))?;
        Ok(ShipHeroCredentials { username, password })
    }

    pub fn warehouse_config(&self) -> WarehouseConfig {
        WarehouseConfig {
            db_path: self.warehouse_path.clone(),
            ..WarehouseConfig::at_home(self.home.clone())
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_max_retries(self.max_retries)
    }
}

fn missing(name: &str) -> PipelineError {
    PipelineError::Config(format!("{name} environment variable not found"))
}

fn parse_number(
    name: &'static str,
    value: Option<String>,
    min: u32,
) -> Result<Option<u32>, ValidationError> {
    value
        .map(|raw| match raw.trim().parse::<u32>() {
            Ok(parsed) if parsed >= min => Ok(parsed),
            _ => Err(ValidationError::InvalidNumber {
                name,
                value: raw,
                min,
            }),
        })
        .transpose()
}

/// Cloud service-account credentials delivered as one JSON document.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub private_key: String,
    pub client_email: String,
}

#[derive(Deserialize)]
struct RawServiceAccountKey {
    project_id: Option<String>,
    private_key: Option<String>,
    client_email: Option<String>,
}

impl ServiceAccountKey {
    /// Parse the key JSON. Literal `\n` sequences in the private key become
    /// real newlines.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let parsed: RawServiceAccountKey =
            serde_json::from_str(raw).map_err(|error| ValidationError::ServiceAccountJson {
                reason: error.to_string(),
            })?;

        let project_id = required(parsed.project_id, "project_id")?;
        let private_key = required(parsed.private_key, "private_key")?.replace("\\n", "\n");
        let client_email = required(parsed.client_email, "client_email")?;

        Ok(Self {
            project_id,
            private_key,
            client_email,
        })
    }

    /// Environment variables the destination credentials are published under.
    pub fn exports(&self) -> [(&'static str, &str); 3] {
        [
            ("CREDENTIALS__PROJECT_ID", self.project_id.as_str()),
            ("CREDENTIALS__PRIVATE_KEY", self.private_key.as_str()),
            ("CREDENTIALS__CLIENT_EMAIL", self.client_email.as_str()),
        ]
    }

    /// Publish [`Self::exports`] into the process environment.
    ///
    /// Call before spawning any threads that read the environment.
    pub fn export_to_env(&self) {
        for (name, value) in self.exports() {
            std::env::set_var(name, value);
        }
        info!(project_id = %self.project_id, "destination credentials configured");
    }
}

impl Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key", &"***")
            .field("client_email", &self.client_email)
            .finish()
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::ServiceAccountField { field })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect::<HashMap<_, _>>();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_lookup(lookup(&[("HOME", "/home/ops")])).expect("settings");

        assert_eq!(settings.home, PathBuf::from("/home/ops/.haulage"));
        assert_eq!(
            settings.warehouse_path,
            PathBuf::from("/home/ops/.haulage/warehouse.duckdb")
        );
        assert_eq!(settings.orders_limit, 500);
        assert_eq!(settings.max_retries, 5);
        assert!(settings.service_account.is_none());
    }

    #[test]
    fn home_override_moves_derived_warehouse_path() {
        let settings = Settings::from_lookup(lookup(&[("HOME", "/home/ops")]))
            .expect("settings")
            .with_home(PathBuf::from("/srv/haulage"));
        assert_eq!(
            settings.warehouse_path,
            PathBuf::from("/srv/haulage/warehouse.duckdb")
        );

        let pinned = Settings::from_lookup(lookup(&[(HAULAGE_WAREHOUSE_PATH, "/data/w.duckdb")]))
            .expect("settings")
            .with_home(PathBuf::from("/srv/haulage"));
        assert_eq!(pinned.warehouse_path, PathBuf::from("/data/w.duckdb"));
        assert_eq!(pinned.home, PathBuf::from("/srv/haulage"));
    }

    #[test]
    fn each_flow_only_needs_its_own_secret() {
        let settings = Settings::from_lookup(lookup(&[(APPLOVIN_API_KEY, "k")])).expect("settings");

        assert_eq!(settings.applovin_api_key().expect("key"), "k");
        assert!(matches!(
            settings.shiphero_credentials(),
            Err(PipelineError::Config(message)) if message.contains(SHIPHERO_USERNAME)
        ));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let settings =
            Settings::from_lookup(lookup(&[(APPLOVIN_API_KEY, "  ")])).expect("settings");
        assert!(matches!(
            settings.applovin_api_key(),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn numeric_overrides_are_validated() {
        let settings = Settings::from_lookup(lookup(&[
            (HAULAGE_ORDERS_LIMIT, "10"),
            (HAULAGE_MAX_RETRIES, "2"),
        ]))
        .expect("settings");
        assert_eq!(settings.orders_limit, 10);
        assert_eq!(settings.retry_config().max_retries, 2);

        assert!(matches!(
            Settings::from_lookup(lookup(&[(HAULAGE_ORDERS_LIMIT, "0")])),
            Err(ValidationError::InvalidNumber { min: 1, .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[(HAULAGE_MAX_RETRIES, "-1")])),
            Err(ValidationError::InvalidNumber { min: 0, .. })
        ));
    }

    #[test]
    fn zero_retries_disables_retrying() {
        let settings =
            Settings::from_lookup(lookup(&[(HAULAGE_MAX_RETRIES, "0")])).expect("settings");
        assert_eq!(settings.retry_config().max_retries, 0);
        assert_eq!(settings.env_file, None);
    }

    #[test]
    fn service_account_key_normalizes_newlines() {
        let raw = r#"{"project_id":"proj","private_key":"-----BEGIN-----\\nabc\\n-----END-----","client_email":"svc@proj.iam"}"#;
        let key = ServiceAccountKey::parse(raw).expect("key");

        assert_eq!(key.private_key, "-----BEGIN-----\nabc\n-----END-----");
        assert_eq!(
            key.exports().map(|(name, _)| name),
            [
                "CREDENTIALS__PROJECT_ID",
                "CREDENTIALS__PRIVATE_KEY",
                "CREDENTIALS__CLIENT_EMAIL"
            ]
        );
        assert!(!format!("{key:?}").contains("abc"));
    }

    #[test]
    fn service_account_key_requires_fields() {
        assert!(matches!(
            ServiceAccountKey::parse(r#"{"project_id":"p","client_email":"e"}"#),
            Err(ValidationError::ServiceAccountField { field: "private_key" })
        ));
        assert!(matches!(
            ServiceAccountKey::parse("not json"),
            Err(ValidationError::ServiceAccountJson { .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[(BQ_KEY, "{}")])),
            Err(ValidationError::ServiceAccountField { .. })
        ));
    }
}

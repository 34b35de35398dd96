// Configuration
//
// Layered with the `config` crate: optional TOML file, then `LEADFLOW_*` environment variables
// (`__` separates nested keys, e.g. `LEADFLOW_CRM__CLIENT_SECRET`). Every section has serde
// defaults so an empty source set still yields a usable (dry-run only) configuration.

use std::fmt;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::utils::logging::mask_sensitive;

pub const ENV_PREFIX: &str = "LEADFLOW";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub crm: CrmSettings,
    pub lead_defaults: LeadDefaults,
    pub logging: LoggingSettings,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmSettings {
    /// OAuth2 host; the token endpoint is `{login_url}/services/oauth2/token`.
    pub login_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    /// REST API version used by the standard sObject endpoints.
    pub api_version: String,
}

impl Default for CrmSettings {
    fn default() -> Self {
        Self {
            login_url: "https://login.salesforce.com".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            api_version: "61.0".to_string(),
        }
    }
}

impl fmt::Debug for CrmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrmSettings")
            .field("login_url", &self.login_url)
            .field("client_id", &mask_sensitive(&self.client_id))
            .field("client_secret", &"***")
            .field("username", &self.username)
            .field("password", &"***")
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl CrmSettings {
    /// Fail fast before any network call when a credential is missing.
    pub fn require_credentials(&self) -> Result<(), SettingsError> {
        let checks: [(&'static str, &str); 5] = [
            ("login_url", &self.login_url),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", &self.username),
            ("password", &self.password),
        ];
        for (name, value) in checks {
            if value.trim().is_empty() {
                return Err(SettingsError::MissingCredential(name));
            }
        }
        Ok(())
    }
}

/// Constant wire values the wizard never collects. Single change point for every mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadDefaults {
    pub business_line: String,
    pub sector: String,
    pub product_code: String,
    pub device_type: String,
    pub system_origin: String,
    pub lead_source: String,
    pub intermediary_code: String,
    pub sales_channel: String,
    pub initial_status: String,
    pub initial_stage: String,
    /// Lead status written when a lead converts. Unverified against the CRM schema owner.
    pub converted_lead_status: String,
    pub won_opportunity_stage: String,
}

impl Default for LeadDefaults {
    fn default() -> Self {
        Self {
            business_line: "01".to_string(),
            sector: "Autos".to_string(),
            product_code: "AUTO".to_string(),
            device_type: "Web".to_string(),
            system_origin: "LeadFlow".to_string(),
            lead_source: "Web".to_string(),
            intermediary_code: "0000".to_string(),
            sales_channel: "Digital".to_string(),
            initial_status: "New".to_string(),
            initial_stage: "Quote".to_string(),
            converted_lead_status: "Qualified".to_string(),
            won_opportunity_stage: "Closed Won".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Overrides the resolved log folder.
    pub directory: Option<PathBuf>,
    pub stdout: bool,
}

impl Settings {
    /// Load settings from `path` (if given, it must exist) or the default per-user config file
    /// (optional), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();

        match path {
            Some(p) => {
                builder = builder.add_source(config::File::from(p.to_path_buf()).required(true));
            }
            None => {
                if let Some(default_path) = crate::utils::path_resolver::default_config_file() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        info!(
            "[PHASE: initialization] [STEP: settings] Settings loaded (login_url={}, api_version={}, system_origin={})",
            settings.crm.login_url, settings.crm.api_version, settings.lead_defaults.system_origin
        );
        Ok(settings)
    }

    /// TOML template of the defaults, with empty credentials.
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&Settings::default())
    }
}

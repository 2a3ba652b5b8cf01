//! Application configuration and loading.

use derivq_auth::AuthConfig;
use derivq_broker::BrokerConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::task::{TaskConfigForm, TaskDefinition};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub broker: BrokerConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub tasks: Vec<TaskConfigForm>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Public base URL entity and upload routes are built from.
    pub base_url: String,
    /// Storage schemes a task may write derivatives to.
    pub schemes: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            schemes: vec!["public".to_string(), "private".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        url::Url::parse(&self.site.base_url)
            .map_err(|e| format!("site.base_url is not a valid URL: {e}"))?;
        if self.site.schemes.iter().any(|s| s.trim().is_empty()) {
            return Err("site.schemes must not contain empty entries".into());
        }
        self.broker.validate()?;
        self.auth.validate()?;

        let mut names = std::collections::HashSet::new();
        for (i, task) in self.tasks.iter().enumerate() {
            task.validate(&self.site.schemes)
                .map_err(|e| format!("tasks[{i}] ({}): {e}", task.display_name()))?;
            if !names.insert(task.display_name()) {
                return Err(format!(
                    "tasks[{i}]: duplicate task name '{}'",
                    task.display_name()
                ));
            }
        }
        Ok(())
    }

    /// Every configured task, validated.
    pub fn task_definitions(&self) -> Result<Vec<TaskDefinition>, ConfigError> {
        self.tasks
            .iter()
            .map(|task| task.validate(&self.site.schemes))
            .collect()
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "derivq.toml";

    /// Load `path` (or `derivq.toml` when present), apply `DERIVQ__*`
    /// environment overrides and validate.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // e.g. DERIVQ__BROKER__PORT=61614
        builder = builder.add_source(
            Environment::with_prefix("DERIVQ")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

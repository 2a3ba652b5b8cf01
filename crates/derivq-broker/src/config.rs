use serde::{Deserialize, Serialize};

/// Broker connection configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [broker]
/// host = "activemq"
/// port = 61613
/// receipts = false   # fire-and-forget
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub login: Option<String>,
    pub passcode: Option<String>,
    /// Value of the CONNECT `host` header. Defaults to `host`.
    pub virtual_host: Option<String>,
    /// Ask the broker for a RECEIPT on every SEND and wait for it. When off,
    /// a broker ERROR after SEND goes unnoticed.
    pub receipts: bool,
    /// Mark messages persistent.
    pub persistent: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 61613,
            login: None,
            passcode: None,
            virtual_host: None,
            receipts: true,
            persistent: true,
        }
    }
}

impl BrokerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// # Errors
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("broker.host must not be empty".into());
        }
        if self.port == 0 {
            return Err("broker.port must be > 0".into());
        }
        if self.login.is_some() != self.passcode.is_some() {
            return Err("broker.login and broker.passcode must be set together".into());
        }
        Ok(())
    }
}

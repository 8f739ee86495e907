use std::time::Duration;

use secrecy::Secret;

use crate::lang::Labels;

#[derive(Clone, serde::Deserialize)]
pub struct Settings {
    pub log_level: String,
    pub sendcloud: SendCloudSettings,
    pub labels: Labels,
}

/// Provider credentials and endpoints, read once at startup.
///
/// SendCloud issues separate credential pairs for triggered (transactional)
/// and batch mail; both senders live here. The base URLs are configurable so
/// tests can point the dispatcher at a mock server.
#[derive(Clone, serde::Deserialize)]
pub struct SendCloudSettings {
    /// Host for the template add/update API.
    pub api_base_url: String,
    /// Host for the template-send web API.
    pub mail_base_url: String,
    pub api_user: String,
    pub api_key: Secret<String>,
    pub from: String,
    pub batch: BatchCredentials,
    pub timeout_milliseconds: u64,
}

#[derive(Clone, serde::Deserialize)]
pub struct BatchCredentials {
    pub api_user: String,
    pub api_key: Secret<String>,
    pub from: String,
}

impl SendCloudSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("config");

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

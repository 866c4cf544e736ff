// Application settings, loaded with the 'config' crate and '.env' support

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_FEATURED_SERVICES: [&str; 4] = [
    "Basic Service",
    "Standard Service",
    "Comprehensive Service",
    "Bonnet Paint",
];

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server_address: String,
    // Input of the `clean` command
    pub raw_dataset_path: String,
    // Output of `clean`, input of `serve`
    pub cleaned_dataset_path: String,
    pub recent_search_limit: usize,
    // Sessions unused for this long are dropped with their history
    pub session_idle_timeout_secs: u64,
    pub max_sessions: usize,
    // Services shown as metric cards on the overview
    pub featured_services: Vec<String>,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("raw_dataset_path", "car_dekho_jaipur.csv")?
            .set_default("cleaned_dataset_path", "cleaned_dataset.csv")?
            .set_default("recent_search_limit", 5)?
            .set_default("session_idle_timeout_secs", 1800)?
            .set_default("max_sessions", 1024)?
            .set_default(
                "featured_services",
                DEFAULT_FEATURED_SERVICES
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>(),
            )?
            // Optional config.toml next to the binary's working directory
            .add_source(File::with_name("config").required(false))
            // Environment overrides, e.g. APP_SERVER_ADDRESS. No separator so
            // that multi-word keys map one-to-one.
            .add_source(Environment::with_prefix("APP").try_parsing(true));

        let settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:3000".to_string(),
            raw_dataset_path: "car_dekho_jaipur.csv".to_string(),
            cleaned_dataset_path: "cleaned_dataset.csv".to_string(),
            recent_search_limit: 5,
            session_idle_timeout_secs: 1800,
            max_sessions: 1024,
            featured_services: DEFAULT_FEATURED_SERVICES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

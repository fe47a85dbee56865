use config::{Config, ConfigError, Environment, File};
use domain::{ConnectionOptionsOverride, DeviceIdentity};
use serde::{Deserialize, Serialize};

/// Which printer to talk to
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Port the chooser picks, e.g. `/dev/ttyUSB0` or `COM3`
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<u16>,
    #[serde(default)]
    pub product_id: Option<u16>,
}

impl DeviceConfig {
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    #[serde(default)]
    pub serial: ConnectionOptionsOverride,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default = "default_watch_interval")]
    pub watch_interval_ms: u64,
    #[serde(default = "default_identity_file")]
    pub identity_file: String,
}

fn default_watch_interval() -> u64 {
    1000
}
fn default_identity_file() -> String {
    "last_device.json".to_string()
}

impl AgentConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Local config file, e.g. config/default.toml
            // Required so we never start against an unknown printer
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(true))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Environment variables (e.g. PRINTER__SERIAL__BAUD_RATE=19200)
            .add_source(
                Environment::with_prefix("PRINTER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}

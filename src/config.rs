use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CSV_DIR: &str = "/tmp";
const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct IpsnapConfig {
    /// Directory holding the ipsnap database
    pub data_dir: String,

    /// Directory holding the extracted snapshot CSV files
    pub csv_dir: String,

    /// Seconds a writer waits for a competing write transaction
    pub busy_timeout_secs: u64,
}

const EMPTY_CONFIG: &str = r#"### ipsnap configuration file

### directory for the ipsnap database
# data_dir = "~/.ipsnap"

### directory holding the extracted snapshot CSV files
# csv_dir = "/tmp"

### seconds to wait for a competing writer before giving up
# busy_timeout_secs = 30
"#;

fn home_dir() -> Result<String> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home directory"))?
        .to_str()
        .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
        .to_owned())
}

impl Default for IpsnapConfig {
    fn default() -> Self {
        let home_dir = home_dir().unwrap_or_else(|_| ".".to_string());

        Self {
            data_dir: format!("{}/.ipsnap", home_dir),
            csv_dir: DEFAULT_CSV_DIR.to_string(),
            busy_timeout_secs: DEFAULT_BUSY_TIMEOUT_SECS,
        }
    }
}

impl IpsnapConfig {
    /// Create and initialize a configuration
    ///
    /// Reads the given TOML file, or `~/.ipsnap/ipsnap.toml` when none is
    /// given, writing a commented template if the file does not exist.
    /// `IPSNAP_`-prefixed environment variables override file values.
    pub fn new(path: &Option<String>) -> Result<IpsnapConfig> {
        let mut builder = Config::builder();
        let ipsnap_dir = format!("{}/.ipsnap", home_dir()?);

        let config_path = match path {
            Some(p) => p.clone(),
            None => {
                std::fs::create_dir_all(ipsnap_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create ipsnap directory: {}", e))?;
                format!("{}/ipsnap.toml", ipsnap_dir)
            }
        };

        if Path::new(config_path.as_str()).exists() {
            builder = builder.add_source(
                config::File::with_name(config_path.as_str()).format(config::FileFormat::Toml),
            );
        } else {
            std::fs::write(config_path.as_str(), EMPTY_CONFIG)
                .map_err(|e| anyhow!("Unable to create config file {}: {}", config_path, e))?;
        }

        // E.g. `IPSNAP_CSV_DIR=/srv/ip2location ipsnap update`
        builder = builder.add_source(config::Environment::with_prefix("IPSNAP"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p)?,
            None => ipsnap_dir,
        };

        let csv_dir = match config.get("csv_dir") {
            Some(p) => expand_home(p)?,
            None => DEFAULT_CSV_DIR.to_string(),
        };

        let busy_timeout_secs = match config.get("busy_timeout_secs") {
            Some(s) => s
                .parse()
                .map_err(|e| anyhow!("Invalid busy_timeout_secs '{}': {}", s, e))?,
            None => DEFAULT_BUSY_TIMEOUT_SECS,
        };

        Ok(IpsnapConfig {
            data_dir,
            csv_dir,
            busy_timeout_secs,
        })
    }

    /// Path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}", data_dir, crate::database::DATABASE_FILE)
    }

    pub fn csv_dir(&self) -> PathBuf {
        PathBuf::from(&self.csv_dir)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {}", self.sqlite_path()),
            format!("Snapshot Directory: {}", self.csv_dir),
            format!("Busy Timeout:       {} seconds", self.busy_timeout_secs),
        ]
        .join("\n")
    }

    /// Default config file path
    pub fn config_file_path() -> String {
        let home_dir = home_dir().unwrap_or_else(|_| "~".to_string());
        format!("{}/.ipsnap/ipsnap.toml", home_dir)
    }
}

fn expand_home(path: &str) -> Result<String> {
    match path.strip_prefix("~/") {
        Some(rest) => Ok(format!("{}/{}", home_dir()?, rest)),
        None if path == "~" => home_dir(),
        None => Ok(path.to_string()),
    }
}

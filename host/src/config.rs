//! Host configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Path of the config file: `privy-jobs.json` in the working directory if
/// present, otherwise `~/.privy-jobs/config.json`.
pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
    let local_config_path = std::env::current_dir()?.join("privy-jobs.json");
    if local_config_path.exists() {
        return Ok(local_config_path);
    }

    let home_path = home::home_dir()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "Home directory not found"))?;
    Ok(home_path.join(".privy-jobs").join("config.json"))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Chain snapshot written after every command.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    #[serde(default = "default_deployments_path")]
    pub deployments_path: PathBuf,

    /// Directory of `<name>.key` account seeds.
    #[serde(default = "default_keys_dir")]
    pub keys_dir: PathBuf,

    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    /// Gas ceiling for job submissions.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    #[serde(default = "default_decryption_validity_days")]
    pub decryption_validity_days: u64,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("privy-jobs-data").join("chain.bin")
}

fn default_deployments_path() -> PathBuf {
    PathBuf::from("privy-jobs-data").join("deployments.json")
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from("privy-jobs-data").join("keys")
}

fn default_chain_id() -> u64 {
    privy_jobs_contract::DEFAULT_CHAIN_ID
}

fn default_gas_limit() -> u64 {
    400_000
}

fn default_decryption_validity_days() -> u64 {
    365
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            deployments_path: default_deployments_path(),
            keys_dir: default_keys_dir(),
            chain_id: default_chain_id(),
            gas_limit: default_gas_limit(),
            decryption_validity_days: default_decryption_validity_days(),
        }
    }
}

impl HostConfig {
    /// Loads configuration from a JSON file at the given path.
    ///
    /// # Errors
    /// Returns an `std::io::Error` if reading from file fails or JSON is invalid.
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let buf = fs::read(path)?;
        let config: HostConfig = serde_json::from_slice(&buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Loads the file if it exists, otherwise returns defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, std::io::Error> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("Serialization failed: {}", e))
        })?;
        fs::write(path, json)?;
        Ok(())
    }
}

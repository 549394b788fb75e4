//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use airlock_core::AirlockConfig;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Protocol parameters
    pub airlock: AirlockConfig,

    /// Unix socket path for IPC
    pub ipc_socket_path: PathBuf,

    /// RSA modulus width for the VDF group
    pub vdf_modulus_bits: u64,

    /// How often the expiry sweep runs, in milliseconds
    pub expiry_sweep_interval_ms: u64,

    /// Whether to run with demo-scale VDF iterations
    pub demo_mode: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            airlock: AirlockConfig::default(),
            ipc_socket_path: Self::default_ipc_path(),
            vdf_modulus_bits: airlock_vdf::MODULUS_BITS,
            expiry_sweep_interval_ms: 1000,
            demo_mode: false,
        }
    }
}

impl DaemonConfig {
    /// Platform-appropriate default IPC path
    fn default_ipc_path() -> PathBuf {
        std::env::var_os("XDG_RUNTIME_DIR")
            .map(|dir| PathBuf::from(dir).join("airlock.sock"))
            .unwrap_or_else(|| PathBuf::from("/tmp/airlock.sock"))
    }

    /// Effective VDF iteration count
    pub fn vdf_iterations(&self) -> u64 {
        if self.demo_mode {
            airlock_core::VDF_ITERATIONS_DEMO
        } else {
            self.airlock.vdf_iterations
        }
    }

    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config
            .airlock
            .validate()
            .map_err(|e| crate::DaemonError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_mode_shrinks_iterations() {
        let mut config = DaemonConfig::default();
        assert_eq!(config.vdf_iterations(), airlock_core::VDF_ITERATIONS);
        config.demo_mode = true;
        assert_eq!(config.vdf_iterations(), airlock_core::VDF_ITERATIONS_DEMO);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = std::env::temp_dir().join("airlock-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("daemon.json");

        let config = DaemonConfig::default();
        config.save(&path).unwrap();
        let loaded = DaemonConfig::load(&path).unwrap();
        assert_eq!(loaded.vdf_modulus_bits, config.vdf_modulus_bits);
        assert_eq!(loaded.airlock.guardian_count, config.airlock.guardian_count);
        std::fs::remove_file(&path).ok();
    }
}

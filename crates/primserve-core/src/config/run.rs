use super::params::ParamStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of primaries per chunk.
pub const DEFAULT_CHUNK_SIZE: u32 = 500;

/// Default generator identity.
pub const DEFAULT_GENERATOR: &str = "boxgen";

/// Default transport engine name.
pub const DEFAULT_MC_ENGINE: &str = "summary";

/// Process-wide run configuration.
///
/// Built once from the startup parameters and afterwards only changed by a
/// reconfiguration. It is also the payload of a config reply, which is how
/// workers learn the engine and parameters of the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Identity of the event generator (e.g. `boxgen`, `extkin`).
    pub generator: String,
    /// Trigger applied to generated events; empty for none.
    pub trigger: String,
    /// Kinematics file read by the external-kinematics generator.
    pub ext_kin_file: Option<PathBuf>,
    /// Number of events to serve before signaling end of work.
    pub n_events: u32,
    /// Initial seed; `None` draws a random one at startup.
    pub seed: Option<u64>,
    /// Maximum number of primaries per chunk.
    pub chunk_size: u32,
    /// Name of the transport engine workers should run.
    pub mc_engine: String,
    /// JSON parameter file layered under `key_values`.
    pub config_file: Option<PathBuf>,
    /// `key=value;...` overrides layered over `config_file`.
    pub key_values: String,
    /// Resolved generator parameters.
    pub params: ParamStore,
    /// Keep serving reconfigurations after a batch completes.
    pub as_service: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            generator: DEFAULT_GENERATOR.to_string(),
            trigger: String::new(),
            ext_kin_file: None,
            n_events: 2,
            seed: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            mc_engine: DEFAULT_MC_ENGINE.to_string(),
            config_file: None,
            key_values: String::new(),
            params: ParamStore::default(),
            as_service: false,
        }
    }
}

impl RunConfig {
    /// Checks invariants the producer relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the chunk size is zero, the event
    /// count does not fit an event id, or no generator is named.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::invalid_config("chunk size must be greater than 0"));
        }
        if i32::try_from(self.n_events).is_err() {
            return Err(Error::invalid_config(format!(
                "number of events ({}) exceeds the maximum event id ({})",
                self.n_events,
                i32::MAX
            )));
        }
        if self.generator.trim().is_empty() {
            return Err(Error::invalid_config("a generator must be named"));
        }
        Ok(())
    }

    /// Layers the config file and then the key-value overrides onto
    /// [`RunConfig::params`].
    ///
    /// # Errors
    ///
    /// Propagates [`Error::InvalidConfig`] from the file or override parser.
    pub fn apply_param_sources(&mut self) -> Result<()> {
        if let Some(path) = &self.config_file {
            self.params.update_from_file(path)?;
        }
        self.params.update_from_string(&self.key_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_chunk_size_and_oversized_batches() {
        let config = RunConfig {
            chunk_size: 0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RunConfig {
            n_events: u32::MAX,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RunConfig {
            generator: "  ".to_string(),
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overrides_win_over_the_config_file() {
        let path = std::env::temp_dir().join(format!(
            "primserve-run-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"BoxGun": {"number": 10, "pdg": 13}}"#).unwrap();

        let mut config = RunConfig {
            config_file: Some(path.clone()),
            key_values: "BoxGun.number=3".to_string(),
            ..RunConfig::default()
        };
        config.apply_param_sources().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.params.get::<u32>("BoxGun.number").unwrap(), Some(3));
        assert_eq!(config.params.get::<i32>("BoxGun.pdg").unwrap(), Some(13));
    }
}

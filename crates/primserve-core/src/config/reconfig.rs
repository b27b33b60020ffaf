use crate::{Error, Result};
use clap::Parser;
use std::path::PathBuf;

/// A reconfiguration command received on the control channel.
///
/// Commands are plain option strings, for example
///
/// ```text
/// -n 10 -g boxgen --seed 42 --configKeyValues BoxGun.number=20
/// --stop
/// ```
///
/// Values cannot contain whitespace; tokens are split on it.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "reconfig",
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct ReconfigRequest {
    /// Stop the producer instead of starting a new batch.
    #[arg(long)]
    pub stop: bool,

    /// JSON parameter file applied before the key-value overrides.
    #[arg(long = "configFile")]
    pub config_file: Option<PathBuf>,

    /// `key=value;...` parameter overrides.
    #[arg(long = "configKeyValues", default_value = "")]
    pub key_values: String,

    /// Initial seed of the new batch; random when omitted.
    #[arg(long = "seed")]
    pub start_seed: Option<u64>,

    /// Number of events in the new batch.
    #[arg(short = 'n', long = "nEvents", default_value_t = 0)]
    pub n_events: u32,

    /// Generator identity.
    #[arg(short = 'g', long = "generator", default_value = "boxgen")]
    pub generator: String,

    /// Trigger applied to generated events.
    #[arg(short = 't', long = "trigger", default_value = "")]
    pub trigger: String,

    /// Kinematics file for the external-kinematics generator.
    #[arg(long = "extKinFile")]
    pub ext_kin_file: Option<PathBuf>,
}

impl ReconfigRequest {
    /// Parses a control command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the command has unknown options or
    /// malformed values.
    pub fn from_command(command: &str) -> Result<Self> {
        Self::try_parse_from(command.split_whitespace()).map_err(|e| Error::Decode {
            reason: format!("invalid reconfiguration command {command:?}: {e}"),
        })
    }

    /// A request that stops the producer.
    pub fn stop() -> Self {
        Self {
            stop: true,
            config_file: None,
            key_values: String::new(),
            start_seed: None,
            n_events: 0,
            generator: String::new(),
            trigger: String::new(),
            ext_kin_file: None,
        }
    }

    /// A request for a new batch of `n_events` events from `generator`.
    pub fn batch(generator: impl Into<String>, n_events: u32, start_seed: Option<u64>) -> Self {
        Self {
            stop: false,
            generator: generator.into(),
            n_events,
            start_seed,
            ..Self::stop()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_command() {
        let request = ReconfigRequest::from_command(
            "-n 10 -g extkin --seed 42 -t nonempty --extKinFile /tmp/kin.jsonl \
             --configKeyValues BoxGun.number=3;BoxGun.pdg=11 --configFile /tmp/p.json",
        )
        .unwrap();

        assert!(!request.stop);
        assert_eq!(request.n_events, 10);
        assert_eq!(request.generator, "extkin");
        assert_eq!(request.start_seed, Some(42));
        assert_eq!(request.trigger, "nonempty");
        assert_eq!(request.ext_kin_file, Some(PathBuf::from("/tmp/kin.jsonl")));
        assert_eq!(request.key_values, "BoxGun.number=3;BoxGun.pdg=11");
        assert_eq!(request.config_file, Some(PathBuf::from("/tmp/p.json")));
    }

    #[test]
    fn defaults_and_stop() {
        let request = ReconfigRequest::from_command("--nEvents 3").unwrap();
        assert_eq!(request, ReconfigRequest::batch("boxgen", 3, None));

        assert!(ReconfigRequest::from_command("--stop").unwrap().stop);
        assert!(ReconfigRequest::from_command("  --stop \n").unwrap().stop);
    }

    #[test]
    fn rejects_unknown_options_and_bad_values() {
        assert!(matches!(
            ReconfigRequest::from_command("--frobnicate"),
            Err(Error::Decode { .. })
        ));
        assert!(ReconfigRequest::from_command("-n many").is_err());
        assert!(ReconfigRequest::from_command("--seed -4").is_err());
    }
}

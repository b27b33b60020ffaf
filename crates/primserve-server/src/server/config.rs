use anyhow::bail;
use clap::Parser;
use primserve_core::{
    channel::ChannelConfig,
    config::{DEFAULT_CHUNK_SIZE, DEFAULT_GENERATOR, DEFAULT_MC_ENGINE, RunConfig},
};
use std::path::PathBuf;

/// Runtime configuration for the `primserve-server` binary.
///
/// Every value can come from a CLI argument or an environment variable
/// (a `.env` file is loaded first). The event-generation options match the
/// ones accepted by reconfiguration commands in service mode.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "primserve-server",
    version,
    about = "Generates primary events and distributes them to workers in chunks"
)]
pub struct CliArgs {
    /// Generator identity (`boxgen` or `extkin`).
    ///
    /// Environment variable: `PRIMSERVE_GENERATOR`
    #[arg(
        short = 'g',
        long,
        env = "PRIMSERVE_GENERATOR",
        default_value = DEFAULT_GENERATOR
    )]
    pub generator: String,

    /// Trigger applied to generated events: empty, `none`, `nonempty` or
    /// `minprimaries:N`.
    ///
    /// Environment variable: `PRIMSERVE_TRIGGER`
    #[arg(short = 't', long, env = "PRIMSERVE_TRIGGER", default_value = "")]
    pub trigger: String,

    /// JSON-lines kinematics file, required by the `extkin` generator.
    ///
    /// Environment variable: `PRIMSERVE_EXT_KIN_FILE`
    #[arg(long, env = "PRIMSERVE_EXT_KIN_FILE")]
    pub ext_kin_file: Option<PathBuf>,

    /// Number of events in the first batch.
    ///
    /// Environment variable: `PRIMSERVE_N_EVENTS`
    #[arg(short = 'n', long, env = "PRIMSERVE_N_EVENTS", default_value_t = 1)]
    pub n_events: u32,

    /// Initial seed. Event `i` is generated with `seed + i`; a random seed
    /// is drawn when omitted.
    ///
    /// Environment variable: `PRIMSERVE_SEED`
    #[arg(long, env = "PRIMSERVE_SEED")]
    pub seed: Option<u64>,

    /// Maximum number of primaries per chunk.
    ///
    /// Environment variable: `PRIMSERVE_CHUNK_SIZE`
    #[arg(long, env = "PRIMSERVE_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u32,

    /// Transport engine the workers run.
    ///
    /// Environment variable: `PRIMSERVE_MC_ENGINE`
    #[arg(long, env = "PRIMSERVE_MC_ENGINE", default_value = DEFAULT_MC_ENGINE)]
    pub mc_engine: String,

    /// JSON parameter file applied before the key-value overrides.
    ///
    /// Environment variable: `PRIMSERVE_CONFIG_FILE`
    #[arg(long, env = "PRIMSERVE_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// `key=value;...` generator parameter overrides, for example
    /// `BoxGun.number=20;BoxGun.pdg=13`.
    ///
    /// Environment variable: `PRIMSERVE_CONFIG_KEY_VALUES`
    #[arg(long, env = "PRIMSERVE_CONFIG_KEY_VALUES", default_value = "")]
    pub config_key_values: String,

    /// Number of in-process workers.
    ///
    /// Environment variable: `PRIMSERVE_NUM_WORKERS`
    #[arg(long, env = "PRIMSERVE_NUM_WORKERS", default_value_t = 1)]
    pub num_workers: usize,

    /// Keep running after a batch and read reconfiguration commands from
    /// stdin, one per line.
    ///
    /// Environment variable: `PRIMSERVE_SERVICE`
    #[arg(short, long, env = "PRIMSERVE_SERVICE", default_value_t = false)]
    pub service: bool,

    /// File or FIFO that receives the 4-byte event index whenever the first
    /// part of an event is handed out.
    ///
    /// Environment variable: `PRIMSERVE_DRIVER_PIPE`
    #[arg(long, env = "PRIMSERVE_DRIVER_PIPE")]
    pub driver_pipe: Option<PathBuf>,

    /// Capacity of the buffer between the workers and the output sink.
    ///
    /// Environment variable: `PRIMSERVE_OUTPUT_BUFFER_SIZE`
    #[arg(long, env = "PRIMSERVE_OUTPUT_BUFFER_SIZE", default_value_t = 256)]
    pub output_buffer_size: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub run: RunConfig,
    pub num_workers: usize,
    pub driver_pipe: Option<PathBuf>,
    pub channels: ChannelConfig,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("PRIMSERVE_NUM_WORKERS must be greater than 0");
        }

        if args.output_buffer_size == 0 {
            bail!("PRIMSERVE_OUTPUT_BUFFER_SIZE must be greater than 0");
        }

        let run = RunConfig {
            generator: args.generator,
            trigger: args.trigger,
            ext_kin_file: args.ext_kin_file,
            n_events: args.n_events,
            seed: args.seed,
            chunk_size: args.chunk_size,
            mc_engine: args.mc_engine,
            config_file: args.config_file,
            key_values: args.config_key_values,
            as_service: args.service,
            ..RunConfig::default()
        };
        run.validate()?;

        Ok(Self {
            run,
            num_workers: args.num_workers,
            driver_pipe: args.driver_pipe,
            channels: ChannelConfig {
                output_capacity: args.output_buffer_size,
                ..ChannelConfig::default()
            },
        })
    }
}

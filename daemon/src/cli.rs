use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use std::path::PathBuf;
use udmx_types::FRAME_INTERVAL;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
pub struct Cli {
    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "info")]
    pub log_level: LevelFilter,

    /// Location of the daemon configuration file on disk
    #[clap(long, default_value_os_t = default_config_location())]
    pub config: PathBuf,

    /// Milliseconds between two DMX frames
    #[clap(
        long,
        default_value_t = FRAME_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..=1000)
    )]
    pub interval_ms: u64,

    /// Connect to the last used device (or the first one found) on startup
    #[clap(long)]
    pub auto_connect: bool,

    /// Send through a serial DMX adapter at this path instead of a uDMX device
    #[clap(long)]
    pub serial: Option<String>,

    /// List the available uDMX devices and serial ports, then exit
    #[clap(long)]
    pub list: bool,

    /// Send a test value to each uDMX device found (or list every USB device if there are none),
    /// then exit
    #[clap(long)]
    pub test: bool,
}

fn default_config_location() -> PathBuf {
    match ProjectDirs::from("org", "udmx-controller", "UDMX-Controller") {
        Some(proj_dirs) => proj_dirs.config_dir().join("settings.json"),
        None => PathBuf::from("settings.json"),
    }
}

#[repr(usize)]
#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum LevelFilter {
    /// A level lower than all log levels.
    Off,
    /// Corresponds to the `Error` log level.
    Error,
    /// Corresponds to the `Warn` log level.
    Warn,
    /// Corresponds to the `Info` log level.
    Info,
    /// Corresponds to the `Debug` log level.
    Debug,
    /// Corresponds to the `Trace` log level.
    Trace,
}

impl From<LevelFilter> for log::LevelFilter {
    fn from(value: LevelFilter) -> Self {
        match value {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        }
    }
}

/// The persisted verbose flag raises the level to Debug, but never lowers an explicit choice.
pub fn effective_level(requested: LevelFilter, verbose: bool) -> log::LevelFilter {
    let requested = log::LevelFilter::from(requested);
    if verbose && requested < log::LevelFilter::Debug {
        return log::LevelFilter::Debug;
    }
    requested
}

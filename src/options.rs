use clap::Parser;

/// Growatt Bridge - a Modbus RTU monitor for Growatt solar inverters
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Dry-run mode: log PVOutput and MQTT data at debug level instead of
    /// sending it
    #[clap(long = "test")]
    pub test: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }
}

//! Command Line Interface (CLI) arguments.

use clap::Parser;

/// Expressionist command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "EXPRESSIONIST_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "EXPRESSIONIST_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "EXPRESSIONIST_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/expressionist/certs/cert.pem",
        env = "EXPRESSIONIST_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/expressionist/certs/key.pem",
        env = "EXPRESSIONIST_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "EXPRESSIONIST_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Root directory holding one sub-directory per bioproject
    #[arg(long, default_value = "./data", env = "EXPRESSIONIST_DATA_DIR")]
    pub data_dir: String,
    /// Directory generated plot images are published into
    #[arg(long, default_value = "./imgs/temp", env = "EXPRESSIONIST_PLOT_DIR")]
    pub plot_dir: String,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}

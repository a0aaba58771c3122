use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "docprep-server")]
#[command(about = "Document image preprocessing server for OCR readiness")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "DOCPREP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "DOCPREP_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 50MB)
    #[arg(long, env = "DOCPREP_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
        }
    }
}

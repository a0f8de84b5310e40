use thiserror::Error;

/// Startup configuration errors. Every variant is fatal for the process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config flag already set")]
    AlreadySet,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid discord token length: expected {expected}, got {actual}")]
    TokenLength { expected: usize, actual: usize },

    #[error("malformed config: {0}")]
    Malformed(String),
}

//! Error types for rule references, compilation and scanning.

/// Errors parsing a `[namespace:]path` rule reference.
#[derive(Debug, thiserror::Error)]
pub enum RuleSpecError {
    /// The reference was an empty string.
    #[error("empty rule specification")]
    EmptyArgument,

    /// A namespace was given without a path after the colon.
    #[error("rule specification '{0}' has no source path")]
    EmptySource(String),

    /// A global variable definition was not of the form `name=value`.
    #[error("malformed global definition '{0}', expected name=value")]
    MalformedGlobal(String),
}

/// Errors building a scanning engine. All of them abort compilation: no
/// engine is produced from a partial rule set.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The compilation unit could not be set up.
    #[error("unable to instantiate rule compiler: {0}")]
    Init(String),

    /// A rule source could not be read.
    #[error("could not open rule file {path}: {cause}")]
    SourceOpen {
        path: String,
        #[source]
        cause: std::io::Error,
    },

    /// A rule source was read but is not valid rule syntax.
    #[error("could not parse rule file {path}: {cause}")]
    SourceParse { path: String, cause: String },

    /// The unit could not be turned into an engine.
    #[error("unable to compile rules: {0}")]
    Finalize(String),
}

/// Error evaluating text against a compiled engine.
#[derive(Debug, thiserror::Error)]
#[error("scan failed: {0}")]
pub struct ScanError(pub String);

/// Result alias for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

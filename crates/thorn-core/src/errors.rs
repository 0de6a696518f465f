use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid optimization level: {0}")]
    InvalidLevel(String),

    #[error("Pass '{pass}' depends on unregistered pass '{dependency}'")]
    UnknownDependency { pass: String, dependency: String },

    #[error("Circular dependency detected among optimization passes: {0}")]
    DependencyCycle(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, OptimizeError>;

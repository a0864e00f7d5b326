use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Settings file not found at {0} (set via ARMFLOW_CONFIG_PATH).\n\
        Without ARMFLOW_CONFIG_PATH the search order is:\n\
        - current directory: armflow.local.yaml, armflow.yaml, .armflow.yaml\n\
        - ~/.config/armflow/settings.yaml"
    )]
    ExplicitPathMissing(PathBuf),

    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid settings: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

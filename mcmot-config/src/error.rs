#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("{source}")]
    SerdeYaml {
        #[from]
        source: serde_yaml::Error,
    },
    #[error("{source}")]
    SerdeJson {
        #[from]
        source: serde_json::Error,
    },
    #[error("{source}")]
    ShellExpand {
        #[from]
        source: shellexpand::LookupError<std::env::VarError>,
    },
    #[error("environment variable {name} has invalid value {raw:?}: {reason}")]
    InvalidEnvValue { name: &'static str, raw: String, reason: String },
    #[error("MCMOT_ENABLED is set but MCMOT_CONFIG_PATH is absent")]
    MissingMcmotConfigPath,
}

pub type Result<T> = std::result::Result<T, Error>;

use {
    std::path::PathBuf,
    tokio::fs,
    serde::Deserialize,
    fx_core::TriggerDefinition,
    crate::{error::ConfigLoadError, pool::ExecutionMode},
};

#[derive(Deserialize, Debug)]
pub struct EmulatorConfig {
    #[serde(skip_deserializing)]
    pub config_path: Option<PathBuf>,

    #[serde(default)]
    pub execution_mode: ExecutionMode,

    pub logger: Option<LoggerConfig>,

    #[serde(default)]
    pub functions: Vec<TriggerDefinition>,
}

#[derive(Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum LoggerConfig {
    #[serde(rename = "stdout")]
    Stdout {
        level: Option<String>,
    },
    #[serde(rename = "noop")]
    Noop,
}

impl EmulatorConfig {
    pub async fn load(file_path: PathBuf) -> Result<Self, ConfigLoadError> {
        let content = fs::read(&file_path).await.map_err(ConfigLoadError::FailedToRead)?;
        let mut config: Self = serde_yml::from_slice(&content).map_err(ConfigLoadError::FailedToParse)?;
        config.config_path = Some(file_path);
        Ok(config)
    }

    pub fn from_yaml(config: &str) -> Result<Self, ConfigLoadError> {
        serde_yml::from_str(config).map_err(ConfigLoadError::FailedToParse)
    }
}

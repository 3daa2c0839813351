use super::BrokerConfig;
use crate::Result;
use config::{Config, Environment};

impl BrokerConfig {
    /// Load configuration from `RELAYMQ_`-prefixed environment variables,
    /// e.g. `RELAYMQ_WORKER_COUNT=8 RELAYMQ_RETRY_DELAY_MS=1000`.
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .add_source(Environment::with_prefix("RELAYMQ"))
            .build()
            .map_err(|e| crate::RelaymqError::Config(e.to_string()))?;

        let config = settings
            .try_deserialize::<BrokerConfig>()
            .map_err(|e| crate::RelaymqError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }
}

use relaymq::BrokerConfig;

#[derive(Debug, Clone)]
pub struct SoakConfig {
    pub worker_count: usize,
    pub max_retry: u32,
    pub retry_delay_ms: u64,
    pub topic: String,
    pub batch_size: usize,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            max_retry: 3,
            retry_delay_ms: 50,
            topic: "soak.records".to_string(),
            batch_size: 100,
        }
    }
}

impl SoakConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: env_parse("SOAK_WORKERS", defaults.worker_count),
            max_retry: env_parse("SOAK_MAX_RETRY", defaults.max_retry),
            retry_delay_ms: env_parse("SOAK_RETRY_DELAY_MS", defaults.retry_delay_ms),
            topic: std::env::var("SOAK_TOPIC").unwrap_or(defaults.topic),
            batch_size: env_parse("SOAK_BATCH_SIZE", defaults.batch_size),
        }
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            worker_count: self.worker_count,
            max_retry: self.max_retry,
            retry_delay_ms: self.retry_delay_ms,
            queue_capacity: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

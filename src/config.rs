use {
    crate::domain::event::TOPIC_PAYMENTS,
    std::{env, str::FromStr, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_url: String,
    pub kafka_brokers: String,
    pub listen_addr: String,
    pub payments_topic: String,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub claim_ttl: Duration,
    pub idempotency_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            db_max_connections: positive(&lookup, "DB_MAX_CONNECTIONS", 20)?,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
            kafka_brokers: lookup("KAFKA_BROKERS").unwrap_or_else(|| "127.0.0.1:9092".into()),
            listen_addr: lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            payments_topic: lookup("PAYMENTS_TOPIC").unwrap_or_else(|| TOPIC_PAYMENTS.into()),
            poll_interval: Duration::from_millis(positive(&lookup, "OUTBOX_POLL_INTERVAL_MS", 5_000)?),
            batch_size: positive(&lookup, "OUTBOX_BATCH_SIZE", 100)?,
            claim_ttl: Duration::from_secs(positive(&lookup, "OUTBOX_CLAIM_TTL_SECS", 30)?),
            idempotency_ttl: Duration::from_secs(positive(
                &lookup,
                "IDEMPOTENCY_TTL_SECS",
                30 * 24 * 60 * 60,
            )?),
        })
    }
}

fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db")])).unwrap();

        assert_eq!(config.database_url, "postgres://db");
        assert_eq!(config.payments_topic, "payments");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.claim_ttl, Duration::from_secs(30));
        assert_eq!(config.idempotency_ttl, Duration::from_secs(2_592_000));
        assert_eq!(config.db_max_connections, 20);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("OUTBOX_BATCH_SIZE", "2"),
            ("OUTBOX_POLL_INTERVAL_MS", "250"),
            ("PAYMENTS_TOPIC", "payments-test"),
        ]))
        .unwrap();

        assert_eq!(config.batch_size, 2);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.payments_topic, "payments-test");
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        for bad in ["0", "-1", "many"] {
            let err = Config::from_lookup(lookup_from(&[
                ("DATABASE_URL", "postgres://db"),
                ("OUTBOX_BATCH_SIZE", bad),
            ]))
            .unwrap_err();
            assert_eq!(
                err,
                ConfigError::Invalid {
                    key: "OUTBOX_BATCH_SIZE",
                    value: bad.to_string()
                }
            );
        }
    }
}

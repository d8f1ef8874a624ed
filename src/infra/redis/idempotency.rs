use {
    crate::domain::error::PipelineError,
    crate::domain::id::IdempotencyKey,
    crate::domain::ports::{BoxFuture, IdempotencyStore},
    fred::clients::Pool,
    fred::prelude::*,
    fred::types::{Builder, Expiration, SetOptions},
    std::time::Duration,
    uuid::Uuid,
};

pub const KEY_PREFIX: &str = "IDEMP_KEY";
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Upper bound for any single command. Kept well under the HTTP request
/// timeout so a stalled Redis fails the reservation instead of letting a
/// queued `SET` land after the request is gone.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Deletes the key only while it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

pub struct RedisIdempotencyStore {
    pool: Pool,
    ttl_secs: i64,
}

impl RedisIdempotencyStore {
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, PipelineError> {
        let ttl_secs = expiry_secs(ttl)?;
        let config = Config::from_url(redis_url)?;

        let pool = Builder::from_config(config)
            .with_connection_config(|cfg| {
                cfg.connection_timeout = Duration::from_secs(5);
                cfg.internal_command_timeout = Duration::from_secs(5);
            })
            .with_performance_config(|cfg| {
                cfg.default_command_timeout = COMMAND_TIMEOUT;
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 1000, 2))
            .build_pool(4)?;

        pool.init().await?;

        Ok(Self { pool, ttl_secs })
    }
}

pub fn storage_key(raw: &IdempotencyKey) -> String {
    format!("{KEY_PREFIX}:{}", raw.as_str())
}

/// `EX` argument for `ttl`: whole seconds, at least one.
pub fn expiry_secs(ttl: Duration) -> Result<i64, PipelineError> {
    i64::try_from(ttl.as_secs().max(1)).map_err(|_| {
        PipelineError::Validation(format!(
            "idempotency ttl of {} seconds is out of range",
            ttl.as_secs()
        ))
    })
}

impl IdempotencyStore for RedisIdempotencyStore {
    fn try_reserve<'a>(
        &'a self,
        key: &'a IdempotencyKey,
        token: Uuid,
    ) -> BoxFuture<'a, Result<bool, PipelineError>> {
        Box::pin(async move {
            // SET NX EX: one round trip, so two callers cannot both win.
            let reply: Option<String> = self
                .pool
                .set(
                    storage_key(key),
                    token.to_string(),
                    Some(Expiration::EX(self.ttl_secs)),
                    Some(SetOptions::NX),
                    false,
                )
                .await?;

            Ok(reply.is_some())
        })
    }

    fn release<'a>(
        &'a self,
        key: &'a IdempotencyKey,
        token: Uuid,
    ) -> BoxFuture<'a, Result<(), PipelineError>> {
        Box::pin(async move {
            let removed: i64 = self
                .pool
                .eval(RELEASE_SCRIPT, vec![storage_key(key)], vec![token.to_string()])
                .await?;
            if removed == 0 {
                tracing::debug!(idempotency_key = %key, "key not held by this token, left in place");
            }
            Ok(())
        })
    }
}

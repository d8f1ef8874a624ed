use {
    super::error::PipelineError,
    derive_more::Display,
    serde::{Deserialize, Serialize},
    std::str::FromStr,
    uuid::Uuid,
};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Opaque order identifier shared with the order service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderReference(Uuid);

impl OrderReference {
    pub fn new(id: Uuid) -> Result<Self, PipelineError> {
        if id.is_nil() {
            return Err(PipelineError::Validation(
                "order_reference must not be the nil uuid".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl FromStr for OrderReference {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::parse_str(s)
            .map_err(|e| PipelineError::Validation(format!("invalid order_reference {s}: {e}")))?;
        Self::new(id)
    }
}

/// Caller identity as propagated by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Result<Self, PipelineError> {
        if id <= 0 {
            return Err(PipelineError::Validation(format!(
                "user_id must be positive, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

/// Client-supplied token deduplicating retried payment requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Result<Self, PipelineError> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::Validation(
                "idempotency_key must not be empty".into(),
            ));
        }
        if trimmed.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(PipelineError::Validation(format!(
                "idempotency_key longer than {MAX_IDEMPOTENCY_KEY_LEN} bytes"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

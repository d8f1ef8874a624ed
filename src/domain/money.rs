use {
    super::error::PipelineError,
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Fractional digits the ledger column stores.
pub const AMOUNT_SCALE: u32 = 2;

/// Upper bound (exclusive) that fits NUMERIC(12,2).
const AMOUNT_LIMIT: i64 = 10_000_000_000;

/// Strictly positive payment amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PipelineError> {
        if value <= Decimal::ZERO {
            return Err(PipelineError::Validation(format!(
                "amount must be positive, got: {value}"
            )));
        }
        if value.normalize().scale() > AMOUNT_SCALE {
            return Err(PipelineError::Validation(format!(
                "amount has more than {AMOUNT_SCALE} fractional digits: {value}"
            )));
        }
        if value >= Decimal::from(AMOUNT_LIMIT) {
            return Err(PipelineError::Validation(format!(
                "amount exceeds storage capacity: {value}"
            )));
        }

        let mut value = value;
        value.rescale(AMOUNT_SCALE);
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PipelineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            error::PipelineError,
            id::{IdempotencyKey, OrderReference, UserId},
            money::Amount,
            payment::PaymentCommand,
            ports::UnitOfWork,
        },
    },
    axum::{
        Json, Router,
        extract::{DefaultBodyLimit, FromRequestParts, State, rejection::JsonRejection},
        http::{StatusCode, request::Parts},
        routing::{get, post},
    },
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::time::Duration,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
    uuid::Uuid,
};

/// Header the gateway sets after authenticating the caller.
pub const USER_ID_HEADER: &str = "x-user-id";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const ACCEPTED_MESSAGE: &str = "Payment accepted. Order status will be updated shortly.";

#[derive(Debug, Deserialize)]
pub struct PayRequest {
    pub order_reference: Uuid,
    pub amount: Decimal,
    pub idempotency_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PayResponse {
    pub message: String,
}

impl PayRequest {
    pub fn into_command(self, user_id: UserId) -> Result<PaymentCommand, PipelineError> {
        Ok(PaymentCommand {
            user_id,
            order_reference: OrderReference::new(self.order_reference)?,
            amount: Amount::new(self.amount)?,
            idempotency_key: IdempotencyKey::new(self.idempotency_key)?,
        })
    }
}

/// Authenticated caller, taken from the trusted gateway header.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| PipelineError::Unauthenticated("missing caller identity".into()))?;

        let id: i64 = raw
            .trim()
            .parse()
            .map_err(|_| PipelineError::Unauthenticated(format!("malformed caller identity: {raw}")))?;

        let user = UserId::new(id).map_err(|e| PipelineError::Unauthenticated(e.to_string()))?;
        Ok(Self(user))
    }
}

pub async fn pay_handler<U: UnitOfWork>(
    State(state): State<AppState<U>>,
    CallerId(user_id): CallerId,
    body: Result<Json<PayRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PayResponse>), ApiError> {
    let Json(request) = body?;
    let cmd = request.into_command(user_id)?;

    state.processor.process(cmd).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PayResponse {
            message: ACCEPTED_MESSAGE.to_string(),
        }),
    ))
}

pub fn router<U: UnitOfWork>(state: AppState<U>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/payments/pay", post(pay_handler::<U>))
        .route("/api/v1/payments/pay", post(pay_handler::<U>))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! REST and webhook handlers

use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use order_dispatch_channels::{
    order_received_text, ChannelError, DriverCommand, MessagingWebhook, VoiceWebhook,
    WebOrderForm, WebOrderReceipt, HELP_TEXT, VOICE_ACK_XML,
};
use order_dispatch_core::{DispatchError, DriverReply, Submission};
use order_dispatch_metrics::{ErrorContext, OrderSpan};
use order_dispatch_types::{
    Channel, Customer, Driver, Order, OrderId, OrderRequest, RejectReason, TransitionOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, Instrument};

use crate::state::AppStateRef;

pub fn routes(state: AppStateRef) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Intake
        .route("/api/web-order", post(submit_web_order))
        .route("/api/orders", post(submit_web_order))
        .route("/api/voice", post(voice_webhook))
        .route("/api/messaging", post(messaging_webhook))
        // Order lifecycle
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/claim", post(claim_order))
        .route("/api/orders/:id/deliver", post(deliver_order))
        .route("/api/orders/:id/release", post(release_order))
        .route("/api/orders/:id/enrichment", post(enrich_order))
        // Admin
        .route("/api/admin/orders", get(list_orders))
        .route("/api/admin/customers", get(list_customers))
        .route("/api/admin/customers/:phone", get(get_customer))
        .route("/api/admin/drivers", get(list_drivers))
        .route("/api/admin/drivers/:phone", get(get_driver))
        .with_state(state)
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum ApiError {
    Dispatch(DispatchError),
    Channel(ChannelError),
    NotFound(String),
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        ApiError::Dispatch(err)
    }
}

impl From<ChannelError> for ApiError {
    fn from(err: ChannelError) -> Self {
        ApiError::Channel(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Dispatch(DispatchError::MalformedRequest(_)) | ApiError::Channel(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Dispatch(DispatchError::NotFound(_)) | ApiError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Dispatch(DispatchError::StoreUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Dispatch(DispatchError::Ledger(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Dispatch(e) => e.to_string(),
            ApiError::Channel(e) => e.to_string(),
            ApiError::NotFound(what) => format!("{what} not found"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.message(), "request failed");
        }
        (status, Json(json!({ "ok": false, "error": self.message() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ═══════════════════════════════════════════════════════════════════════════
// HEALTH
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    store_ready: bool,
    drivers: usize,
}

pub async fn health_check(State(state): State<AppStateRef>) -> Json<HealthResponse> {
    let store_ready = state.store.is_ready();
    Json(HealthResponse {
        status: if store_ready { "healthy" } else { "starting" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        store_ready,
        drivers: state.core.roster().len(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// INTAKE
// ═══════════════════════════════════════════════════════════════════════════

async fn submit(state: &AppStateRef, request: OrderRequest) -> ApiResult<Submission> {
    let channel = request.channel;
    let span = OrderSpan::new("intake");
    let started = Instant::now();

    let result = state
        .core
        .submit_order(request)
        .instrument(span.span())
        .await;
    state
        .metrics
        .record_operation_duration("intake", started.elapsed());

    match result {
        Ok(submission) => {
            state.metrics.record_order_received(channel);
            let failed = state.core.roster().len().saturating_sub(submission.notified);
            state.metrics.record_broadcast(submission.notified, failed);
            info!(
                correlation_id = %span.correlation_id,
                order_id = %submission.order.id,
                %channel,
                "order received"
            );
            Ok(submission)
        }
        Err(e) => {
            record_failure(state, channel, &e);
            Err(e.into())
        }
    }
}

fn record_failure(state: &AppStateRef, channel: Channel, err: &DispatchError) {
    match err {
        DispatchError::MalformedRequest(_) => state.metrics.record_intake_rejected(channel),
        DispatchError::StoreUnavailable(_) => state.metrics.record_store_unavailable(),
        _ => {}
    }
}

pub async fn submit_web_order(
    State(state): State<AppStateRef>,
    Json(form): Json<WebOrderForm>,
) -> ApiResult<Json<WebOrderReceipt>> {
    let request = form.into_request().map_err(|e| {
        state.metrics.record_intake_rejected(Channel::Web);
        ApiError::from(e)
    })?;

    let submission = submit(&state, request).await?;
    Ok(Json(WebOrderReceipt::received(submission.order.id)))
}

pub async fn voice_webhook(
    State(state): State<AppStateRef>,
    Form(webhook): Form<VoiceWebhook>,
) -> ApiResult<Response> {
    submit(&state, webhook.into_request()).await?;
    Ok(([(header::CONTENT_TYPE, "text/xml")], VOICE_ACK_XML).into_response())
}

/// Text messages carry both driver commands and customer orders.
///
/// The reply body is plain text and is the only answer the sender gets:
/// claims and deliveries made here skip the notifier.
pub async fn messaging_webhook(
    State(state): State<AppStateRef>,
    Form(webhook): Form<MessagingWebhook>,
) -> ApiResult<String> {
    let sender = webhook.sender()?.to_string();

    let reply = match webhook.command() {
        Ok(DriverCommand::Claim { order_id }) => run_claim(&state, &order_id, &sender).await?.text,
        Ok(DriverCommand::Delivered { order_id, note }) => {
            run_delivery(&state, &order_id, &sender, note).await?.text
        }
        Err(ChannelError::UnknownCommand(_)) => match webhook.into_request() {
            Ok(request) => {
                let submission = submit(&state, request).await?;
                order_received_text(&submission.order.id)
            }
            Err(e) => {
                state.metrics.record_intake_rejected(Channel::Messaging);
                info!(from = %sender, error = %e, "message is neither a command nor an order");
                HELP_TEXT.to_string()
            }
        },
        Err(_) => HELP_TEXT.to_string(),
    };
    Ok(reply)
}

// ═══════════════════════════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverBody {
    #[serde(default, alias = "driver")]
    pub driver_phone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverBody {
    #[serde(default, alias = "driver")]
    pub driver_phone: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentBody {
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    ok: bool,
    replay: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    order: Order,
}

/// 200 when accepted (fresh or replay), 409 with the reason when rejected
fn transition_response(outcome: TransitionOutcome) -> Response {
    match outcome {
        TransitionOutcome::Accepted { order, replay } => (
            StatusCode::OK,
            Json(TransitionResponse {
                ok: true,
                replay,
                reason: None,
                message: None,
                order,
            }),
        )
            .into_response(),
        TransitionOutcome::Rejected { order, reason } => (
            StatusCode::CONFLICT,
            Json(TransitionResponse {
                ok: false,
                replay: false,
                reason: Some(reason),
                message: Some(reason.message().to_string()),
                order,
            }),
        )
            .into_response(),
    }
}

async fn run_claim(
    state: &AppStateRef,
    id: &OrderId,
    driver: &str,
) -> Result<DriverReply, DispatchError> {
    let span = OrderSpan::for_order("claim", id.as_str());
    let started = Instant::now();
    let result = state
        .core
        .claim_with_reply(id, driver)
        .instrument(span.span())
        .await;
    state
        .metrics
        .record_operation_duration("claim", started.elapsed());

    match &result {
        Ok(reply) => state.metrics.record_claim(&reply.outcome),
        Err(DispatchError::StoreUnavailable(_)) => state.metrics.record_store_unavailable(),
        Err(_) => {}
    }
    result
}

async fn run_delivery(
    state: &AppStateRef,
    id: &OrderId,
    driver: &str,
    note: Option<String>,
) -> Result<DriverReply, DispatchError> {
    let span = OrderSpan::for_order("deliver", id.as_str());
    let started = Instant::now();
    let result = state
        .core
        .confirm_delivery_with_reply(id, driver, note)
        .instrument(span.span())
        .await;
    state
        .metrics
        .record_operation_duration("deliver", started.elapsed());

    match &result {
        Ok(reply) => state.metrics.record_delivery(&reply.outcome),
        Err(DispatchError::StoreUnavailable(_)) => state.metrics.record_store_unavailable(),
        Err(_) => {}
    }
    result
}

pub async fn get_order(
    State(state): State<AppStateRef>,
    Path(id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state.core.lookup_order(&OrderId::from(id)).await?;
    Ok(Json(order))
}

pub async fn claim_order(
    State(state): State<AppStateRef>,
    Path(id): Path<String>,
    Json(body): Json<DriverBody>,
) -> ApiResult<Response> {
    let reply = run_claim(&state, &OrderId::from(id), &body.driver_phone).await?;
    state.core.send_reply(&reply).await;
    Ok(transition_response(reply.outcome))
}

pub async fn deliver_order(
    State(state): State<AppStateRef>,
    Path(id): Path<String>,
    Json(body): Json<DeliverBody>,
) -> ApiResult<Response> {
    let reply = run_delivery(&state, &OrderId::from(id), &body.driver_phone, body.note).await?;
    state.core.send_reply(&reply).await;
    Ok(transition_response(reply.outcome))
}

pub async fn release_order(
    State(state): State<AppStateRef>,
    Path(id): Path<String>,
    Json(body): Json<DriverBody>,
) -> ApiResult<Response> {
    let id = OrderId::from(id);
    let outcome = state
        .core
        .release_claim(&id, &body.driver_phone)
        .instrument(OrderSpan::for_order("release", id.as_str()).span())
        .await?;
    Ok(transition_response(outcome))
}

pub async fn enrich_order(
    State(state): State<AppStateRef>,
    Path(id): Path<String>,
    Json(body): Json<EnrichmentBody>,
) -> ApiResult<Json<Order>> {
    let id = OrderId::from(id);
    let order = state
        .core
        .enrich_order(&id, body.audio_url, body.transcript)
        .await
        .with_order_id(id.as_str())?;
    Ok(Json(order))
}

// ═══════════════════════════════════════════════════════════════════════════
// ADMIN
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

pub async fn list_orders(State(state): State<AppStateRef>) -> ApiResult<Json<ListResponse<Order>>> {
    Ok(Json(state.core.list_orders().await?.into()))
}

pub async fn list_customers(
    State(state): State<AppStateRef>,
) -> ApiResult<Json<ListResponse<Customer>>> {
    Ok(Json(state.core.customers().await?.into()))
}

pub async fn get_customer(
    State(state): State<AppStateRef>,
    Path(phone): Path<String>,
) -> ApiResult<Json<Customer>> {
    state
        .core
        .customer(&phone)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("customer {phone}")))
}

pub async fn list_drivers(
    State(state): State<AppStateRef>,
) -> ApiResult<Json<ListResponse<Driver>>> {
    Ok(Json(state.core.drivers().await?.into()))
}

pub async fn get_driver(
    State(state): State<AppStateRef>,
    Path(phone): Path<String>,
) -> ApiResult<Json<Driver>> {
    state
        .core
        .driver(&phone)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("driver {phone}")))
}

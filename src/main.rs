//! EZMarket Orders - admin API for the order lifecycle and activity audit log

use anyhow::Result;
use axum::{async_trait, extract::{FromRequestParts, Path, Query, State}, http::{request::Parts, StatusCode}, routing::{get, post, put}, Json, Router};
use ezmarket_orders::{ActivityLogEntry, AdminIdentity, NewOrder, Note, Order, OrderService, OrderStatus, OrdersError, PaymentStatus, PgStore, ShippingUpdate, StatusMeta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct AppState { pub service: Arc<OrderService> }

type ApiError = (StatusCode, String);

fn http_err(e: OrdersError) -> ApiError {
    let code = match &e {
        OrdersError::OrderNotFound | OrdersError::NoteNotFound => StatusCode::NOT_FOUND,
        OrdersError::InvalidTransition(_) => StatusCode::CONFLICT,
        OrdersError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OrdersError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, e.to_string())
}

fn invalid(e: impl std::fmt::Display) -> ApiError { (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()) }

/// Acting admin, taken from headers set by the auth proxy in front of us.
pub struct CurrentAdmin(pub AdminIdentity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
        };
        match (header("x-admin-id"), header("x-admin-name")) {
            (Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => {
                Ok(Self(AdminIdentity { id, name }))
            }
            _ => Err((StatusCode::UNAUTHORIZED, "Missing x-admin-id / x-admin-name headers".to_string())),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let db = PgPoolOptions::new().max_connections(10).connect(&std::env::var("DATABASE_URL")?).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let nats = match std::env::var("NATS_URL") { Ok(url) => async_nats::connect(&url).await.ok(), Err(_) => None };
    let service = Arc::new(OrderService::with_events(Arc::new(PgStore::new(db)), nats));
    let state = AppState { service };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "ezmarket-orders"})) }))
        .route("/api/v1/order-statuses", get(list_statuses))
        .route("/api/v1/orders", get(list_orders).post(create_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/activity", get(list_activity))
        .route("/api/v1/orders/:id/status", put(change_status))
        .route("/api/v1/orders/:id/payment-status", put(change_payment_status))
        .route("/api/v1/orders/:id/shipping", put(update_shipping))
        .route("/api/v1/orders/:id/notify", post(notify_customer))
        .route("/api/v1/orders/:id/notes", get(list_notes).post(add_note))
        .route("/api/v1/orders/:id/notes/:note_id", put(update_note).delete(delete_note))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8084".to_string());
    tracing::info!("🚀 EZMarket orders service listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32> }
#[derive(Debug, Serialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: i64, pub page: u32 }
#[derive(Debug, Serialize)] pub struct MutationResponse { pub order: Order, pub activity: ActivityLogEntry }
#[derive(Debug, Serialize)] pub struct NoteResponse { pub note: Note, pub activity: ActivityLogEntry }
#[derive(Debug, Serialize)] pub struct StatusEntry { pub value: OrderStatus, #[serde(flatten)] pub meta: &'static StatusMeta }

async fn list_statuses() -> Json<Vec<StatusEntry>> {
    Json(OrderStatus::ALL.iter().map(|&s| StatusEntry { value: s, meta: s.meta() }).collect())
}

async fn list_orders(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Order>>, ApiError> {
    let page = p.page.unwrap_or(1).max(1); let per_page = p.per_page.unwrap_or(20).min(100);
    let (data, total) = s.service.list_orders(page, per_page).await.map_err(http_err)?;
    Ok(Json(PaginatedResponse { data, total, page }))
}

async fn get_order(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>, ApiError> {
    s.service.get_order(id).await.map(Json).map_err(http_err)
}

async fn list_activity(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<ActivityLogEntry>>, ApiError> {
    s.service.list_activity(id).await.map(Json).map_err(http_err)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderBody {
    pub customer_id: Option<Uuid>,
    #[validate(email)]
    pub customer_email: String,
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    pub subtotal: Decimal,
    #[serde(default)] pub shipping_cost: Decimal,
    #[serde(default)] pub discount: Decimal,
}

async fn create_order(State(s): State<AppState>, CurrentAdmin(admin): CurrentAdmin, Json(body): Json<CreateOrderBody>) -> Result<(StatusCode, Json<MutationResponse>), ApiError> {
    body.validate().map_err(invalid)?;
    let new = NewOrder { customer_id: body.customer_id, customer_email: body.customer_email, currency: body.currency, subtotal: body.subtotal, shipping_cost: body.shipping_cost, discount: body.discount };
    let (order, activity) = s.service.create_order(new, &admin).await.map_err(http_err)?;
    Ok((StatusCode::CREATED, Json(MutationResponse { order, activity })))
}

#[derive(Debug, Deserialize)] pub struct StatusBody { pub status: OrderStatus }

async fn change_status(State(s): State<AppState>, CurrentAdmin(admin): CurrentAdmin, Path(id): Path<Uuid>, Json(body): Json<StatusBody>) -> Result<Json<MutationResponse>, ApiError> {
    let (order, activity) = s.service.change_status(id, body.status, &admin).await.map_err(http_err)?;
    Ok(Json(MutationResponse { order, activity }))
}

#[derive(Debug, Deserialize)] pub struct PaymentStatusBody { pub payment_status: PaymentStatus }

async fn change_payment_status(State(s): State<AppState>, CurrentAdmin(admin): CurrentAdmin, Path(id): Path<Uuid>, Json(body): Json<PaymentStatusBody>) -> Result<Json<MutationResponse>, ApiError> {
    let (order, activity) = s.service.change_payment_status(id, body.payment_status, &admin).await.map_err(http_err)?;
    Ok(Json(MutationResponse { order, activity }))
}

async fn update_shipping(State(s): State<AppState>, CurrentAdmin(admin): CurrentAdmin, Path(id): Path<Uuid>, Json(patch): Json<ShippingUpdate>) -> Result<Json<MutationResponse>, ApiError> {
    let (order, activity) = s.service.update_shipping(id, patch, &admin).await.map_err(http_err)?;
    Ok(Json(MutationResponse { order, activity }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct NotifyBody {
    #[serde(default = "default_channel")] pub channel: String,
    #[validate(length(min = 1, max = 1000))] pub message: String,
}
fn default_channel() -> String { "email".to_string() }

async fn notify_customer(State(s): State<AppState>, CurrentAdmin(admin): CurrentAdmin, Path(id): Path<Uuid>, Json(body): Json<NotifyBody>) -> Result<Json<MutationResponse>, ApiError> {
    body.validate().map_err(invalid)?;
    let (order, activity) = s.service.notify_customer(id, body.channel, body.message, &admin).await.map_err(http_err)?;
    Ok(Json(MutationResponse { order, activity }))
}

async fn list_notes(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Vec<Note>>, ApiError> {
    s.service.list_notes(id).await.map(Json).map_err(http_err)
}

#[derive(Debug, Deserialize, Validate)]
pub struct NoteBody { #[validate(length(min = 1, max = 2000))] pub text: String }

async fn add_note(State(s): State<AppState>, CurrentAdmin(admin): CurrentAdmin, Path(id): Path<Uuid>, Json(body): Json<NoteBody>) -> Result<(StatusCode, Json<NoteResponse>), ApiError> {
    body.validate().map_err(invalid)?;
    let (note, activity) = s.service.add_note(id, body.text, &admin).await.map_err(http_err)?;
    Ok((StatusCode::CREATED, Json(NoteResponse { note, activity })))
}

async fn update_note(State(s): State<AppState>, CurrentAdmin(admin): CurrentAdmin, Path((id, note_id)): Path<(Uuid, Uuid)>, Json(body): Json<NoteBody>) -> Result<Json<NoteResponse>, ApiError> {
    body.validate().map_err(invalid)?;
    let (note, activity) = s.service.update_note(id, note_id, body.text, &admin).await.map_err(http_err)?;
    Ok(Json(NoteResponse { note, activity }))
}

async fn delete_note(State(s): State<AppState>, CurrentAdmin(admin): CurrentAdmin, Path((id, note_id)): Path<(Uuid, Uuid)>) -> Result<Json<ActivityLogEntry>, ApiError> {
    s.service.delete_note(id, note_id, &admin).await.map(Json).map_err(http_err)
}

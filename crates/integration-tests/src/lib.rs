//! Integration tests for Greenhouse.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p greenhouse-integration-tests
//! ```
//!
//! # Fake backend
//!
//! [`FakeBackend`] serves the cart and notification routes from memory on a
//! random local port. It answers the way the real backend does: cart writes
//! return the whole cart with a server-computed `montantTotal`, notification
//! writes return only `{message}`, errors carry `{message}`, and requests
//! without the session token get `401`.
//!
//! ```rust,ignore
//! let backend = FakeBackend::start().await;
//! backend.add_product("p1", "Capteur d'humidité", 1250, 5);
//! let gateway = HttpGateway::new(&backend.api_config())?;
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use chrono::{Duration, TimeZone, Utc};
use greenhouse_client::ApiConfig;
use greenhouse_core::{
    CartEntry, CartEntryId, CartSnapshotDocument, Notification, NotificationCategory,
    NotificationId, NotificationPageDocument, Price, Priority, ProductId, Quantity,
    UnreadCountDocument, UserId,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Token the fake backend accepts.
pub const SESSION_TOKEN: &str = "test-session-token";

/// User every fake notification belongs to.
pub const USER_ID: &str = "user-1";

// =============================================================================
// Errors
// =============================================================================

/// Error response in the backend's `{message}` shape.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Non authentifié")
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone)]
struct Product {
    name: String,
    price: Price,
    stock: u32,
}

#[derive(Debug, Default)]
struct BackendState {
    products: HashMap<ProductId, Product>,
    cart: Vec<CartEntry>,
    /// Subtracted from the cart total so tests can tell a server total from a
    /// client-side sum.
    discount: Decimal,
    notifications: Vec<Notification>,
    /// Status returned by the next request instead of handling it.
    fail_next: Option<StatusCode>,
    requests: Vec<String>,
}

impl BackendState {
    fn cart_document(&self) -> CartSnapshotDocument {
        let sum: Decimal = self
            .cart
            .iter()
            .map(|entry| entry.unit_price.amount() * Decimal::from(entry.quantity.get()))
            .sum();
        let total = Price::new((sum - self.discount).max(Decimal::ZERO)).unwrap_or(Price::ZERO);

        CartSnapshotDocument {
            items: self.cart.clone(),
            total,
        }
    }

    fn unread_count(&self) -> u64 {
        self.notifications.iter().filter(|n| !n.is_read).count() as u64
    }

    fn notification_page(&self, skip: usize, limit: usize) -> NotificationPageDocument {
        let notifications: Vec<Notification> = self
            .notifications
            .iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();
        let has_more = skip + notifications.len() < self.notifications.len();

        NotificationPageDocument {
            notifications,
            unread_count: self.unread_count(),
            has_more,
        }
    }

    fn stock_of(&self, product_id: &ProductId) -> ApiResult<u32> {
        self.products
            .get(product_id)
            .map(|product| product.stock)
            .ok_or_else(|| ApiError::not_found("Produit introuvable"))
    }
}

#[derive(Clone)]
struct Backend {
    state: Arc<Mutex<BackendState>>,
}

impl Backend {
    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// FakeBackend
// =============================================================================

/// In-process stand-in for the Greenhouse REST backend.
///
/// The server task stops when the value is dropped.
pub struct FakeBackend {
    backend: Backend,
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind a random local port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let backend = Backend {
            state: Arc::new(Mutex::new(BackendState::default())),
        };

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("Failed to bind fake backend: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("Fake backend has no local address: {e}"));

        let app = router(backend.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            backend,
            addr,
            handle,
        }
    }

    /// Base URL of the server.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client configuration carrying the accepted session token.
    ///
    /// # Panics
    ///
    /// Panics if the server URL does not parse.
    #[must_use]
    pub fn api_config(&self) -> ApiConfig {
        let mut config = self.anonymous_config();
        config.session_token = Some(SecretString::from(SESSION_TOKEN));
        config
    }

    /// Client configuration without a session token.
    ///
    /// # Panics
    ///
    /// Panics if the server URL does not parse.
    #[must_use]
    pub fn anonymous_config(&self) -> ApiConfig {
        ApiConfig::new(&self.url()).unwrap_or_else(|e| panic!("Invalid fake backend URL: {e}"))
    }

    /// Register a product priced in cents with `stock` units available.
    pub fn add_product(&self, id: &str, name: &str, price_cents: u32, stock: u32) {
        self.backend.lock().products.insert(
            ProductId::new(id),
            Product {
                name: name.to_string(),
                price: Price::from_cents(price_cents),
                stock,
            },
        );
    }

    /// Amount subtracted from every cart total.
    pub fn set_discount(&self, discount: Decimal) {
        self.backend.lock().discount = discount;
    }

    /// Insert `count` notifications, newest first, the first `unread` of them unread.
    pub fn seed_notifications(&self, count: usize, unread: usize) {
        let base = Utc
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let mut state = self.backend.lock();
        state.notifications = (0..count)
            .map(|i| Notification {
                id: NotificationId::new(format!("n{i}")),
                user_id: UserId::new(USER_ID),
                category: match i % 3 {
                    0 => NotificationCategory::Alert,
                    1 => NotificationCategory::Order,
                    _ => NotificationCategory::System,
                },
                title: format!("Notification {i}"),
                body: format!("Pot {i}: humidité basse"),
                created_at: base - Duration::minutes(i64::try_from(i).unwrap_or(i64::MAX)),
                is_read: i >= unread,
                link: None,
                priority: if i == 0 { Priority::High } else { Priority::Normal },
            })
            .collect();
    }

    /// Make the next request fail with `status`.
    pub fn fail_next(&self, status: StatusCode) {
        self.backend.lock().fail_next = Some(status);
    }

    /// Add a notification on the server side only, as another service would.
    pub fn push_notification(&self, title: &str) {
        let mut state = self.backend.lock();
        let notification = Notification {
            id: NotificationId::new(uuid::Uuid::new_v4().to_string()),
            user_id: UserId::new(USER_ID),
            category: NotificationCategory::Info,
            title: title.to_string(),
            body: String::new(),
            created_at: Utc::now(),
            is_read: false,
            link: None,
            priority: Priority::Normal,
        };
        state.notifications.insert(0, notification);
    }

    /// Current server-side cart.
    #[must_use]
    pub fn cart(&self) -> Vec<CartEntry> {
        self.backend.lock().cart.clone()
    }

    /// Current server-side notifications.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.backend.lock().notifications.clone()
    }

    /// Requests received so far, as `"METHOD /path?query"`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.backend.lock().requests.clone()
    }

    /// Number of requests whose line starts with `prefix`.
    #[must_use]
    pub fn request_count(&self, prefix: &str) -> usize {
        self.backend
            .lock()
            .requests
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// =============================================================================
// Router
// =============================================================================

fn router(backend: Backend) -> Router {
    Router::new()
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_item))
        .route("/api/cart/items/{id}", put(update_item).delete(remove_item))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", patch(mark_all_read))
        .route("/api/notifications/read", delete(delete_read))
        .route("/api/notifications/{id}/read", patch(mark_read))
        .route("/api/notifications/{id}", delete(delete_notification))
        .layer(middleware::from_fn_with_state(backend.clone(), gatekeeper))
        .with_state(backend)
}

/// Record the request, apply an injected failure, then check the token.
async fn gatekeeper(State(backend): State<Backend>, request: Request, next: Next) -> Response {
    let line = match request.uri().query() {
        Some(query) => format!("{} {}?{query}", request.method(), request.uri().path()),
        None => format!("{} {}", request.method(), request.uri().path()),
    };

    let injected = {
        let mut state = backend.lock();
        state.requests.push(line);
        state.fail_next.take()
    };
    if let Some(status) = injected {
        return ApiError::new(status, "Erreur serveur simulée").into_response();
    }

    if !is_authorized(request.headers()) {
        return ApiError::unauthorized().into_response();
    }

    next.run(request).await
}

fn is_authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        == Some(SESSION_TOKEN)
}

// =============================================================================
// Cart handlers
// =============================================================================

#[derive(Deserialize)]
struct AddItemRequest {
    #[serde(rename = "produitId")]
    product_id: ProductId,
    #[serde(rename = "quantite", default = "one")]
    quantity: i64,
}

#[derive(Deserialize)]
struct UpdateItemRequest {
    #[serde(rename = "quantite")]
    quantity: i64,
}

const fn one() -> i64 {
    1
}

fn parse_quantity(raw: i64) -> ApiResult<Quantity> {
    Quantity::new(raw).map_err(|_| ApiError::bad_request("La quantité doit être au moins 1"))
}

async fn get_cart(State(backend): State<Backend>) -> Json<CartSnapshotDocument> {
    Json(backend.lock().cart_document())
}

async fn add_item(
    State(backend): State<Backend>,
    Json(body): Json<AddItemRequest>,
) -> ApiResult<Json<CartSnapshotDocument>> {
    let quantity = parse_quantity(body.quantity)?;
    let mut state = backend.lock();

    let product = state
        .products
        .get(&body.product_id)
        .cloned()
        .ok_or_else(|| ApiError::not_found("Produit introuvable"))?;

    match state
        .cart
        .iter_mut()
        .find(|entry| entry.product_id == body.product_id)
    {
        Some(entry) => {
            let wanted = entry.quantity.get() + quantity.get();
            if wanted > product.stock {
                return Err(ApiError::bad_request("Stock insuffisant"));
            }
            entry.quantity = parse_quantity(i64::from(wanted))?;
        }
        None => {
            if quantity.get() > product.stock {
                return Err(ApiError::bad_request("Stock insuffisant"));
            }
            state.cart.push(CartEntry {
                id: CartEntryId::new(uuid::Uuid::new_v4().to_string()),
                product_id: body.product_id,
                name: product.name,
                unit_price: product.price,
                quantity,
                image: None,
            });
        }
    }

    Ok(Json(state.cart_document()))
}

async fn update_item(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<UpdateItemRequest>,
) -> ApiResult<Json<CartSnapshotDocument>> {
    let quantity = parse_quantity(body.quantity)?;
    let mut state = backend.lock();

    let product_id = state
        .cart
        .iter()
        .find(|entry| entry.id.as_str() == id)
        .map(|entry| entry.product_id.clone())
        .ok_or_else(|| ApiError::not_found("Article introuvable dans le panier"))?;
    if quantity.get() > state.stock_of(&product_id)? {
        return Err(ApiError::bad_request("Stock insuffisant"));
    }

    if let Some(entry) = state.cart.iter_mut().find(|entry| entry.id.as_str() == id) {
        entry.quantity = quantity;
    }
    Ok(Json(state.cart_document()))
}

async fn remove_item(
    State(backend): State<Backend>,
    Path(id): Path<String>,
) -> ApiResult<Json<CartSnapshotDocument>> {
    let mut state = backend.lock();
    let before = state.cart.len();
    state.cart.retain(|entry| entry.id.as_str() != id);
    if state.cart.len() == before {
        return Err(ApiError::not_found("Article introuvable dans le panier"));
    }
    Ok(Json(state.cart_document()))
}

async fn clear_cart(State(backend): State<Backend>) -> Json<CartSnapshotDocument> {
    let mut state = backend.lock();
    state.cart.clear();
    Json(state.cart_document())
}

// =============================================================================
// Notification handlers
// =============================================================================

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

const fn default_limit() -> usize {
    20
}

fn done(message: &str) -> Json<serde_json::Value> {
    Json(json!({ "message": message }))
}

async fn list_notifications(
    State(backend): State<Backend>,
    Query(page): Query<PageQuery>,
) -> Json<NotificationPageDocument> {
    Json(backend.lock().notification_page(page.skip, page.limit))
}

async fn unread_count(State(backend): State<Backend>) -> Json<UnreadCountDocument> {
    Json(UnreadCountDocument {
        count: backend.lock().unread_count(),
    })
}

async fn mark_read(
    State(backend): State<Backend>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut state = backend.lock();
    let notification = state
        .notifications
        .iter_mut()
        .find(|n| n.id.as_str() == id)
        .ok_or_else(|| ApiError::not_found("Notification introuvable"))?;
    notification.is_read = true;
    Ok(done("Notification marquée comme lue"))
}

async fn mark_all_read(State(backend): State<Backend>) -> Json<serde_json::Value> {
    let mut state = backend.lock();
    for notification in &mut state.notifications {
        notification.is_read = true;
    }
    done("Toutes les notifications ont été marquées comme lues")
}

async fn delete_notification(
    State(backend): State<Backend>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut state = backend.lock();
    let before = state.notifications.len();
    state.notifications.retain(|n| n.id.as_str() != id);
    if state.notifications.len() == before {
        return Err(ApiError::not_found("Notification introuvable"));
    }
    Ok(done("Notification supprimée"))
}

async fn delete_read(State(backend): State<Backend>) -> Json<serde_json::Value> {
    let mut state = backend.lock();
    state.notifications.retain(|n| !n.is_read);
    done("Notifications lues supprimées")
}

//! Integration test support for the Tidewear cart engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tidewear-integration-tests
//! ```
//!
//! No external services are needed: [`MockCartApi`] serves the storefront
//! cart endpoints from an in-process axum server on an ephemeral port.
//!
//! # Test Categories
//!
//! - `cart_sync` - engine scenarios over the HTTP gateway and JSON file cache
//! - `http_gateway` - gateway status mapping and wire handling

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tidewear_cart::remote::types::{
    AddItemBody, UpdateItemBody, WireCart, WireCartItem, WireProduct,
};
use tidewear_core::{CartId, CartLineId, Credential, ProductId, UserId};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

/// Build a catalog product sold in S, M and L.
#[must_use]
pub fn product(id: i32, title: &str, price: Decimal, stock: i64) -> WireProduct {
    WireProduct {
        id: ProductId::new(id),
        title: title.to_string(),
        description: format!("{title} from the summer collection"),
        price,
        category: "tops".to_string(),
        stock,
        images: vec![format!("https://cdn.tidewear.test/{id}.jpg")],
        sizes: vec!["S".to_string(), "M".to_string(), "L".to_string()],
    }
}

// =============================================================================
// Mock Cart API
// =============================================================================

#[derive(Debug, Default)]
struct ApiState {
    products: HashMap<ProductId, WireProduct>,
    users: HashMap<String, UserId>,
    carts: HashMap<UserId, Vec<WireCartItem>>,
    next_item_id: i32,
    delay: Duration,
    forced_status: Option<StatusCode>,
    requests: usize,
}

type Shared = Arc<Mutex<ApiState>>;

/// In-process stand-in for the storefront cart API.
///
/// Mirrors the server's behavior: bearer auth per user, one cart per user,
/// stock checked against the requested quantity only, the whole cart
/// returned after every change, and `{"detail": ...}` error bodies.
pub struct MockCartApi {
    base_url: Url,
    state: Shared,
    server: JoinHandle<()>,
}

impl MockCartApi {
    /// Start serving `catalog` on `127.0.0.1` with an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start(catalog: impl IntoIterator<Item = WireProduct>) -> Self {
        let state: Shared = Arc::new(Mutex::new(ApiState {
            products: catalog.into_iter().map(|p| (p.id, p)).collect(),
            next_item_id: 1,
            ..ApiState::default()
        }));

        let router = Router::new()
            .route("/api/products/{id}", get(get_product))
            .route("/api/cart/", get(get_cart).delete(clear_cart))
            .route("/api/cart/items", axum::routing::post(add_item))
            .route(
                "/api/cart/items/{product_id}",
                put(update_item).delete(remove_item),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock cart API");
        let addr = listener
            .local_addr()
            .expect("Mock cart API has no local address");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let base_url = Url::parse(&format!("http://{addr}/api/"))
            .expect("Mock cart API address is not a valid URL");

        Self {
            base_url,
            state,
            server,
        }
    }

    /// Base URL to hand to the gateway.
    #[must_use]
    pub fn base_url(&self) -> Url {
        self.base_url.clone()
    }

    /// Register a user and return a credential the API accepts.
    pub async fn register(&self, token: &str) -> Credential {
        let mut state = self.state.lock().await;
        let next = i32::try_from(state.users.len())
            .unwrap_or(i32::MAX)
            .saturating_add(1);
        let user_id = UserId::new(next);
        state.users.insert(token.to_string(), user_id);
        state.carts.insert(user_id, Vec::new());
        Credential::new(token)
    }

    /// Put `quantity` of `product_id` in `size` straight into a user's cart.
    pub async fn seed(&self, credential: &Credential, product_id: i32, size: &str, quantity: i64) {
        let mut state = self.state.lock().await;
        let Some(user_id) = state.users.get(credential.expose()).copied() else {
            panic!("seeding a cart for an unregistered user");
        };
        let product = state
            .products
            .get(&ProductId::new(product_id))
            .cloned()
            .expect("seeding a product missing from the catalog");
        let id = state.allocate_item_id();
        state.carts.entry(user_id).or_default().push(WireCartItem {
            id,
            product_id: product.id,
            quantity,
            size: size.to_string(),
            product,
        });
    }

    /// `(product_id, size, quantity)` for each server cart item, in order.
    pub async fn cart_items(&self, credential: &Credential) -> Vec<(i32, String, i64)> {
        let state = self.state.lock().await;
        state
            .users
            .get(credential.expose())
            .and_then(|user_id| state.carts.get(user_id))
            .map(|items| {
                items
                    .iter()
                    .map(|item| (item.product_id.as_i32(), item.size.clone(), item.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Change a product's stock level.
    pub async fn set_stock(&self, product_id: i32, stock: i64) {
        if let Some(product) = self
            .state
            .lock()
            .await
            .products
            .get_mut(&ProductId::new(product_id))
        {
            product.stock = stock;
        }
    }

    /// Delay every response by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = delay;
    }

    /// Answer every request with `status` (or behave normally with `None`).
    pub async fn force_status(&self, status: Option<StatusCode>) {
        self.state.lock().await.forced_status = status;
    }

    /// Requests served so far.
    pub async fn request_count(&self) -> usize {
        self.state.lock().await.requests
    }
}

impl Drop for MockCartApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl ApiState {
    fn allocate_item_id(&mut self) -> CartLineId {
        let id = CartLineId::new(self.next_item_id);
        self.next_item_id += 1;
        id
    }

    fn cart_response(&self, user_id: UserId) -> Response {
        let cart = WireCart {
            id: CartId::new(user_id.as_i32()),
            user_id,
            items: self.carts.get(&user_id).cloned().unwrap_or_default(),
        };
        Json(cart).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
struct SizeQuery {
    size: Option<String>,
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

/// Count the request, apply the configured delay, and short-circuit with a
/// forced status if one is set.
async fn enter(state: &Shared) -> Option<Response> {
    let (delay, forced) = {
        let mut state = state.lock().await;
        state.requests += 1;
        (state.delay, state.forced_status)
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    forced.map(|status| {
        let mut response = detail(status, "Service unavailable");
        if status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("7"));
        }
        response
    })
}

fn authenticate(state: &ApiState, headers: &HeaderMap) -> Result<UserId, Response> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.users.get(token).copied())
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
}

async fn get_product(State(state): State<Shared>, Path(id): Path<i32>) -> Response {
    if let Some(response) = enter(&state).await {
        return response;
    }
    let state = state.lock().await;
    state.products.get(&ProductId::new(id)).map_or_else(
        || detail(StatusCode::NOT_FOUND, "Product not found"),
        |product| Json(product.clone()).into_response(),
    )
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(response) = enter(&state).await {
        return response;
    }
    let state = state.lock().await;
    match authenticate(&state, &headers) {
        Ok(user_id) => state.cart_response(user_id),
        Err(response) => response,
    }
}

async fn add_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<AddItemBody>,
) -> Response {
    if let Some(response) = enter(&state).await {
        return response;
    }
    let mut state = state.lock().await;
    let user_id = match authenticate(&state, &headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let Some(product) = state.products.get(&body.product_id).cloned() else {
        return detail(StatusCode::NOT_FOUND, "Product not found");
    };
    if product.stock < i64::from(body.quantity) {
        return detail(StatusCode::BAD_REQUEST, "Not enough stock");
    }

    let id = state.allocate_item_id();
    let items = state.carts.entry(user_id).or_default();
    if let Some(item) = items
        .iter_mut()
        .find(|item| item.product_id == body.product_id && item.size == body.size)
    {
        item.quantity += i64::from(body.quantity);
    } else {
        items.push(WireCartItem {
            id,
            product_id: body.product_id,
            quantity: i64::from(body.quantity),
            size: body.size,
            product,
        });
    }
    state.cart_response(user_id)
}

async fn update_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(product_id): Path<i32>,
    Query(query): Query<SizeQuery>,
    Json(body): Json<UpdateItemBody>,
) -> Response {
    if let Some(response) = enter(&state).await {
        return response;
    }
    let mut state = state.lock().await;
    let user_id = match authenticate(&state, &headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let size = query.size.unwrap_or_else(|| "M".to_string());
    let product_id = ProductId::new(product_id);
    let items = state.carts.entry(user_id).or_default();
    let Some(position) = items
        .iter()
        .position(|item| item.product_id == product_id && item.size == size)
    else {
        return detail(StatusCode::NOT_FOUND, "Cart or item not found");
    };

    if body.quantity <= 0 {
        items.remove(position);
    } else if let Some(item) = items.get_mut(position) {
        item.quantity = body.quantity;
    }
    state.cart_response(user_id)
}

async fn remove_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(product_id): Path<i32>,
    Query(query): Query<SizeQuery>,
) -> Response {
    if let Some(response) = enter(&state).await {
        return response;
    }
    let mut state = state.lock().await;
    let user_id = match authenticate(&state, &headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let size = query.size.unwrap_or_else(|| "M".to_string());
    let product_id = ProductId::new(product_id);
    state
        .carts
        .entry(user_id)
        .or_default()
        .retain(|item| !(item.product_id == product_id && item.size == size));
    state.cart_response(user_id)
}

async fn clear_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if let Some(response) = enter(&state).await {
        return response;
    }
    let mut state = state.lock().await;
    let user_id = match authenticate(&state, &headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    state.carts.insert(user_id, Vec::new());
    state.cart_response(user_id)
}

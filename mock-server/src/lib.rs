use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};

/// Header a client sets on create so a retried POST is answered with the
/// item from the first attempt instead of creating a second one.
pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Deserialize)]
pub struct UpdateItem {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

/// Server-side storage. Items are keyed by id and ids only grow, so
/// iteration order is creation order. `idempotency` keeps the item each key
/// first created, so a replay is answered the same way after a delete too.
#[derive(Debug)]
pub struct Store {
    items: BTreeMap<i64, Item>,
    next_id: i64,
    idempotency: HashMap<String, Item>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            next_id: 1,
            idempotency: HashMap::new(),
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with(Db::default())
}

/// Build the router over an existing store, so tests can seed or inspect it.
pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route("/items/{id}", put(update_item).delete(delete_item))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!("serving items on {addr}");
    }
    axum::serve(listener, app()).await
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let store = db.read().await;
    Json(store.items.values().cloned().collect())
}

async fn create_item(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateItem>,
) -> (StatusCode, Json<Item>) {
    let key = headers
        .get(IDEMPOTENCY_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut store = db.write().await;
    if let Some(existing) = key.as_ref().and_then(|k| store.idempotency.get(k)) {
        debug!(id = existing.id, "replayed create");
        return (StatusCode::CREATED, Json(existing.clone()));
    }

    let item = Item {
        id: store.next_id,
        title: input.title,
        completed: input.completed,
    };
    store.next_id += 1;
    store.items.insert(item.id, item.clone());
    if let Some(key) = key {
        store.idempotency.insert(key, item.clone());
    }
    debug!(id = item.id, "created item");
    (StatusCode::CREATED, Json(item))
}

async fn update_item(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateItem>,
) -> Result<Json<Item>, StatusCode> {
    let mut store = db.write().await;
    let item = store.items.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(title) = input.title {
        item.title = title;
    }
    if let Some(completed) = input.completed {
        item.completed = completed;
    }
    debug!(id, "updated item");
    Ok(Json(item.clone()))
}

async fn delete_item(
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store
        .items
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

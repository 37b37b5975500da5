//! Simple example with Axum server
//!
//! This example demonstrates:
//! - Loading entity metadata and mapper settings from YAML
//! - Serving an in-memory store behind the `SpecQuery` extractor
//! - Filters, sorting, pagination, count and aggregates from the query string

use axum::{
    Json, Router,
    extract::{FromRef, State},
    routing::get,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use viewton::prelude::*;

const ORDER_METADATA: &str = r#"
name: order
fields:
  - name: id
    type: integer
  - name: customer
    type: text
  - name: status
    type: enum
    variants: [OPEN, SHIPPED, CANCELLED]
  - name: region
    type: text
  - name: quantity
    type: integer
    avg_alias: avg_quantity
  - name: avg_quantity
    type: double
  - name: amount
    type: big_decimal
  - name: created
    type: date
"#;

#[derive(Clone)]
struct AppState {
    mapper: Arc<QueryMapper>,
    orders: InMemoryStore,
    mode: ExecutionMode,
}

impl FromRef<AppState> for Arc<QueryMapper> {
    fn from_ref(state: &AppState) -> Self {
        state.mapper.clone()
    }
}

async fn list_orders(
    State(state): State<AppState>,
    SpecQuery(spec): SpecQuery,
) -> Result<Json<Value>, QueryError> {
    let response = fetch(&state.orders, &spec, state.mode).await?;
    let pagination = response.pagination(&spec);
    Ok(Json(json!({
        "data": response,
        "pagination": pagination,
    })))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("viewton=debug")),
        )
        .init();

    println!("🚀 Viewton Simple Query Example");
    println!("===============================\n");

    // Load configuration
    let config = match std::env::var("VIEWTON_CONFIG") {
        Ok(path) => MapperConfig::from_yaml_file(&path)?,
        Err(_) => MapperConfig::default(),
    };
    let mode = config.execution_mode();
    let mapper = Arc::new(QueryMapper::builder().config(config).build()?);
    println!("✅ Mapper ready ({:?} execution)", mode);

    // Create the store
    let metadata = EntityMetadata::from_yaml_str(ORDER_METADATA)?;
    let orders = InMemoryStore::new(metadata);
    orders.insert_many([
        json!({"id": 1, "customer": "Alice", "status": "OPEN", "region": "north", "quantity": 3, "amount": "19.90", "created": "2024-01-15"}),
        json!({"id": 2, "customer": "bob", "status": "SHIPPED", "region": "south", "quantity": 1, "amount": "5.00", "created": "2024-02-01"}),
        json!({"id": 3, "customer": "Carol", "status": "OPEN", "region": "north", "quantity": 8, "amount": "120.00", "created": "2024-03-10"}),
        json!({"id": 4, "customer": "Dave", "status": "CANCELLED", "region": "east", "quantity": 2, "amount": "42.50", "created": null}),
    ])?;
    println!("✅ Loaded {} orders\n", orders.len());

    let state = AppState {
        mapper,
        orders,
        mode,
    };

    // Build the router
    let app = Router::new()
        .route("/orders", get(list_orders))
        .with_state(state);

    // Start the server
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("🌐 Server running on http://{}", addr);
    println!("\n📚 Try:");
    println!("   curl 'http://{}/orders?status=OPEN&sorting=-amount'", addr);
    println!("   curl 'http://{}/orders?customer=%5Eb%25&count'", addr);
    println!("   curl 'http://{}/orders?created=2024-01-01..2024-02-28'", addr);
    println!("   curl 'http://{}/orders?sum=quantity,amount%5Bregion%5D'", addr);
    println!("   curl 'http://{}/orders?avg=quantity&page=1&page_size=2&count'", addr);
    println!("   curl 'http://{}/orders?created=null'\n", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

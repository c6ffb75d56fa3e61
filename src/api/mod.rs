// ============================================================================
// Order API - JSON over HTTP
// ============================================================================
//
//   POST /orders              {userId, items}  -> 201 Order
//   GET  /orders/{id}                          -> 200 Order | 404
//   PUT  /orders/{id}/status  {status}         -> 200 Order
//   GET  /orders?userId=                       -> 200 {orders}
//
// Errors are `{error, message}` with the status taken from the error kind.
// A dropped connection cancels the in-flight workflow future; nothing is
// scheduled after that point.
//
// The same operations are served over gRPC as `order.OrderService` by
// `grpc::serve_grpc`.
//
// ============================================================================

pub mod grpc;
mod handlers;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};

use crate::domain::order::{OrderQueryService, OrderWorkflow};

pub use handlers::configure;

/// Shared state of the order API.
#[derive(Clone)]
pub struct AppState {
    pub workflow: OrderWorkflow,
    pub queries: OrderQueryService,
}

/// Build the order API server. The caller drives the returned future.
pub fn start_api_server(state: AppState, host: &str, port: u16) -> std::io::Result<Server> {
    tracing::info!("🛒 Starting order API on http://{}:{}", host, port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}

use actix_web::http::StatusCode;
use actix_web::{error, web, HttpRequest, HttpResponse, ResponseError};

use super::AppState;
use crate::domain::order::{CreateOrder, OrderError};
use crate::models::{CreateOrderRequest, ErrorBody, ListOrdersQuery, OrderList, OrderView, UpdateStatusRequest};

/// Register the order routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .service(
            web::resource("/orders")
                .route(web::post().to(create_order))
                .route(web::get().to(list_orders)),
        )
        .route("/orders/{id}", web::get().to(get_order))
        .route("/orders/{id}/status", web::put().to(update_order_status));
}

async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, OrderError> {
    let request = body.into_inner();
    let order = state
        .workflow
        .create_order(CreateOrder::new(request.user_id, request.items))
        .await?;

    Ok(HttpResponse::Created().json(OrderView::from(&order)))
}

async fn get_order(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse, OrderError> {
    let order = state.queries.get_order(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderView::from(&order)))
}

async fn update_order_status(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateStatusRequest>,
) -> Result<HttpResponse, OrderError> {
    let order = state
        .queries
        .update_order_status(path.into_inner(), &body.status)
        .await?;

    Ok(HttpResponse::Ok().json(OrderView::from(&order)))
}

async fn list_orders(
    state: web::Data<AppState>,
    query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, OrderError> {
    let orders = state.queries.list_orders(query.user_id).await?;

    Ok(HttpResponse::Ok().json(OrderList {
        orders: orders.iter().map(OrderView::from).collect(),
    }))
}

// ============================================================================
// Error mapping
// ============================================================================

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::ProductNotFound { .. } | OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::InsufficientStock { .. } => StatusCode::CONFLICT,
            OrderError::CatalogUnavailable { .. } => StatusCode::BAD_GATEWAY,
            OrderError::PersistOutcomeUnknown { .. } => StatusCode::GATEWAY_TIMEOUT,
            OrderError::StockUpdateFailed { .. }
            | OrderError::OrderPersistFailed { .. }
            | OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if !self.is_client_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
            applied: self.applied_decrements().to_vec(),
        })
    }
}

fn bad_request(message: String) -> error::Error {
    let body = ErrorBody {
        error: "validation_error".to_string(),
        message,
        applied: Vec::new(),
    };
    error::InternalError::from_response(body.message.clone(), HttpResponse::BadRequest().json(body)).into()
}

fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> error::Error {
    bad_request(format!("Invalid request body: {}", err))
}

fn query_error(err: error::QueryPayloadError, _req: &HttpRequest) -> error::Error {
    bad_request(format!("Invalid query: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::EventDispatcher;
    use crate::catalog::InMemoryCatalog;
    use crate::config::WorkflowConfig;
    use crate::domain::order::{OrderQueryService, OrderWorkflow};
    use crate::messaging::RecordingPublisher;
    use crate::metrics::Metrics;
    use crate::store::InMemoryOrderRepository;
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn state(catalog: Arc<InMemoryCatalog>) -> AppState {
        let store = Arc::new(InMemoryOrderRepository::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let events = EventDispatcher::spawn(Arc::new(RecordingPublisher::new()), None);

        AppState {
            workflow: OrderWorkflow::new(catalog, store.clone(), events, metrics, WorkflowConfig::default()),
            queries: OrderQueryService::new(store, Duration::from_secs(1)),
        }
    }

    fn stocked(stock: &[(i64, i32)]) -> Arc<InMemoryCatalog> {
        Arc::new(InMemoryCatalog::with_products(
            stock.iter().map(|(id, stock)| InMemoryCatalog::product(*id, *stock)),
        ))
    }

    #[actix_web::test]
    async fn test_create_then_get_order() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(stocked(&[(1, 10)]))))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(json!({"userId": 4, "items": [{"productId": 1, "quantity": 2}]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["status"], "pending");
        assert_eq!(created["userId"], 4);
        assert_eq!(created["items"], json!([{"productId": 1, "quantity": 2}]));

        let uri = format!("/orders/{}", created["id"]);
        let fetched: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(fetched, created);
    }

    #[actix_web::test]
    async fn test_error_status_mapping() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(stocked(&[(1, 3)]))))
                .configure(configure),
        )
        .await;

        let cases = [
            (json!({"userId": 1, "items": []}), StatusCode::BAD_REQUEST, "validation_error"),
            (
                json!({"userId": 1, "items": [{"productId": 1, "quantity": 5}]}),
                StatusCode::CONFLICT,
                "insufficient_stock",
            ),
            (
                json!({"userId": 1, "items": [{"productId": 9, "quantity": 1}]}),
                StatusCode::NOT_FOUND,
                "product_not_found",
            ),
        ];

        for (body, status, code) in cases {
            let req = test::TestRequest::post().uri("/orders").set_json(body).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), status);

            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], code);
        }
    }

    #[actix_web::test]
    async fn test_malformed_body_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(stocked(&[]))))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"userId\": \"abc\"}")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "validation_error");
    }

    #[actix_web::test]
    async fn test_update_status_and_list() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(stocked(&[(1, 10)]))))
                .configure(configure),
        )
        .await;

        for user_id in [1, 2, 1] {
            let req = test::TestRequest::post()
                .uri("/orders")
                .set_json(json!({"userId": user_id, "items": [{"productId": 1, "quantity": 1}]}))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::put()
            .uri("/orders/1/status")
            .set_json(json!({"status": "shipped"}))
            .to_request();
        let updated: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated["status"], "shipped");

        let req = test::TestRequest::put()
            .uri("/orders/1/status")
            .set_json(json!({"status": "lost"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_status");

        let mine: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/orders?userId=1").to_request()).await;
        assert_eq!(mine["orders"].as_array().unwrap().len(), 2);

        let all: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/orders").to_request()).await;
        assert_eq!(all["orders"].as_array().unwrap().len(), 3);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/orders/99").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_persist_failure_reports_applied_decrements() {
        let err = OrderError::OrderPersistFailed {
            source: crate::store::StoreError::Timeout,
            applied: vec![crate::domain::order::AppliedDecrement {
                product_id: 1,
                quantity: 2,
                previous_stock: 10,
            }],
            compensated: false,
        };

        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "order_persist_failed");
        assert_eq!(body["applied"], json!([{"productId": 1, "quantity": 2, "previousStock": 10}]));
    }

    #[actix_web::test]
    async fn test_conflict_body_shows_stock_taken_by_earlier_items() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(stocked(&[(1, 10), (2, 1)]))))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(json!({"userId": 1, "items": [
                {"productId": 1, "quantity": 2},
                {"productId": 2, "quantity": 5}
            ]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "insufficient_stock");
        assert_eq!(body["applied"], json!([{"productId": 1, "quantity": 2, "previousStock": 10}]));
    }

    #[actix_web::test]
    async fn test_unknown_persist_outcome_is_gateway_timeout() {
        let err = OrderError::PersistOutcomeUnknown { applied: vec![] };

        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);

        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "persist_outcome_unknown");
        assert!(body.get("applied").is_none());
    }
}

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::SecondsFormat;
use tonic::codegen::{http, Body, BoxFuture, Service, StdError};
use tonic::server::{NamedService, UnaryService};
use tonic::{Code, Status};

use super::AppState;
use crate::domain::order::{CreateOrder, Order, OrderError, OrderItem};

// ============================================================================
// Order API - gRPC
// ============================================================================
//
// `order.OrderService`, the surface the gateway calls. Messages mirror
// order.proto:
//
//   message OrderItem         { int64 product_id = 1; int32 quantity = 2; }
//   message OrderRequest      { int64 user_id = 1; repeated OrderItem items = 2; }
//   message OrderResponse     { int64 id = 1; int64 user_id = 2; string status = 3;
//                               string created_at = 4; repeated OrderItem items = 5; }
//   message OrderID           { int64 id = 1; }
//   message OrderList         { repeated OrderResponse orders = 1; }
//   message StatusUpdate      { int64 id = 1; string status = 2; }
//   message UserOrdersRequest { int64 user_id = 1; }
//
// Routing is done by hand on the request path, one unary handler per method.
//
// ============================================================================

pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct OrderItem {
        #[prost(int64, tag = "1")]
        pub product_id: i64,
        #[prost(int32, tag = "2")]
        pub quantity: i32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct OrderRequest {
        #[prost(int64, tag = "1")]
        pub user_id: i64,
        #[prost(message, repeated, tag = "2")]
        pub items: Vec<OrderItem>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct OrderResponse {
        #[prost(int64, tag = "1")]
        pub id: i64,
        #[prost(int64, tag = "2")]
        pub user_id: i64,
        #[prost(string, tag = "3")]
        pub status: String,
        #[prost(string, tag = "4")]
        pub created_at: String,
        #[prost(message, repeated, tag = "5")]
        pub items: Vec<OrderItem>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct OrderId {
        #[prost(int64, tag = "1")]
        pub id: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct OrderList {
        #[prost(message, repeated, tag = "1")]
        pub orders: Vec<OrderResponse>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StatusUpdate {
        #[prost(int64, tag = "1")]
        pub id: i64,
        #[prost(string, tag = "2")]
        pub status: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct UserOrdersRequest {
        #[prost(int64, tag = "1")]
        pub user_id: i64,
    }
}

pub const SERVICE_NAME: &str = "order.OrderService";

pub const CREATE_ORDER: &str = "/order.OrderService/CreateOrder";
pub const GET_ORDER: &str = "/order.OrderService/GetOrder";
pub const UPDATE_ORDER_STATUS: &str = "/order.OrderService/UpdateOrderStatus";
pub const LIST_ORDERS: &str = "/order.OrderService/ListOrders";

impl From<&Order> for proto::OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status.to_string(),
            created_at: order.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            items: order
                .items
                .iter()
                .map(|item| proto::OrderItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

impl From<OrderError> for Status {
    fn from(err: OrderError) -> Self {
        let code = match &err {
            OrderError::Validation(_) => Code::InvalidArgument,
            OrderError::ProductNotFound { .. } | OrderError::OrderNotFound(_) => Code::NotFound,
            OrderError::InsufficientStock { .. } => Code::FailedPrecondition,
            OrderError::CatalogUnavailable { .. } => Code::Unavailable,
            // The order may exist; the caller must check before retrying.
            OrderError::PersistOutcomeUnknown { .. } => Code::DeadlineExceeded,
            OrderError::StockUpdateFailed { .. }
            | OrderError::OrderPersistFailed { .. }
            | OrderError::Store(_) => Code::Internal,
        };

        if !err.is_client_error() {
            tracing::error!(code = err.code(), error = %err, "RPC failed");
        }

        Status::new(code, err.to_string())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// The four order RPCs over the shared workflow and query services.
#[derive(Clone)]
pub struct OrderRpc {
    state: AppState,
}

impl OrderRpc {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub async fn create_order(&self, request: proto::OrderRequest) -> Result<proto::OrderResponse, Status> {
        let items = request
            .items
            .iter()
            .map(|item| OrderItem::new(item.product_id, item.quantity))
            .collect();

        let order = self
            .state
            .workflow
            .create_order(CreateOrder::new(request.user_id, items))
            .await?;

        Ok(proto::OrderResponse::from(&order))
    }

    pub async fn get_order(&self, request: proto::OrderId) -> Result<proto::OrderResponse, Status> {
        let order = self.state.queries.get_order(request.id).await?;
        Ok(proto::OrderResponse::from(&order))
    }

    pub async fn update_order_status(
        &self,
        request: proto::StatusUpdate,
    ) -> Result<proto::OrderResponse, Status> {
        let order = self
            .state
            .queries
            .update_order_status(request.id, &request.status)
            .await?;

        Ok(proto::OrderResponse::from(&order))
    }

    /// `user_id` 0 lists every order.
    pub async fn list_orders(&self, request: proto::UserOrdersRequest) -> Result<proto::OrderList, Status> {
        let orders = self.state.queries.list_orders(Some(request.user_id)).await?;

        Ok(proto::OrderList {
            orders: orders.iter().map(proto::OrderResponse::from).collect(),
        })
    }
}

// ============================================================================
// Server
// ============================================================================

type Handler<Req, Resp> = fn(Arc<OrderRpc>, Req) -> BoxFuture<Resp, Status>;

/// One unary method bound to its handler.
struct Method<Req, Resp> {
    rpc: Arc<OrderRpc>,
    handler: Handler<Req, Resp>,
}

impl<Req, Resp> UnaryService<Req> for Method<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    type Response = Resp;
    type Future = BoxFuture<tonic::Response<Resp>, Status>;

    fn call(&mut self, request: tonic::Request<Req>) -> Self::Future {
        let rpc = self.rpc.clone();
        let handler = self.handler;
        Box::pin(async move { handler(rpc, request.into_inner()).await.map(tonic::Response::new) })
    }
}

fn create_order(rpc: Arc<OrderRpc>, req: proto::OrderRequest) -> BoxFuture<proto::OrderResponse, Status> {
    Box::pin(async move { rpc.create_order(req).await })
}

fn get_order(rpc: Arc<OrderRpc>, req: proto::OrderId) -> BoxFuture<proto::OrderResponse, Status> {
    Box::pin(async move { rpc.get_order(req).await })
}

fn update_order_status(rpc: Arc<OrderRpc>, req: proto::StatusUpdate) -> BoxFuture<proto::OrderResponse, Status> {
    Box::pin(async move { rpc.update_order_status(req).await })
}

fn list_orders(rpc: Arc<OrderRpc>, req: proto::UserOrdersRequest) -> BoxFuture<proto::OrderList, Status> {
    Box::pin(async move { rpc.list_orders(req).await })
}

fn serve_unary<Req, Resp, B>(
    rpc: Arc<OrderRpc>,
    handler: Handler<Req, Resp>,
    request: http::Request<B>,
) -> BoxFuture<http::Response<tonic::body::Body>, Infallible>
where
    Req: prost::Message + Default + Send + 'static,
    Resp: prost::Message + Send + 'static,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    Box::pin(async move {
        let codec = tonic_prost::ProstCodec::<Resp, Req>::default();
        let mut grpc = tonic::server::Grpc::new(codec);
        Ok(grpc.unary(Method { rpc, handler }, request).await)
    })
}

/// tower service for `order.OrderService`, ready for
/// `tonic::transport::Server::add_service`.
#[derive(Clone)]
pub struct OrderServiceServer {
    rpc: Arc<OrderRpc>,
}

impl OrderServiceServer {
    pub fn new(rpc: OrderRpc) -> Self {
        Self { rpc: Arc::new(rpc) }
    }
}

impl NamedService for OrderServiceServer {
    const NAME: &'static str = SERVICE_NAME;
}

impl<B> Service<http::Request<B>> for OrderServiceServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        let rpc = self.rpc.clone();

        match request.uri().path() {
            CREATE_ORDER => serve_unary(rpc, create_order as Handler<_, _>, request),
            GET_ORDER => serve_unary(rpc, get_order as Handler<_, _>, request),
            UPDATE_ORDER_STATUS => serve_unary(rpc, update_order_status as Handler<_, _>, request),
            LIST_ORDERS => serve_unary(rpc, list_orders as Handler<_, _>, request),
            path => {
                let status = Status::unimplemented(format!("Unknown method {}", path));
                Box::pin(async move { Ok(status.into_http()) })
            }
        }
    }
}

/// Serve `order.OrderService` on `addr` until ctrl-c.
pub async fn serve_grpc(rpc: OrderRpc, addr: SocketAddr) -> Result<(), tonic::transport::Error> {
    tracing::info!("🛰️ Starting order gRPC service on {}", addr);

    tonic::transport::Server::builder()
        .add_service(OrderServiceServer::new(rpc))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("Order gRPC service stopped");
    Ok(())
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
    use std::time::Duration;
    use tonic::codegen::http::uri::PathAndQuery;
    use tonic::transport::Channel;

    fn rpc(stock: &[(i64, i32)]) -> OrderRpc {
        let catalog = Arc::new(InMemoryCatalog::with_products(
            stock.iter().map(|(id, stock)| InMemoryCatalog::product(*id, *stock)),
        ));
        let store = Arc::new(InMemoryOrderRepository::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let events = EventDispatcher::spawn(Arc::new(RecordingPublisher::new()), None);

        OrderRpc::new(AppState {
            workflow: OrderWorkflow::new(catalog, store.clone(), events, metrics, WorkflowConfig::default()),
            queries: OrderQueryService::new(store, Duration::from_secs(1)),
        })
    }

    fn request(user_id: i64, items: &[(i64, i32)]) -> proto::OrderRequest {
        proto::OrderRequest {
            user_id,
            items: items
                .iter()
                .map(|(product_id, quantity)| proto::OrderItem {
                    product_id: *product_id,
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_create_get_update_list() {
        let rpc = rpc(&[(1, 10)]);

        let created = rpc.create_order(request(4, &[(1, 2)])).await.unwrap();
        assert_eq!(created.user_id, 4);
        assert_eq!(created.status, "pending");
        assert_eq!(created.items, vec![proto::OrderItem { product_id: 1, quantity: 2 }]);

        let fetched = rpc.get_order(proto::OrderId { id: created.id }).await.unwrap();
        assert_eq!(fetched, created);

        let updated = rpc
            .update_order_status(proto::StatusUpdate {
                id: created.id,
                status: "shipped".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(updated.status, "shipped");

        rpc.create_order(request(5, &[(1, 1)])).await.unwrap();
        let mine = rpc.list_orders(proto::UserOrdersRequest { user_id: 4 }).await.unwrap();
        assert_eq!(mine.orders.len(), 1);
        let all = rpc.list_orders(proto::UserOrdersRequest { user_id: 0 }).await.unwrap();
        assert_eq!(all.orders.len(), 2);
    }

    #[tokio::test]
    async fn test_errors_map_to_status_codes() {
        let rpc = rpc(&[(1, 3)]);

        let cases = [
            (request(1, &[]), Code::InvalidArgument),
            (request(1, &[(1, 5)]), Code::FailedPrecondition),
            (request(1, &[(9, 1)]), Code::NotFound),
        ];
        for (req, code) in cases {
            assert_eq!(rpc.create_order(req).await.unwrap_err().code(), code);
        }

        let err = rpc.get_order(proto::OrderId { id: 42 }).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        let err = rpc
            .update_order_status(proto::StatusUpdate { id: 1, status: "lost".to_string() })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[test]
    fn test_server_side_errors_map_to_status_codes() {
        use crate::catalog::CatalogError;
        use crate::store::StoreError;

        let unavailable = OrderError::CatalogUnavailable {
            product_id: 1,
            source: CatalogError::CircuitOpen,
            applied: vec![],
            compensated: false,
        };
        assert_eq!(Status::from(unavailable).code(), Code::Unavailable);

        let persist = OrderError::OrderPersistFailed {
            source: StoreError::Unavailable("down".to_string()),
            applied: vec![],
            compensated: false,
        };
        assert_eq!(Status::from(persist).code(), Code::Internal);

        let unknown = OrderError::PersistOutcomeUnknown { applied: vec![] };
        assert_eq!(Status::from(unknown).code(), Code::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_served_over_the_wire() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
        tokio::spawn(serve_grpc(rpc(&[(1, 10)]), addr));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let channel = Channel::from_shared(format!("http://127.0.0.1:{}", port))
            .unwrap()
            .connect()
            .await
            .unwrap();
        let mut client = tonic::client::Grpc::new(channel);

        client.ready().await.unwrap();
        let created: tonic::Response<proto::OrderResponse> = client
            .unary(
                tonic::Request::new(request(7, &[(1, 3)])),
                PathAndQuery::from_static(CREATE_ORDER),
                tonic_prost::ProstCodec::default(),
            )
            .await
            .unwrap();
        assert_eq!(created.get_ref().user_id, 7);

        client.ready().await.unwrap();
        let missing = client
            .unary::<_, proto::OrderResponse, _>(
                tonic::Request::new(proto::OrderId { id: 99 }),
                PathAndQuery::from_static(GET_ORDER),
                tonic_prost::ProstCodec::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(missing.code(), Code::NotFound);

        client.ready().await.unwrap();
        let unknown = client
            .unary::<_, proto::OrderResponse, _>(
                tonic::Request::new(proto::OrderId { id: 1 }),
                PathAndQuery::from_static("/order.OrderService/DeleteOrder"),
                tonic_prost::ProstCodec::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(unknown.code(), Code::Unimplemented);
    }
}

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};

use super::{CatalogError, Product, ProductCatalog};
use crate::actors::{HealthProbe, HealthStatus};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};

// ============================================================================
// gRPC Inventory Client
// ============================================================================
//
// Client for `inventory.InventoryService`. Only the two RPCs the order
// workflow needs are bound. Messages mirror inventory.proto:
//
//   message ProductID { int64 id = 1; }
//   message Product   { int64 id = 1; string name = 2; string category = 3;
//                       int32 stock = 4; double price = 5; }
//
// ============================================================================

pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ProductId {
        #[prost(int64, tag = "1")]
        pub id: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Product {
        #[prost(int64, tag = "1")]
        pub id: i64,
        #[prost(string, tag = "2")]
        pub name: String,
        #[prost(string, tag = "3")]
        pub category: String,
        #[prost(int32, tag = "4")]
        pub stock: i32,
        #[prost(double, tag = "5")]
        pub price: f64,
    }
}

impl From<proto::Product> for Product {
    fn from(p: proto::Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            category: p.category,
            stock: p.stock,
            price: p.price,
        }
    }
}

impl From<&Product> for proto::Product {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            category: p.category.clone(),
            stock: p.stock,
            price: p.price,
        }
    }
}

const GET_PRODUCT: &str = "/inventory.InventoryService/GetProduct";
const UPDATE_PRODUCT: &str = "/inventory.InventoryService/UpdateProduct";

/// Thin unary client over a tonic channel. Cheap to clone.
///
/// Every call, including waiting for the channel to become ready, is bounded
/// by `request_timeout` and ends in `DEADLINE_EXCEEDED` when it runs out.
#[derive(Clone, Debug)]
pub struct InventoryClient {
    inner: tonic::client::Grpc<Channel>,
    request_timeout: Duration,
}

impl InventoryClient {
    pub fn new(channel: Channel, request_timeout: Duration) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
            request_timeout,
        }
    }

    pub async fn get_product(&mut self, id: i64) -> Result<proto::Product, tonic::Status> {
        self.unary(GET_PRODUCT, proto::ProductId { id }).await
    }

    pub async fn update_product(
        &mut self,
        product: proto::Product,
    ) -> Result<proto::Product, tonic::Status> {
        self.unary(UPDATE_PRODUCT, product).await
    }

    async fn unary<Req, Resp>(&mut self, path: &'static str, message: Req) -> Result<Resp, tonic::Status>
    where
        Req: ::prost::Message + Send + Sync + 'static,
        Resp: ::prost::Message + Default + Send + Sync + 'static,
    {
        let deadline = self.request_timeout;
        match tokio::time::timeout(deadline, self.call(path, message)).await {
            Ok(result) => result,
            Err(_) => Err(tonic::Status::deadline_exceeded(format!(
                "{} took longer than {}ms",
                path,
                deadline.as_millis()
            ))),
        }
    }

    async fn call<Req, Resp>(&mut self, path: &'static str, message: Req) -> Result<Resp, tonic::Status>
    where
        Req: ::prost::Message + Send + Sync + 'static,
        Resp: ::prost::Message + Default + Send + Sync + 'static,
    {
        self.inner.ready().await.map_err(|e| {
            tonic::Status::unavailable(format!("Inventory service not ready: {}", e))
        })?;

        let codec = tonic_prost::ProstCodec::default();
        let response = self
            .inner
            .unary(tonic::Request::new(message), PathAndQuery::from_static(path), codec)
            .await?;

        Ok(response.into_inner())
    }
}

/// `ProductCatalog` backed by the inventory gRPC service.
pub struct GrpcCatalog {
    client: InventoryClient,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Arc<Metrics>>,
}

impl GrpcCatalog {
    /// Build a lazily-connected catalog. The first RPC opens the connection,
    /// so the order service starts even while inventory is down.
    ///
    /// `request_timeout` must be shorter than the workflow's catalog timeout:
    /// a call cut off from outside never reaches the circuit breaker.
    pub fn connect_lazy(
        url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let endpoint = Endpoint::from_shared(url.to_string())
            .map_err(|e| CatalogError::Remote(format!("Invalid inventory url {}: {}", url, e)))?
            .connect_timeout(connect_timeout)
            .timeout(request_timeout);

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            timeout: Duration::from_secs(15),
            success_threshold: 2,
        };

        Ok(Self {
            client: InventoryClient::new(endpoint.connect_lazy(), request_timeout),
            circuit_breaker: CircuitBreaker::new("inventory", cb_config),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.circuit_breaker = self.circuit_breaker.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    pub async fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.get_state().await
    }

    fn observe(&self, operation: &str, started: std::time::Instant) {
        if let Some(ref metrics) = self.metrics {
            metrics.record_catalog_call(operation, started.elapsed().as_secs_f64());
        }
    }
}

fn map_breaker_error(err: CircuitBreakerError<tonic::Status>) -> CatalogError {
    match err {
        CircuitBreakerError::CircuitOpen => CatalogError::CircuitOpen,
        // The channel's own timeout surfaces as CANCELLED.
        CircuitBreakerError::OperationFailed(status)
            if matches!(status.code(), tonic::Code::DeadlineExceeded | tonic::Code::Cancelled) =>
        {
            CatalogError::Timeout
        }
        CircuitBreakerError::OperationFailed(status) => {
            CatalogError::Remote(format!("{:?}: {}", status.code(), status.message()))
        }
    }
}

#[async_trait]
impl ProductCatalog for GrpcCatalog {
    async fn get_product(&self, id: i64) -> Result<Product, CatalogError> {
        let started = std::time::Instant::now();
        let mut client = self.client.clone();

        // NOT_FOUND is an answer, not an outage: keep it out of the breaker.
        let result = self
            .circuit_breaker
            .call(async move {
                match client.get_product(id).await {
                    Ok(product) => Ok(Some(product)),
                    Err(status) if status.code() == tonic::Code::NotFound => Ok(None),
                    Err(status) => Err(status),
                }
            })
            .await;
        self.observe("get_product", started);

        match result {
            Ok(Some(product)) => {
                tracing::debug!(product_id = id, stock = product.stock, "Fetched product from inventory");
                Ok(product.into())
            }
            Ok(None) => Err(CatalogError::NotFound(id)),
            Err(e) => {
                let err = map_breaker_error(e);
                tracing::warn!(product_id = id, error = %err, "Inventory GetProduct failed");
                Err(err)
            }
        }
    }

    async fn update_product(&self, product: &Product) -> Result<Product, CatalogError> {
        let started = std::time::Instant::now();
        let mut client = self.client.clone();
        let request = proto::Product::from(product);
        let id = product.id;

        let result = self
            .circuit_breaker
            .call(async move {
                match client.update_product(request).await {
                    Ok(product) => Ok(Some(product)),
                    Err(status) if status.code() == tonic::Code::NotFound => Ok(None),
                    Err(status) => Err(status),
                }
            })
            .await;
        self.observe("update_product", started);

        match result {
            Ok(Some(updated)) => {
                tracing::debug!(product_id = id, stock = updated.stock, "Updated product in inventory");
                Ok(updated.into())
            }
            Ok(None) => Err(CatalogError::NotFound(id)),
            Err(e) => {
                let err = map_breaker_error(e);
                tracing::warn!(product_id = id, error = %err, "Inventory UpdateProduct failed");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl HealthProbe for GrpcCatalog {
    fn component(&self) -> &'static str {
        "inventory"
    }

    async fn probe(&self) -> HealthStatus {
        HealthStatus::from_circuit(self.circuit_state().await)
    }
}

use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;

use crate::actors::EventDispatcher;
use crate::catalog::{CatalogError, Product, ProductCatalog};
use crate::config::{ReservationMode, WorkflowConfig};
use crate::metrics::Metrics;
use crate::store::{OrderRepository, StoreError};

use super::aggregate::{NewOrder, Order};
use super::commands::CreateOrder;
use super::errors::{AppliedDecrement, OrderError};
use super::events::OrderEventEnvelope;
use super::value_objects::OrderItem;

// ============================================================================
// Order Workflow
// ============================================================================
//
// Orchestrates: Validate → (GetProduct → check → UpdateProduct)* → Persist → Publish
//
// - Items are processed strictly in the order given, one remote call at a time
// - The first failing item aborts the run; later items are never touched
// - Stock taken from the catalog is NOT part of the order transaction. On
//   abort it stays taken unless `compensate_on_failure` is set, and every
//   server-side error reports what was left applied
// - A store call that times out may still have committed. Its outcome is
//   reported as unknown and stock is never restored for it
// - The order-created event is handed to the dispatcher after commit and
//   never awaited; a lost event does not fail the order
//
// With `ReservationMode::CheckThenAct` two concurrent orders for the same
// product can both pass the stock check. `ReservationMode::Conditional`
// delegates the check to the catalog instead.
//
// ============================================================================

/// Why a run stopped, before stock reconciliation is known.
#[derive(Debug)]
enum Abort {
    ProductNotFound(i64),
    InsufficientStock {
        product_id: i64,
        requested: i32,
        available: i32,
    },
    CatalogUnavailable {
        product_id: i64,
        source: CatalogError,
    },
    StockUpdateFailed {
        product_id: i64,
        source: CatalogError,
    },
    PersistFailed(StoreError),
    /// The store call timed out; the commit may have landed.
    PersistOutcomeUnknown,
}

impl Abort {
    fn is_client_error(&self) -> bool {
        matches!(self, Abort::ProductNotFound(_) | Abort::InsufficientStock { .. })
    }

    fn is_outcome_unknown(&self) -> bool {
        matches!(self, Abort::PersistOutcomeUnknown)
    }

    fn into_error(self, applied: Vec<AppliedDecrement>, compensated: bool) -> OrderError {
        match self {
            Abort::ProductNotFound(product_id) => OrderError::ProductNotFound {
                product_id,
                applied,
                compensated,
            },
            Abort::InsufficientStock {
                product_id,
                requested,
                available,
            } => OrderError::InsufficientStock {
                product_id,
                requested,
                available,
                applied,
                compensated,
            },
            Abort::CatalogUnavailable { product_id, source } => OrderError::CatalogUnavailable {
                product_id,
                source,
                applied,
                compensated,
            },
            Abort::StockUpdateFailed { product_id, source } => OrderError::StockUpdateFailed {
                product_id,
                source,
                applied,
                compensated,
            },
            Abort::PersistFailed(source) => OrderError::OrderPersistFailed {
                source,
                applied,
                compensated,
            },
            Abort::PersistOutcomeUnknown => OrderError::PersistOutcomeUnknown { applied },
        }
    }
}

#[derive(Clone)]
pub struct OrderWorkflow {
    catalog: Arc<dyn ProductCatalog>,
    store: Arc<dyn OrderRepository>,
    events: EventDispatcher,
    metrics: Arc<Metrics>,
    config: WorkflowConfig,
}

impl OrderWorkflow {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        store: Arc<dyn OrderRepository>,
        events: EventDispatcher,
        metrics: Arc<Metrics>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            events,
            metrics,
            config,
        }
    }

    /// Create an order, taking stock for every item before committing it.
    pub async fn create_order(&self, command: CreateOrder) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = self.run(command).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(_) => self.metrics.record_order_created(elapsed),
            Err(e) => {
                tracing::info!(reason = e.code(), error = %e, "Order creation aborted");
                self.metrics.record_order_failure(e.code(), elapsed);
            }
        }

        result
    }

    async fn run(&self, command: CreateOrder) -> Result<Order, OrderError> {
        command.validate()?;

        tracing::debug!(
            user_id = command.user_id,
            items = command.items.len(),
            mode = ?self.config.reservation,
            "Processing order"
        );

        let mut applied = Vec::with_capacity(command.items.len());
        for item in &command.items {
            let reserved = match self.config.reservation {
                ReservationMode::CheckThenAct => self.check_then_decrement(item).await,
                ReservationMode::Conditional => self.conditional_decrement(item).await,
            };

            match reserved {
                Ok(decrement) => applied.push(decrement),
                Err(abort) => return Err(self.abort(abort, applied).await),
            }
        }

        let new_order = NewOrder::pending(command.user_id, command.items);
        let order = match timeout(self.config.store_timeout, self.store.create(new_order)).await {
            Ok(Ok(order)) => order,
            Ok(Err(e)) => return Err(self.abort(Abort::PersistFailed(e), applied).await),
            Err(_) => return Err(self.abort(Abort::PersistOutcomeUnknown, applied).await),
        };

        tracing::info!(
            order_id = order.id,
            user_id = order.user_id,
            items = order.items.len(),
            "✅ Order created"
        );

        self.publish_created(&order);

        Ok(order)
    }

    // ========================================================================
    // Stock reservation
    // ========================================================================

    async fn check_then_decrement(&self, item: &OrderItem) -> Result<AppliedDecrement, Abort> {
        let product_id = item.product_id;

        let product = match timeout(self.config.catalog_timeout, self.catalog.get_product(product_id)).await {
            Ok(Ok(product)) => product,
            Ok(Err(CatalogError::NotFound(_))) => return Err(Abort::ProductNotFound(product_id)),
            Ok(Err(source)) => return Err(Abort::CatalogUnavailable { product_id, source }),
            Err(_) => {
                return Err(Abort::CatalogUnavailable {
                    product_id,
                    source: CatalogError::Timeout,
                })
            }
        };

        if item.quantity > product.stock {
            return Err(Abort::InsufficientStock {
                product_id,
                requested: item.quantity,
                available: product.stock,
            });
        }

        let previous_stock = product.stock;
        let updated = Product {
            stock: previous_stock - item.quantity,
            ..product
        };

        match timeout(self.config.catalog_timeout, self.catalog.update_product(&updated)).await {
            Ok(Ok(_)) => {}
            Ok(Err(source)) => return Err(Abort::StockUpdateFailed { product_id, source }),
            Err(_) => {
                tracing::warn!(product_id, "Stock update timed out, outcome on the catalog is unknown");
                return Err(Abort::StockUpdateFailed {
                    product_id,
                    source: CatalogError::Timeout,
                });
            }
        }

        tracing::debug!(product_id, previous_stock, remaining = updated.stock, "Stock decremented");

        Ok(AppliedDecrement {
            product_id,
            quantity: item.quantity,
            previous_stock,
        })
    }

    async fn conditional_decrement(&self, item: &OrderItem) -> Result<AppliedDecrement, Abort> {
        let product_id = item.product_id;
        let call = self.catalog.decrement_if_available(product_id, item.quantity);

        match timeout(self.config.catalog_timeout, call).await {
            Ok(Ok(decrement)) => {
                tracing::debug!(
                    product_id,
                    previous_stock = decrement.previous_stock,
                    remaining = decrement.remaining_stock,
                    "Stock decremented"
                );
                Ok(AppliedDecrement {
                    product_id,
                    quantity: item.quantity,
                    previous_stock: decrement.previous_stock,
                })
            }
            Ok(Err(CatalogError::NotFound(_))) => Err(Abort::ProductNotFound(product_id)),
            Ok(Err(CatalogError::InsufficientStock {
                product_id,
                requested,
                available,
            })) => Err(Abort::InsufficientStock {
                product_id,
                requested,
                available,
            }),
            Ok(Err(CatalogError::CircuitOpen)) => Err(Abort::CatalogUnavailable {
                product_id,
                source: CatalogError::CircuitOpen,
            }),
            Ok(Err(source)) => Err(Abort::StockUpdateFailed { product_id, source }),
            Err(_) => {
                tracing::warn!(product_id, "Stock decrement timed out, outcome on the catalog is unknown");
                Err(Abort::StockUpdateFailed {
                    product_id,
                    source: CatalogError::Timeout,
                })
            }
        }
    }

    // ========================================================================
    // Abort handling
    // ========================================================================

    async fn abort(&self, abort: Abort, applied: Vec<AppliedDecrement>) -> OrderError {
        // Restocking an order that did commit would leave it without stock.
        if abort.is_outcome_unknown() {
            tracing::error!(
                applied = ?applied,
                timeout_ms = self.config.store_timeout.as_millis() as u64,
                "Order persist timed out, commit outcome unknown, stock left as is"
            );
            return abort.into_error(applied, false);
        }

        if applied.is_empty() {
            return abort.into_error(applied, false);
        }

        let compensated = if self.config.compensate_on_failure {
            self.compensate(&applied).await
        } else {
            if abort.is_client_error() {
                tracing::warn!(
                    abort = ?abort,
                    applied = ?applied,
                    "Order aborted with stock already decremented, not restored"
                );
            } else {
                tracing::error!(
                    abort = ?abort,
                    applied = ?applied,
                    "Order aborted with stock already decremented, not restored"
                );
            }
            self.metrics.record_stock_divergence(applied.len());
            false
        };

        abort.into_error(applied, compensated)
    }

    /// Give back every applied decrement, latest first. Returns true when all
    /// restocks succeeded.
    async fn compensate(&self, applied: &[AppliedDecrement]) -> bool {
        let mut failed = 0;

        for decrement in applied.iter().rev() {
            let call = self.catalog.restock(decrement.product_id, decrement.quantity);
            let outcome = match timeout(self.config.catalog_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(CatalogError::Timeout),
            };

            match outcome {
                Ok(product) => {
                    tracing::info!(
                        product_id = decrement.product_id,
                        quantity = decrement.quantity,
                        stock = product.stock,
                        "↩️ Stock restored"
                    );
                    self.metrics.record_compensation(true);
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        product_id = decrement.product_id,
                        quantity = decrement.quantity,
                        error = %e,
                        "Failed to restore stock, manual reconciliation needed"
                    );
                    self.metrics.record_compensation(false);
                }
            }
        }

        if failed > 0 {
            self.metrics.record_stock_divergence(failed);
        }
        failed == 0
    }

    // ========================================================================
    // Publication
    // ========================================================================

    fn publish_created(&self, order: &Order) {
        let subject = self.config.event_subject.as_str();
        let envelope = OrderEventEnvelope::order_created(order);

        match envelope.to_bytes() {
            Ok(payload) => self.events.dispatch(subject, &envelope.key(), payload),
            Err(e) => {
                tracing::error!(order_id = order.id, error = %e, "Failed to serialize order event");
                self.metrics.record_event_failed(subject, "serialization");
            }
        }
    }
}

use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use kameo::actor::ActorRef;
use prometheus::{Encoder, Registry, TextEncoder};

use crate::actors::{GetSystemHealth, HealthMonitorActor};

/// Shared state of the metrics/health server.
#[derive(Clone)]
pub struct MetricsState {
    pub registry: Registry,
    pub health_monitor: Option<ActorRef<HealthMonitorActor>>,
}

/// Build the metrics HTTP server. The caller drives the returned future.
pub fn start_metrics_server(state: MetricsState, host: &str, port: u16) -> std::io::Result<Server> {
    tracing::info!("📊 Starting metrics server on http://{}:{}/metrics", host, port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/metrics", web::get().to(metrics_handler))
            .route("/health", web::get().to(health_handler))
    })
    .workers(1)
    .bind((host, port))?
    .run();

    Ok(server)
}

async fn metrics_handler(state: web::Data<MetricsState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

async fn health_handler(state: web::Data<MetricsState>) -> impl Responder {
    let Some(ref monitor) = state.health_monitor else {
        return HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "service": "order-service"
        }));
    };

    match monitor.ask(GetSystemHealth).await {
        Ok(health) => {
            let body = health.to_json();
            if health.overall_status.is_unhealthy() {
                HttpResponse::ServiceUnavailable().json(body)
            } else {
                HttpResponse::Ok().json(body)
            }
        }
        Err(e) => {
            tracing::error!(error = ?e, "Failed to query health monitor");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unknown",
                "service": "order-service"
            }))
        }
    }
}

use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};

use crate::consumer::ReadinessGate;
use crate::domain::order::Order;
use crate::service::{OrderService, OrderServiceError};

// ============================================================================
// HTTP Shell
// ============================================================================
//
// Thin translation from service outcomes to status codes:
//   add_order -> 201 Created | 400 InvalidInput | 409 AlreadyExists | 500
//   get_order -> 200         | 404 NotFound     | 500
//
// ============================================================================

pub async fn start_api_server(
    service: Arc<OrderService>,
    gate: Arc<ReadinessGate>,
    port: u16,
) -> std::io::Result<()> {
    tracing::info!(port, "starting api server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(service.clone()))
            .app_data(web::Data::new(gate.clone()))
            .route("/order", web::post().to(add_order))
            .route("/order/{uid}", web::get().to(get_order))
            .route("/health", web::get().to(health))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

async fn add_order(
    service: web::Data<Arc<OrderService>>,
    order: web::Json<Order>,
) -> impl Responder {
    match service.add_order(&order).await {
        Ok(()) => HttpResponse::Created().json(serde_json::json!({"status": "created"})),
        Err(err @ OrderServiceError::InvalidInput(_)) => {
            HttpResponse::BadRequest().json(error_body(&err))
        }
        Err(err @ OrderServiceError::AlreadyExists(_)) => {
            HttpResponse::Conflict().json(error_body(&err))
        }
        Err(err) => {
            tracing::error!(error = %err, "add order failed");
            HttpResponse::InternalServerError().json(error_body(&err))
        }
    }
}

async fn get_order(service: web::Data<Arc<OrderService>>, uid: web::Path<String>) -> impl Responder {
    match service.get_order(uid.as_str()).await {
        Ok(order) => HttpResponse::Ok().json(order),
        Err(err @ OrderServiceError::NotFound(_)) => HttpResponse::NotFound().json(error_body(&err)),
        Err(err) => {
            tracing::error!(error = %err, "get order failed");
            HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": "internal error"}))
        }
    }
}

async fn health(gate: web::Data<Arc<ReadinessGate>>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "consumer_ready": gate.is_open(),
    }))
}

fn error_body(err: &OrderServiceError) -> serde_json::Value {
    serde_json::json!({"error": err.to_string()})
}

use erasure_common::db::DbAsyncPool;
use erasure_common::registry::REGISTRY_VERSION;

use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::middleware::CronAuthorized;

pub async fn heartbeat() -> impl Responder {
    HttpResponse::Ok()
}

pub async fn health(
    db_async_pool: web::Data<DbAsyncPool>,
    _auth: CronAuthorized,
) -> impl Responder {
    let async_pool_state = db_async_pool.state();
    let resp_body = json!({
        "db_async_pool_state": {
            "connections": async_pool_state.connections,
            "idle_connections": async_pool_state.idle_connections
        },
        "registry_version": REGISTRY_VERSION,
    });

    HttpResponse::Ok().json(resp_body)
}

use actix_web::{error, web, HttpResponse};

use super::handlers;

/// Reports malformed JSON bodies with the same shape as other client errors
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let body = serde_json::json!({ "error": format!("Invalid request body: {}", err) });
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    })
}

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(
        web::scope("/api/v1")
            .route("/chain", web::get().to(handlers::get_chain))
            .route("/mine", web::get().to(handlers::mine_block))
            .route("/transactions/new", web::post().to(handlers::new_transaction))
            .route("/transactions/pending", web::get().to(handlers::get_pending_transactions))
            .route("/validate", web::get().to(handlers::validate_chain))
            .route("/nodes/register", web::post().to(handlers::register_nodes))
            .route("/nodes/resolve", web::get().to(handlers::resolve_conflicts)),
    );
}

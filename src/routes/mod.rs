// Route exports
pub mod analyze;
pub mod errors;

pub use analyze::{AppState, IMAGE_FIELD, SCHEMA_HEADER};
pub use errors::{AnalyzeError, AnalyzeFailure};

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(analyze::configure);
}

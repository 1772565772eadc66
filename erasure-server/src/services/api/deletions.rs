use actix_web::web::*;

use crate::handlers::deletions;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        resource("/cron/process-deletions")
            .route(get().to(deletions::process_deletions))
            .route(post().to(deletions::process_deletions)),
    );
}

use erasure_common::jobs::{BatchSummary, ProcessDeletionsJob};

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::handlers::error::HttpErrorResponse;
use crate::middleware::CronAuthorized;

#[derive(Serialize)]
struct ProcessDeletionsResponse {
    success: bool,
    #[serde(flatten)]
    summary: BatchSummary,
}

pub async fn process_deletions(
    job: web::Data<ProcessDeletionsJob>,
    _auth: CronAuthorized,
) -> Result<HttpResponse, HttpErrorResponse> {
    let summary = match job.execute().await {
        Ok(s) => s,
        Err(e) => {
            log::error!("{e}");
            return Err(HttpErrorResponse::InternalError(String::from(
                "Failed to process deletions",
            )));
        }
    };

    Ok(HttpResponse::Ok().json(ProcessDeletionsResponse {
        success: true,
        summary,
    }))
}

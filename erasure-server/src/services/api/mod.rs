use actix_web::web::*;

mod deletions;
mod health;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/api")
            .configure(deletions::configure)
            .configure(health::configure),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use erasure_common::billing::providers::MockBillingProvider;
    use erasure_common::email::senders::MockSender;
    use erasure_common::email::DeletionNotifier;
    use erasure_common::erasure::ErasurePlan;
    use erasure_common::jobs::ProcessDeletionsJob;
    use erasure_common::registry::ClassificationRegistry;
    use erasure_common::testing::MemoryStore;

    use actix_web::http::{header, StatusCode};
    use actix_web::test::{self, TestRequest};
    use actix_web::web::Data;
    use actix_web::App;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use crate::middleware::CronSecret;

    #[actix_web::test]
    async fn test_routes() {
        let store = Arc::new(MemoryStore::new());
        store.insert_user("user-a");
        store.add_request("user-a", SystemTime::now() - Duration::from_secs(1));

        let registry = ClassificationRegistry::standard().unwrap();
        let job = ProcessDeletionsJob::new(
            store.clone(),
            Arc::new(MockBillingProvider::new()),
            DeletionNotifier::new(
                Arc::new(MockSender::new()),
                "accounts@erasure.test".parse().unwrap(),
                "accounts@erasure.test".parse().unwrap(),
            ),
            Arc::new(ErasurePlan::from_registry(&registry)),
            Duration::from_secs(900),
            1,
        );

        let app = test::init_service(
            App::new()
                .app_data(Data::new(job))
                .app_data(Data::new(CronSecret::new("s3cret")))
                .configure(configure),
        )
        .await;

        let req = TestRequest::get().uri("/api/heartbeat").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = TestRequest::get()
            .uri("/api/cron/process-deletions")
            .insert_header((header::AUTHORIZATION, "Bearer s3cret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(store.count_where("user", "id", "user-a"), 0);

        let req = TestRequest::post()
            .uri("/api/cron/process-deletions")
            .insert_header((header::AUTHORIZATION, "Bearer s3cret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp_body = test::read_body(resp).await;
        let resp_json: serde_json::Value = serde_json::from_slice(&resp_body).unwrap();
        assert_eq!(resp_json["processed"], 0);

        let req = TestRequest::delete()
            .uri("/api/cron/process-deletions")
            .insert_header((header::AUTHORIZATION, "Bearer s3cret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

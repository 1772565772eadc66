use erasure_common::billing::providers::{MockBillingProvider, StripeBillingProvider};
use erasure_common::billing::BillingProvider;
use erasure_common::db::schema_catalog;
use erasure_common::db::store::PgErasureStore;
use erasure_common::db::{create_db_async_pool, DbAsyncPool};
use erasure_common::email::senders::{MockSender, SmtpSender};
use erasure_common::email::{DeletionNotifier, SendEmail};
use erasure_common::erasure::ErasurePlan;
use erasure_common::jobs::ProcessDeletionsJob;
use erasure_common::registry::{ClassificationRegistry, REGISTRY_VERSION};

use actix_web::web::Data;
use actix_web::{App, HttpServer};
use flexi_logger::{
    Age, Cleanup, Criterion, Duplicate, FileSpec, LogSpecification, Logger, Naming, WriteMode,
};
use std::sync::Arc;

mod env;
mod handlers;
mod middleware;
mod services;

use middleware::CronSecret;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let mut port = 9000u16;

    let mut args = std::env::args();

    // Eat the first argument, which is the relative path to the executable
    args.next();

    while let Some(arg) = args.next() {
        match arg.to_lowercase().as_str() {
            "--port" => {
                let port_str = {
                    let next_arg = args.next();

                    match next_arg {
                        Some(s) => s,
                        None => {
                            eprintln!("ERROR: --port option specified but no port was given");
                            std::process::exit(1);
                        }
                    }
                };

                port = {
                    let port_result = port_str.parse::<u16>();

                    match port_result {
                        Ok(p) => p,
                        Err(_) => {
                            eprintln!("ERROR: Incorrect format for port. Integer expected");
                            std::process::exit(1);
                        }
                    }
                };

                continue;
            }
            a => {
                eprintln!("ERROR: Invalid argument: {}", &a);
                std::process::exit(1);
            }
        }
    }

    let base_addr = format!("127.0.0.1:{}", &port);

    let log_spec = LogSpecification::parse(&env::CONF.log_level).unwrap_or_else(|_| {
        eprintln!(
            "WARNING: Invalid log level '{}'. Defaulting to info",
            env::CONF.log_level
        );
        LogSpecification::info()
    });

    let _logger = Logger::with(log_spec)
        .log_to_file(FileSpec::default().directory("./logs"))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogAndCompressedFiles(60, 365),
        )
        .cleanup_in_background_thread(true)
        .duplicate_to_stdout(Duplicate::All)
        .write_mode(WriteMode::Async)
        .format(|writer, now, record| {
            write!(
                writer,
                "{:5} | {} | {}:{} | {}",
                record.level(),
                now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                record.module_path().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .use_utc()
        .start()
        .expect("Failed to start logger");

    let actix_workers = env::CONF.actix_worker_count;

    // To prevent resource starvation, max connections must be at least as large as the number of
    // actix workers
    let db_max_connections = if actix_workers > env::CONF.db_max_connections as usize {
        actix_workers as u32
    } else {
        env::CONF.db_max_connections
    };

    log::info!("Connecting to database...");

    let db_async_pool = create_db_async_pool(
        &env::CONF.database_uri(),
        db_max_connections,
        env::CONF.db_idle_timeout,
    )
    .await;

    log::info!("Successfully connected to database");

    let registry = match ClassificationRegistry::standard() {
        Ok(r) => r,
        Err(e) => {
            log::error!("Classification registry is invalid: {e}");
            std::process::exit(1);
        }
    };

    if env::CONF.schema_check_enabled {
        check_schema(&registry, &db_async_pool).await;
    } else {
        log::warn!("Schema check is disabled. Unclassified tables will not be detected");
    }

    let plan = ErasurePlan::from_registry(&registry);
    log::info!(
        "Loaded classification registry v{} ({} erasure operations)",
        REGISTRY_VERSION,
        plan.len()
    );

    let billing_provider: Arc<dyn BillingProvider> = if env::CONF.billing_enabled {
        match StripeBillingProvider::new(
            &env::CONF.stripe_secret_key,
            &env::CONF.stripe_api_base,
            env::CONF.billing_timeout,
        ) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                log::error!("Failed to create billing client: {e}");
                std::process::exit(1);
            }
        }
    } else {
        Arc::new(MockBillingProvider::new())
    };

    let email_sender: Arc<dyn SendEmail> = if env::CONF.email_enabled {
        log::info!("Connecting to SMTP relay...");

        let smtp_sender = match SmtpSender::with_credentials(
            &env::CONF.smtp_username,
            &env::CONF.smtp_password,
            &env::CONF.smtp_address,
            env::CONF.max_smtp_connections,
            env::CONF.smtp_idle_timeout,
        ) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to create SMTP client: {e}");
                std::process::exit(1);
            }
        };

        match smtp_sender.test_connection().await {
            Ok(true) => (),
            Ok(false) => {
                log::error!("Failed to connect to SMTP relay");
                std::process::exit(1);
            }
            Err(e) => {
                log::error!("Failed to connect to SMTP relay: {e}");
                std::process::exit(1);
            }
        }

        log::info!("Successfully connected to SMTP relay");
        Arc::new(smtp_sender)
    } else {
        Arc::new(MockSender::new())
    };

    for warning in disabled_integration_warnings(env::CONF.billing_enabled, env::CONF.email_enabled)
    {
        log::warn!("{warning}");
    }

    let notifier = DeletionNotifier::new(
        email_sender,
        env::CONF.email_from_address.clone(),
        env::CONF.email_reply_to_address.clone(),
    );

    let process_deletions_job = ProcessDeletionsJob::new(
        Arc::new(PgErasureStore::new(&db_async_pool)),
        billing_provider,
        notifier,
        Arc::new(plan),
        env::CONF.claim_lease,
        env::CONF.max_concurrent_users,
    );

    let cron_secret = Data::new(CronSecret::new(&env::CONF.cron_secret));
    if !cron_secret.is_configured() {
        log::warn!("No cron secret is configured. All cron requests will be rejected");
    }

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(db_async_pool.clone()))
            .app_data(Data::new(process_deletions_job.clone()))
            .app_data(cron_secret.clone())
            .configure(services::api::configure)
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(actix_workers)
    .bind(base_addr)?
    .run()
    .await?;

    // All workers have stopped
    unsafe {
        env::CONF.zeroize();
    }

    Ok(())
}

fn disabled_integration_warnings(billing_enabled: bool, email_enabled: bool) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !billing_enabled {
        warnings.push("Billing is disabled. Subscriptions of erased users will not be cancelled");
    }

    if !email_enabled {
        warnings.push("Email is disabled. Erased users will not be sent a deletion notice");
    }

    warnings
}

/// Refuses to start if the live schema and the registry disagree.
async fn check_schema(registry: &ClassificationRegistry, db_async_pool: &DbAsyncPool) {
    let columns = match schema_catalog::Dao::new(db_async_pool)
        .get_all_columns()
        .await
    {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to read database schema: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = registry.validate_against_schema(&columns) {
        log::error!("Classification registry does not match the database schema: {e}");
        std::process::exit(1);
    }

    log::info!("Classification registry matches the database schema");
}

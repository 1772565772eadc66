use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use futures::future;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::handlers::error::HttpErrorResponse;

/// The shared secret the scheduler presents as a bearer token.
pub struct CronSecret(Zeroizing<String>);

impl CronSecret {
    pub fn new(secret: &str) -> Self {
        Self(Zeroizing::new(String::from(secret)))
    }

    pub fn is_configured(&self) -> bool {
        !self.0.is_empty()
    }

    fn matches(&self, candidate: &str) -> bool {
        let expected = Sha256::digest(self.0.as_bytes());
        let candidate = Sha256::digest(candidate.as_bytes());

        // Do bitwise comparison of the digests to prevent timing attacks
        let mut mismatched = 0u8;
        for (expected_byte, candidate_byte) in expected.iter().zip(candidate.iter()) {
            mismatched |= expected_byte ^ candidate_byte;
        }

        mismatched == 0
    }
}

/// Extracting this in a handler rejects the request with a 401 unless it
/// carries `Authorization: Bearer <secret>`.
pub struct CronAuthorized;

impl FromRequest for CronAuthorized {
    type Error = HttpErrorResponse;
    type Future = future::Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(secret) = req.app_data::<Data<CronSecret>>() else {
            log::error!("No cron secret is registered with the app");
            return future::err(HttpErrorResponse::Unauthorized);
        };

        if !secret.is_configured() {
            log::warn!("Rejected cron request because no cron secret is configured");
            return future::err(HttpErrorResponse::Unauthorized);
        }

        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        match token {
            Some(token) if secret.matches(token) => future::ok(CronAuthorized),
            _ => {
                log::warn!(
                    "Rejected cron request to {} with a missing or incorrect secret",
                    req.path()
                );
                future::err(HttpErrorResponse::Unauthorized)
            }
        }
    }
}

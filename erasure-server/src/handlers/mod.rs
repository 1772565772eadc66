pub mod deletions;
pub mod health;

pub mod error {
    use actix_web::http::StatusCode;
    use actix_web::{HttpResponse, HttpResponseBuilder};
    use serde_json::json;
    use std::fmt;

    #[derive(Debug)]
    pub enum HttpErrorResponse {
        // 401
        Unauthorized,

        // 500
        InternalError(String),
    }

    impl std::error::Error for HttpErrorResponse {}

    impl fmt::Display for HttpErrorResponse {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                HttpErrorResponse::Unauthorized => write!(f, "Unauthorized"),
                HttpErrorResponse::InternalError(msg) => write!(f, "{msg}"),
            }
        }
    }

    impl actix_web::error::ResponseError for HttpErrorResponse {
        fn error_response(&self) -> HttpResponse {
            HttpResponseBuilder::new(self.status_code()).json(json!({ "error": self.to_string() }))
        }

        fn status_code(&self) -> StatusCode {
            match *self {
                HttpErrorResponse::Unauthorized => StatusCode::UNAUTHORIZED,
                HttpErrorResponse::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }
}

use argon2::Error as ArgonError;
use warp::{
    Rejection, Reply,
    filters::{body::BodyDeserializeError, cors::CorsForbidden},
    http::StatusCode,
    reject::{InvalidQuery, MissingHeader, Reject},
};

use tracing::{Level, event, instrument};

#[derive(Debug)]
pub enum Error {
    ParseError(std::num::ParseIntError),
    Validation(String),
    NotFound(String),
    Forbidden(String),
    Conflict(String),
    WrongPassword,
    CannotDecryptToken,
    Unauthorized,
    ArgonLibraryError(ArgonError),
    TokenError(String),
    Configuration(String),
    DatabaseQueryError(sqlx::Error),
    MigrationError(sqlx::migrate::MigrateError),
}

impl Error {
    pub fn not_found(what: &str) -> Self {
        Error::NotFound(format!("{} not found", what))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::ParseError(err) => {
                write!(f, "Cannot parse parameter: {}", err)
            }
            Error::Validation(message)
            | Error::NotFound(message)
            | Error::Forbidden(message)
            | Error::Conflict(message) => {
                write!(f, "{}", message)
            }
            Error::WrongPassword => {
                write!(f, "Wrong password")
            }
            Error::CannotDecryptToken => {
                write!(f, "Cannot decrypt token")
            }
            Error::Unauthorized => {
                write!(f, "No permission to change the underlying resource")
            }
            Error::ArgonLibraryError(_) => {
                write!(f, "Cannot verify password")
            }
            Error::TokenError(err) => {
                write!(f, "Cannot issue token: {}", err)
            }
            Error::Configuration(err) => {
                write!(f, "Invalid configuration: {}", err)
            }
            Error::DatabaseQueryError(_) => {
                write!(f, "Cannot update, invalid data.")
            }
            Error::MigrationError(err) => {
                write!(f, "Cannot migrate data: {}", err)
            }
        }
    }
}

impl Reject for Error {}

// PostgreSQL unique_violation
const DUPLICATE_KEY: u32 = 23505;

fn error_reply(message: impl Into<String>, status: StatusCode) -> warp::reply::Response {
    let body = serde_json::json!({
        "success": false,
        "message": message.into(),
    });
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// 고유 제약 조건 위반인지 확인한다.
pub fn is_duplicate_key(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(err) => err
            .code()
            .and_then(|code| code.parse::<u32>().ok())
            .map_or(false, |code| code == DUPLICATE_KEY),
        _ => false,
    }
}

/// 거부를 `{ success: false, message }` 응답으로 바꾼다.
#[instrument]
pub async fn return_error(r: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(crate::Error::DatabaseQueryError(e)) = r.find() {
        if is_duplicate_key(e) {
            event!(Level::WARN, "Duplicate key: {:?}", e);
            Ok(error_reply("Resource already exists", StatusCode::CONFLICT))
        } else {
            event!(Level::ERROR, "Database query error: {:?}", e);
            Ok(error_reply(
                "Cannot update data",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    } else if let Some(crate::Error::Validation(message)) = r.find() {
        event!(Level::INFO, "Validation failed: {}", message);
        Ok(error_reply(message.clone(), StatusCode::BAD_REQUEST))
    } else if let Some(crate::Error::NotFound(message)) = r.find() {
        event!(Level::INFO, "{}", message);
        Ok(error_reply(message.clone(), StatusCode::NOT_FOUND))
    } else if let Some(crate::Error::Forbidden(message)) = r.find() {
        event!(Level::WARN, "Forbidden: {}", message);
        Ok(error_reply(message.clone(), StatusCode::FORBIDDEN))
    } else if let Some(crate::Error::Conflict(message)) = r.find() {
        event!(Level::INFO, "Conflict: {}", message);
        Ok(error_reply(message.clone(), StatusCode::CONFLICT))
    } else if let Some(crate::Error::Unauthorized) = r.find() {
        event!(Level::ERROR, "Not matching account id");
        Ok(error_reply(
            "No permission to change underlying resource",
            StatusCode::UNAUTHORIZED,
        ))
    } else if let Some(crate::Error::WrongPassword) = r.find() {
        event!(Level::ERROR, "Entered wrong password");
        Ok(error_reply(
            "Wrong E-Mail/Password combination",
            StatusCode::UNAUTHORIZED,
        ))
    } else if let Some(crate::Error::CannotDecryptToken) = r.find() {
        event!(Level::WARN, "Rejected token");
        Ok(error_reply("Invalid or expired token", StatusCode::UNAUTHORIZED))
    } else if let Some(crate::Error::ArgonLibraryError(e)) = r.find() {
        event!(Level::ERROR, "{:?}", e);
        Ok(error_reply(
            "Internal Server Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    } else if let Some(crate::Error::TokenError(e)) = r.find() {
        event!(Level::ERROR, "{}", e);
        Ok(error_reply(
            "Internal Server Error",
            StatusCode::INTERNAL_SERVER_ERROR,
        ))
    } else if let Some(error) = r.find::<MissingHeader>() {
        event!(Level::WARN, "Missing header: {}", error.name());
        Ok(error_reply(
            "Authentication required",
            StatusCode::UNAUTHORIZED,
        ))
    } else if let Some(error) = r.find::<CorsForbidden>() {
        event!(Level::ERROR, "CORS forbidden error: {}", error);
        Ok(error_reply(error.to_string(), StatusCode::FORBIDDEN))
    } else if let Some(error) = r.find::<BodyDeserializeError>() {
        event!(Level::ERROR, "Cannot deserialize request body: {}", error);
        Ok(error_reply(
            error.to_string(),
            StatusCode::UNPROCESSABLE_ENTITY,
        ))
    } else if let Some(error) = r.find::<InvalidQuery>() {
        event!(Level::INFO, "Invalid query: {}", error);
        Ok(error_reply(error.to_string(), StatusCode::BAD_REQUEST))
    } else if let Some(error) = r.find::<Error>() {
        event!(Level::ERROR, "{}", error);
        Ok(error_reply(error.to_string(), StatusCode::BAD_REQUEST))
    } else {
        event!(Level::WARN, "Requested route was not found");
        Ok(error_reply("Route not found", StatusCode::NOT_FOUND))
    }
}

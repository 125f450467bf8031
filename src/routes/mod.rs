use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};

use crate::types::account::Session;
use handle_errors::Error;

pub mod admin;
pub mod answer;
pub mod authentication;
pub mod notification;
pub mod question;
pub mod realtime;
pub mod tag;
pub mod user;
pub mod vote;

/// 모든 성공 응답은 `{ success, data, message }` 형태로 감싼다.
#[derive(Serialize, Debug)]
struct Envelope<'a, T: Serialize> {
    success: bool,
    data: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

pub fn respond<T: Serialize>(status: StatusCode, data: &T, message: Option<&str>) -> WithStatus<Json> {
    let envelope = Envelope {
        success: true,
        data,
        message,
    };
    warp::reply::with_status(warp::reply::json(&envelope), status)
}

pub fn ok<T: Serialize>(data: &T) -> WithStatus<Json> {
    respond(StatusCode::OK, data, None)
}

pub fn created<T: Serialize>(data: &T, message: &str) -> WithStatus<Json> {
    respond(StatusCode::CREATED, data, Some(message))
}

/// 돌려줄 데이터가 없을 때
pub fn done(message: &str) -> WithStatus<Json> {
    respond(StatusCode::OK, &serde_json::Value::Null, Some(message))
}

/// 관리자만 할 수 있는 작업. `action`은 거부 메시지에 들어간다.
pub fn admin_only(session: &Session, action: &str) -> Result<(), Error> {
    if session.is_admin() {
        Ok(())
    } else {
        Err(Error::Forbidden(format!("Only admins can {}", action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::account::{Role, UserId};
    use chrono::Utc;
    use warp::Reply;

    #[test]
    fn only_admins_pass_the_admin_guard() {
        let now = Utc::now();
        let session = Session {
            exp: now,
            user_id: UserId(2),
            role: Role::User,
            nbf: now,
        };
        match admin_only(&session, "change tags") {
            Err(Error::Forbidden(message)) => assert_eq!(message, "Only admins can change tags"),
            other => panic!("expected Forbidden, got {:?}", other),
        }
        let admin = Session {
            role: Role::Admin,
            ..session
        };
        assert!(admin_only(&admin, "change tags").is_ok());
    }

    #[tokio::test]
    async fn envelope_shape() {
        let response = created(&serde_json::json!({ "id": 3 }), "Question created").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["id"], 3);
        assert_eq!(value["message"], "Question created");
    }

    #[tokio::test]
    async fn message_is_omitted_when_absent() {
        let response = ok(&vec![1, 2]).into_response();
        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(value.get("message").is_none());
    }
}

use argon2::{self, Config}; // argon2 해싱 알고리즘
use chrono::prelude::*;
use rand::Rng;
use serde::Serialize;
use std::future;
use std::sync::Arc;
use tracing::{Level, event, instrument};
use warp::Filter;

use crate::store::Store;
use crate::types::account::{Account, Login, Role, Session, User, UserId};
use handle_errors::Error;

/// 토큰 암호화 키. 설정의 PASETO_KEY에서 만든다.
#[derive(Clone)]
pub struct TokenKey(Arc<Vec<u8>>);

impl TokenKey {
    pub fn new(key: &str) -> Self {
        TokenKey(Arc::new(key.as_bytes().to_vec()))
    }
}

impl std::fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "TokenKey(..)")
    }
}

#[derive(Serialize, Debug)]
struct LoginResponse {
    token: String,
    user: User,
}

pub fn verify_token(key: &TokenKey, token: &str) -> Result<Session, Error> {
    let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
    let token = paseto::tokens::validate_local_token(
        token,
        None,
        &key.0,
        &paseto::tokens::TimeBackend::Chrono,
    )
    .map_err(|_| Error::CannotDecryptToken)?;

    serde_json::from_value::<Session>(token).map_err(|_| Error::CannotDecryptToken)
}

#[instrument(skip(store, account))]
pub async fn register(store: Store, account: Account) -> Result<impl warp::Reply, warp::Rejection> {
    let account = account.validate()?;
    // 평문 대신 솔트를 붙여 해시한 비밀번호를 저장한다
    let account = Account {
        password: hash_password(account.password.as_bytes())?,
        ..account
    };

    match store.add_account(account).await {
        Ok(user) => {
            event!(Level::INFO, user_id = user.id.0, "account registered");
            Ok(super::created(&user, "User registered successfully"))
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub fn hash_password(password: &[u8]) -> Result<String, Error> {
    let salt = rand::thread_rng().r#gen::<[u8; 32]>();
    let config = Config::default();
    argon2::hash_encoded(password, &salt, &config).map_err(Error::ArgonLibraryError)
}

#[instrument(skip(store, key, login))]
pub async fn login(store: Store, key: TokenKey, login: Login) -> Result<impl warp::Reply, warp::Rejection> {
    // 없는 이메일과 틀린 비밀번호는 같은 에러로 돌려준다
    let credentials = match store.get_credentials(&login.email).await? {
        Some(credentials) => credentials,
        None => return Err(warp::reject::custom(Error::WrongPassword)),
    };

    match verify_password(&credentials.password, login.password.as_bytes()) {
        Ok(true) => {
            event!(
                Level::INFO,
                user_id = credentials.id.0,
                role = credentials.role.as_str(),
                "logged in"
            );
            let token = issue_token(&key, credentials.id, credentials.role)?;
            let user = store.get_user(credentials.id).await?;
            Ok(super::ok(&LoginResponse { token, user }))
        }
        Ok(false) => Err(warp::reject::custom(Error::WrongPassword)),
        Err(e) => Err(warp::reject::custom(Error::ArgonLibraryError(e))),
    }
}

/// 토큰은 서버에 저장하지 않으므로 클라이언트가 버리면 끝난다.
pub async fn logout(session: Session) -> Result<impl warp::Reply, warp::Rejection> {
    event!(Level::INFO, user_id = session.user_id.0, "logged out");
    Ok(super::done("Logged out successfully"))
}

fn verify_password(hash: &str, password: &[u8]) -> Result<bool, argon2::Error> {
    argon2::verify_encoded(hash, password)
}

pub fn issue_token(key: &TokenKey, user_id: UserId, role: Role) -> Result<String, Error> {
    let current_date_time = Utc::now();
    let dt = current_date_time + chrono::Duration::days(1);

    paseto::tokens::PasetoBuilder::new()
        .set_encryption_key(&key.0)
        .set_expiration(&dt)
        .set_not_before(&current_date_time)
        .set_claim("user_id", serde_json::json!(user_id))
        .set_claim("role", serde_json::json!(role))
        .build()
        .map_err(|e| Error::TokenError(format!("{:?}", e)))
}

pub fn auth(key: TokenKey) -> impl Filter<Extract = (Session,), Error = warp::Rejection> + Clone {
    warp::header::<String>("Authorization").and_then(move |token: String| {
        future::ready(verify_token(&key, &token).map_err(warp::reject::custom))
    })
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::badge::Badge;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub i32);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// 회원 가입 요청 본문
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Login {
    pub email: String,
    pub password: String,
}

/// 저장소에서 읽어 온 로그인 자격 증명. 비밀번호 해시는 직렬화하지 않는다.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: UserId,
    pub role: Role,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub reputation: i32,
    pub role: Role,
    pub badges: Vec<Badge>,
    pub created_at: DateTime<Utc>,
}

/// 인증 토큰에 담기는 클레임
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Session {
    pub exp: DateTime<Utc>,
    pub user_id: UserId,
    pub role: Role,
    pub nbf: DateTime<Utc>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 소유자이거나 관리자인지 확인한다.
    pub fn may_manage(&self, owner: UserId) -> bool {
        self.user_id == owner || self.is_admin()
    }
}

impl Account {
    pub fn validate(self) -> Result<Account, handle_errors::Error> {
        let display_name = self.display_name.trim().to_string();
        let email = self.email.trim().to_lowercase();

        if display_name.is_empty() {
            return Err(handle_errors::Error::Validation(
                "Display name is required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(handle_errors::Error::Validation(
                "Please provide a valid email".to_string(),
            ));
        }
        if self.password.len() < 6 {
            return Err(handle_errors::Error::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        Ok(Account {
            display_name,
            email,
            password: self.password,
        })
    }
}

const LEADERBOARD_DEFAULT: i64 = 10;
const LEADERBOARD_MAX: i64 = 100;

/// 평판 순위표의 한 줄. 같은 평판은 같은 순위를 받는다.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub id: UserId,
    pub display_name: String,
    pub reputation: i32,
    pub badge_count: i64,
}

/// `limit` 쿼리 매개변수. 없으면 10명, 100명을 넘기면 100명까지만 보여 준다.
pub fn leaderboard_limit(params: &HashMap<String, String>) -> Result<i64, handle_errors::Error> {
    let limit = match params.get("limit") {
        Some(limit) => limit
            .parse::<i64>()
            .map_err(handle_errors::Error::ParseError)?,
        None => return Ok(LEADERBOARD_DEFAULT),
    };
    if limit < 1 {
        return Err(handle_errors::Error::Validation(
            "limit must be at least 1".to_string(),
        ));
    }

    Ok(limit.min(LEADERBOARD_MAX))
}

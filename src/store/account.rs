use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::{Level, event};

use crate::reputation;
use crate::types::account::{Account, Credentials, LeaderboardEntry, Role, User, UserId};
use crate::types::badge::BadgeId;

use super::{Store, Tx, db_error};
use handle_errors::Error;

impl Store {
    /// 비밀번호는 이미 해시된 상태로 전달된다.
    pub async fn add_account(&self, account: Account) -> Result<User, Error> {
        match sqlx::query(
            "INSERT INTO users (display_name, email, password)
            VALUES ($1, $2, $3)
            RETURNING id, display_name, email, reputation, role, created_at",
        )
        .bind(account.display_name)
        .bind(account.email)
        .bind(account.password)
        .map(|row: PgRow| user_from_row(&row, Vec::new()))
        .fetch_one(&self.connection)
        .await
        {
            Ok(user) => Ok(user),
            Err(error) if handle_errors::is_duplicate_key(&error) => {
                event!(Level::INFO, "registration with an existing email");
                Err(Error::Conflict("Email is already registered".to_string()))
            }
            Err(error) => Err(db_error(error)),
        }
    }

    pub async fn get_credentials(&self, email: &str) -> Result<Option<Credentials>, Error> {
        sqlx::query("SELECT id, role, password FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .map(|row: PgRow| Credentials {
                id: UserId(row.get("id")),
                role: Role::from_db(row.get("role")),
                password: row.get("password"),
            })
            .fetch_optional(&self.connection)
            .await
            .map_err(db_error)
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<User, Error> {
        let user = sqlx::query(
            "SELECT id, display_name, email, reputation, role, created_at
            FROM users WHERE id = $1",
        )
        .bind(user_id.0)
        .map(|row: PgRow| user_from_row(&row, Vec::new()))
        .fetch_optional(&self.connection)
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::not_found("User"))?;

        let badges = sqlx::query("SELECT badge_id FROM user_badges WHERE user_id = $1 ORDER BY awarded_at")
            .bind(user_id.0)
            .map(|row: PgRow| row.get::<String, _>("badge_id"))
            .fetch_all(&self.connection)
            .await
            .map_err(db_error)?
            .iter()
            .filter_map(|id| BadgeId::from_db(id))
            .map(|id| id.badge())
            .collect();

        Ok(User { badges, ..user })
    }

    /// 평판 순위표. 같은 평판이면 먼저 가입한 사용자가 앞에 온다.
    pub async fn get_leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, Error> {
        sqlx::query(
            "SELECT u.id, u.display_name, u.reputation,
                RANK() OVER (ORDER BY u.reputation DESC) AS rank,
                (SELECT COUNT(*) FROM user_badges b WHERE b.user_id = u.id) AS badge_count
            FROM users u
            ORDER BY u.reputation DESC, u.id ASC
            LIMIT $1",
        )
        .bind(limit)
        .map(|row: PgRow| LeaderboardEntry {
            rank: row.get("rank"),
            id: UserId(row.get("id")),
            display_name: row.get("display_name"),
            reputation: row.get("reputation"),
            badge_count: row.get("badge_count"),
        })
        .fetch_all(&self.connection)
        .await
        .map_err(db_error)
    }

    pub async fn user_exists(&self, user_id: UserId) -> Result<bool, Error> {
        sqlx::query("SELECT 1 FROM users WHERE id = $1")
            .bind(user_id.0)
            .fetch_optional(&self.connection)
            .await
            .map(|row| row.is_some())
            .map_err(db_error)
    }
}

fn user_from_row(row: &PgRow, badges: Vec<crate::types::badge::Badge>) -> User {
    User {
        id: UserId(row.get("id")),
        display_name: row.get("display_name"),
        email: row.get("email"),
        reputation: row.get("reputation"),
        role: Role::from_db(row.get("role")),
        badges,
        created_at: row.get("created_at"),
    }
}

async fn held_badges(tx: &mut Tx, user_id: UserId) -> Result<Vec<BadgeId>, Error> {
    let ids = sqlx::query("SELECT badge_id FROM user_badges WHERE user_id = $1")
        .bind(user_id.0)
        .map(|row: PgRow| row.get::<String, _>("badge_id"))
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;

    Ok(ids.iter().filter_map(|id| BadgeId::from_db(id)).collect())
}

async fn award_badges(tx: &mut Tx, user_id: UserId, badges: &[BadgeId]) -> Result<(), Error> {
    for badge in badges {
        // 이미 받은 배지는 다시 넣지 않는다
        sqlx::query(
            "INSERT INTO user_badges (user_id, badge_id) VALUES ($1, $2)
            ON CONFLICT DO NOTHING",
        )
        .bind(user_id.0)
        .bind(badge.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        event!(Level::INFO, user_id = user_id.0, badge = badge.as_str(), "badge awarded");
    }
    Ok(())
}

/// 사용자 행을 잠그고 현재 평판을 읽는다.
pub(super) async fn lock_reputation(tx: &mut Tx, user_id: UserId) -> Result<i32, Error> {
    sqlx::query("SELECT reputation FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id.0)
        .map(|row: PgRow| row.get("reputation"))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::not_found("User"))
}

/// 잠근 사용자의 평판을 새 값으로 바꾸고 받을 수 있는 배지를 준다.
pub(super) async fn set_reputation(
    tx: &mut Tx,
    user_id: UserId,
    current: i32,
    reputation: i32,
) -> Result<i32, Error> {
    if reputation == current {
        return Ok(current);
    }

    sqlx::query("UPDATE users SET reputation = $1 WHERE id = $2")
        .bind(reputation)
        .bind(user_id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    event!(
        Level::DEBUG,
        user_id = user_id.0,
        delta = reputation - current,
        reputation,
        "reputation changed"
    );

    let held = held_badges(tx, user_id).await?;
    award_badges(tx, user_id, &reputation::badges_earned(reputation, &held)).await?;
    Ok(reputation)
}

/// 평판에 변화량을 더한다(하한 0). 바뀐 평판을 돌려준다.
pub(super) async fn grant_reputation(tx: &mut Tx, user_id: UserId, delta: i32) -> Result<i32, Error> {
    let current = lock_reputation(tx, user_id).await?;
    set_reputation(tx, user_id, current, reputation::clamp(current, delta)).await
}

/// 처음 질문이나 답변을 올린 사용자에게 First Post 배지를 준다.
pub(super) async fn award_first_post(tx: &mut Tx, user_id: UserId) -> Result<(), Error> {
    let held = held_badges(tx, user_id).await?;
    if let Some(badge) = reputation::first_post_badge(&held) {
        award_badges(tx, user_id, &[badge]).await?;
    }
    Ok(())
}

use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::Transaction;

use crate::types::{
    account::UserId,
    answer::{Answer, AnswerId},
    notification::{Notification, NotificationId},
    question::{Question, QuestionId},
    tag::{Tag, TagId},
    vote::{TargetType, Vote, VoteDirection, VoteId, VoteTarget},
};

use handle_errors::Error;

mod account;
mod admin;
mod answer;
mod notification;
mod question;
mod tag;
mod vote;

/// 커밋 후 실시간 채널로 보낼 알림과 그 시점의 읽지 않은 알림 수
pub type Delivery = Vec<(Notification, i64)>;

type Tx = Transaction<'static, Postgres>;

#[derive(Debug, Clone)]
pub struct Store {
    pub connection: PgPool,
}

impl Store {
    pub async fn new(db_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let db_pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;

        Ok(Store {
            connection: db_pool,
        })
    }

    /// 여러 단계로 이루어진 변경은 모두 하나의 트랜잭션 안에서 실행한다.
    async fn begin(&self) -> Result<Tx, Error> {
        self.connection.begin().await.map_err(db_error)
    }
}

async fn commit(tx: Tx) -> Result<(), Error> {
    tx.commit().await.map_err(db_error)
}

fn db_error(error: sqlx::Error) -> Error {
    tracing::event!(tracing::Level::ERROR, "{:?}", error);
    Error::DatabaseQueryError(error)
}

fn question_from_row(row: &PgRow) -> Question {
    Question {
        id: QuestionId(row.get("id")),
        title: row.get("title"),
        body: row.get("body"),
        author_id: UserId(row.get("account_id")),
        tags: row.get("tags"),
        votes: row.get("votes"),
        views: row.get("views"),
        answer_count: row.get("answer_count"),
        accepted_answer_id: row
            .get::<Option<i32>, _>("accepted_answer_id")
            .map(AnswerId),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn answer_from_row(row: &PgRow) -> Answer {
    Answer {
        id: AnswerId(row.get("id")),
        body: row.get("body"),
        question_id: QuestionId(row.get("question_id")),
        author_id: UserId(row.get("account_id")),
        votes: row.get("votes"),
        is_accepted: row.get("is_accepted"),
        created_at: row.get("created_at"),
    }
}

fn vote_from_row(row: &PgRow) -> Result<Vote, Error> {
    let target_type: String = row.get("target_type");
    Ok(Vote {
        id: VoteId(row.get("id")),
        voter_id: UserId(row.get("voter_id")),
        target: VoteTarget {
            target_type: target_type.parse::<TargetType>()?,
            target_id: row.get("target_id"),
        },
        direction: VoteDirection::from_value(row.get("direction")),
        reputation_applied: row.get("reputation_applied"),
        created_at: row.get("created_at"),
    })
}

fn notification_from_row(row: &PgRow) -> Result<Notification, Error> {
    let kind: String = row.get("kind");
    Ok(Notification {
        id: NotificationId(row.get("id")),
        recipient_id: UserId(row.get("recipient_id")),
        kind: kind.parse()?,
        title: row.get("title"),
        message: row.get("message"),
        related_id: row.get("related_id"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

fn tag_from_row(row: &PgRow) -> Tag {
    Tag {
        id: TagId(row.get("id")),
        name: row.get("name"),
        description: row.get("description"),
        question_count: row.get("question_count"),
        created_at: row.get("created_at"),
    }
}

/// 저장소 테스트용 준비 함수. DATABASE_URL이 없으면 테스트를 건너뛴다.
#[cfg(test)]
pub(crate) mod testing {
    use chrono::{Duration, Utc};

    use super::Store;
    use crate::types::account::{Account, Role, Session, UserId};
    use crate::types::answer::{AnswerId, NewAnswer};
    use crate::types::question::{NewQuestion, QuestionId};

    pub async fn store() -> Option<Store> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = Store::new(&url, 5).await.expect("database is reachable");
        sqlx::migrate!()
            .run(&store.connection)
            .await
            .expect("migrations apply");
        Some(store)
    }

    /// 이메일이 겹치지 않는 새 사용자. 평판은 1에서 시작한다.
    pub async fn user(store: &Store, name: &str) -> UserId {
        let account = Account {
            display_name: name.to_string(),
            email: format!("{}-{}@example.com", name, uuid::Uuid::new_v4()),
            password: "not-a-real-hash".to_string(),
        };
        store.add_account(account).await.expect("account is created").id
    }

    pub fn session(user_id: UserId) -> Session {
        let now = Utc::now();
        Session {
            exp: now + Duration::days(1),
            user_id,
            role: Role::User,
            nbf: now,
        }
    }

    pub async fn reputation(store: &Store, user_id: UserId) -> i32 {
        store.get_user(user_id).await.expect("user exists").reputation
    }

    pub async fn question(store: &Store, author: UserId) -> QuestionId {
        let new_question = NewQuestion {
            title: "How do lifetimes work?".to_string(),
            body: "The borrow checker rejects my struct.".to_string(),
            tags: vec!["rust".to_string()],
        };
        store
            .add_question(new_question, author)
            .await
            .expect("question is created")
            .id
    }

    pub async fn answer(store: &Store, question_id: QuestionId, author: UserId) -> AnswerId {
        let new_answer = NewAnswer {
            body: "Add a lifetime parameter to the struct.".to_string(),
        };
        let (answer, _) = store
            .add_answer(question_id, new_answer, author)
            .await
            .expect("answer is created");
        answer.id
    }
}

use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::types::stats::PlatformStats;

use super::{Store, db_error};
use handle_errors::Error;

impl Store {
    pub async fn get_platform_stats(&self) -> Result<PlatformStats, Error> {
        sqlx::query(
            "SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM users WHERE role = 'admin') AS admins,
                (SELECT COUNT(*) FROM questions) AS questions,
                (SELECT COUNT(*) FROM questions WHERE answer_count = 0) AS unanswered_questions,
                (SELECT COUNT(*) FROM answers) AS answers,
                (SELECT COUNT(*) FROM answers WHERE is_accepted) AS accepted_answers,
                (SELECT COUNT(*) FROM votes) AS votes,
                (SELECT COUNT(*) FROM tags) AS tags",
        )
        .map(|row: PgRow| PlatformStats {
            users: row.get("users"),
            admins: row.get("admins"),
            questions: row.get("questions"),
            unanswered_questions: row.get("unanswered_questions"),
            answers: row.get("answers"),
            accepted_answers: row.get("accepted_answers"),
            votes: row.get("votes"),
            tags: row.get("tags"),
        })
        .fetch_one(&self.connection)
        .await
        .map_err(db_error)
    }
}

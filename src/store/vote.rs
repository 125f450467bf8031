use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::{Level, event};

use crate::ledger::{self, VoteTransition};
use crate::reputation;
use crate::types::{
    account::UserId,
    notification::{NewNotification, NotificationKind},
    pagination::{Page, PageInfo, Pagination},
    vote::{
        TargetType, Vote, VoteAction, VoteCounts, VoteDirection, VoteHistoryEntry, VoteId,
        VoteOutcome, VoteTarget,
    },
};

use super::account::{lock_reputation, set_reputation};
use super::notification::notify;
use super::{Delivery, Store, Tx, commit, db_error, vote_from_row};
use handle_errors::Error;

/// 잠근 투표 대상의 작성자와 소속 질문
struct LockedTarget {
    author_id: UserId,
    question_id: i32,
}

impl Store {
    /// 투표를 기록하거나 취소하거나 방향을 바꾼다.
    ///
    /// 대상 행을 먼저 잠그므로 같은 대상에 대한 투표는 차례로 처리된다.
    pub async fn cast_vote(
        &self,
        voter_id: UserId,
        target: VoteTarget,
        direction: VoteDirection,
    ) -> Result<(VoteOutcome, Delivery), Error> {
        let mut tx = self.begin().await?;
        let locked = lock_target(&mut tx, target).await?;

        let existing = sqlx::query(
            "SELECT * FROM votes
            WHERE voter_id = $1 AND target_type = $2 AND target_id = $3
            FOR UPDATE",
        )
        .bind(voter_id.0)
        .bind(target.target_type.as_str())
        .bind(target.target_id)
        .try_map(|row: PgRow| {
            vote_from_row(&row).map_err(|e| sqlx::Error::Decode(e.to_string().into()))
        })
        .fetch_optional(&mut tx)
        .await
        .map_err(db_error)?;

        let step = ledger::transition(existing.as_ref().map(|vote| vote.direction), direction);
        let current = lock_reputation(&mut tx, locked.author_id).await?;
        let settled = reputation::settle_vote(
            current,
            existing.as_ref().map_or(0, |vote| vote.reputation_applied),
            locked.author_id,
            voter_id,
            &step,
        );

        match (&existing, step.next) {
            (None, Some(next)) => {
                sqlx::query(
                    "INSERT INTO votes (voter_id, target_type, target_id, direction, reputation_applied)
                    VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(voter_id.0)
                .bind(target.target_type.as_str())
                .bind(target.target_id)
                .bind(next.value())
                .bind(settled.applied)
                .execute(&mut tx)
                .await
                .map_err(db_error)?;
            }
            (Some(vote), Some(next)) => {
                sqlx::query(
                    "UPDATE votes SET direction = $1, reputation_applied = $2, updated_at = NOW()
                    WHERE id = $3",
                )
                .bind(next.value())
                .bind(settled.applied)
                .bind(vote.id.0)
                .execute(&mut tx)
                .await
                .map_err(db_error)?;
            }
            (Some(vote), None) => {
                sqlx::query("DELETE FROM votes WHERE id = $1")
                    .bind(vote.id.0)
                    .execute(&mut tx)
                    .await
                    .map_err(db_error)?;
            }
            (None, None) => {}
        }

        let score = apply_score(&mut tx, target, step.score_delta).await?;
        set_reputation(&mut tx, locked.author_id, current, settled.reputation).await?;
        let delivery = notify(&mut tx, upvote_notification(&step, &locked, voter_id, target)).await?;

        commit(tx).await?;
        event!(
            Level::INFO,
            voter_id = voter_id.0,
            target_type = target.target_type.as_str(),
            target_id = target.target_id,
            action = ?step.action,
            score,
            "vote recorded"
        );
        Ok((
            VoteOutcome {
                action: step.action,
                direction: step.next,
                score,
            },
            delivery,
        ))
    }

    /// 투표 id로 자신의 투표를 지운다. 점수와 평판도 함께 되돌린다.
    pub async fn remove_vote(&self, vote_id: VoteId, voter_id: UserId) -> Result<VoteOutcome, Error> {
        let mut tx = self.begin().await?;

        let target = sqlx::query("SELECT * FROM votes WHERE id = $1")
            .bind(vote_id.0)
            .try_map(|row: PgRow| {
                vote_from_row(&row).map_err(|e| sqlx::Error::Decode(e.to_string().into()))
            })
            .fetch_optional(&mut tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| Error::not_found("Vote"))?
            .target;

        // 대상 먼저 잠그고 투표 행을 다시 읽는다
        let locked = lock_target(&mut tx, target).await?;
        let vote = sqlx::query("SELECT * FROM votes WHERE id = $1 FOR UPDATE")
            .bind(vote_id.0)
            .try_map(|row: PgRow| {
                vote_from_row(&row).map_err(|e| sqlx::Error::Decode(e.to_string().into()))
            })
            .fetch_optional(&mut tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| Error::not_found("Vote"))?;

        if vote.voter_id != voter_id {
            return Err(Error::Forbidden(
                "You can only remove your own votes".to_string(),
            ));
        }

        let step = ledger::removal(vote.direction);
        let current = lock_reputation(&mut tx, locked.author_id).await?;
        let settled = reputation::settle_vote(
            current,
            vote.reputation_applied,
            locked.author_id,
            voter_id,
            &step,
        );
        sqlx::query("DELETE FROM votes WHERE id = $1")
            .bind(vote_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?;

        let score = apply_score(&mut tx, target, step.score_delta).await?;
        set_reputation(&mut tx, locked.author_id, current, settled.reputation).await?;

        commit(tx).await?;
        Ok(VoteOutcome {
            action: step.action,
            direction: None,
            score,
        })
    }

    /// 사용자가 남긴 투표를 최근 것부터. 답변에 한 투표는 소속 질문을 따라간다.
    pub async fn get_vote_history(
        &self,
        voter_id: UserId,
        direction: Option<VoteDirection>,
        pagination: Pagination,
    ) -> Result<Page<VoteHistoryEntry>, Error> {
        let direction = direction.map(|d| d.value());

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM votes
            WHERE voter_id = $1 AND ($2::SMALLINT IS NULL OR direction = $2)",
        )
        .bind(voter_id.0)
        .bind(direction)
        .map(|row: PgRow| row.get("total"))
        .fetch_one(&self.connection)
        .await
        .map_err(db_error)?;

        let items = sqlx::query(
            "SELECT v.*, q.id AS question_id, q.title AS question_title
            FROM votes v
            LEFT JOIN answers a ON v.target_type = 'answer' AND a.id = v.target_id
            JOIN questions q ON q.id = CASE
                WHEN v.target_type = 'question' THEN v.target_id
                ELSE a.question_id
            END
            WHERE v.voter_id = $1 AND ($2::SMALLINT IS NULL OR v.direction = $2)
            ORDER BY v.created_at DESC, v.id DESC
            LIMIT $3 OFFSET $4",
        )
        .bind(voter_id.0)
        .bind(direction)
        .bind(i64::from(pagination.per_page))
        .bind(i64::from(pagination.offset()))
        .try_map(|row: PgRow| {
            let vote =
                vote_from_row(&row).map_err(|e| sqlx::Error::Decode(e.to_string().into()))?;
            Ok(VoteHistoryEntry {
                vote,
                question_id: row.get("question_id"),
                question_title: row.get("question_title"),
            })
        })
        .fetch_all(&self.connection)
        .await
        .map_err(db_error)?;

        Ok(Page {
            items,
            pagination: PageInfo::new(&pagination, total),
        })
    }

    pub async fn get_vote_counts(&self, target: VoteTarget) -> Result<VoteCounts, Error> {
        sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE direction = 1) AS upvotes,
                COUNT(*) FILTER (WHERE direction = -1) AS downvotes
            FROM votes
            WHERE target_type = $1 AND target_id = $2",
        )
        .bind(target.target_type.as_str())
        .bind(target.target_id)
        .map(|row: PgRow| VoteCounts::new(row.get("upvotes"), row.get("downvotes")))
        .fetch_one(&self.connection)
        .await
        .map_err(db_error)
    }

    /// 사용자가 대상에 남긴 투표. 없으면 None
    pub async fn get_user_vote(
        &self,
        voter_id: UserId,
        target: VoteTarget,
    ) -> Result<Option<Vote>, Error> {
        sqlx::query(
            "SELECT * FROM votes
            WHERE voter_id = $1 AND target_type = $2 AND target_id = $3",
        )
        .bind(voter_id.0)
        .bind(target.target_type.as_str())
        .bind(target.target_id)
        .try_map(|row: PgRow| {
            vote_from_row(&row).map_err(|e| sqlx::Error::Decode(e.to_string().into()))
        })
        .fetch_optional(&self.connection)
        .await
        .map_err(db_error)
    }
}

async fn lock_target(tx: &mut Tx, target: VoteTarget) -> Result<LockedTarget, Error> {
    let (query, missing) = match target.target_type {
        TargetType::Question => (
            "SELECT account_id, id AS question_id FROM questions WHERE id = $1 FOR UPDATE",
            "Question",
        ),
        TargetType::Answer => (
            "SELECT account_id, question_id FROM answers WHERE id = $1 FOR UPDATE",
            "Answer",
        ),
    };

    sqlx::query(query)
        .bind(target.target_id)
        .map(|row: PgRow| LockedTarget {
            author_id: UserId(row.get("account_id")),
            question_id: row.get("question_id"),
        })
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::not_found(missing))
}

/// 대상의 votes 컬럼에 변화량을 더하고 새 점수를 돌려준다.
async fn apply_score(tx: &mut Tx, target: VoteTarget, delta: i32) -> Result<i32, Error> {
    let query = match target.target_type {
        TargetType::Question => "UPDATE questions SET votes = votes + $1 WHERE id = $2 RETURNING votes",
        TargetType::Answer => "UPDATE answers SET votes = votes + $1 WHERE id = $2 RETURNING votes",
    };

    sqlx::query(query)
        .bind(delta)
        .bind(target.target_id)
        .map(|row: PgRow| row.get("votes"))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)
}

/// 추천이 새로 남은 경우에만 작성자에게 알린다.
fn upvote_notification(
    step: &VoteTransition,
    locked: &LockedTarget,
    voter_id: UserId,
    target: VoteTarget,
) -> Option<NewNotification> {
    if step.next != Some(VoteDirection::Up) || step.action == VoteAction::Removed {
        return None;
    }

    let noun = target.target_type.as_str();
    NewNotification::for_recipient(
        locked.author_id,
        voter_id,
        NotificationKind::Vote,
        format!("Your {} was upvoted", noun),
        format!("Someone upvoted your {}", noun),
        Some(locked.question_id),
    )
}

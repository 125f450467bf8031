use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::{Level, event};

use crate::acceptance::{self, AcceptPlan, AnswerState, QuestionState};
use crate::reputation::ACCEPTED_ANSWER_REPUTATION;
use crate::types::{
    account::{Session, UserId},
    answer::{Answer, AnswerId, NewAnswer},
    notification::{NewNotification, NotificationKind},
    pagination::{Page, PageInfo, Pagination},
    question::QuestionId,
};

use super::account::{award_first_post, grant_reputation};
use super::notification::notify;
use super::{Delivery, Store, Tx, answer_from_row, commit, db_error};
use handle_errors::Error;

impl Store {
    pub async fn get_answers_for_question(
        &self,
        question_id: QuestionId,
        pagination: Pagination,
    ) -> Result<Page<Answer>, Error> {
        let total: i64 = sqlx::query("SELECT answer_count FROM questions WHERE id = $1")
            .bind(question_id.0)
            .map(|row: PgRow| i64::from(row.get::<i32, _>("answer_count")))
            .fetch_optional(&self.connection)
            .await
            .map_err(db_error)?
            .ok_or_else(|| Error::not_found("Question"))?;

        let items = sqlx::query(
            "SELECT * FROM answers WHERE question_id = $1
            ORDER BY is_accepted DESC, votes DESC, created_at ASC
            LIMIT $2 OFFSET $3",
        )
        .bind(question_id.0)
        .bind(i64::from(pagination.per_page))
        .bind(i64::from(pagination.offset()))
        .map(|row: PgRow| answer_from_row(&row))
        .fetch_all(&self.connection)
        .await
        .map_err(db_error)?;

        Ok(Page {
            items,
            pagination: PageInfo::new(&pagination, total),
        })
    }

    pub async fn get_answers_by_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> Result<Page<Answer>, Error> {
        if !self.user_exists(user_id).await? {
            return Err(Error::not_found("User"));
        }

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM answers WHERE account_id = $1")
            .bind(user_id.0)
            .map(|row: PgRow| row.get("total"))
            .fetch_one(&self.connection)
            .await
            .map_err(db_error)?;

        let items = sqlx::query(
            "SELECT * FROM answers WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3",
        )
        .bind(user_id.0)
        .bind(i64::from(pagination.per_page))
        .bind(i64::from(pagination.offset()))
        .map(|row: PgRow| answer_from_row(&row))
        .fetch_all(&self.connection)
        .await
        .map_err(db_error)?;

        Ok(Page {
            items,
            pagination: PageInfo::new(&pagination, total),
        })
    }

    /// 답변을 저장하고 답변 수를 같은 트랜잭션 안에서 올린다.
    pub async fn add_answer(
        &self,
        question_id: QuestionId,
        new_answer: NewAnswer,
        user_id: UserId,
    ) -> Result<(Answer, Delivery), Error> {
        let mut tx = self.begin().await?;

        let (question_author, title) = sqlx::query(
            "SELECT account_id, title FROM questions WHERE id = $1 FOR UPDATE",
        )
        .bind(question_id.0)
        .map(|row: PgRow| (UserId(row.get("account_id")), row.get::<String, _>("title")))
        .fetch_optional(&mut tx)
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::not_found("Question"))?;

        let answer = sqlx::query(
            "INSERT INTO answers (body, question_id, account_id)
            VALUES ($1, $2, $3)
            RETURNING *",
        )
        .bind(new_answer.body)
        .bind(question_id.0)
        .bind(user_id.0)
        .map(|row: PgRow| answer_from_row(&row))
        .fetch_one(&mut tx)
        .await
        .map_err(db_error)?;

        sqlx::query("UPDATE questions SET answer_count = answer_count + 1 WHERE id = $1")
            .bind(question_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?;

        award_first_post(&mut tx, user_id).await?;

        let draft = NewNotification::for_recipient(
            question_author,
            user_id,
            NotificationKind::Answer,
            "New answer on your question",
            format!("Someone answered your question: {}", title),
            Some(question_id.0),
        );
        let delivery = notify(&mut tx, draft).await?;

        commit(tx).await?;
        event!(
            Level::INFO,
            question_id = question_id.0,
            answer_id = answer.id.0,
            "answer created"
        );
        Ok((answer, delivery))
    }

    pub async fn delete_answer(&self, answer_id: AnswerId, session: &Session) -> Result<(), Error> {
        let mut tx = self.begin().await?;
        let (_, answer) = lock_thread(&mut tx, answer_id).await?;

        if !session.may_manage(answer.author_id) {
            return Err(Error::Forbidden(
                "You can only delete your own answers".to_string(),
            ));
        }

        sqlx::query("DELETE FROM votes WHERE target_type = 'answer' AND target_id = $1")
            .bind(answer_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?;

        sqlx::query(
            "UPDATE questions
            SET answer_count = GREATEST(answer_count - 1, 0),
                accepted_answer_id = CASE WHEN accepted_answer_id = $2 THEN NULL ELSE accepted_answer_id END
            WHERE id = $1",
        )
        .bind(answer.question_id.0)
        .bind(answer_id.0)
        .execute(&mut tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM answers WHERE id = $1")
            .bind(answer_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?;

        commit(tx).await
    }

    /// 답변을 채택한다. 다른 채택은 해제되고 답변 작성자는 평판 보너스를 받는다.
    pub async fn accept_answer(
        &self,
        answer_id: AnswerId,
        session: &Session,
    ) -> Result<(Answer, Delivery), Error> {
        let mut tx = self.begin().await?;
        let (question, answer) = lock_thread(&mut tx, answer_id).await?;
        let plan = acceptance::plan_accept(&question, &answer, session.user_id)?;

        sqlx::query(
            "UPDATE answers SET is_accepted = FALSE
            WHERE question_id = $1 AND is_accepted AND id <> $2",
        )
        .bind(plan.question_id.0)
        .bind(plan.answer_id.0)
        .execute(&mut tx)
        .await
        .map_err(db_error)?;

        let accepted = set_accepted(&mut tx, &plan, true).await?;
        grant_reputation(&mut tx, plan.answer_author, ACCEPTED_ANSWER_REPUTATION).await?;

        let draft = NewNotification::for_recipient(
            plan.answer_author,
            session.user_id,
            NotificationKind::Accepted,
            "Your answer was accepted!",
            "Your answer was marked as the accepted solution",
            Some(plan.question_id.0),
        );
        let delivery = notify(&mut tx, draft).await?;

        commit(tx).await?;
        event!(
            Level::INFO,
            question_id = plan.question_id.0,
            answer_id = plan.answer_id.0,
            replaced = ?plan.previously_accepted,
            "answer accepted"
        );
        Ok((accepted, delivery))
    }

    /// 채택을 취소한다. 이미 준 평판은 되돌리지 않는다.
    pub async fn unaccept_answer(&self, answer_id: AnswerId, session: &Session) -> Result<Answer, Error> {
        let mut tx = self.begin().await?;
        let (question, answer) = lock_thread(&mut tx, answer_id).await?;
        let plan = acceptance::plan_unaccept(&question, &answer, session.user_id)?;

        let unaccepted = set_accepted(&mut tx, &plan, false).await?;
        commit(tx).await?;
        Ok(unaccepted)
    }
}

async fn answer_state(tx: &mut Tx, answer_id: AnswerId) -> Result<AnswerState, Error> {
    sqlx::query("SELECT id, question_id, account_id, is_accepted FROM answers WHERE id = $1")
        .bind(answer_id.0)
        .map(|row: PgRow| AnswerState {
            id: AnswerId(row.get("id")),
            question_id: QuestionId(row.get("question_id")),
            author_id: UserId(row.get("account_id")),
            is_accepted: row.get("is_accepted"),
        })
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::not_found("Answer"))
}

/// 질문을 먼저 잠근 뒤 답변 상태를 다시 읽는다. 같은 질문에 대한 채택 처리는 차례로 진행된다.
async fn lock_thread(tx: &mut Tx, answer_id: AnswerId) -> Result<(QuestionState, AnswerState), Error> {
    let question_id = answer_state(tx, answer_id).await?.question_id;
    let question = lock_question(tx, question_id).await?;
    let answer = answer_state(tx, answer_id).await?;
    Ok((question, answer))
}

async fn lock_question(tx: &mut Tx, question_id: QuestionId) -> Result<QuestionState, Error> {
    sqlx::query(
        "SELECT id, account_id, accepted_answer_id FROM questions WHERE id = $1 FOR UPDATE",
    )
    .bind(question_id.0)
    .map(|row: PgRow| QuestionState {
        id: QuestionId(row.get("id")),
        author_id: UserId(row.get("account_id")),
        accepted_answer_id: row
            .get::<Option<i32>, _>("accepted_answer_id")
            .map(AnswerId),
    })
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error)?
    .ok_or_else(|| Error::not_found("Question"))
}

/// 답변의 채택 플래그와 질문의 accepted_answer_id를 함께 바꾼다.
async fn set_accepted(tx: &mut Tx, plan: &AcceptPlan, accepted: bool) -> Result<Answer, Error> {
    let answer = sqlx::query("UPDATE answers SET is_accepted = $1 WHERE id = $2 RETURNING *")
        .bind(accepted)
        .bind(plan.answer_id.0)
        .map(|row: PgRow| answer_from_row(&row))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

    let accepted_answer_id = if accepted { Some(plan.answer_id.0) } else { None };
    sqlx::query("UPDATE questions SET accepted_answer_id = $1 WHERE id = $2")
        .bind(accepted_answer_id)
        .bind(plan.question_id.0)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    Ok(answer)
}

use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::{Level, event};

use crate::listing::ListingQuery;
use crate::types::{
    account::{Session, UserId},
    pagination::{Page, PageInfo, Pagination},
    question::{NewQuestion, Question, QuestionDetail, QuestionId, QuestionUpdate},
};

use super::account::award_first_post;
use super::{Store, Tx, answer_from_row, commit, db_error, question_from_row};
use handle_errors::Error;

impl Store {
    /// 검색, 태그 필터, 정렬, 페이지를 모두 SQL에서 처리한다.
    pub async fn get_questions(&self, query: &ListingQuery) -> Result<Page<Question>, Error> {
        let pattern = query.search_pattern();
        let unanswered = query.unanswered_only();

        let count_sql = query.count_sql();
        let total: i64 = sqlx::query(&count_sql)
            .bind(pattern.as_deref())
            .bind(&query.tags)
            .bind(unanswered)
            .map(|row: PgRow| row.get("total"))
            .fetch_one(&self.connection)
            .await
            .map_err(db_error)?;

        let select_sql = query.select_sql();
        let items = sqlx::query(&select_sql)
            .bind(pattern.as_deref())
            .bind(&query.tags)
            .bind(unanswered)
            .bind(i64::from(query.pagination.per_page))
            .bind(i64::from(query.pagination.offset()))
            .map(|row: PgRow| question_from_row(&row))
            .fetch_all(&self.connection)
            .await
            .map_err(db_error)?;

        Ok(Page {
            items,
            pagination: PageInfo::new(&query.pagination, total),
        })
    }

    pub async fn get_questions_by_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> Result<Page<Question>, Error> {
        if !self.user_exists(user_id).await? {
            return Err(Error::not_found("User"));
        }

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM questions WHERE account_id = $1")
            .bind(user_id.0)
            .map(|row: PgRow| row.get("total"))
            .fetch_one(&self.connection)
            .await
            .map_err(db_error)?;

        let items = sqlx::query(
            "SELECT * FROM questions WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3",
        )
        .bind(user_id.0)
        .bind(i64::from(pagination.per_page))
        .bind(i64::from(pagination.offset()))
        .map(|row: PgRow| question_from_row(&row))
        .fetch_all(&self.connection)
        .await
        .map_err(db_error)?;

        Ok(Page {
            items,
            pagination: PageInfo::new(&pagination, total),
        })
    }

    /// 질문 하나와 답변을 돌려주고 조회수를 1 올린다.
    pub async fn get_question_detail(&self, question_id: QuestionId) -> Result<QuestionDetail, Error> {
        let question = sqlx::query(
            "UPDATE questions SET views = views + 1
            WHERE id = $1
            RETURNING *",
        )
        .bind(question_id.0)
        .map(|row: PgRow| question_from_row(&row))
        .fetch_optional(&self.connection)
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::not_found("Question"))?;

        let answers = sqlx::query(
            "SELECT * FROM answers WHERE question_id = $1
            ORDER BY is_accepted DESC, votes DESC, created_at ASC",
        )
        .bind(question_id.0)
        .map(|row: PgRow| answer_from_row(&row))
        .fetch_all(&self.connection)
        .await
        .map_err(db_error)?;

        Ok(QuestionDetail { question, answers })
    }

    pub async fn add_question(
        &self,
        new_question: NewQuestion,
        user_id: UserId,
    ) -> Result<Question, Error> {
        let mut tx = self.begin().await?;

        let question = sqlx::query(
            "INSERT INTO questions (title, body, tags, account_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(new_question.title)
        .bind(new_question.body)
        .bind(new_question.tags)
        .bind(user_id.0)
        .map(|row: PgRow| question_from_row(&row))
        .fetch_one(&mut tx)
        .await
        .map_err(db_error)?;

        award_first_post(&mut tx, user_id).await?;
        commit(tx).await?;

        event!(Level::INFO, question_id = question.id.0, "question created");
        Ok(question)
    }

    pub async fn update_question(
        &self,
        question_id: QuestionId,
        update: QuestionUpdate,
        session: &Session,
    ) -> Result<Question, Error> {
        let mut tx = self.begin().await?;
        let owner = question_owner(&mut tx, question_id).await?;
        // 수정은 작성자만 할 수 있다
        if owner != session.user_id {
            return Err(Error::Forbidden(
                "You can only update your own questions".to_string(),
            ));
        }

        let question = sqlx::query(
            "UPDATE questions
            SET title = COALESCE($1, title),
                body = COALESCE($2, body),
                tags = COALESCE($3, tags),
                updated_at = NOW()
            WHERE id = $4
            RETURNING *",
        )
        .bind(update.title)
        .bind(update.body)
        .bind(update.tags)
        .bind(question_id.0)
        .map(|row: PgRow| question_from_row(&row))
        .fetch_one(&mut tx)
        .await
        .map_err(db_error)?;

        commit(tx).await?;
        Ok(question)
    }

    /// 질문과 그 답변, 그리고 둘에 달린 투표를 함께 지운다.
    pub async fn delete_question(&self, question_id: QuestionId, session: &Session) -> Result<(), Error> {
        let mut tx = self.begin().await?;
        let owner = question_owner(&mut tx, question_id).await?;
        if !session.may_manage(owner) {
            return Err(Error::Forbidden(
                "You can only delete your own questions".to_string(),
            ));
        }

        sqlx::query(
            "DELETE FROM votes
            WHERE (target_type = 'question' AND target_id = $1)
               OR (target_type = 'answer'
                   AND target_id IN (SELECT id FROM answers WHERE question_id = $1))",
        )
        .bind(question_id.0)
        .execute(&mut tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(question_id.0)
            .execute(&mut tx)
            .await
            .map_err(db_error)?;

        commit(tx).await?;
        event!(
            Level::INFO,
            question_id = question_id.0,
            by = session.user_id.0,
            "question deleted"
        );
        Ok(())
    }
}

/// 질문 행을 잠그고 작성자를 돌려준다.
pub(super) async fn question_owner(tx: &mut Tx, question_id: QuestionId) -> Result<UserId, Error> {
    sqlx::query("SELECT account_id FROM questions WHERE id = $1 FOR UPDATE")
        .bind(question_id.0)
        .map(|row: PgRow| UserId(row.get("account_id")))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::not_found("Question"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::SortMode;
    use crate::store::testing;

    /// 다른 테스트의 질문과 섞이지 않도록 테스트마다 고유한 태그를 쓴다
    fn unique_tag(name: &str) -> String {
        format!("{}-{}", name, &uuid::Uuid::new_v4().to_simple().to_string()[..8])
    }

    async fn tagged_question(store: &Store, author: UserId, tags: &[&str]) -> QuestionId {
        let new_question = NewQuestion {
            title: "Listing fixture".to_string(),
            body: "body".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        store.add_question(new_question, author).await.unwrap().id
    }

    fn listing(tags: &[&str], sort: SortMode) -> ListingQuery {
        ListingQuery {
            search: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            sort,
            pagination: Pagination::first(10),
        }
    }

    #[tokio::test]
    async fn tag_filter_needs_one_shared_tag() {
        let Some(store) = testing::store().await else {
            return;
        };
        let author = testing::user(&store, "author").await;
        let (react, hooks, css) = (unique_tag("react"), unique_tag("hooks"), unique_tag("css"));
        let id = tagged_question(&store, author, &[&react, &hooks]).await;

        let page = store.get_questions(&listing(&[&css], SortMode::Newest)).await.unwrap();
        assert!(page.items.is_empty());

        let page = store.get_questions(&listing(&[&react], SortMode::Newest)).await.unwrap();
        assert_eq!(page.items.iter().map(|q| q.id).collect::<Vec<_>>(), vec![id]);
    }

    #[tokio::test]
    async fn unanswered_keeps_zero_answer_questions_newest_first() {
        let Some(store) = testing::store().await else {
            return;
        };
        let author = testing::user(&store, "author").await;
        let helper = testing::user(&store, "helper").await;
        let tag = unique_tag("rust");

        let mut ids = Vec::new();
        for answers in [0, 2, 0, 1] {
            let id = tagged_question(&store, author, &[&tag]).await;
            for _ in 0..answers {
                testing::answer(&store, id, helper).await;
            }
            ids.push(id);
        }

        let page = store
            .get_questions(&listing(&[&tag], SortMode::Unanswered))
            .await
            .unwrap();
        assert_eq!(
            page.items.iter().map(|q| q.id).collect::<Vec<_>>(),
            vec![ids[2], ids[0]]
        );
        assert_eq!(page.pagination.total_items, 2);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let Some(store) = testing::store().await else {
            return;
        };
        let author = testing::user(&store, "author").await;
        let tag = unique_tag("search");
        tagged_question(&store, author, &[&tag]).await;

        let mut query = listing(&[&tag], SortMode::Newest);
        query.search = Some("%".to_string());
        assert!(store.get_questions(&query).await.unwrap().items.is_empty());

        query.search = Some("fixture".to_string());
        assert_eq!(store.get_questions(&query).await.unwrap().items.len(), 1);
    }
}

use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::{Level, event};

use crate::listing::contains_pattern;
use crate::types::{
    pagination::{Page, PageInfo, Pagination},
    tag::{NewTag, Tag, TagId},
};

use super::{Store, db_error, tag_from_row};
use handle_errors::Error;

// 태그가 달린 질문 수는 저장하지 않고 매번 센다
const TAG_COLUMNS: &str = "t.id, t.name, t.description, t.created_at,
    (SELECT COUNT(*) FROM questions q WHERE t.name = ANY(q.tags)) AS question_count";

impl Store {
    pub async fn get_tags(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> Result<Page<Tag>, Error> {
        let pattern = search.map(|s| contains_pattern(&s.trim().to_lowercase()));

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM tags
            WHERE $1::TEXT IS NULL OR name LIKE $1",
        )
        .bind(pattern.as_deref())
        .map(|row: PgRow| row.get("total"))
        .fetch_one(&self.connection)
        .await
        .map_err(db_error)?;

        let sql = format!(
            "SELECT {} FROM tags t
            WHERE $1::TEXT IS NULL OR t.name LIKE $1
            ORDER BY question_count DESC, t.name ASC
            LIMIT $2 OFFSET $3",
            TAG_COLUMNS
        );
        let items = sqlx::query(&sql)
            .bind(pattern.as_deref())
            .bind(i64::from(pagination.per_page))
            .bind(i64::from(pagination.offset()))
            .map(|row: PgRow| tag_from_row(&row))
            .fetch_all(&self.connection)
            .await
            .map_err(db_error)?;

        Ok(Page {
            items,
            pagination: PageInfo::new(&pagination, total),
        })
    }

    pub async fn get_tag(&self, tag_id: TagId) -> Result<Tag, Error> {
        let sql = format!("SELECT {} FROM tags t WHERE t.id = $1", TAG_COLUMNS);
        sqlx::query(&sql)
            .bind(tag_id.0)
            .map(|row: PgRow| tag_from_row(&row))
            .fetch_optional(&self.connection)
            .await
            .map_err(db_error)?
            .ok_or_else(|| Error::not_found("Tag"))
    }

    /// 이름은 이미 소문자로 정규화되어 있다.
    pub async fn get_tag_by_name(&self, name: &str) -> Result<Tag, Error> {
        let sql = format!("SELECT {} FROM tags t WHERE t.name = $1", TAG_COLUMNS);
        sqlx::query(&sql)
            .bind(name)
            .map(|row: PgRow| tag_from_row(&row))
            .fetch_optional(&self.connection)
            .await
            .map_err(db_error)?
            .ok_or_else(|| Error::not_found("Tag"))
    }

    pub async fn add_tag(&self, new_tag: NewTag) -> Result<Tag, Error> {
        match sqlx::query(
            "INSERT INTO tags (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, 0::BIGINT AS question_count",
        )
        .bind(new_tag.name)
        .bind(new_tag.description)
        .map(|row: PgRow| tag_from_row(&row))
        .fetch_one(&self.connection)
        .await
        {
            Ok(tag) => {
                event!(Level::INFO, tag = %tag.name, "tag created");
                Ok(tag)
            }
            Err(error) if handle_errors::is_duplicate_key(&error) => {
                Err(Error::Conflict("Tag already exists".to_string()))
            }
            Err(error) => Err(db_error(error)),
        }
    }

    /// 이름이 바뀌어도 질문에 달린 태그 문자열은 그대로 둔다.
    pub async fn update_tag(&self, tag_id: TagId, tag: NewTag) -> Result<Tag, Error> {
        let updated = match sqlx::query(
            "UPDATE tags SET name = $1, description = $2
            WHERE id = $3
            RETURNING id",
        )
        .bind(tag.name)
        .bind(tag.description)
        .bind(tag_id.0)
        .fetch_optional(&self.connection)
        .await
        {
            Ok(row) => row,
            Err(error) if handle_errors::is_duplicate_key(&error) => {
                return Err(Error::Conflict("Tag already exists".to_string()));
            }
            Err(error) => return Err(db_error(error)),
        };

        match updated {
            Some(_) => self.get_tag(tag_id).await,
            None => Err(Error::not_found("Tag")),
        }
    }

    pub async fn delete_tag(&self, tag_id: TagId) -> Result<(), Error> {
        let deleted = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(tag_id.0)
            .execute(&self.connection)
            .await
            .map_err(db_error)?
            .rows_affected();

        if deleted == 0 {
            return Err(Error::not_found("Tag"));
        }
        event!(Level::INFO, tag_id = tag_id.0, "tag deleted");
        Ok(())
    }
}

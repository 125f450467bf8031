use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::{Level, event};

use crate::types::{
    account::UserId,
    notification::{NewNotification, Notification, NotificationFilter, NotificationId},
    pagination::{Page, PageInfo, Pagination},
};

use super::{Delivery, Store, Tx, db_error, notification_from_row};
use handle_errors::Error;

impl Store {
    /// 필터에 맞는 알림 한 페이지와 전체 읽지 않은 알림 수
    pub async fn get_notifications(
        &self,
        user_id: UserId,
        filter: NotificationFilter,
        pagination: Pagination,
    ) -> Result<(Page<Notification>, i64), Error> {
        let kind = filter.kind.map(|kind| kind.as_str());

        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM notifications
            WHERE recipient_id = $1
              AND ($2::BOOLEAN IS NULL OR is_read = $2)
              AND ($3::TEXT IS NULL OR kind = $3)",
        )
        .bind(user_id.0)
        .bind(filter.is_read)
        .bind(kind)
        .map(|row: PgRow| row.get("total"))
        .fetch_one(&self.connection)
        .await
        .map_err(db_error)?;

        let items = sqlx::query(
            "SELECT * FROM notifications
            WHERE recipient_id = $1
              AND ($2::BOOLEAN IS NULL OR is_read = $2)
              AND ($3::TEXT IS NULL OR kind = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5",
        )
        .bind(user_id.0)
        .bind(filter.is_read)
        .bind(kind)
        .bind(i64::from(pagination.per_page))
        .bind(i64::from(pagination.offset()))
        .try_map(|row: PgRow| {
            notification_from_row(&row).map_err(|e| sqlx::Error::Decode(e.to_string().into()))
        })
        .fetch_all(&self.connection)
        .await
        .map_err(db_error)?;

        let unread = self.unread_count(user_id).await?;
        Ok((
            Page {
                items,
                pagination: PageInfo::new(&pagination, total),
            },
            unread,
        ))
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, Error> {
        sqlx::query(
            "SELECT COUNT(*) AS unread FROM notifications
            WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(user_id.0)
        .map(|row: PgRow| row.get("unread"))
        .fetch_one(&self.connection)
        .await
        .map_err(db_error)
    }

    /// 받는 사람이 다르면 존재하지 않는 알림과 똑같이 취급한다.
    pub async fn mark_read(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> Result<(Notification, i64), Error> {
        let notification = sqlx::query(
            "UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND recipient_id = $2
            RETURNING *",
        )
        .bind(notification_id.0)
        .bind(user_id.0)
        .try_map(|row: PgRow| {
            notification_from_row(&row).map_err(|e| sqlx::Error::Decode(e.to_string().into()))
        })
        .fetch_optional(&self.connection)
        .await
        .map_err(db_error)?
        .ok_or_else(|| Error::not_found("Notification"))?;

        let unread = self.unread_count(user_id).await?;
        Ok((notification, unread))
    }

    /// 바뀐 알림 수를 돌려준다.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, Error> {
        sqlx::query(
            "UPDATE notifications SET is_read = TRUE
            WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(user_id.0)
        .execute(&self.connection)
        .await
        .map(|done| done.rows_affected())
        .map_err(db_error)
    }

    pub async fn delete_notification(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> Result<i64, Error> {
        let deleted = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(notification_id.0)
            .bind(user_id.0)
            .execute(&self.connection)
            .await
            .map_err(db_error)?
            .rows_affected();
        if deleted == 0 {
            return Err(Error::not_found("Notification"));
        }

        self.unread_count(user_id).await
    }

    /// 기준 시각보다 오래된 읽은 알림을 지운다.
    pub async fn prune_notifications(&self, older_than: DateTime<Utc>) -> Result<u64, Error> {
        let pruned = sqlx::query("DELETE FROM notifications WHERE is_read AND created_at < $1")
            .bind(older_than)
            .execute(&self.connection)
            .await
            .map_err(db_error)?
            .rows_affected();
        event!(Level::INFO, pruned, "old notifications removed");
        Ok(pruned)
    }
}

/// 알림을 트랜잭션 안에서 저장한다. 실시간 전달은 커밋 뒤에 한다.
pub(super) async fn notify(tx: &mut Tx, draft: Option<NewNotification>) -> Result<Delivery, Error> {
    let draft = match draft {
        Some(draft) => draft,
        None => return Ok(Vec::new()),
    };

    let notification = sqlx::query(
        "INSERT INTO notifications (recipient_id, kind, title, message, related_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *",
    )
    .bind(draft.recipient_id.0)
    .bind(draft.kind.as_str())
    .bind(draft.title)
    .bind(draft.message)
    .bind(draft.related_id)
    .try_map(|row: PgRow| {
        notification_from_row(&row).map_err(|e| sqlx::Error::Decode(e.to_string().into()))
    })
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    let unread: i64 = sqlx::query(
        "SELECT COUNT(*) AS unread FROM notifications
        WHERE recipient_id = $1 AND is_read = FALSE",
    )
    .bind(draft.recipient_id.0)
    .map(|row: PgRow| row.get("unread"))
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    Ok(vec![(notification, unread)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    #[tokio::test]
    async fn mark_all_read_is_idempotent() {
        let Some(store) = testing::store().await else {
            return;
        };
        let asker = testing::user(&store, "asker").await;
        let helper = testing::user(&store, "helper").await;
        let question_id = testing::question(&store, asker).await;
        testing::answer(&store, question_id, helper).await;
        testing::answer(&store, question_id, helper).await;

        assert_eq!(store.unread_count(asker).await.unwrap(), 2);
        assert_eq!(store.mark_all_read(asker).await.unwrap(), 2);
        assert_eq!(store.mark_all_read(asker).await.unwrap(), 0);
        assert_eq!(store.unread_count(asker).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_read_only_reaches_the_recipient() {
        let Some(store) = testing::store().await else {
            return;
        };
        let asker = testing::user(&store, "asker").await;
        let helper = testing::user(&store, "helper").await;
        let question_id = testing::question(&store, asker).await;
        testing::answer(&store, question_id, helper).await;

        let (page, unread) = store
            .get_notifications(asker, NotificationFilter::default(), Pagination::first(10))
            .await
            .unwrap();
        assert_eq!(unread, 1);
        let id = page.items[0].id;

        assert!(matches!(
            store.mark_read(id, helper).await,
            Err(Error::NotFound(_))
        ));
        let (notification, unread) = store.mark_read(id, asker).await.unwrap();
        assert!(notification.is_read);
        assert_eq!(unread, 0);
    }
}

use serde::Serialize;
use std::collections::HashMap;
use tracing::{Level, event};

use crate::realtime::{self, Registry};
use crate::store::Store;
use crate::types::account::Session;
use crate::types::notification::{Notification, NotificationFilter, NotificationId, UnreadCount};
use crate::types::pagination::{PageInfo, extract_pagination};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct NotificationList {
    notifications: Vec<Notification>,
    pagination: PageInfo,
    unread_count: i64,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub notification_id: NotificationId,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarkedAllRead {
    pub updated: u64,
}

/// `isRead`, `type`, `page` 매개변수를 받는다.
pub async fn get_notifications(
    params: HashMap<String, String>,
    session: Session,
    store: Store,
    page_size: u32,
) -> Result<impl warp::Reply, warp::Rejection> {
    let filter = NotificationFilter::from_params(&params)?;
    let pagination = extract_pagination(&params, page_size)?;

    match store
        .get_notifications(session.user_id, filter, pagination)
        .await
    {
        Ok((page, unread_count)) => Ok(super::ok(&NotificationList {
            notifications: page.items,
            pagination: page.pagination,
            unread_count,
        })),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn get_unread_count(
    session: Session,
    store: Store,
) -> Result<impl warp::Reply, warp::Rejection> {
    match store.unread_count(session.user_id).await {
        Ok(unread_count) => Ok(super::ok(&UnreadCount { unread_count })),
        Err(e) => Err(warp::reject::custom(e)),
    }
}

pub async fn mark_read(
    id: i32,
    session: Session,
    store: Store,
    registry: Registry,
) -> Result<impl warp::Reply, warp::Rejection> {
    let user_id = session.user_id;
    match store.mark_read(NotificationId(id), user_id).await {
        Ok((notification, unread_count)) => {
            registry
                .emit(
                    user_id,
                    realtime::NOTIFICATION_MARKED_READ,
                    &MarkedRead {
                        notification_id: notification.id,
                    },
                )
                .await;
            registry.push_unread_count(user_id, unread_count).await;
            Ok(super::respond(
                warp::http::StatusCode::OK,
                &notification,
                Some("Notification marked as read"),
            ))
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

/// 두 번째 호출부터는 바뀌는 알림이 없다.
pub async fn mark_all_read(
    session: Session,
    store: Store,
    registry: Registry,
) -> Result<impl warp::Reply, warp::Rejection> {
    let user_id = session.user_id;
    let updated = store.mark_all_read(user_id).await?;
    event!(Level::DEBUG, user_id = user_id.0, updated, "notifications marked read");

    let unread_count = store.unread_count(user_id).await?;
    registry
        .emit(
            user_id,
            realtime::ALL_NOTIFICATIONS_MARKED_READ,
            &MarkedAllRead { updated },
        )
        .await;
    registry.push_unread_count(user_id, unread_count).await;

    Ok(super::respond(
        warp::http::StatusCode::OK,
        &MarkedAllRead { updated },
        Some("All notifications marked as read"),
    ))
}

pub async fn delete_notification(
    id: i32,
    session: Session,
    store: Store,
    registry: Registry,
) -> Result<impl warp::Reply, warp::Rejection> {
    match store
        .delete_notification(NotificationId(id), session.user_id)
        .await
    {
        Ok(unread_count) => {
            registry.push_unread_count(session.user_id, unread_count).await;
            Ok(super::done("Notification deleted"))
        }
        Err(e) => Err(warp::reject::custom(e)),
    }
}

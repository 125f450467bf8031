use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{Level, event};
use uuid::Uuid;

use crate::types::account::UserId;
use crate::types::notification::{Notification, UnreadCount};

pub const NEW_NOTIFICATION: &str = "new_notification";
pub const UNREAD_COUNT_UPDATE: &str = "unread_count_update";
pub const NOTIFICATION_MARKED_READ: &str = "notification_marked_read";
pub const ALL_NOTIFICATIONS_MARKED_READ: &str = "all_notifications_marked_read";
pub const ERROR: &str = "error";

pub type ConnectionId = Uuid;

#[derive(Serialize, Debug)]
struct Envelope<'a, T: Serialize> {
    event: &'a str,
    data: &'a T,
}

/// 접속 중인 사용자와 전송 채널을 묶어 둔다. 한 사용자가 여러 탭으로 접속할 수 있다.
///
/// 프로세스 안에만 존재하므로 서버를 여러 대 띄우면 다른 인스턴스의 접속에는 보낼 수 없다.
/// 그런 경우 알림은 저장소에 남아 있다가 다음 조회 때 전달된다.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    connections: Arc<RwLock<HashMap<UserId, HashMap<ConnectionId, mpsc::UnboundedSender<String>>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub async fn register(&self, user_id: UserId) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        self.connections
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(connection_id, sender);
        event!(Level::DEBUG, user_id = user_id.0, %connection_id, "connection registered");
        (connection_id, receiver)
    }

    pub async fn unregister(&self, user_id: UserId, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(user_connections) = connections.get_mut(&user_id) {
            user_connections.remove(&connection_id);
            if user_connections.is_empty() {
                connections.remove(&user_id);
            }
        }
        event!(Level::DEBUG, user_id = user_id.0, %connection_id, "connection removed");
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.connections.read().await.contains_key(&user_id)
    }

    pub async fn online_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// 사용자의 모든 접속에 이벤트를 보내고 전달된 접속 수를 돌려준다.
    /// 닫힌 채널은 이 때 정리된다.
    pub async fn emit<T: Serialize>(&self, user_id: UserId, event_name: &str, payload: &T) -> usize {
        let message = match serde_json::to_string(&Envelope {
            event: event_name,
            data: payload,
        }) {
            Ok(message) => message,
            Err(e) => {
                event!(Level::ERROR, "cannot serialize {} event: {:?}", event_name, e);
                return 0;
            }
        };

        let mut connections = self.connections.write().await;
        let Some(user_connections) = connections.get_mut(&user_id) else {
            return 0;
        };
        user_connections.retain(|_, sender| sender.send(message.clone()).is_ok());
        let delivered = user_connections.len();
        if delivered == 0 {
            connections.remove(&user_id);
        }
        delivered
    }

    /// 저장된 알림을 접속 중인 수신자에게 밀어 넣는다. 접속이 없으면 아무것도 하지 않는다.
    pub async fn deliver(&self, notification: &Notification, unread_count: i64) {
        let recipient = notification.recipient_id;
        if self.emit(recipient, NEW_NOTIFICATION, notification).await > 0 {
            self.push_unread_count(recipient, unread_count).await;
        }
    }

    pub async fn deliver_all(&self, notifications: &[(Notification, i64)]) {
        for (notification, unread_count) in notifications {
            self.deliver(notification, *unread_count).await;
        }
    }

    pub async fn push_unread_count(&self, user_id: UserId, unread_count: i64) {
        self.emit(user_id, UNREAD_COUNT_UPDATE, &UnreadCount { unread_count })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::notification::{NotificationId, NotificationKind};
    use chrono::Utc;

    fn notification(recipient: i32) -> Notification {
        Notification {
            id: NotificationId(1),
            recipient_id: UserId(recipient),
            kind: NotificationKind::Vote,
            title: "Your question was upvoted".to_string(),
            message: "Someone upvoted your question".to_string(),
            related_id: Some(5),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_notification_and_unread_count_to_live_connection() {
        let registry = Registry::new();
        let (_, mut receiver) = registry.register(UserId(2)).await;

        registry.deliver(&notification(2), 3).await;

        let first: serde_json::Value =
            serde_json::from_str(&receiver.recv().await.unwrap()).unwrap();
        assert_eq!(first["event"], NEW_NOTIFICATION);
        assert_eq!(first["data"]["type"], "vote");
        assert_eq!(first["data"]["isRead"], false);

        let second: serde_json::Value =
            serde_json::from_str(&receiver.recv().await.unwrap()).unwrap();
        assert_eq!(second["event"], UNREAD_COUNT_UPDATE);
        assert_eq!(second["data"]["unreadCount"], 3);
    }

    #[tokio::test]
    async fn offline_recipient_gets_nothing() {
        let registry = Registry::new();
        let (_, mut receiver) = registry.register(UserId(2)).await;

        registry.deliver(&notification(9), 1).await;

        assert!(receiver.try_recv().is_err());
        assert_eq!(registry.emit(UserId(9), ERROR, &"nope").await, 0);
    }

    #[tokio::test]
    async fn every_tab_of_a_user_receives_events() {
        let registry = Registry::new();
        let (_, mut first) = registry.register(UserId(2)).await;
        let (_, mut second) = registry.register(UserId(2)).await;

        assert_eq!(registry.emit(UserId(2), UNREAD_COUNT_UPDATE, &1).await, 2);
        assert!(first.recv().await.is_some());
        assert!(second.recv().await.is_some());
        assert_eq!(registry.online_count().await, 1);
    }

    #[tokio::test]
    async fn closed_connections_are_pruned() {
        let registry = Registry::new();
        let (_, receiver) = registry.register(UserId(2)).await;
        drop(receiver);

        assert_eq!(registry.emit(UserId(2), UNREAD_COUNT_UPDATE, &1).await, 0);
        assert!(!registry.is_online(UserId(2)).await);
    }

    #[tokio::test]
    async fn unregister_forgets_the_user() {
        let registry = Registry::new();
        let (connection_id, _receiver) = registry.register(UserId(4)).await;
        assert!(registry.is_online(UserId(4)).await);

        registry.unregister(UserId(4), connection_id).await;
        assert!(!registry.is_online(UserId(4)).await);
    }
}

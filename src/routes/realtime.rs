use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{Level, event};
use warp::ws::{Message, WebSocket, Ws};

use super::authentication::{TokenKey, verify_token};
use super::notification::{MarkedAllRead, MarkedRead};
use crate::realtime::{self, Registry};
use crate::store::Store;
use crate::types::account::UserId;
use crate::types::notification::NotificationId;
use handle_errors::Error;

/// 클라이언트가 보내는 명령. 서버 이벤트와 같은 `{ event, data }` 형태다.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientCommand {
    MarkRead {
        #[serde(rename = "notificationId")]
        notification_id: i32,
    },
    MarkAllRead,
}

fn parse_command(text: &str) -> Result<ClientCommand, String> {
    serde_json::from_str(text).map_err(|e| format!("Unknown command: {}", e))
}

#[derive(serde::Serialize, Debug)]
struct ErrorPayload {
    message: String,
}

/// GET /ws?token=.. HTTP API와 같은 토큰으로 인증한 뒤 연결을 올린다.
pub async fn connect(
    ws: Ws,
    params: HashMap<String, String>,
    store: Store,
    registry: Registry,
    key: TokenKey,
) -> Result<impl warp::Reply, warp::Rejection> {
    let token = params
        .get("token")
        .ok_or(Error::Unauthorized)?;
    let session = verify_token(&key, token)?;
    let user_id = session.user_id;

    Ok(ws.on_upgrade(move |socket| client_connection(socket, user_id, store, registry)))
}

async fn client_connection(socket: WebSocket, user_id: UserId, store: Store, registry: Registry) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (connection_id, mut outgoing) = registry.register(user_id).await;
    let online = registry.online_count().await;
    event!(
        Level::INFO,
        user_id = user_id.0,
        %connection_id,
        online,
        "websocket connected"
    );

    // 레지스트리에서 받은 이벤트를 소켓으로 흘려보낸다
    let forward = tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            if let Err(e) = ws_tx.send(Message::text(message)).await {
                event!(Level::WARN, "websocket send failed: {}", e);
                break;
            }
        }
    });

    match store.unread_count(user_id).await {
        Ok(unread_count) => registry.push_unread_count(user_id, unread_count).await,
        Err(e) => event!(Level::ERROR, "cannot load unread count: {}", e),
    }

    while let Some(result) = ws_rx.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                event!(Level::WARN, user_id = user_id.0, "websocket error: {}", e);
                break;
            }
        };
        if message.is_close() {
            break;
        }
        if let Ok(text) = message.to_str() {
            handle_command(text, user_id, &store, &registry).await;
        }
    }

    registry.unregister(user_id, connection_id).await;
    forward.abort();
    let other_tabs = registry.is_online(user_id).await;
    event!(
        Level::INFO,
        user_id = user_id.0,
        %connection_id,
        other_tabs,
        "websocket disconnected"
    );
}

async fn handle_command(text: &str, user_id: UserId, store: &Store, registry: &Registry) {
    let result = match parse_command(text) {
        Ok(ClientCommand::MarkRead { notification_id }) => {
            mark_read(NotificationId(notification_id), user_id, store, registry).await
        }
        Ok(ClientCommand::MarkAllRead) => mark_all_read(user_id, store, registry).await,
        Err(message) => Err(Error::Validation(message)),
    };

    if let Err(e) = result {
        registry
            .emit(
                user_id,
                realtime::ERROR,
                &ErrorPayload {
                    message: e.to_string(),
                },
            )
            .await;
    }
}

async fn mark_read(
    notification_id: NotificationId,
    user_id: UserId,
    store: &Store,
    registry: &Registry,
) -> Result<(), Error> {
    let (notification, unread_count) = store.mark_read(notification_id, user_id).await?;
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
    Ok(())
}

async fn mark_all_read(user_id: UserId, store: &Store, registry: &Registry) -> Result<(), Error> {
    let updated = store.mark_all_read(user_id).await?;
    let unread_count = store.unread_count(user_id).await?;
    registry
        .emit(
            user_id,
            realtime::ALL_NOTIFICATIONS_MARKED_READ,
            &MarkedAllRead { updated },
        )
        .await;
    registry.push_unread_count(user_id, unread_count).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mark_read() {
        assert_eq!(
            parse_command(r#"{"event":"mark_read","data":{"notificationId":12}}"#),
            Ok(ClientCommand::MarkRead { notification_id: 12 })
        );
    }

    #[test]
    fn parses_mark_all_read_without_data() {
        assert_eq!(
            parse_command(r#"{"event":"mark_all_read"}"#),
            Ok(ClientCommand::MarkAllRead)
        );
    }

    #[test]
    fn unknown_events_are_errors() {
        assert!(parse_command(r#"{"event":"subscribe","data":{}}"#).is_err());
        assert!(parse_command("not json").is_err());
    }
}

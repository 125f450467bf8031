use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::types::account::UserId;

use handle_errors::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(pub i32);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Answer,
    Comment,
    Mention,
    Vote,
    Accepted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Answer => "answer",
            NotificationKind::Comment => "comment",
            NotificationKind::Mention => "mention",
            NotificationKind::Vote => "vote",
            NotificationKind::Accepted => "accepted",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "answer" => Ok(NotificationKind::Answer),
            "comment" => Ok(NotificationKind::Comment),
            "mention" => Ok(NotificationKind::Mention),
            "vote" => Ok(NotificationKind::Vote),
            "accepted" => Ok(NotificationKind::Accepted),
            other => Err(Error::Validation(format!(
                "Unknown notification type: {}",
                other
            ))),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// 아직 저장되지 않은 알림
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<i32>,
}

impl NewNotification {
    /// 자기 자신에게는 알림을 보내지 않는다.
    pub fn for_recipient(
        recipient_id: UserId,
        actor_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        related_id: Option<i32>,
    ) -> Option<NewNotification> {
        if recipient_id == actor_id {
            return None;
        }

        Some(NewNotification {
            recipient_id,
            kind,
            title: title.into(),
            message: message.into(),
            related_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    pub is_read: Option<bool>,
    pub kind: Option<NotificationKind>,
}

impl NotificationFilter {
    /// `isRead`, `type` 쿼리 매개변수를 읽는다.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, Error> {
        let is_read = match params.get("isRead").map(|v| v.as_str()) {
            None => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(other) => {
                return Err(Error::Validation(format!(
                    "isRead must be true or false, got {}",
                    other
                )));
            }
        };
        let kind = match params.get("type") {
            Some(kind) => Some(kind.parse()?),
            None => None,
        };

        Ok(NotificationFilter { is_read, kind })
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_notify_yourself() {
        let draft = NewNotification::for_recipient(
            UserId(4),
            UserId(4),
            NotificationKind::Answer,
            "New answer on your question",
            "Someone answered",
            Some(1),
        );
        assert_eq!(draft, None);
    }

    #[test]
    fn drafts_for_other_users() {
        let draft = NewNotification::for_recipient(
            UserId(4),
            UserId(9),
            NotificationKind::Vote,
            "Your question was upvoted",
            "Someone upvoted your question",
            Some(12),
        )
        .unwrap();
        assert_eq!(draft.recipient_id, UserId(4));
        assert_eq!(draft.kind, NotificationKind::Vote);
        assert!(!draft.title.is_empty());
    }

    #[test]
    fn filter_reads_query_parameters() {
        let mut params = HashMap::new();
        params.insert("isRead".to_string(), "false".to_string());
        params.insert("type".to_string(), "accepted".to_string());
        let filter = NotificationFilter::from_params(&params).unwrap();
        assert_eq!(filter.is_read, Some(false));
        assert_eq!(filter.kind, Some(NotificationKind::Accepted));

        params.insert("isRead".to_string(), "maybe".to_string());
        assert!(NotificationFilter::from_params(&params).is_err());
    }
}

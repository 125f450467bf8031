use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::account::UserId;
use crate::types::answer::{Answer, AnswerId};

use handle_errors::Error;

pub const MAX_TAGS: usize = 5;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub body: String,
    pub author_id: UserId,
    pub tags: Vec<String>,
    pub votes: i32,
    pub views: i32,
    pub answer_count: i32,
    pub accepted_answer_id: Option<AnswerId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, Copy, Eq, Hash, Deserialize, PartialEq)]
pub struct QuestionId(pub i32);

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NewQuestion {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// 질문 수정 요청. 비어 있는 필드는 바꾸지 않는다.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct QuestionUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// 질문 상세 보기: 질문과 그 답변들
#[derive(Serialize, Debug, Clone)]
pub struct QuestionDetail {
    pub question: Question,
    pub answers: Vec<Answer>,
}

impl NewQuestion {
    pub fn validate(self) -> Result<NewQuestion, Error> {
        let title = self.title.trim().to_string();
        let body = self.body.trim().to_string();
        if title.is_empty() || body.is_empty() {
            return Err(Error::Validation(
                "Title and body are required".to_string(),
            ));
        }

        Ok(NewQuestion {
            title,
            body,
            tags: normalize_tags(self.tags)?,
        })
    }
}

impl QuestionUpdate {
    pub fn validate(self) -> Result<QuestionUpdate, Error> {
        let title = non_blank(self.title);
        let body = non_blank(self.body);
        let tags = match self.tags {
            Some(tags) => Some(normalize_tags(tags)?),
            None => None,
        };

        Ok(QuestionUpdate { title, body, tags })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 태그를 소문자로 바꾸고 공백과 중복을 제거한다. 태그는 1개 이상 5개 이하여야 한다.
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>, Error> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }

    if normalized.is_empty() {
        return Err(Error::Validation(
            "At least one tag is required".to_string(),
        ));
    }
    if normalized.len() > MAX_TAGS {
        return Err(Error::Validation(format!(
            "A question can have at most {} tags",
            MAX_TAGS
        )));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn tags_are_lowercased_and_deduplicated() {
        let normalized = normalize_tags(tags(&["React", " hooks ", "react", ""])).unwrap();
        assert_eq!(normalized, tags(&["react", "hooks"]));
    }

    #[test]
    fn empty_tag_list_is_a_validation_error() {
        assert!(matches!(
            normalize_tags(tags(&["  "])),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn more_than_five_tags_is_rejected() {
        assert!(normalize_tags(tags(&["a", "b", "c", "d", "e", "f"])).is_err());
        assert!(normalize_tags(tags(&["a", "b", "c", "d", "e"])).is_ok());
    }

    #[test]
    fn new_question_requires_title_and_body() {
        let question = NewQuestion {
            title: "  ".to_string(),
            body: "How do hooks work?".to_string(),
            tags: tags(&["react"]),
        };
        assert!(question.validate().is_err());
    }

    #[test]
    fn blank_update_fields_are_ignored() {
        let update = QuestionUpdate {
            title: Some("   ".to_string()),
            body: Some("new body".to_string()),
            tags: None,
        }
        .validate()
        .unwrap();
        assert_eq!(update.title, None);
        assert_eq!(update.body.as_deref(), Some("new body"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::account::UserId;
use crate::types::question::QuestionId;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: AnswerId,
    pub body: String,
    pub question_id: QuestionId,
    pub author_id: UserId,
    pub votes: i32,
    pub is_accepted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnswerId(pub i32);

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NewAnswer {
    pub body: String,
}

impl NewAnswer {
    pub fn validate(self) -> Result<NewAnswer, handle_errors::Error> {
        let body = self.body.trim().to_string();
        if body.is_empty() {
            return Err(handle_errors::Error::Validation(
                "Answer content is required".to_string(),
            ));
        }
        Ok(NewAnswer { body })
    }
}

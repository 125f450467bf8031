use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::types::account::UserId;

use handle_errors::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoteId(pub i32);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// 데이터베이스에 저장되는 값: 추천 +1, 비추천 -1
    pub fn value(&self) -> i16 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    pub fn from_value(value: i16) -> Self {
        if value > 0 {
            VoteDirection::Up
        } else {
            VoteDirection::Down
        }
    }
}

impl FromStr for VoteDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" | "upvote" => Ok(VoteDirection::Up),
            "down" | "downvote" => Ok(VoteDirection::Down),
            other => Err(Error::Validation(format!(
                "Unknown vote direction: {}",
                other
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Question,
    Answer,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Question => "question",
            TargetType::Answer => "answer",
        }
    }
}

impl FromStr for TargetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question" => Ok(TargetType::Question),
            "answer" => Ok(TargetType::Answer),
            other => Err(Error::Validation(format!(
                "Unknown target type: {}",
                other
            ))),
        }
    }
}

/// 투표 대상: 질문 또는 답변
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct VoteTarget {
    pub target_type: TargetType,
    pub target_id: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: VoteId,
    pub voter_id: UserId,
    #[serde(flatten)]
    pub target: VoteTarget,
    pub direction: VoteDirection,
    /// 이 투표가 작성자 평판에 실제로 더한 값. 평판 하한 때문에 명목 값과 다를 수 있다.
    #[serde(skip)]
    pub reputation_applied: i32,
    pub created_at: DateTime<Utc>,
}

/// POST /votes 본문. 잘못된 값은 Validation 에러로 돌려주기 위해 문자열로 받는다.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewVote {
    pub target_type: String,
    pub target_id: i32,
    pub direction: String,
}

impl NewVote {
    pub fn parse(self) -> Result<(VoteTarget, VoteDirection), Error> {
        let target = VoteTarget {
            target_type: self.target_type.parse()?,
            target_id: self.target_id,
        };
        Ok((target, self.direction.parse()?))
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Created,
    Removed,
    Switched,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub action: VoteAction,
    pub direction: Option<VoteDirection>,
    pub score: i32,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
    pub total_votes: i64,
    pub score: i64,
}

impl VoteCounts {
    pub fn new(upvotes: i64, downvotes: i64) -> Self {
        VoteCounts {
            upvotes,
            downvotes,
            total_votes: upvotes + downvotes,
            score: upvotes - downvotes,
        }
    }
}

/// 내 투표 기록의 한 줄. 답변에 한 투표도 소속 질문 제목을 함께 보여 준다.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteHistoryEntry {
    #[serde(flatten)]
    pub vote: Vote,
    pub question_id: i32,
    pub question_title: String,
}

/// `direction` 쿼리 매개변수. 없으면 두 방향 모두
pub fn history_direction(
    params: &HashMap<String, String>,
) -> Result<Option<VoteDirection>, Error> {
    params.get("direction").map(|d| d.parse()).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_direction_is_optional() {
        let mut params = HashMap::new();
        assert_eq!(history_direction(&params).unwrap(), None);
        params.insert("direction".to_string(), "Upvote".to_string());
        assert_eq!(history_direction(&params).unwrap(), Some(VoteDirection::Up));
        params.insert("direction".to_string(), "sideways".to_string());
        assert!(matches!(history_direction(&params), Err(Error::Validation(_))));
    }

    #[test]
    fn history_entry_flattens_the_vote() {
        let entry = VoteHistoryEntry {
            vote: Vote {
                id: VoteId(4),
                voter_id: UserId(2),
                target: VoteTarget {
                    target_type: TargetType::Answer,
                    target_id: 9,
                },
                direction: VoteDirection::Down,
                reputation_applied: -2,
                created_at: chrono::Utc::now(),
            },
            question_id: 3,
            question_title: "Lifetimes".to_string(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["targetType"], "answer");
        assert_eq!(value["direction"], "down");
        assert_eq!(value["questionTitle"], "Lifetimes");
        assert!(value.get("reputationApplied").is_none());
    }

    #[test]
    fn malformed_target_type_is_a_validation_error() {
        let vote = NewVote {
            target_type: "comment".to_string(),
            target_id: 3,
            direction: "up".to_string(),
        };
        assert!(matches!(vote.parse(), Err(Error::Validation(_))));
    }

    #[test]
    fn new_vote_accepts_capitalized_direction_names() {
        let vote = NewVote {
            target_type: "answer".to_string(),
            target_id: 7,
            direction: "Downvote".to_string(),
        };
        let (target, direction) = vote.parse().unwrap();
        assert_eq!(target.target_type, TargetType::Answer);
        assert_eq!(target.target_id, 7);
        assert_eq!(direction, VoteDirection::Down);
    }

    #[test]
    fn counts_derive_total_and_score() {
        let counts = VoteCounts::new(5, 2);
        assert_eq!(counts.total_votes, 7);
        assert_eq!(counts.score, 3);
    }
}

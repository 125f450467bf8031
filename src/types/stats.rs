use serde::Serialize;

/// 관리자 화면의 전체 현황
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub users: i64,
    pub admins: i64,
    pub questions: i64,
    pub unanswered_questions: i64,
    pub answers: i64,
    pub accepted_answers: i64,
    pub votes: i64,
    pub tags: i64,
}

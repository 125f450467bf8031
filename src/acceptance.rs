use crate::types::account::UserId;
use crate::types::answer::AnswerId;
use crate::types::question::QuestionId;

use handle_errors::Error;

/// 채택 처리에 필요한 질문의 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionState {
    pub id: QuestionId,
    pub author_id: UserId,
    pub accepted_answer_id: Option<AnswerId>,
}

/// 채택 처리에 필요한 답변의 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerState {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub author_id: UserId,
    pub is_accepted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptPlan {
    pub question_id: QuestionId,
    pub answer_id: AnswerId,
    pub answer_author: UserId,
    pub previously_accepted: Option<AnswerId>,
}

fn guard(question: &QuestionState, answer: &AnswerState, actor: UserId) -> Result<(), Error> {
    if actor != question.author_id {
        return Err(Error::Forbidden(
            "Only the question author can accept answers".to_string(),
        ));
    }
    if answer.question_id != question.id {
        return Err(Error::not_found("Answer"));
    }
    Ok(())
}

pub fn plan_accept(
    question: &QuestionState,
    answer: &AnswerState,
    actor: UserId,
) -> Result<AcceptPlan, Error> {
    guard(question, answer, actor)?;
    if answer.is_accepted {
        return Err(Error::Validation("Answer is already accepted".to_string()));
    }

    Ok(AcceptPlan {
        question_id: question.id,
        answer_id: answer.id,
        answer_author: answer.author_id,
        previously_accepted: question.accepted_answer_id.filter(|id| *id != answer.id),
    })
}

pub fn plan_unaccept(
    question: &QuestionState,
    answer: &AnswerState,
    actor: UserId,
) -> Result<AcceptPlan, Error> {
    guard(question, answer, actor)?;
    if !answer.is_accepted {
        return Err(Error::Validation(
            "Answer is not currently accepted".to_string(),
        ));
    }

    Ok(AcceptPlan {
        question_id: question.id,
        answer_id: answer.id,
        answer_author: answer.author_id,
        previously_accepted: Some(answer.id),
    })
}

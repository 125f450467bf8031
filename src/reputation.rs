use crate::ledger::VoteTransition;
use crate::types::account::UserId;
use crate::types::badge::BadgeId;
use crate::types::vote::VoteDirection;

pub const UPVOTE_REPUTATION: i32 = 10;
pub const DOWNVOTE_REPUTATION: i32 = -2;
pub const ACCEPTED_ANSWER_REPUTATION: i32 = 15;

/// 평판 기준으로 주어지는 배지
const REPUTATION_BADGES: [(i32, BadgeId); 2] = [
    (50, BadgeId::FiftyUpvotes),
    (100, BadgeId::HundredUpvotes),
];

fn standing(direction: Option<VoteDirection>) -> i32 {
    match direction {
        Some(VoteDirection::Up) => UPVOTE_REPUTATION,
        Some(VoteDirection::Down) => DOWNVOTE_REPUTATION,
        None => 0,
    }
}

/// 투표 하나를 정산한 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteSettlement {
    /// 정산 후 작성자 평판
    pub reputation: i32,
    /// 남아 있는 투표가 실제로 더한 값. 투표 행에 기록했다가 다음 정산에서 되돌린다.
    pub applied: i32,
}

/// 투표 상태가 바뀐 뒤 작성자의 평판을 정산한다.
///
/// 이전 투표가 실제로 더한 값(`recorded`)을 먼저 되돌리고, 남는 투표의
/// 명목 값(+10, -2)을 하한 0 아래로 내려가지 않게 적용한다. 자기 글에 한
/// 투표는 평판을 바꾸지 않는다.
pub fn settle_vote(
    current: i32,
    recorded: i32,
    author: UserId,
    voter: UserId,
    transition: &VoteTransition,
) -> VoteSettlement {
    let reverted = clamp(current, -recorded);
    let nominal = if author == voter {
        0
    } else {
        standing(transition.next)
    };
    let reputation = clamp(reverted, nominal);
    VoteSettlement {
        reputation,
        applied: reputation - reverted,
    }
}

/// 평판은 0 아래로 내려가지 않는다.
pub fn clamp(current: i32, delta: i32) -> i32 {
    current.saturating_add(delta).max(0)
}

/// 새 평판에 도달해 받게 되는 배지 중 아직 없는 것만 돌려준다.
pub fn badges_earned(reputation: i32, held: &[BadgeId]) -> Vec<BadgeId> {
    REPUTATION_BADGES
        .iter()
        .filter(|(threshold, badge)| reputation >= *threshold && !held.contains(badge))
        .map(|(_, badge)| *badge)
        .collect()
}

pub fn first_post_badge(held: &[BadgeId]) -> Option<BadgeId> {
    if held.contains(&BadgeId::FirstPost) {
        None
    } else {
        Some(BadgeId::FirstPost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transition;

    use VoteDirection::{Down, Up};

    const AUTHOR: UserId = UserId(1);
    const VOTER: UserId = UserId(2);

    /// 평판이 넉넉한 작성자에게 투표 상태 변화를 차례로 적용한다
    fn replay(start: i32, author: UserId, steps: &[VoteTransition]) -> (i32, i32) {
        let (mut reputation, mut recorded) = (start, 0);
        for step in steps {
            let settled = settle_vote(reputation, recorded, author, VOTER, step);
            reputation = settled.reputation;
            recorded = settled.applied;
        }
        (reputation, recorded)
    }

    #[test]
    fn upvote_and_downvote_values() {
        assert_eq!(replay(100, AUTHOR, &[transition(None, Up)]), (110, 10));
        assert_eq!(replay(100, AUTHOR, &[transition(None, Down)]), (98, -2));
    }

    #[test]
    fn toggles_and_switches_reverse_the_previous_vote() {
        assert_eq!(
            replay(100, AUTHOR, &[transition(None, Up), transition(Some(Up), Up)]),
            (100, 0)
        );
        assert_eq!(
            replay(100, AUTHOR, &[transition(None, Down), transition(Some(Down), Down)]),
            (100, 0)
        );
        assert_eq!(
            replay(100, AUTHOR, &[transition(None, Down), transition(Some(Down), Up)]),
            (110, 10)
        );
        assert_eq!(
            replay(100, AUTHOR, &[transition(None, Up), transition(Some(Up), Down)]),
            (98, -2)
        );
    }

    #[test]
    fn self_votes_never_change_reputation() {
        for existing in [None, Some(Up), Some(Down)] {
            for incoming in [Up, Down] {
                let t = transition(existing, incoming);
                assert_eq!(settle_vote(7, 0, VOTER, VOTER, &t), VoteSettlement {
                    reputation: 7,
                    applied: 0,
                });
            }
        }
    }

    #[test]
    fn clamped_downvote_is_undone_exactly() {
        let down = transition(None, Down);
        let toggle = transition(Some(Down), Down);
        let mut reputation = 0;
        for _ in 0..50 {
            let cast = settle_vote(reputation, 0, AUTHOR, VOTER, &down);
            assert_eq!(cast, VoteSettlement { reputation: 0, applied: 0 });
            reputation = settle_vote(cast.reputation, cast.applied, AUTHOR, VOTER, &toggle).reputation;
        }
        assert_eq!(reputation, 0);

        // 평판 1에서의 비추천은 1만 깎고, 취소하면 1만 돌려준다
        let cast = settle_vote(1, 0, AUTHOR, VOTER, &down);
        assert_eq!(cast, VoteSettlement { reputation: 0, applied: -1 });
        assert_eq!(settle_vote(0, cast.applied, AUTHOR, VOTER, &toggle).reputation, 1);
    }

    #[test]
    fn reputation_floor_is_zero() {
        let mut reputation = 3;
        for _ in 0..10 {
            reputation = clamp(reputation, DOWNVOTE_REPUTATION);
            assert!(reputation >= 0);
        }
        assert_eq!(reputation, 0);
        assert_eq!(clamp(0, UPVOTE_REPUTATION), 10);
    }

    #[test]
    fn upvote_scenario_from_five_to_fifteen() {
        assert_eq!(replay(5, AUTHOR, &[transition(None, Up)]), (15, 10));
    }

    #[test]
    fn badges_are_awarded_once_per_threshold() {
        assert!(badges_earned(49, &[]).is_empty());
        assert_eq!(badges_earned(50, &[]), vec![BadgeId::FiftyUpvotes]);
        assert_eq!(
            badges_earned(120, &[]),
            vec![BadgeId::FiftyUpvotes, BadgeId::HundredUpvotes]
        );
        assert_eq!(
            badges_earned(120, &[BadgeId::FiftyUpvotes]),
            vec![BadgeId::HundredUpvotes]
        );
        assert!(badges_earned(120, &[BadgeId::FiftyUpvotes, BadgeId::HundredUpvotes]).is_empty());
    }

    #[test]
    fn first_post_badge_is_idempotent() {
        assert_eq!(first_post_badge(&[]), Some(BadgeId::FirstPost));
        assert_eq!(first_post_badge(&[BadgeId::FirstPost]), None);
    }
}

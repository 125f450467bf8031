use crate::types::vote::{VoteAction, VoteDirection};

/// (투표자, 대상) 쌍 하나에 대한 투표 상태 변화
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub action: VoteAction,
    pub previous: Option<VoteDirection>,
    pub next: Option<VoteDirection>,
    pub score_delta: i32,
}

fn score_of(direction: Option<VoteDirection>) -> i32 {
    direction.map_or(0, |d| i32::from(d.value()))
}

/// 기존 투표와 새로 들어온 투표로 다음 상태와 점수 변화량을 정한다.
///
/// 같은 방향을 다시 누르면 투표가 취소되고, 반대 방향이면 방향만 바뀐다.
pub fn transition(existing: Option<VoteDirection>, incoming: VoteDirection) -> VoteTransition {
    let (action, next) = match existing {
        None => (VoteAction::Created, Some(incoming)),
        Some(current) if current == incoming => (VoteAction::Removed, None),
        Some(_) => (VoteAction::Switched, Some(incoming)),
    };

    VoteTransition {
        action,
        previous: existing,
        next,
        score_delta: score_of(next) - score_of(existing),
    }
}

/// 저장된 투표를 직접 지울 때의 상태 변화
pub fn removal(existing: VoteDirection) -> VoteTransition {
    VoteTransition {
        action: VoteAction::Removed,
        previous: Some(existing),
        next: None,
        score_delta: -score_of(Some(existing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use VoteDirection::{Down, Up};

    /// 저장소 없이 규칙만 검사하기 위한 장부
    #[derive(Default)]
    struct Ledger {
        votes: HashMap<(i32, i32), VoteDirection>,
        scores: HashMap<i32, i32>,
    }

    impl Ledger {
        fn cast(&mut self, voter: i32, target: i32, direction: VoteDirection) -> VoteTransition {
            let t = transition(self.votes.get(&(voter, target)).copied(), direction);
            match t.next {
                Some(next) => {
                    self.votes.insert((voter, target), next);
                }
                None => {
                    self.votes.remove(&(voter, target));
                }
            }
            *self.scores.entry(target).or_insert(0) += t.score_delta;
            t
        }

        fn score(&self, target: i32) -> i32 {
            self.scores.get(&target).copied().unwrap_or(0)
        }
    }

    #[test]
    fn first_vote_creates_with_unit_delta() {
        assert_eq!(transition(None, Up).score_delta, 1);
        assert_eq!(transition(None, Down).score_delta, -1);
        assert_eq!(transition(None, Up).action, VoteAction::Created);
    }

    #[test]
    fn same_direction_toggles_off() {
        let t = transition(Some(Up), Up);
        assert_eq!(t.action, VoteAction::Removed);
        assert_eq!(t.next, None);
        assert_eq!(t.score_delta, -1);
        assert_eq!(transition(Some(Down), Down).score_delta, 1);
    }

    #[test]
    fn switching_moves_score_by_two() {
        let t = transition(Some(Down), Up);
        assert_eq!(t.action, VoteAction::Switched);
        assert_eq!(t.next, Some(Up));
        assert_eq!(t.score_delta, 2);
        assert_eq!(transition(Some(Up), Down).score_delta, -2);
    }

    #[test]
    fn removal_reverses_the_stored_vote() {
        assert_eq!(removal(Up).score_delta, -1);
        assert_eq!(removal(Down).score_delta, 1);
    }

    #[test]
    fn repeating_a_vote_leaves_no_trace() {
        for direction in [Up, Down] {
            let mut ledger = Ledger::default();
            ledger.cast(1, 10, direction);
            ledger.cast(1, 10, direction);
            assert_eq!(ledger.score(10), 0);
            assert!(ledger.votes.is_empty());
        }
    }

    #[test]
    fn at_most_one_vote_per_voter_and_target() {
        let mut ledger = Ledger::default();
        let sequence = [Up, Down, Down, Up, Up, Down, Up, Up, Up, Down];
        for (i, direction) in sequence.iter().enumerate() {
            let voter = (i % 3) as i32;
            ledger.cast(voter, 10, *direction);
            ledger.cast(voter, 11, *direction);
        }

        // 장부의 점수는 남아 있는 투표의 합과 항상 같다
        for target in [10, 11] {
            let expected: i32 = ledger
                .votes
                .iter()
                .filter(|((_, t), _)| *t == target)
                .map(|(_, d)| i32::from(d.value()))
                .sum();
            assert_eq!(ledger.score(target), expected);
        }
        assert!(ledger.votes.len() <= 6);
    }

    #[test]
    fn switch_is_exactly_two_relative_to_before() {
        let mut ledger = Ledger::default();
        ledger.cast(2, 5, Up);
        ledger.cast(3, 5, Up);
        let before = ledger.score(5);
        ledger.cast(2, 5, Down);
        assert_eq!(ledger.score(5), before - 2);
    }
}

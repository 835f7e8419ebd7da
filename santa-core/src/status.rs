use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{GameError, RoomStatus};

/// Outcome of a requested status change. A refused-but-harmless request is
/// not an error, the caller just surfaces the warning.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Transition {
    Moved { from: RoomStatus, to: RoomStatus },
    Ignored(InvalidStateTransition),
}

impl Transition {
    pub fn status(&self) -> RoomStatus {
        match self {
            Transition::Moved { to, .. } => *to,
            Transition::Ignored(warning) => warning.current,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("room is already {current}, cannot move to {requested}")]
pub struct InvalidStateTransition {
    pub current: RoomStatus,
    pub requested: RoomStatus,
}

pub fn can_predict(status: RoomStatus) -> bool {
    matches!(status, RoomStatus::Predicting)
}

/// Warning for a guess that arrives outside `predicting`; `None` when guesses
/// are open.
pub fn prediction_refusal(status: RoomStatus) -> Option<InvalidStateTransition> {
    if can_predict(status) {
        return None;
    }
    let warning = InvalidStateTransition {
        current: status,
        requested: RoomStatus::Predicting,
    };
    warn!(%warning, "prediction ignored");
    Some(warning)
}

pub fn lock(status: RoomStatus) -> Transition {
    match status {
        RoomStatus::Predicting => Transition::Moved {
            from: status,
            to: RoomStatus::Locked,
        },
        RoomStatus::Locked | RoomStatus::Results => ignored(status, RoomStatus::Locked),
    }
}

pub fn reveal(status: RoomStatus, has_assignment: bool) -> Result<Transition, GameError> {
    if status == RoomStatus::Results {
        return Ok(ignored(status, RoomStatus::Results));
    }
    if !has_assignment {
        return Err(GameError::NoAssignmentYet);
    }
    Ok(Transition::Moved {
        from: status,
        to: RoomStatus::Results,
    })
}

fn ignored(current: RoomStatus, requested: RoomStatus) -> Transition {
    let warning = InvalidStateTransition { current, requested };
    warn!(%warning, "status change ignored");
    Transition::Ignored(warning)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_predicting_accepts_guesses() {
        assert!(can_predict(RoomStatus::Predicting));
        assert!(!can_predict(RoomStatus::Locked));
        assert!(!can_predict(RoomStatus::Results));
    }

    #[test]
    fn late_guesses_get_a_warning() {
        assert_eq!(prediction_refusal(RoomStatus::Predicting), None);
        assert_eq!(
            prediction_refusal(RoomStatus::Locked),
            Some(InvalidStateTransition {
                current: RoomStatus::Locked,
                requested: RoomStatus::Predicting,
            })
        );
    }

    #[test]
    fn lock_moves_forward_once() {
        assert_eq!(
            lock(RoomStatus::Predicting),
            Transition::Moved {
                from: RoomStatus::Predicting,
                to: RoomStatus::Locked
            }
        );

        let again = lock(RoomStatus::Locked);
        assert_eq!(
            again,
            Transition::Ignored(InvalidStateTransition {
                current: RoomStatus::Locked,
                requested: RoomStatus::Locked,
            })
        );
        assert_eq!(again.status(), RoomStatus::Locked);

        // never backwards
        assert_eq!(lock(RoomStatus::Results).status(), RoomStatus::Results);
    }

    #[test]
    fn reveal_needs_an_assignment() {
        assert_eq!(
            reveal(RoomStatus::Locked, false),
            Err(GameError::NoAssignmentYet)
        );
        assert_eq!(
            reveal(RoomStatus::Predicting, false),
            Err(GameError::NoAssignmentYet)
        );
    }

    #[test]
    fn reveal_may_skip_lock() {
        let moved = reveal(RoomStatus::Predicting, true).unwrap();
        assert_eq!(
            moved,
            Transition::Moved {
                from: RoomStatus::Predicting,
                to: RoomStatus::Results
            }
        );
    }

    #[test]
    fn second_reveal_is_a_warning() {
        let again = reveal(RoomStatus::Results, true).unwrap();
        assert!(matches!(again, Transition::Ignored(_)));
        assert_eq!(again.status(), RoomStatus::Results);
    }
}

pub mod assignment;
pub mod predictions;
pub mod scoring;
pub mod status;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub use assignment::{generate, redraw, DrawMode, ManualViolation};
pub use predictions::{for_user, progress, record, Progress, Recorded};
pub use scoring::{score, Leaderboard, PredictionOutcome, Standing};
pub use status::{
    can_predict, lock, prediction_refusal, reveal, InvalidStateTransition, Transition,
};

pub type ParticipantId = String;

/// Real pairing of a room, giver -> receiver.
pub type Assignment = BTreeMap<ParticipantId, ParticipantId>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub is_admin: bool,
    pub joined_at: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Predicting,
    Locked,
    Results,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RoomStatus::Predicting => "predicting",
            RoomStatus::Locked => "locked",
            RoomStatus::Results => "results",
        })
    }
}

/// One participant's guess that `predicted_giver` gifts `predicted_receiver`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prediction {
    pub user: ParticipantId,
    pub predicted_giver: ParticipantId,
    pub predicted_receiver: ParticipantId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("need at least 2 participants, got {count}")]
    InsufficientParticipants { count: usize },
    #[error("participant {0} listed twice")]
    DuplicateParticipant(ParticipantId),
    #[error("no valid draw found after {attempts} attempts")]
    UnsolvableAssignment { attempts: usize },
    #[error("invalid manual assignment ({violation}): {}", .participants.join(", "))]
    InvalidManualAssignment {
        violation: ManualViolation,
        participants: Vec<ParticipantId>,
    },
    #[error("no assignment has been drawn yet")]
    NoAssignmentYet,
    #[error("participant {0} not in room")]
    UnknownParticipant(ParticipantId),
}

pub(crate) fn participant_name<'a>(participants: &'a [Participant], id: &'a str) -> &'a str {
    participants
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.name.as_str())
        .unwrap_or(id)
}

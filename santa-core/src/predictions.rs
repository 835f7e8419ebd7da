//! A room's guesses, at most one per (user, receiver).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    prediction_refusal, GameError, InvalidStateTransition, Participant, ParticipantId,
    Prediction, RoomStatus,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub required: usize,
    /// Every participant has a guessed giver.
    pub submitted: bool,
}

#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Saved,
    /// The room no longer takes guesses; nothing was written.
    Ignored(InvalidStateTransition),
}

/// Insert `prediction`, replacing the user's earlier guess for the same receiver.
pub fn record(
    book: &mut Vec<Prediction>,
    status: RoomStatus,
    participants: &[Participant],
    prediction: Prediction,
) -> Result<Recorded, GameError> {
    if let Some(warning) = prediction_refusal(status) {
        return Ok(Recorded::Ignored(warning));
    }

    for id in [
        &prediction.user,
        &prediction.predicted_giver,
        &prediction.predicted_receiver,
    ] {
        if !participants.iter().any(|p| &p.id == id) {
            return Err(GameError::UnknownParticipant(id.clone()));
        }
    }

    let slot = book.iter().position(|p| {
        p.user == prediction.user && p.predicted_receiver == prediction.predicted_receiver
    });
    match slot {
        Some(index) => book[index].predicted_giver = prediction.predicted_giver,
        None => book.push(prediction),
    }
    Ok(Recorded::Saved)
}

pub fn progress(book: &[Prediction], participants: &[Participant], user: &str) -> Progress {
    let completed = book.iter().filter(|p| p.user == user).count();
    let required = participants.len();
    Progress {
        completed,
        required,
        submitted: completed == required,
    }
}

/// The user's guesses as receiver -> giver.
pub fn for_user(book: &[Prediction], user: &str) -> BTreeMap<ParticipantId, ParticipantId> {
    book.iter()
        .filter(|p| p.user == user)
        .map(|p| (p.predicted_receiver.clone(), p.predicted_giver.clone()))
        .collect()
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::{participant_name, Assignment, Participant, ParticipantId, Prediction};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictionOutcome {
    pub predicted_giver: ParticipantId,
    pub predicted_receiver: ParticipantId,
    pub giver_name: String,
    pub receiver_name: String,
    pub correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Standing {
    pub participant: ParticipantId,
    pub name: String,
    pub score: usize,
    pub predictions: Vec<PredictionOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Leaderboard {
    /// Highest score first, ties by name.
    pub ranking: Vec<Standing>,
    /// Names of everyone sharing the top score.
    pub winners: Vec<String>,
}

impl Leaderboard {
    pub fn standing(&self, participant: &str) -> Option<&Standing> {
        self.ranking.iter().find(|s| s.participant == participant)
    }
}

/// Score every participant's guesses against the real assignment.
///
/// A guess is correct when the guessed giver really gives to the guessed
/// receiver. Participants without guesses still rank, with zero points.
pub fn score(
    participants: &[Participant],
    assignment: &Assignment,
    predictions: &[Prediction],
) -> Leaderboard {
    let mut standings: HashMap<&str, Standing> = participants
        .iter()
        .map(|p| {
            (
                p.id.as_str(),
                Standing {
                    participant: p.id.clone(),
                    name: p.name.clone(),
                    score: 0,
                    predictions: Vec::new(),
                },
            )
        })
        .collect();

    for prediction in predictions {
        let Some(standing) = standings.get_mut(prediction.user.as_str()) else {
            debug!(user = %prediction.user, "ignoring prediction from outside the room");
            continue;
        };

        let correct = assignment.get(&prediction.predicted_giver) == Some(&prediction.predicted_receiver);
        if correct {
            standing.score += 1;
        }
        standing.predictions.push(PredictionOutcome {
            predicted_giver: prediction.predicted_giver.clone(),
            predicted_receiver: prediction.predicted_receiver.clone(),
            giver_name: participant_name(participants, &prediction.predicted_giver).to_string(),
            receiver_name: participant_name(participants, &prediction.predicted_receiver)
                .to_string(),
            correct,
        });
    }

    let mut ranking: Vec<Standing> = standings.into_values().collect();
    ranking.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.participant.cmp(&b.participant))
    });

    let top = ranking.first().map(|s| s.score);
    let winners = ranking
        .iter()
        .take_while(|s| Some(s.score) == top)
        .map(|s| s.name.clone())
        .collect();

    Leaderboard { ranking, winners }
}

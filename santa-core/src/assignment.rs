//! Drawing the real giver -> receiver pairing of a room.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, warn};

use crate::{Assignment, GameError, Participant, ParticipantId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawMode {
    Random,
    /// Organizer-picked pairing, receiver -> giver, one entry per participant.
    Manual(HashMap<ParticipantId, ParticipantId>),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ManualViolation {
    UnknownParticipant,
    MissingReceiver,
    RepeatedGiver,
    SelfGift,
}

impl fmt::Display for ManualViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ManualViolation::UnknownParticipant => "not in room",
            ManualViolation::MissingReceiver => "nobody gives to",
            ManualViolation::RepeatedGiver => "gives more than once",
            ManualViolation::SelfGift => "gives to themselves",
        })
    }
}

/// Produce a full assignment for `participants`.
///
/// Random mode pairs two shuffled sequences and repairs rejected positions by
/// reshuffling the receivers still available. A receiver is rejected when it is
/// the giver, or (rooms of 3+) when the reverse pair is already in the draw.
/// The whole draw gets `N²` repairs/restarts before giving up; a pair of
/// participants always swaps.
pub fn generate<R: Rng + ?Sized>(
    participants: &[Participant],
    mode: &DrawMode,
    rng: &mut R,
) -> Result<Assignment, GameError> {
    let ids = participant_ids(participants)?;
    match mode {
        DrawMode::Random => {
            let budget = ids.len() * ids.len();
            random_draw(&ids, budget, rng)
        }
        DrawMode::Manual(givers) => manual_draw(&ids, givers),
    }
}

/// Replace `existing` with a fresh draw. On failure `existing` is left as it was.
pub fn redraw<R: Rng + ?Sized>(
    existing: &mut Assignment,
    participants: &[Participant],
    mode: &DrawMode,
    rng: &mut R,
) -> Result<(), GameError> {
    *existing = generate(participants, mode, rng)?;
    Ok(())
}

fn participant_ids(participants: &[Participant]) -> Result<Vec<ParticipantId>, GameError> {
    if participants.len() < 2 {
        return Err(GameError::InsufficientParticipants {
            count: participants.len(),
        });
    }

    let mut seen = BTreeSet::new();
    for participant in participants {
        if !seen.insert(participant.id.as_str()) {
            return Err(GameError::DuplicateParticipant(participant.id.clone()));
        }
    }

    Ok(participants.iter().map(|p| p.id.clone()).collect())
}

fn random_draw<R: Rng + ?Sized>(
    ids: &[ParticipantId],
    budget: usize,
    rng: &mut R,
) -> Result<Assignment, GameError> {
    if let [first, second] = ids {
        // Two people can only swap.
        return Ok(Assignment::from([
            (first.clone(), second.clone()),
            (second.clone(), first.clone()),
        ]));
    }

    let mut attempts = 0;

    'draw: loop {
        let mut givers = ids.to_vec();
        let mut receivers = ids.to_vec();
        givers.shuffle(rng);
        receivers.shuffle(rng);

        let mut draw = Assignment::new();
        for (position, giver) in givers.into_iter().enumerate() {
            // `receivers` only holds the ones nobody picked yet.
            let mut pick = 0;
            while !acceptable(&giver, &receivers[pick], &draw) {
                attempts += 1;
                if attempts > budget {
                    warn!(participants = ids.len(), budget, "draw retry budget exhausted");
                    return Err(GameError::UnsolvableAssignment { attempts: budget });
                }
                if !receivers.iter().any(|r| acceptable(&giver, r, &draw)) {
                    debug!(position, attempts, "dead end, restarting draw");
                    continue 'draw;
                }
                receivers.shuffle(rng);
                pick = position % receivers.len();
            }
            let receiver = receivers.remove(pick);
            draw.insert(giver, receiver);
        }

        debug!(participants = ids.len(), attempts, "draw complete");
        return Ok(draw);
    }
}

/// Rooms of 3+ only: a self-gift or the reverse of a pair already drawn is refused.
fn acceptable(giver: &str, receiver: &str, draw: &Assignment) -> bool {
    giver != receiver && !draw.get(receiver).is_some_and(|back| back == giver)
}

fn manual_draw(
    ids: &[ParticipantId],
    givers: &HashMap<ParticipantId, ParticipantId>,
) -> Result<Assignment, GameError> {
    let room: BTreeSet<&str> = ids.iter().map(String::as_str).collect();

    let unknown: BTreeSet<&str> = givers
        .iter()
        .flat_map(|(receiver, giver)| [receiver.as_str(), giver.as_str()])
        .filter(|id| !room.contains(id))
        .collect();
    reject(ManualViolation::UnknownParticipant, unknown)?;

    let missing = ids
        .iter()
        .map(String::as_str)
        .filter(|id| !givers.contains_key(*id));
    reject(ManualViolation::MissingReceiver, missing)?;

    // Receivers now match the room exactly, so N distinct givers means a bijection.
    let mut gifts_per_giver: BTreeMap<&str, usize> = BTreeMap::new();
    for giver in givers.values() {
        *gifts_per_giver.entry(giver.as_str()).or_default() += 1;
    }
    if gifts_per_giver.len() != ids.len() {
        let repeated = gifts_per_giver
            .into_iter()
            .filter(|(_, gifts)| *gifts > 1)
            .map(|(giver, _)| giver);
        reject(ManualViolation::RepeatedGiver, repeated)?;
    }

    let selfish: BTreeSet<&str> = givers
        .iter()
        .filter(|(receiver, giver)| receiver == giver)
        .map(|(receiver, _)| receiver.as_str())
        .collect();
    reject(ManualViolation::SelfGift, selfish)?;

    Ok(givers
        .iter()
        .map(|(receiver, giver)| (giver.clone(), receiver.clone()))
        .collect())
}

fn reject<'a>(
    violation: ManualViolation,
    offenders: impl IntoIterator<Item = &'a str>,
) -> Result<(), GameError> {
    let participants: Vec<ParticipantId> = offenders.into_iter().map(str::to_owned).collect();
    if participants.is_empty() {
        return Ok(());
    }
    debug!(%violation, ?participants, "manual assignment rejected");
    Err(GameError::InvalidManualAssignment {
        violation,
        participants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::room;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn manual(pairs: &[(&str, &str)]) -> DrawMode {
        DrawMode::Manual(
            pairs
                .iter()
                .map(|(receiver, giver)| (receiver.to_string(), giver.to_string()))
                .collect(),
        )
    }

    fn assert_derangement(participants: &[Participant], draw: &Assignment) {
        let ids: BTreeSet<&str> = participants.iter().map(|p| p.id.as_str()).collect();
        let givers: BTreeSet<&str> = draw.keys().map(String::as_str).collect();
        let receivers: BTreeSet<&str> = draw.values().map(String::as_str).collect();
        assert_eq!(givers, ids);
        assert_eq!(receivers, ids);
        assert!(draw.iter().all(|(giver, receiver)| giver != receiver));
    }

    #[test]
    fn refuses_rooms_under_two() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for n in 0..2 {
            let err = generate(&room(n), &DrawMode::Random, &mut rng).unwrap_err();
            assert_eq!(err, GameError::InsufficientParticipants { count: n });
        }
    }

    #[test]
    fn refuses_duplicate_ids() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut participants = room(3);
        participants.push(participants[1].clone());
        let err = generate(&participants, &DrawMode::Random, &mut rng).unwrap_err();
        assert_eq!(err, GameError::DuplicateParticipant("p2".into()));
    }

    #[test]
    fn random_draw_is_a_derangement() {
        for n in 2..=9 {
            let participants = room(n);
            for seed in 0..200 {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                if let Ok(draw) = generate(&participants, &DrawMode::Random, &mut rng) {
                    assert_derangement(&participants, &draw);
                }
            }
        }
    }

    #[test]
    fn random_draw_avoids_reciprocal_pairs_above_two() {
        let mut successes = 0;
        for n in 3..=8 {
            let participants = room(n);
            for seed in 0..300 {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let Ok(draw) = generate(&participants, &DrawMode::Random, &mut rng) else {
                    continue;
                };
                successes += 1;
                for (giver, receiver) in &draw {
                    assert_ne!(draw.get(receiver), Some(giver), "{giver} <-> {receiver}");
                }
            }
        }
        assert!(successes > 0);
    }

    #[test]
    fn two_participants_always_swap() {
        let participants = room(2);
        for seed in 0..500 {
            let draw = generate(
                &participants,
                &DrawMode::Random,
                &mut ChaCha8Rng::seed_from_u64(seed),
            )
            .unwrap();
            assert_eq!(draw.get("p1").map(String::as_str), Some("p2"));
            assert_eq!(draw.get("p2").map(String::as_str), Some("p1"));
        }
    }

    #[test]
    fn seeded_draws_repeat() {
        let participants = room(6);
        let first = generate(
            &participants,
            &DrawMode::Random,
            &mut ChaCha8Rng::seed_from_u64(42),
        );
        let second = generate(
            &participants,
            &DrawMode::Random,
            &mut ChaCha8Rng::seed_from_u64(42),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn exhausted_budget_is_unsolvable() {
        // A constant rng shuffles givers and receivers identically, so the
        // first position is always a self-gift and needs a repair.
        let ids: Vec<ParticipantId> = room(3).into_iter().map(|p| p.id).collect();
        let err = random_draw(&ids, 0, &mut StepRng::new(0, 0)).unwrap_err();
        assert_eq!(err, GameError::UnsolvableAssignment { attempts: 0 });
    }

    #[test]
    fn random_budget_is_participants_squared() {
        // Three people only have two valid cycles, so some seeds run dry.
        let participants = room(3);
        let failures: Vec<GameError> = (0..10_000)
            .filter_map(|seed| {
                generate(
                    &participants,
                    &DrawMode::Random,
                    &mut ChaCha8Rng::seed_from_u64(seed),
                )
                .err()
            })
            .collect();

        assert!(!failures.is_empty());
        for err in failures {
            assert_eq!(err, GameError::UnsolvableAssignment { attempts: 9 });
        }
    }

    #[test]
    fn manual_draw_accepts_a_bijection() {
        let participants = room(3);
        let mode = manual(&[("p1", "p3"), ("p2", "p1"), ("p3", "p2")]);
        let draw = generate(&participants, &mode, &mut StepRng::new(0, 0)).unwrap();

        assert_derangement(&participants, &draw);
        assert_eq!(draw.get("p3").map(String::as_str), Some("p1"));
        assert_eq!(draw.get("p1").map(String::as_str), Some("p2"));
    }

    #[test]
    fn manual_repeated_giver_keeps_previous_draw() {
        let participants = room(3);
        let mut existing = generate(
            &participants,
            &manual(&[("p1", "p3"), ("p2", "p1"), ("p3", "p2")]),
            &mut StepRng::new(0, 0),
        )
        .unwrap();
        let before = existing.clone();

        let err = redraw(
            &mut existing,
            &participants,
            &manual(&[("p1", "p2"), ("p2", "p1"), ("p3", "p2")]),
            &mut StepRng::new(0, 0),
        )
        .unwrap_err();

        assert_eq!(
            err,
            GameError::InvalidManualAssignment {
                violation: ManualViolation::RepeatedGiver,
                participants: vec!["p2".into()],
            }
        );
        assert_eq!(existing, before);
    }

    #[test]
    fn manual_rejects_self_gift() {
        let err = generate(
            &room(2),
            &manual(&[("p1", "p1"), ("p2", "p2")]),
            &mut StepRng::new(0, 0),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GameError::InvalidManualAssignment {
                violation: ManualViolation::SelfGift,
                participants: vec!["p1".into(), "p2".into()],
            }
        );
    }

    #[test]
    fn manual_rejects_missing_and_unknown() {
        let err = generate(
            &room(3),
            &manual(&[("p1", "p2"), ("p2", "p1")]),
            &mut StepRng::new(0, 0),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GameError::InvalidManualAssignment {
                violation: ManualViolation::MissingReceiver,
                participants: vec!["p3".into()],
            }
        );

        let err = generate(
            &room(2),
            &manual(&[("p1", "p2"), ("p2", "ghost")]),
            &mut StepRng::new(0, 0),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GameError::InvalidManualAssignment {
                violation: ManualViolation::UnknownParticipant,
                participants: vec!["ghost".into()],
            }
        );
    }
}

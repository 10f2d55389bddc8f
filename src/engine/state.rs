//! Turn-engine state and the pure functions that step it.
//!
//! Every step takes a state by reference and returns a new one. Only the host owns a
//! live `TurnState`; everyone else sees it as a snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::deck::Deck;
use super::phase::{transition, Event, Phase};
use super::tiers::EngineConfig;
use super::GameRules;
use crate::protocol::PlayerId;

/// A turn outcome reported by a player action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Pass,
    Match,
    NoMatch,
}

impl Outcome {
    pub fn from_action(name: &str) -> Option<Self> {
        match name {
            "correct" => Some(Self::Correct),
            "pass" => Some(Self::Pass),
            "match" => Some(Self::Match),
            "no_match" => Some(Self::NoMatch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: PlayerId,
    pub name: String,
}

/// Counters reset at the start of every turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnCounters {
    pub correct: u32,
    pub passed: u32,
    pub matched: u32,
    pub missed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    /// Rotation order, as seated in the room
    pub participants: Vec<Participant>,
    pub deck: Deck<String>,
    pub phase: Phase,
    /// 1-based
    pub round: u32,
    pub max_rounds: u32,
    pub target_score: Option<i32>,
    /// Index of the acting participant (clue-giver)
    pub acting: usize,
    pub current_item: Option<String>,
    pub scores: BTreeMap<PlayerId, i32>,
    pub turn: TurnCounters,
}

impl TurnState {
    pub fn new(participants: Vec<Participant>, deck: Deck<String>, config: &EngineConfig) -> Self {
        let scores = participants.iter().map(|p| (p.id, 0)).collect();
        Self {
            participants,
            deck,
            phase: Phase::Setup,
            round: 1,
            max_rounds: config.max_rounds.max(1),
            target_score: config.target_score,
            acting: 0,
            current_item: None,
            scores,
            turn: TurnCounters::default(),
        }
    }

    pub fn acting_participant(&self) -> Option<&Participant> {
        self.participants.get(self.acting)
    }

    /// The participant after the acting one; they act next.
    pub fn guesser(&self) -> Option<&Participant> {
        if self.participants.is_empty() {
            return None;
        }
        self.participants
            .get((self.acting + 1) % self.participants.len())
    }

    pub fn score_of(&self, id: &PlayerId) -> i32 {
        self.scores.get(id).copied().unwrap_or(0)
    }

    pub fn is_over(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Apply a phase event.
    pub fn with_event(&self, event: Event) -> Self {
        Self {
            phase: transition(self.phase, event),
            ..self.clone()
        }
    }

    pub fn winner(&self) -> Option<PlayerId> {
        evaluate_winner(&self.scores, self.target_score, self.is_over())
    }
}

/// Draw the next item into `current_item`.
pub fn draw_next(state: &TurnState) -> TurnState {
    let mut next = state.clone();
    next.current_item = next.deck.draw();
    next
}

/// Score `outcome` for the current turn. Outside `InTurn` the state is returned unchanged.
pub fn apply_outcome<R: GameRules + ?Sized>(
    rules: &R,
    state: &TurnState,
    outcome: Outcome,
) -> TurnState {
    if state.phase != Phase::InTurn {
        return state.clone();
    }

    let mut next = state.clone();
    match outcome {
        Outcome::Correct => next.turn.correct += 1,
        Outcome::Pass => next.turn.passed += 1,
        Outcome::Match => next.turn.matched += 1,
        Outcome::NoMatch => next.turn.missed += 1,
    }
    for (id, points) in rules.score(state, outcome) {
        *next.scores.entry(id).or_insert(0) += points;
    }

    let reached = next
        .target_score
        .is_some_and(|target| next.scores.values().any(|&score| score >= target));
    if reached {
        next.phase = transition(next.phase, Event::ScoreReached);
    }
    next
}

/// Rotate to the next acting participant.
///
/// The round limit is checked before a rotation that would start round
/// `max_rounds + 1`; that call ends the game instead of rotating.
pub fn advance_turn(state: &TurnState) -> TurnState {
    if state.is_over() || state.participants.is_empty() {
        return state.clone();
    }

    let mut next = state.clone();
    next.turn = TurnCounters::default();
    next.current_item = None;

    let wraps = state.acting + 1 >= state.participants.len();
    if wraps && state.round >= state.max_rounds {
        next.phase = transition(state.phase, Event::RoundsExhausted);
        return next;
    }

    next.acting = (state.acting + 1) % state.participants.len();
    if wraps {
        next.round += 1;
    }
    next.phase = transition(transition(state.phase, Event::EndTurn), Event::Advance);
    next
}

/// The winner, if any.
///
/// A participant at or above `target` wins early; otherwise the top score wins once
/// `game_over`. Ties go to the lowest participant id.
pub fn evaluate_winner(
    scores: &BTreeMap<PlayerId, i32>,
    target: Option<i32>,
    game_over: bool,
) -> Option<PlayerId> {
    let best = || {
        scores
            .iter()
            .max_by(|(a_id, a), (b_id, b)| a.cmp(b).then_with(|| b_id.cmp(a_id)))
            .map(|(id, _)| *id)
    };

    if let Some(target) = target {
        if scores.values().any(|&score| score >= target) {
            return best();
        }
    }
    if game_over {
        best()
    } else {
        None
    }
}

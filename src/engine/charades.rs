//! Charades: the acting participant mimes, the next participant guesses.

use super::state::{Outcome, TurnState};
use super::GameRules;
use crate::protocol::PlayerId;

pub const GAME_ID: &str = "charades";

const PROMPTS: &[&str] = &[
    "Brushing teeth",
    "Riding a bicycle",
    "Walking a dog",
    "Baking a cake",
    "Playing the piano",
    "Climbing a mountain",
    "Changing a tire",
    "Catching a fish",
    "Flying a kite",
    "Doing laundry",
    "Surfing a wave",
    "Reading a map",
    "Juggling",
    "Building a snowman",
    "Taking a selfie",
    "Painting a fence",
    "Shoveling snow",
    "Conducting an orchestra",
    "Walking a tightrope",
    "Planting a tree",
    "Directing traffic",
    "Lifting weights",
    "Milking a cow",
    "Blowing up a balloon",
    "Ice skating",
    "Making pizza",
    "Sneaking past a sleeping giant",
    "Opening a stuck jar",
    "Chasing a bus",
    "Hanging a painting",
];

/// A correct guess scores one point each for the clue-giver and the guesser.
/// Passing scores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Charades;

impl GameRules for Charades {
    fn game_id(&self) -> &'static str {
        GAME_ID
    }

    fn prompts(&self) -> Vec<String> {
        PROMPTS.iter().map(|p| (*p).to_string()).collect()
    }

    fn score(&self, state: &TurnState, outcome: Outcome) -> Vec<(PlayerId, i32)> {
        match outcome {
            Outcome::Correct => state
                .acting_participant()
                .into_iter()
                .chain(state.guesser())
                .map(|p| (p.id, 1))
                .collect(),
            Outcome::Pass | Outcome::Match | Outcome::NoMatch => Vec::new(),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    TurnReady,
    InTurn,
    TurnOver,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Start,
    BeginTurn,
    EndTurn,
    Advance,
    RoundsExhausted,
    ScoreReached,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Setup,
        Phase::TurnReady,
        Phase::InTurn,
        Phase::TurnOver,
        Phase::GameOver,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::TurnReady => "turn_ready",
            Self::InTurn => "in_turn",
            Self::TurnOver => "turn_over",
            Self::GameOver => "game_over",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::GameOver)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    pub const ALL: [Event; 6] = [
        Event::Start,
        Event::BeginTurn,
        Event::EndTurn,
        Event::Advance,
        Event::RoundsExhausted,
        Event::ScoreReached,
    ];
}

/// Next phase for every `(phase, event)` pair. Pairs not listed keep the current
/// phase and `GameOver` absorbs everything.
pub const fn transition(phase: Phase, event: Event) -> Phase {
    match (phase, event) {
        (Phase::GameOver, _) => Phase::GameOver,
        (_, Event::RoundsExhausted | Event::ScoreReached) => Phase::GameOver,
        (Phase::Setup, Event::Start) => Phase::TurnReady,
        (Phase::TurnReady, Event::BeginTurn) => Phase::InTurn,
        (Phase::InTurn, Event::EndTurn) => Phase::TurnOver,
        (Phase::TurnOver, Event::Advance) => Phase::TurnReady,
        (phase, _) => phase,
    }
}

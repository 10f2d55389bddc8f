//! Host-side game runtime and the read-only mirror every other member keeps.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use super::deck::Deck;
use super::phase::{Event, Phase};
use super::state::{advance_turn, apply_outcome, draw_next, Outcome, Participant, TurnState};
use super::tiers::{EngineConfig, TierLookup};
use super::{EngineError, GameRules};
use crate::config::EngineSettings;
use crate::coordination::RoomCoordinator;
use crate::error::RoomResult;
use crate::protocol::{BroadcastEnvelope, ChannelEvent, GameSnapshot, PlayerAction, PlayerId};

/// Owns the authoritative [`TurnState`] for one room and publishes every change.
pub struct GameHost {
    coordinator: Arc<RoomCoordinator>,
    rules: Arc<dyn GameRules>,
    host: PlayerId,
    room_code: String,
    state: TurnState,
    revision: u64,
}

impl GameHost {
    /// Seat the current roster, move the room to `playing` and announce the
    /// initial snapshot.
    pub async fn start(
        coordinator: Arc<RoomCoordinator>,
        host: PlayerId,
        room_code: &str,
        rules: Arc<dyn GameRules>,
        settings: &EngineSettings,
        tiers: &dyn TierLookup,
        seed: u64,
    ) -> RoomResult<Self> {
        let roster = coordinator.roster(room_code).await?;
        let config = EngineConfig::for_host(settings, tiers, &host, roster.len()).await?;
        let participants = roster
            .into_iter()
            .map(|member| Participant {
                id: member.user_id,
                name: member.display_name,
            })
            .collect();
        let deck = Deck::new(rules.prompts(), seed);
        let state = TurnState::new(participants, deck, &config).with_event(Event::Start);

        let mut game = Self {
            coordinator,
            rules,
            host,
            room_code: room_code.to_string(),
            state,
            revision: 1,
        };
        let snapshot = game.snapshot()?;
        let room = game
            .coordinator
            .start_game(host, room_code, snapshot)
            .await?;
        game.room_code = room.code;
        Ok(game)
    }

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    pub fn snapshot(&self) -> Result<GameSnapshot, EngineError> {
        self.snapshot_of(&self.state, self.revision)
    }

    fn snapshot_of(&self, state: &TurnState, revision: u64) -> Result<GameSnapshot, EngineError> {
        let state =
            serde_json::to_value(state).map_err(|e| EngineError::Snapshot(e.to_string()))?;
        Ok(GameSnapshot {
            game_id: self.rules.game_id().to_string(),
            revision,
            state,
        })
    }

    /// Feed one channel event to the host. Returns whether the state changed.
    pub async fn handle_event(&mut self, envelope: &BroadcastEnvelope) -> RoomResult<bool> {
        match &envelope.event {
            ChannelEvent::PlayerAction(action) if action.identity == envelope.from => {
                self.handle_action(action).await
            }
            _ => Ok(false),
        }
    }

    /// Interpret a player action. Unknown actions, actions that do not apply in the
    /// current phase and actions from members without the matching role are ignored.
    pub async fn handle_action(&mut self, action: &PlayerAction) -> RoomResult<bool> {
        let name = action.action_name.as_str();
        if !self.may_perform(&action.identity, name) {
            debug!(
                identity = %action.identity,
                action = %name,
                room_code = %self.room_code,
                "Ignoring action from a member without that role"
            );
            return Ok(false);
        }

        let current = &self.state;
        let next = match name {
            "begin_turn" if current.phase == Phase::TurnReady => {
                draw_next(&current.with_event(Event::BeginTurn))
            }
            "end_turn" => current.with_event(Event::EndTurn),
            "next_turn" => advance_turn(current),
            name => match Outcome::from_action(name) {
                Some(outcome) => {
                    let scored = apply_outcome(self.rules.as_ref(), current, outcome);
                    if scored.phase == Phase::InTurn && scored != *current {
                        draw_next(&scored)
                    } else {
                        scored
                    }
                }
                None => {
                    debug!(action = %name, room_code = %self.room_code, "Ignoring action");
                    return Ok(false);
                }
            },
        };

        if next == self.state {
            return Ok(false);
        }
        self.commit(next).await?;
        Ok(true)
    }

    /// Turn control belongs to the clue-giver. Outcomes may be reported by the
    /// clue-giver or the guesser. The host may do both.
    fn may_perform(&self, identity: &PlayerId, action_name: &str) -> bool {
        if *identity == self.host {
            return true;
        }
        let acting = self.state.acting_participant().map(|p| p.id);
        let guessing = self.state.guesser().map(|p| p.id);
        match action_name {
            "begin_turn" | "end_turn" | "next_turn" => acting == Some(*identity),
            _ => acting == Some(*identity) || guessing == Some(*identity),
        }
    }

    /// Adopt `next` once the writes it depends on have succeeded. A failed write
    /// leaves the previous state in place so the same action can be retried.
    async fn commit(&mut self, next: TurnState) -> RoomResult<()> {
        let revision = self.revision + 1;
        let update = ChannelEvent::GameStateUpdate(self.snapshot_of(&next, revision)?);

        if !next.is_over() {
            self.coordinator
                .publish(self.host, &self.room_code, update)
                .await?;
            self.state = next;
            self.revision = revision;
            return Ok(());
        }

        self.coordinator
            .finish_game(self.host, &self.room_code)
            .await?;
        self.state = next;
        self.revision = revision;
        // The room is already finished; the final snapshot is best-effort.
        if let Err(err) = self
            .coordinator
            .publish(self.host, &self.room_code, update)
            .await
        {
            warn!(room_code = %self.room_code, error = %err, "Failed to publish final state");
        }
        Ok(())
    }
}

/// What applying a channel event did to a [`GameMirror`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorUpdate {
    Replaced { revision: u64 },
    /// The revision is not newer than the one already held
    Stale,
    Closed { reason: String },
    Ignored,
}

/// Read-only copy of the host's game, replaced wholesale by each snapshot.
#[derive(Debug, Default, Clone)]
pub struct GameMirror {
    snapshot: Option<GameSnapshot>,
    closed: Option<String>,
}

impl GameMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, envelope: &BroadcastEnvelope) -> MirrorUpdate {
        if self.closed.is_some() {
            return MirrorUpdate::Ignored;
        }
        match &envelope.event {
            ChannelEvent::HostStartGame(snapshot) | ChannelEvent::GameStateUpdate(snapshot) => {
                let newer = self
                    .snapshot
                    .as_ref()
                    .is_none_or(|current| snapshot.revision > current.revision);
                if !newer {
                    return MirrorUpdate::Stale;
                }
                self.snapshot = Some(snapshot.clone());
                MirrorUpdate::Replaced {
                    revision: snapshot.revision,
                }
            }
            ChannelEvent::RoomClosed { reason } => {
                self.snapshot = None;
                self.closed = Some(reason.clone());
                MirrorUpdate::Closed {
                    reason: reason.clone(),
                }
            }
            ChannelEvent::PlayerAction(_) => MirrorUpdate::Ignored,
        }
    }

    pub fn snapshot(&self) -> Option<&GameSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Decode the mirrored state as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.snapshot
            .as_ref()
            .map(|snapshot| serde_json::from_value(snapshot.state.clone()))
            .transpose()
    }
}

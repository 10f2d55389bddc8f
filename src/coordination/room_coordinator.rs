//! Room operations composed over the directory, the room channel and the rate limiter.
//!
//! Durable facts (membership, host, game, status) are written to the directory first;
//! the channel only propagates them. Multi-row sequences compensate explicitly when a
//! later step fails.

use std::sync::Arc;
use tracing::{info, warn};

use crate::channel::{ChannelError, ChannelSession, PubSubTransport};
use crate::config::{Config, ProtocolConfig, ServerConfig};
use crate::directory::{MembershipInsert, NewMember, RoomCodeTaken, RoomDirectory, RoomUpdate};
use crate::error::{RoomError, RoomResult};
use crate::metrics::ServerMetrics;
use crate::protocol::room_codes::{generate_clean_room_code_with_config, normalize_room_code};
use crate::protocol::validation;
use crate::protocol::{
    BroadcastEnvelope, ChannelEvent, ErrorCode, GameSnapshot, PlayerId, PresenceRecord, Room, RoomId,
    RoomPlayer, RoomStatus, RoomSummary,
};
use crate::rate_limit::{RateBucket, RoomRateLimiter};
use crate::retry::RetryConfig;

/// Action name that additionally consumes the clue bucket.
pub const CLUE_ACTION: &str = "clue";

/// Upper bound on host-repair compare-and-set rounds when racing other repairs.
const HOST_REPAIR_ATTEMPTS: usize = 8;

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinedRoom {
    pub room: Room,
    pub member: RoomPlayer,
    /// Ordered by `(joined_at, seq)`
    pub roster: Vec<RoomPlayer>,
    /// True when the identity was already a member (re-join)
    pub already_member: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub room_deleted: bool,
    /// Set when the leaver was host and a successor took over
    pub new_host: Option<PlayerId>,
}

/// Orchestrates room lifecycle over a [`RoomDirectory`] and a [`PubSubTransport`].
pub struct RoomCoordinator {
    directory: Arc<dyn RoomDirectory>,
    transport: Arc<dyn PubSubTransport>,
    rate_limiter: Arc<RoomRateLimiter>,
    metrics: Arc<ServerMetrics>,
    protocol: ProtocolConfig,
    server: ServerConfig,
}

impl RoomCoordinator {
    pub fn new(
        directory: Arc<dyn RoomDirectory>,
        transport: Arc<dyn PubSubTransport>,
        rate_limiter: Arc<RoomRateLimiter>,
        metrics: Arc<ServerMetrics>,
        config: &Config,
    ) -> Self {
        Self {
            directory,
            transport,
            rate_limiter,
            metrics,
            protocol: config.protocol.clone(),
            server: config.server.clone(),
        }
    }

    pub fn directory(&self) -> &Arc<dyn RoomDirectory> {
        &self.directory
    }

    pub fn transport(&self) -> &Arc<dyn PubSubTransport> {
        &self.transport
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    fn check_rate(&self, bucket: RateBucket, identity: &PlayerId) -> RoomResult<()> {
        self.rate_limiter.check(bucket, identity).map_err(|err| {
            self.metrics.increment_rate_limit_rejections();
            RoomError::from(err)
        })
    }

    /// Admit one request in every bucket or in none of them.
    fn check_rates(&self, buckets: &[RateBucket], identity: &PlayerId) -> RoomResult<()> {
        self.rate_limiter.check_all(buckets, identity).map_err(|err| {
            self.metrics.increment_rate_limit_rejections();
            RoomError::from(err)
        })
    }

    fn validate(&self, code: ErrorCode, result: Result<(), String>) -> RoomResult<()> {
        result.map_err(|reason| {
            self.metrics.increment_validation_errors();
            RoomError::InvalidField { code, reason }
        })
    }

    fn persistence(&self, err: anyhow::Error) -> RoomError {
        self.metrics.increment_internal_errors();
        RoomError::Persistence(err)
    }

    /// Look up a room by a user-supplied code.
    async fn room_by_code(&self, code: &str) -> RoomResult<Room> {
        let code = normalize_room_code(code);
        self.validate(
            ErrorCode::InvalidRoomCode,
            validation::validate_room_code_with_config(&code, &self.protocol),
        )?;
        self.directory
            .get_room_by_code(&code)
            .await
            .map_err(|e| self.persistence(e))?
            .ok_or(RoomError::RoomNotFound(code))
    }

    async fn require_host(&self, identity: &PlayerId, code: &str) -> RoomResult<Room> {
        let room = self.room_by_code(code).await?;
        if room.host_id != *identity {
            return Err(RoomError::NotHost);
        }
        Ok(room)
    }

    async fn list_players(&self, room_id: &RoomId) -> RoomResult<Vec<RoomPlayer>> {
        self.directory
            .list_players(room_id)
            .await
            .map_err(|e| self.persistence(e))
    }

    fn updated(update: RoomUpdate, code: &str) -> RoomResult<Room> {
        match update {
            RoomUpdate::Updated(room) => Ok(room),
            RoomUpdate::Rejected(room) => Err(RoomError::InvalidTransition(format!(
                "room {} is {}",
                room.code, room.status
            ))),
            RoomUpdate::Missing => Err(RoomError::RoomNotFound(code.to_string())),
        }
    }

    /// Create a room hosted by `identity` with the host already seated and ready.
    #[tracing::instrument(name = "room.create", skip_all, fields(%identity, room_code = tracing::field::Empty))]
    pub async fn create_room(&self, identity: PlayerId, display_name: &str) -> RoomResult<Room> {
        self.check_rate(RateBucket::CreateRoom, &identity)?;
        self.validate(
            ErrorCode::InvalidDisplayName,
            validation::validate_display_name_with_config(display_name, &self.protocol),
        )?;

        let mut created = None;
        for attempt in 1..=self.server.room_code_attempts {
            let code = generate_clean_room_code_with_config(&self.protocol);
            let candidate = Room::new(code, identity, self.server.default_max_players);
            match self.directory.insert_room(candidate).await {
                Ok(room) => {
                    created = Some(room);
                    break;
                }
                Err(err) if err.downcast_ref::<RoomCodeTaken>().is_some() => {
                    self.metrics.increment_room_code_collisions();
                    tracing::debug!(attempt, "Room code collision, regenerating");
                }
                Err(err) => {
                    self.metrics.increment_room_creation_failures();
                    return Err(self.persistence(err));
                }
            }
        }
        let Some(room) = created else {
            self.metrics.increment_room_creation_failures();
            return Err(self.persistence(anyhow::anyhow!(
                "could not allocate a unique room code after {} attempts",
                self.server.room_code_attempts
            )));
        };
        tracing::Span::current().record("room_code", room.code.as_str());

        if let Err(err) = self.transport.open(&room.code).await {
            self.compensate_create(&room).await;
            return Err(RoomError::Transport(err.to_string()));
        }

        let host = NewMember {
            user_id: identity,
            display_name: display_name.to_string(),
            is_ready: true,
        };
        match self.directory.insert_player(&room.id, host).await {
            Ok(MembershipInsert::Inserted(_)) => {}
            Ok(other) => {
                self.compensate_create(&room).await;
                return Err(self.persistence(anyhow::anyhow!(
                    "host membership insert was refused: {other:?}"
                )));
            }
            Err(err) => {
                self.compensate_create(&room).await;
                return Err(self.persistence(err));
            }
        }

        self.metrics.increment_rooms_created();
        info!(room_id = %room.id, "Room created");
        Ok(room)
    }

    /// Undo a half-created room.
    async fn compensate_create(&self, room: &Room) {
        self.metrics.increment_room_creation_failures();
        if let Err(err) = self.directory.delete_room(&room.id).await {
            warn!(room_id = %room.id, error = %err, "Failed to delete room during compensation");
        }
        let _ = self.transport.close(&room.code).await;
    }

    /// Join the room with `code`. Re-joining as an existing member always succeeds.
    #[tracing::instrument(name = "room.join", skip_all, fields(%identity, room_code = %code))]
    pub async fn join_room(
        &self,
        code: &str,
        identity: PlayerId,
        display_name: &str,
    ) -> RoomResult<JoinedRoom> {
        self.check_rate(RateBucket::JoinRoom, &identity)?;
        self.validate(
            ErrorCode::InvalidDisplayName,
            validation::validate_display_name_with_config(display_name, &self.protocol),
        )?;
        let room = self.room_by_code(code).await?;

        let roster = self.list_players(&room.id).await?;
        if let Some(existing) = roster.iter().find(|p| p.user_id == identity) {
            return Ok(JoinedRoom {
                member: existing.clone(),
                room,
                roster,
                already_member: true,
            });
        }
        if !room.is_joinable() {
            self.metrics.increment_room_join_failures();
            return Err(RoomError::RoomNotJoinable {
                code: room.code,
                status: room.status.to_string(),
            });
        }
        if roster.len() >= usize::from(room.max_players) {
            self.metrics.increment_room_join_failures();
            return Err(RoomError::RoomFull {
                code: room.code,
                max_players: room.max_players,
            });
        }

        let member = NewMember {
            user_id: identity,
            display_name: display_name.to_string(),
            is_ready: false,
        };
        let insert = self
            .directory
            .insert_player(&room.id, member)
            .await
            .map_err(|e| self.persistence(e))?;
        let (member, already_member) = match insert {
            MembershipInsert::Inserted(player) => {
                self.metrics.increment_players_joined();
                info!("Player joined room");
                (player, false)
            }
            MembershipInsert::Existing(player) => (player, true),
            MembershipInsert::Full { max_players } => {
                self.metrics.increment_room_join_failures();
                return Err(RoomError::RoomFull {
                    code: room.code,
                    max_players,
                });
            }
            MembershipInsert::NotJoinable(status) => {
                self.metrics.increment_room_join_failures();
                return Err(RoomError::RoomNotJoinable {
                    code: room.code,
                    status: status.to_string(),
                });
            }
            MembershipInsert::RoomMissing => return Err(RoomError::RoomNotFound(room.code)),
        };

        let room = self
            .directory
            .get_room(&room.id)
            .await
            .map_err(|e| self.persistence(e))?
            .ok_or_else(|| RoomError::RoomNotFound(room.code.clone()))?;
        let roster = self.list_players(&room.id).await?;
        Ok(JoinedRoom {
            room,
            member,
            roster,
            already_member,
        })
    }

    /// Remove the caller's membership, migrating the host or deleting the room as needed.
    #[tracing::instrument(name = "room.leave", skip_all, fields(%identity, room_code = %code))]
    pub async fn leave_room(&self, identity: PlayerId, code: &str) -> RoomResult<LeaveOutcome> {
        let room = self.room_by_code(code).await?;
        let removed = self
            .directory
            .delete_player(&room.id, &identity)
            .await
            .map_err(|e| self.persistence(e))?;
        if removed.is_none() {
            return Err(RoomError::NotMember(room.code));
        }
        self.metrics.increment_players_left();

        let remaining = self.list_players(&room.id).await?;
        if remaining.is_empty() {
            self.delete_and_close(&room, "room is empty").await?;
            return Ok(LeaveOutcome {
                room_deleted: true,
                new_host: None,
            });
        }

        if room.host_id != identity {
            return Ok(LeaveOutcome {
                room_deleted: false,
                new_host: None,
            });
        }

        let new_host = self.repair_host(&room.id).await?;
        Ok(LeaveOutcome {
            room_deleted: new_host.is_none(),
            new_host,
        })
    }

    /// Repair a room whose recorded host is no longer a member. Idempotent: returns the
    /// current host, or `None` if the room was empty and has been deleted.
    #[tracing::instrument(name = "room.migrate_host", skip_all, fields(room_code = %code))]
    pub async fn migrate_host(&self, code: &str) -> RoomResult<Option<PlayerId>> {
        let room = self.room_by_code(code).await?;
        self.repair_host(&room.id).await
    }

    async fn repair_host(&self, room_id: &RoomId) -> RoomResult<Option<PlayerId>> {
        for _ in 0..HOST_REPAIR_ATTEMPTS {
            let Some(room) = self
                .directory
                .get_room(room_id)
                .await
                .map_err(|e| self.persistence(e))?
            else {
                return Ok(None);
            };

            let roster = self.list_players(room_id).await?;
            if roster.iter().any(|p| p.user_id == room.host_id) {
                return Ok(Some(room.host_id));
            }
            let Some(successor) = roster.first() else {
                self.delete_and_close(&room, "room is empty").await?;
                return Ok(None);
            };

            match self
                .directory
                .compare_and_set_host(room_id, &room.host_id, &successor.user_id)
                .await
                .map_err(|e| self.persistence(e))?
            {
                RoomUpdate::Updated(updated) => {
                    self.metrics.increment_host_migrations();
                    info!(
                        room_code = %updated.code,
                        previous_host = %room.host_id,
                        new_host = %updated.host_id,
                        "Host migrated"
                    );
                    return Ok(Some(updated.host_id));
                }
                // Another repair won the race; re-evaluate against its result.
                RoomUpdate::Rejected(_) => continue,
                RoomUpdate::Missing => return Ok(None),
            }
        }
        Err(self.persistence(anyhow::anyhow!(
            "host migration for room {room_id} did not converge"
        )))
    }

    /// Host removes `target`. Kicking a non-member is a no-op that returns `false`.
    #[tracing::instrument(name = "room.kick", skip_all, fields(%host, %target, room_code = %code))]
    pub async fn kick_player(
        &self,
        host: PlayerId,
        code: &str,
        target: PlayerId,
    ) -> RoomResult<bool> {
        let room = self.require_host(&host, code).await?;
        if target == host {
            return Err(RoomError::invalid("the host cannot kick themselves"));
        }
        let removed = self
            .directory
            .delete_player(&room.id, &target)
            .await
            .map_err(|e| self.persistence(e))?
            .is_some();
        if removed {
            self.metrics.increment_players_kicked();
            info!("Player kicked");
        }
        Ok(removed)
    }

    #[tracing::instrument(name = "room.select_game", skip_all, fields(%host, room_code = %code, %game_id))]
    pub async fn select_game(&self, host: PlayerId, code: &str, game_id: &str) -> RoomResult<Room> {
        self.validate(
            ErrorCode::InvalidGameId,
            validation::validate_game_id_with_config(game_id, &self.protocol),
        )?;
        let room = self.require_host(&host, code).await?;
        let update = self
            .directory
            .set_game(&room.id, game_id)
            .await
            .map_err(|e| self.persistence(e))?;
        Self::updated(update, &room.code)
    }

    pub async fn set_visibility(
        &self,
        host: PlayerId,
        code: &str,
        is_public: bool,
    ) -> RoomResult<Room> {
        let room = self.require_host(&host, code).await?;
        let update = self
            .directory
            .set_visibility(&room.id, is_public)
            .await
            .map_err(|e| self.persistence(e))?;
        Self::updated(update, &room.code)
    }

    pub async fn set_max_players(
        &self,
        host: PlayerId,
        code: &str,
        max_players: u8,
    ) -> RoomResult<Room> {
        let room = self.require_host(&host, code).await?;
        let members = self.list_players(&room.id).await?.len();
        self.validate(
            ErrorCode::InvalidMaxPlayers,
            validation::validate_max_players_with_config(max_players, members, &self.protocol),
        )?;
        match self
            .directory
            .set_max_players(&room.id, max_players)
            .await
            .map_err(|e| self.persistence(e))?
        {
            RoomUpdate::Updated(room) => Ok(room),
            // A join landed between the count and the write.
            RoomUpdate::Rejected(_) => Err(RoomError::invalid(
                "max players cannot be below the current member count",
            )),
            RoomUpdate::Missing => Err(RoomError::RoomNotFound(room.code)),
        }
    }

    /// Toggle a non-host member's ready flag.
    pub async fn set_ready(
        &self,
        identity: PlayerId,
        code: &str,
        ready: bool,
    ) -> RoomResult<RoomPlayer> {
        let room = self.room_by_code(code).await?;
        if room.host_id == identity {
            return Err(RoomError::invalid("the host is always ready"));
        }
        self.directory
            .set_player_ready(&room.id, &identity, ready)
            .await
            .map_err(|e| self.persistence(e))?
            .ok_or(RoomError::NotMember(room.code))
    }

    /// Move the room to `playing` and announce `initial` to the channel exactly once.
    #[tracing::instrument(name = "room.start_game", skip_all, fields(%host, room_code = %code))]
    pub async fn start_game(
        &self,
        host: PlayerId,
        code: &str,
        initial: GameSnapshot,
    ) -> RoomResult<Room> {
        let room = self.require_host(&host, code).await?;
        let Some(game_id) = room.game_id.as_deref() else {
            return Err(RoomError::NoGameSelected);
        };
        if initial.game_id != game_id {
            return Err(RoomError::invalid(format!(
                "snapshot is for {} but the room selected {game_id}",
                initial.game_id
            )));
        }

        let update = self
            .directory
            .advance_status(&room.id, RoomStatus::Waiting)
            .await
            .map_err(|e| self.persistence(e))?;
        let room = Self::updated(update, &room.code)?;
        self.metrics.increment_games_started();
        info!(game_id = %initial.game_id, "Game started");

        // Only the caller that won the status CAS reaches this broadcast.
        let envelope = BroadcastEnvelope {
            from: host,
            event: ChannelEvent::HostStartGame(initial),
        };
        if let Err(err) = self.transport.broadcast(&room.code, envelope).await {
            warn!(error = %err, "Failed to announce game start");
        } else {
            self.metrics.increment_broadcasts_sent();
        }
        Ok(room)
    }

    #[tracing::instrument(name = "room.finish_game", skip_all, fields(%host, room_code = %code))]
    pub async fn finish_game(&self, host: PlayerId, code: &str) -> RoomResult<Room> {
        let room = self.require_host(&host, code).await?;
        let update = self
            .directory
            .advance_status(&room.id, RoomStatus::Playing)
            .await
            .map_err(|e| self.persistence(e))?;
        let room = Self::updated(update, &room.code)?;
        self.metrics.increment_games_finished();
        Ok(room)
    }

    /// Host closes the room for everyone.
    #[tracing::instrument(name = "room.close", skip_all, fields(%host, room_code = %code))]
    pub async fn close_room(&self, host: PlayerId, code: &str, reason: &str) -> RoomResult<()> {
        let room = self.require_host(&host, code).await?;
        self.delete_and_close(&room, reason).await
    }

    /// Delete the room row, then tell subscribers and close its channel.
    async fn delete_and_close(&self, room: &Room, reason: &str) -> RoomResult<()> {
        let deleted = self
            .directory
            .delete_room(&room.id)
            .await
            .map_err(|e| self.persistence(e))?;
        if deleted.is_none() {
            return Ok(());
        }
        self.metrics.increment_rooms_deleted();
        info!(room_code = %room.code, reason, "Room closed");
        self.announce_closed(room, reason).await;
        Ok(())
    }

    async fn announce_closed(&self, room: &Room, reason: &str) {
        let envelope = BroadcastEnvelope {
            from: room.host_id,
            event: ChannelEvent::RoomClosed {
                reason: reason.to_string(),
            },
        };
        match self.transport.broadcast(&room.code, envelope).await {
            Ok(_) => self.metrics.increment_broadcasts_sent(),
            Err(err) => tracing::debug!(error = %err, "Room closed without an open channel"),
        }
        let _ = self.transport.close(&room.code).await;
    }

    pub async fn room(&self, code: &str) -> RoomResult<Room> {
        self.room_by_code(code).await
    }

    /// Members ordered by `(joined_at, seq)`.
    pub async fn roster(&self, code: &str) -> RoomResult<Vec<RoomPlayer>> {
        let room = self.room_by_code(code).await?;
        self.list_players(&room.id).await
    }

    pub async fn public_rooms(&self) -> RoomResult<Vec<RoomSummary>> {
        self.directory
            .list_public_rooms()
            .await
            .map_err(|e| self.persistence(e))
    }

    /// Subscribe a member to the room channel and announce their presence.
    pub async fn open_channel(
        &self,
        code: &str,
        identity: PlayerId,
        display_name: &str,
    ) -> RoomResult<ChannelSession> {
        let room = self.room_by_code(code).await?;
        let roster = self.list_players(&room.id).await?;
        if !roster.iter().any(|p| p.user_id == identity) {
            return Err(RoomError::NotMember(room.code));
        }

        let presence = PresenceRecord {
            id: identity,
            name: display_name.to_string(),
            connected_at: chrono::Utc::now(),
        };
        ChannelSession::join(
            Arc::clone(&self.transport),
            room.code.clone(),
            presence,
            RetryConfig::resubscribe(&self.server),
            Some(Arc::clone(&self.metrics)),
        )
        .await
        .map_err(|err| Self::channel_error(err, &room.code))
    }

    fn channel_error(err: ChannelError, code: &str) -> RoomError {
        match err {
            ChannelError::TopicClosed(_) => RoomError::RoomNotFound(code.to_string()),
            ChannelError::Unavailable(..) => RoomError::Transport(err.to_string()),
        }
    }

    /// Publish `event` on the room channel as `identity`.
    #[tracing::instrument(name = "room.publish", skip_all, fields(%identity, room_code = %code, kind = event.kind()))]
    pub async fn publish(
        &self,
        identity: PlayerId,
        code: &str,
        event: ChannelEvent,
    ) -> RoomResult<usize> {
        let room = self.room_by_code(code).await?;
        let roster = self.list_players(&room.id).await?;
        if !roster.iter().any(|p| p.user_id == identity) {
            return Err(RoomError::NotMember(room.code));
        }
        if event.requires_host() && room.host_id != identity {
            return Err(RoomError::NotHost);
        }
        if event.is_lifecycle() {
            return Err(RoomError::invalid(format!(
                "{} is only sent when the room starts or closes",
                event.kind()
            )));
        }
        if let ChannelEvent::PlayerAction(action) = &event {
            if action.identity != identity {
                return Err(RoomError::invalid(
                    "player actions must carry the sender's identity",
                ));
            }
            if action.action_name == CLUE_ACTION {
                self.check_rates(&[RateBucket::GameAction, RateBucket::SendClue], &identity)?;
            } else {
                self.check_rate(RateBucket::GameAction, &identity)?;
            }
        }
        let touches_room = matches!(event, ChannelEvent::GameStateUpdate(_));

        let reached = self
            .transport
            .broadcast(
                &room.code,
                BroadcastEnvelope {
                    from: identity,
                    event,
                },
            )
            .await
            .map_err(|err| Self::channel_error(err, &room.code))?;
        self.metrics.increment_broadcasts_sent();

        // Game traffic keeps a playing room out of the idle sweep.
        if touches_room {
            if let Err(err) = self.directory.touch_room(&room.id).await {
                warn!(error = %err, "Failed to refresh room activity");
            }
        }
        Ok(reached)
    }

    /// Delete expired rooms and close their channels. Returns how many were removed.
    pub async fn cleanup_stale_rooms(&self) -> RoomResult<usize> {
        let finished = chrono::Duration::seconds(
            i64::try_from(self.server.finished_room_timeout).unwrap_or(i64::MAX / 1000),
        );
        let idle = chrono::Duration::seconds(
            i64::try_from(self.server.idle_room_timeout).unwrap_or(i64::MAX / 1000),
        );
        let removed = self
            .directory
            .cleanup_stale_rooms(finished, idle)
            .await
            .map_err(|e| self.persistence(e))?;
        for room in &removed {
            self.announce_closed(room, "room expired").await;
        }
        let count = removed.len();
        if count > 0 {
            self.metrics.add_stale_rooms_cleaned(count as u64);
            info!(count, "Cleaned up stale rooms");
        }
        Ok(count)
    }
}

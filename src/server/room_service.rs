use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::connection_manager::RoomBinding;
use super::PartyServer;
use crate::channel::{ChannelSession, SessionEvent};
use crate::coordination::JoinedRoom;
use crate::directory::DirectoryChange;
use crate::error::{RoomError, RoomResult};
use crate::protocol::{
    ChannelEvent, ErrorCode, PlayerId, Room, RoomId, RoomJoinedPayload, ServerMessage,
};

/// How long to wait for the channel's closing broadcast after the room row vanished.
const ROOM_GONE_GRACE: Duration = Duration::from_secs(2);

const DEFAULT_CLOSE_REASON: &str = "room closed";

enum RelayExit {
    /// The binding was replaced or dropped by the connection itself
    Stopped,
    /// The member is no longer on the roster (kicked)
    Removed,
    Closed,
}

impl PartyServer {
    /// The room code this connection is bound to.
    pub(crate) fn current_room(&self, identity: &PlayerId) -> RoomResult<String> {
        self.connection_manager
            .room_code(identity)
            .ok_or_else(|| RoomError::InvalidField {
                code: ErrorCode::NotInRoom,
                reason: "join or create a room first".to_string(),
            })
    }

    pub(crate) async fn handle_create_room(
        self: &Arc<Self>,
        identity: PlayerId,
        display_name: String,
    ) -> RoomResult<()> {
        let room = self
            .coordinator
            .create_room(identity, &display_name)
            .await?;
        let roster = self.coordinator.roster(&room.code).await?;
        let member = roster
            .iter()
            .find(|p| p.user_id == identity)
            .cloned()
            .ok_or_else(|| RoomError::NotMember(room.code.clone()))?;
        self.enter_room(
            identity,
            &display_name,
            JoinedRoom {
                room,
                member,
                roster,
                already_member: false,
            },
        )
        .await
    }

    pub(crate) async fn handle_join_room(
        self: &Arc<Self>,
        identity: PlayerId,
        room_code: String,
        display_name: String,
    ) -> RoomResult<()> {
        let joined = self
            .coordinator
            .join_room(&room_code, identity, &display_name)
            .await?;
        // A re-joining member keeps the name it was seated with.
        let name = joined.member.display_name.clone();
        self.enter_room(identity, &name, joined).await
    }

    pub(crate) async fn handle_leave_room(&self, identity: PlayerId) -> RoomResult<()> {
        let code = self.current_room(&identity)?;
        let room_id = self.connection_manager.set_leaving(&identity, true);
        if let Err(err) = self.coordinator.leave_room(identity, &code).await {
            // Still seated; keep relaying as before.
            self.connection_manager.set_leaving(&identity, false);
            return Err(err);
        }
        if let Some(room_id) = room_id {
            self.connection_manager.unbind_room(&identity, Some(&room_id));
        }
        self.send_to(&identity, ServerMessage::RoomLeft { room_code: code });
        Ok(())
    }

    async fn enter_room(
        self: &Arc<Self>,
        identity: PlayerId,
        display_name: &str,
        joined: JoinedRoom,
    ) -> RoomResult<()> {
        let room = joined.room.clone();
        self.send_to(
            &identity,
            ServerMessage::RoomJoined(Box::new(RoomJoinedPayload {
                room: joined.room,
                roster: joined.roster,
                you: joined.member,
            })),
        );
        self.bind_room(identity, display_name, &room).await
    }

    /// Subscribe the connection to the room channel and start relaying.
    async fn bind_room(
        self: &Arc<Self>,
        identity: PlayerId,
        display_name: &str,
        room: &Room,
    ) -> RoomResult<()> {
        let changes = self.directory.subscribe_changes();
        let session = self
            .coordinator
            .open_channel(&room.code, identity, display_name)
            .await?;

        let (stop, stopped) = oneshot::channel();
        let binding = RoomBinding {
            room_id: room.id,
            code: room.code.clone(),
            stop,
            leaving: false,
        };
        if !self.connection_manager.bind_room(&identity, binding) {
            session.leave().await;
            return Ok(());
        }

        let server = Arc::clone(self);
        let room_id = room.id;
        let code = room.code.clone();
        tokio::spawn(async move {
            server
                .relay_room(identity, room_id, code, session, changes, stopped)
                .await;
        });
        Ok(())
    }

    /// Forward channel traffic and directory changes for one bound room until the
    /// binding is dropped, the member is removed or the room closes.
    async fn relay_room(
        self: Arc<Self>,
        identity: PlayerId,
        room_id: RoomId,
        code: String,
        mut session: ChannelSession,
        mut changes: broadcast::Receiver<DirectoryChange>,
        mut stopped: oneshot::Receiver<()>,
    ) {
        let mut close_reason: Option<String> = None;
        let mut gone_deadline: Option<Instant> = None;

        let exit = loop {
            tokio::select! {
                biased;

                _ = &mut stopped => break RelayExit::Stopped,

                () = tokio::time::sleep_until(gone_deadline.unwrap_or_else(Instant::now)),
                    if gone_deadline.is_some() => break RelayExit::Closed,

                event = session.next_event() => match event {
                    SessionEvent::Closed => break RelayExit::Closed,
                    SessionEvent::Lagged(_) => {}
                    SessionEvent::Resubscribed => {
                        debug!(%identity, room_code = %code, "Re-reading room after resubscribe");
                        match self.refresh_room(&identity, &room_id).await {
                            Refresh::Current => {}
                            Refresh::Removed => break RelayExit::Removed,
                            Refresh::Gone => {
                                gone_deadline.get_or_insert_with(|| Instant::now() + ROOM_GONE_GRACE);
                            }
                        }
                    }
                    other => {
                        if let Some(ChannelEvent::RoomClosed { reason }) =
                            other.envelope().map(|envelope| &envelope.event)
                        {
                            close_reason = Some(reason.clone());
                        }
                        if let Some(message) = other.server_message() {
                            self.send_to(&identity, message);
                        }
                    }
                },

                change = changes.recv() => match change {
                    Ok(change) if change.room_id != room_id => {}
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        match self.refresh_room(&identity, &room_id).await {
                            Refresh::Current => {}
                            Refresh::Removed => break RelayExit::Removed,
                            Refresh::Gone => {
                                gone_deadline.get_or_insert_with(|| Instant::now() + ROOM_GONE_GRACE);
                            }
                        }
                    }
                    Err(RecvError::Closed) => break RelayExit::Stopped,
                },
            }
        };

        session.leave().await;
        match exit {
            RelayExit::Stopped => {}
            RelayExit::Removed => {
                if self
                    .connection_manager
                    .unbind_room(&identity, Some(&room_id))
                    .is_some_and(|binding| !binding.leaving)
                {
                    self.send_to(&identity, ServerMessage::RoomLeft { room_code: code });
                }
            }
            RelayExit::Closed => {
                if self
                    .connection_manager
                    .unbind_room(&identity, Some(&room_id))
                    .is_some_and(|binding| !binding.leaving)
                {
                    self.send_to(
                        &identity,
                        ServerMessage::RoomClosed {
                            room_code: code,
                            reason: close_reason.unwrap_or_else(|| DEFAULT_CLOSE_REASON.into()),
                        },
                    );
                }
            }
        }
    }

    /// Re-read the room and roster and push them to the connection.
    async fn refresh_room(&self, identity: &PlayerId, room_id: &RoomId) -> Refresh {
        let room = match self.directory.get_room(room_id).await {
            Ok(Some(room)) => room,
            Ok(None) => return Refresh::Gone,
            Err(err) => {
                warn!(%identity, %room_id, error = %err, "Failed to refresh room");
                return Refresh::Current;
            }
        };
        let roster = match self.directory.list_players(room_id).await {
            Ok(roster) => roster,
            Err(err) => {
                warn!(%identity, %room_id, error = %err, "Failed to refresh roster");
                return Refresh::Current;
            }
        };
        if !roster.iter().any(|member| member.user_id == *identity) {
            return Refresh::Removed;
        }
        self.send_to(identity, ServerMessage::RoomUpdated { room });
        self.send_to(identity, ServerMessage::RosterUpdated { roster });
        Refresh::Current
    }
}

enum Refresh {
    Current,
    Removed,
    Gone,
}

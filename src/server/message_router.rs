use std::sync::Arc;

use crate::error::RoomResult;
use crate::protocol::{ClientMessage, GameSnapshot, PlayerId, ServerMessage};

use super::PartyServer;

const DEFAULT_CLOSE_REASON: &str = "closed by host";

impl PartyServer {
    /// Dispatch one client message. Failures are reported to the sender as `Error`.
    pub async fn handle_client_message(self: &Arc<Self>, identity: PlayerId, message: ClientMessage) {
        if let Err(err) = self.dispatch(identity, message).await {
            self.send_error(&identity, &err);
        }
    }

    async fn dispatch(self: &Arc<Self>, identity: PlayerId, message: ClientMessage) -> RoomResult<()> {
        match message {
            ClientMessage::CreateRoom { display_name } => {
                self.handle_create_room(identity, display_name).await
            }
            ClientMessage::JoinRoom {
                room_code,
                display_name,
            } => {
                self.handle_join_room(identity, room_code, display_name)
                    .await
            }
            ClientMessage::LeaveRoom => self.handle_leave_room(identity).await,
            ClientMessage::KickPlayer { target } => {
                let code = self.current_room(&identity)?;
                self.coordinator.kick_player(identity, &code, target).await?;
                Ok(())
            }
            ClientMessage::SelectGame { game_id } => {
                let code = self.current_room(&identity)?;
                self.coordinator
                    .select_game(identity, &code, &game_id)
                    .await?;
                Ok(())
            }
            ClientMessage::SetVisibility { is_public } => {
                let code = self.current_room(&identity)?;
                self.coordinator
                    .set_visibility(identity, &code, is_public)
                    .await?;
                Ok(())
            }
            ClientMessage::SetMaxPlayers { max_players } => {
                let code = self.current_room(&identity)?;
                self.coordinator
                    .set_max_players(identity, &code, max_players)
                    .await?;
                Ok(())
            }
            ClientMessage::SetReady { ready } => {
                let code = self.current_room(&identity)?;
                self.coordinator.set_ready(identity, &code, ready).await?;
                Ok(())
            }
            ClientMessage::StartGame { snapshot } => {
                let code = self.current_room(&identity)?;
                let snapshot = match snapshot {
                    Some(snapshot) => snapshot,
                    None => {
                        let room = self.coordinator.room(&code).await?;
                        GameSnapshot::empty(room.game_id.unwrap_or_default())
                    }
                };
                self.coordinator
                    .start_game(identity, &code, snapshot)
                    .await?;
                Ok(())
            }
            ClientMessage::FinishGame => {
                let code = self.current_room(&identity)?;
                self.coordinator.finish_game(identity, &code).await?;
                Ok(())
            }
            ClientMessage::CloseRoom { reason } => {
                let code = self.current_room(&identity)?;
                let reason = reason.unwrap_or_else(|| DEFAULT_CLOSE_REASON.to_string());
                self.coordinator.close_room(identity, &code, &reason).await
            }
            ClientMessage::MigrateHost => {
                let code = self.current_room(&identity)?;
                self.coordinator.migrate_host(&code).await?;
                Ok(())
            }
            ClientMessage::Broadcast { event } => {
                let code = self.current_room(&identity)?;
                self.coordinator.publish(identity, &code, event).await?;
                Ok(())
            }
            ClientMessage::Ping => {
                self.send_to(&identity, ServerMessage::Pong);
                Ok(())
            }
        }
    }
}

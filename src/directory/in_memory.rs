use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{
    ChangeKind, DirectoryChange, MembershipInsert, NewMember, RoomCodeTaken, RoomDirectory,
    RoomUpdate,
};
use crate::protocol::{PlayerId, Room, RoomId, RoomPlayer, RoomStatus, RoomSummary};

const DEFAULT_CHANGE_CAPACITY: usize = 1024;

#[derive(Default)]
struct DirectoryState {
    rooms: HashMap<RoomId, Room>,
    codes: HashMap<String, RoomId>,
    /// Members per room, kept in `(joined_at, seq)` order
    players: HashMap<RoomId, Vec<RoomPlayer>>,
    next_seq: u64,
}

impl DirectoryState {
    fn touch(&mut self, room_id: &RoomId) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.updated_at = Utc::now();
        }
    }

    fn remove_room(&mut self, room_id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(room_id)?;
        self.codes.remove(&room.code);
        self.players.remove(room_id);
        Some(room)
    }

    fn member_count(&self, room_id: &RoomId) -> usize {
        self.players.get(room_id).map_or(0, Vec::len)
    }
}

/// In-memory directory for tests and single-instance deployments
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
    changes: broadcast::Sender<DirectoryChange>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::with_change_capacity(DEFAULT_CHANGE_CAPACITY)
    }

    /// `capacity` bounds how far a change subscriber may lag before it sees `Lagged`.
    pub fn with_change_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            state: RwLock::new(DirectoryState::default()),
            changes,
        }
    }

    fn publish(&self, room: &Room, kind: ChangeKind) {
        // No subscribers is fine.
        let _ = self.changes.send(DirectoryChange {
            room_id: room.id,
            code: room.code.clone(),
            kind,
        });
    }

    /// Apply `mutate` to a room when `accept` holds, publishing a room change on success.
    async fn update_room_if<A, M>(&self, room_id: &RoomId, accept: A, mutate: M) -> RoomUpdate
    where
        A: FnOnce(&Room, usize) -> bool + Send,
        M: FnOnce(&mut Room) + Send,
    {
        let mut state = self.state.write().await;
        let members = state.member_count(room_id);
        let Some(room) = state.rooms.get_mut(room_id) else {
            return RoomUpdate::Missing;
        };
        if !accept(room, members) {
            return RoomUpdate::Rejected(room.clone());
        }
        mutate(room);
        room.updated_at = Utc::now();
        let updated = room.clone();
        drop(state);

        self.publish(&updated, ChangeKind::Room);
        RoomUpdate::Updated(updated)
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomDirectory for InMemoryDirectory {
    async fn insert_room(&self, room: Room) -> Result<Room> {
        let mut state = self.state.write().await;
        if state.codes.contains_key(&room.code) {
            return Err(RoomCodeTaken(room.code).into());
        }
        if state.rooms.contains_key(&room.id) {
            anyhow::bail!("Room id {} already exists", room.id);
        }
        state.codes.insert(room.code.clone(), room.id);
        state.players.insert(room.id, Vec::new());
        state.rooms.insert(room.id, room.clone());
        drop(state);

        self.publish(&room, ChangeKind::Room);
        Ok(room)
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Option<Room>> {
        Ok(self.state.read().await.rooms.get(room_id).cloned())
    }

    async fn get_room_by_code(&self, code: &str) -> Result<Option<Room>> {
        let state = self.state.read().await;
        Ok(state
            .codes
            .get(code)
            .and_then(|room_id| state.rooms.get(room_id))
            .cloned())
    }

    async fn delete_room(&self, room_id: &RoomId) -> Result<Option<Room>> {
        let removed = self.state.write().await.remove_room(room_id);
        if let Some(room) = &removed {
            self.publish(room, ChangeKind::Deleted);
        }
        Ok(removed)
    }

    async fn compare_and_set_host(
        &self,
        room_id: &RoomId,
        expected: &PlayerId,
        new_host: &PlayerId,
    ) -> Result<RoomUpdate> {
        let expected = *expected;
        let new_host = *new_host;
        Ok(self
            .update_room_if(
                room_id,
                |room, _| room.host_id == expected,
                |room| room.host_id = new_host,
            )
            .await)
    }

    async fn set_game(&self, room_id: &RoomId, game_id: &str) -> Result<RoomUpdate> {
        let game_id = game_id.to_string();
        Ok(self
            .update_room_if(
                room_id,
                |room, _| room.status == RoomStatus::Waiting,
                |room| room.game_id = Some(game_id),
            )
            .await)
    }

    async fn set_visibility(&self, room_id: &RoomId, is_public: bool) -> Result<RoomUpdate> {
        Ok(self
            .update_room_if(room_id, |_, _| true, |room| room.is_public = is_public)
            .await)
    }

    async fn set_max_players(&self, room_id: &RoomId, max_players: u8) -> Result<RoomUpdate> {
        Ok(self
            .update_room_if(
                room_id,
                |_, members| usize::from(max_players) >= members,
                |room| room.max_players = max_players,
            )
            .await)
    }

    async fn advance_status(&self, room_id: &RoomId, from: RoomStatus) -> Result<RoomUpdate> {
        let Some(to) = from.next() else {
            anyhow::bail!("Room status {from} has no successor");
        };
        Ok(self
            .update_room_if(room_id, |room, _| room.status == from, |room| room.status = to)
            .await)
    }

    async fn touch_room(&self, room_id: &RoomId) -> Result<bool> {
        let mut state = self.state.write().await;
        Ok(match state.rooms.get_mut(room_id) {
            Some(room) => {
                room.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn insert_player(&self, room_id: &RoomId, member: NewMember) -> Result<MembershipInsert> {
        let mut state = self.state.write().await;
        let Some(room) = state.rooms.get(room_id) else {
            return Ok(MembershipInsert::RoomMissing);
        };
        let (status, max_players) = (room.status, room.max_players);

        let members = state.players.entry(*room_id).or_default();
        if let Some(existing) = members.iter().find(|p| p.user_id == member.user_id) {
            return Ok(MembershipInsert::Existing(existing.clone()));
        }
        if status != RoomStatus::Waiting {
            return Ok(MembershipInsert::NotJoinable(status));
        }
        if members.len() >= usize::from(max_players) {
            return Ok(MembershipInsert::Full { max_players });
        }

        state.next_seq += 1;
        let player = RoomPlayer {
            id: Uuid::new_v4(),
            room_id: *room_id,
            user_id: member.user_id,
            display_name: member.display_name,
            is_ready: member.is_ready,
            joined_at: Utc::now(),
            seq: state.next_seq,
        };
        let members = state.players.entry(*room_id).or_default();
        members.push(player.clone());
        members.sort_by_key(RoomPlayer::join_order);
        state.touch(room_id);
        let room = state.rooms.get(room_id).cloned();
        drop(state);

        if let Some(room) = room {
            self.publish(&room, ChangeKind::Players);
        }
        Ok(MembershipInsert::Inserted(player))
    }

    async fn delete_player(
        &self,
        room_id: &RoomId,
        user_id: &PlayerId,
    ) -> Result<Option<RoomPlayer>> {
        let mut state = self.state.write().await;
        let removed = state.players.get_mut(room_id).and_then(|members| {
            let idx = members.iter().position(|p| p.user_id == *user_id)?;
            Some(members.remove(idx))
        });
        if removed.is_none() {
            return Ok(None);
        }
        state.touch(room_id);
        let room = state.rooms.get(room_id).cloned();
        drop(state);

        if let Some(room) = room {
            self.publish(&room, ChangeKind::Players);
        }
        Ok(removed)
    }

    async fn set_player_ready(
        &self,
        room_id: &RoomId,
        user_id: &PlayerId,
        ready: bool,
    ) -> Result<Option<RoomPlayer>> {
        let mut state = self.state.write().await;
        let updated = state.players.get_mut(room_id).and_then(|members| {
            let player = members.iter_mut().find(|p| p.user_id == *user_id)?;
            player.is_ready = ready;
            Some(player.clone())
        });
        if updated.is_none() {
            return Ok(None);
        }
        state.touch(room_id);
        let room = state.rooms.get(room_id).cloned();
        drop(state);

        if let Some(room) = room {
            self.publish(&room, ChangeKind::Players);
        }
        Ok(updated)
    }

    async fn list_players(&self, room_id: &RoomId) -> Result<Vec<RoomPlayer>> {
        Ok(self
            .state
            .read()
            .await
            .players
            .get(room_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_public_rooms(&self) -> Result<Vec<RoomSummary>> {
        let state = self.state.read().await;
        let mut rooms: Vec<RoomSummary> = state
            .rooms
            .values()
            .filter(|room| room.is_public && room.status == RoomStatus::Waiting)
            .map(|room| RoomSummary {
                code: room.code.clone(),
                game_id: room.game_id.clone(),
                player_count: state.member_count(&room.id),
                max_players: room.max_players,
                created_at: room.created_at,
            })
            .collect();
        rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rooms)
    }

    async fn cleanup_stale_rooms(
        &self,
        finished_timeout: chrono::Duration,
        idle_timeout: chrono::Duration,
    ) -> Result<Vec<Room>> {
        let now = Utc::now();
        let mut state = self.state.write().await;
        let stale: Vec<RoomId> = state
            .rooms
            .values()
            .filter(|room| {
                let idle = now.signed_duration_since(room.updated_at);
                (room.status == RoomStatus::Finished && idle >= finished_timeout)
                    || idle >= idle_timeout
            })
            .map(|room| room.id)
            .collect();
        let removed: Vec<Room> = stale
            .iter()
            .filter_map(|room_id| state.remove_room(room_id))
            .collect();
        drop(state);

        for room in &removed {
            self.publish(room, ChangeKind::Deleted);
        }
        Ok(removed)
    }

    async fn room_count(&self) -> Result<usize> {
        Ok(self.state.read().await.rooms.len())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<DirectoryChange> {
        self.changes.subscribe()
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn member(name: &str) -> NewMember {
        NewMember {
            user_id: Uuid::new_v4(),
            display_name: name.to_string(),
            is_ready: false,
        }
    }

    async fn room_with_capacity(directory: &InMemoryDirectory, code: &str, max: u8) -> Room {
        directory
            .insert_room(Room::new(code.to_string(), Uuid::new_v4(), max))
            .await
            .expect("room insert should succeed")
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected_with_typed_error() {
        let directory = InMemoryDirectory::new();
        room_with_capacity(&directory, "AB7KQ2", 4).await;

        let err = directory
            .insert_room(Room::new("AB7KQ2".to_string(), Uuid::new_v4(), 4))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<RoomCodeTaken>().is_some());
    }

    #[tokio::test]
    async fn code_is_reusable_after_delete() {
        let directory = InMemoryDirectory::new();
        let room = room_with_capacity(&directory, "AB7KQ2", 4).await;
        directory.insert_player(&room.id, member("A")).await.unwrap();

        let deleted = directory.delete_room(&room.id).await.unwrap();
        assert_eq!(deleted.map(|r| r.id), Some(room.id));
        assert!(directory.list_players(&room.id).await.unwrap().is_empty());
        assert!(directory.get_room_by_code("AB7KQ2").await.unwrap().is_none());

        room_with_capacity(&directory, "AB7KQ2", 4).await;
    }

    #[tokio::test]
    async fn insert_player_enforces_capacity_and_status() {
        let directory = InMemoryDirectory::new();
        let room = room_with_capacity(&directory, "CAP234", 2).await;

        let first = member("A");
        assert!(matches!(
            directory.insert_player(&room.id, first.clone()).await.unwrap(),
            MembershipInsert::Inserted(_)
        ));
        assert!(matches!(
            directory.insert_player(&room.id, member("B")).await.unwrap(),
            MembershipInsert::Inserted(_)
        ));
        assert_eq!(
            directory.insert_player(&room.id, member("C")).await.unwrap(),
            MembershipInsert::Full { max_players: 2 }
        );
        // Existing members are recognized even when the room is full.
        assert!(matches!(
            directory.insert_player(&room.id, first).await.unwrap(),
            MembershipInsert::Existing(_)
        ));

        directory
            .advance_status(&room.id, RoomStatus::Waiting)
            .await
            .unwrap();
        directory.set_max_players(&room.id, 4).await.unwrap();
        assert_eq!(
            directory.insert_player(&room.id, member("D")).await.unwrap(),
            MembershipInsert::NotJoinable(RoomStatus::Playing)
        );
    }

    #[tokio::test]
    async fn roster_is_ordered_by_join_sequence() {
        let directory = InMemoryDirectory::new();
        let room = room_with_capacity(&directory, "ORD234", 8).await;
        for name in ["A", "B", "C", "D"] {
            directory.insert_player(&room.id, member(name)).await.unwrap();
        }
        let roster = directory.list_players(&room.id).await.unwrap();
        let names: Vec<_> = roster.iter().map(|p| p.display_name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C", "D"]);
        assert!(roster.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test]
    async fn status_advance_is_compare_and_set() {
        let directory = InMemoryDirectory::new();
        let room = room_with_capacity(&directory, "CAS234", 4).await;

        let RoomUpdate::Updated(playing) = directory
            .advance_status(&room.id, RoomStatus::Waiting)
            .await
            .unwrap()
        else {
            panic!("first advance should win");
        };
        assert_eq!(playing.status, RoomStatus::Playing);

        let second = directory
            .advance_status(&room.id, RoomStatus::Waiting)
            .await
            .unwrap();
        assert!(matches!(second, RoomUpdate::Rejected(r) if r.status == RoomStatus::Playing));

        assert!(directory
            .advance_status(&room.id, RoomStatus::Finished)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn game_selection_requires_waiting_room() {
        let directory = InMemoryDirectory::new();
        let room = room_with_capacity(&directory, "GAM234", 4).await;
        assert!(matches!(
            directory.set_game(&room.id, "trivia").await.unwrap(),
            RoomUpdate::Updated(r) if r.game_id.as_deref() == Some("trivia")
        ));
        directory
            .advance_status(&room.id, RoomStatus::Waiting)
            .await
            .unwrap();
        assert!(matches!(
            directory.set_game(&room.id, "charades").await.unwrap(),
            RoomUpdate::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn max_players_cannot_drop_below_members() {
        let directory = InMemoryDirectory::new();
        let room = room_with_capacity(&directory, "MAX234", 8).await;
        for name in ["A", "B", "C"] {
            directory.insert_player(&room.id, member(name)).await.unwrap();
        }
        assert!(matches!(
            directory.set_max_players(&room.id, 2).await.unwrap(),
            RoomUpdate::Rejected(_)
        ));
        assert!(matches!(
            directory.set_max_players(&room.id, 3).await.unwrap(),
            RoomUpdate::Updated(r) if r.max_players == 3
        ));
    }

    #[tokio::test]
    async fn host_compare_and_set() {
        let directory = InMemoryDirectory::new();
        let room = room_with_capacity(&directory, "HST234", 4).await;
        let next = Uuid::new_v4();

        assert!(matches!(
            directory
                .compare_and_set_host(&room.id, &room.host_id, &next)
                .await
                .unwrap(),
            RoomUpdate::Updated(r) if r.host_id == next
        ));
        assert!(matches!(
            directory
                .compare_and_set_host(&room.id, &room.host_id, &Uuid::new_v4())
                .await
                .unwrap(),
            RoomUpdate::Rejected(r) if r.host_id == next
        ));
    }

    #[tokio::test]
    async fn changes_are_published_per_write() {
        let directory = InMemoryDirectory::new();
        let mut changes = directory.subscribe_changes();

        let room = room_with_capacity(&directory, "CHG234", 4).await;
        let joined = member("A");
        let user = joined.user_id;
        directory.insert_player(&room.id, joined).await.unwrap();
        directory.delete_player(&room.id, &user).await.unwrap();
        directory.delete_room(&room.id).await.unwrap();

        let kinds: Vec<ChangeKind> = (0..4)
            .map(|_| changes.try_recv().expect("change should be queued").kind)
            .collect();
        assert_eq!(
            kinds,
            [
                ChangeKind::Room,
                ChangeKind::Players,
                ChangeKind::Players,
                ChangeKind::Deleted
            ]
        );
    }

    #[tokio::test]
    async fn public_listing_only_shows_waiting_public_rooms() {
        let directory = InMemoryDirectory::new();
        let private = room_with_capacity(&directory, "PRV234", 4).await;
        let public = room_with_capacity(&directory, "PUB234", 4).await;
        let started = room_with_capacity(&directory, "STA234", 4).await;
        directory.set_visibility(&public.id, true).await.unwrap();
        directory.set_visibility(&started.id, true).await.unwrap();
        directory
            .advance_status(&started.id, RoomStatus::Waiting)
            .await
            .unwrap();
        directory.insert_player(&public.id, member("A")).await.unwrap();

        let listed = directory.list_public_rooms().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].code, "PUB234");
        assert_eq!(listed[0].player_count, 1);
        assert!(directory.get_room(&private.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cleanup_removes_finished_and_idle_rooms() {
        let directory = InMemoryDirectory::new();
        let waiting = room_with_capacity(&directory, "WAI234", 4).await;
        let finished = room_with_capacity(&directory, "FIN234", 4).await;
        directory
            .advance_status(&finished.id, RoomStatus::Waiting)
            .await
            .unwrap();
        directory
            .advance_status(&finished.id, RoomStatus::Playing)
            .await
            .unwrap();

        let removed = directory
            .cleanup_stale_rooms(chrono::Duration::zero(), chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, finished.id);
        assert!(directory.get_room(&waiting.id).await.unwrap().is_some());

        let removed = directory
            .cleanup_stale_rooms(chrono::Duration::zero(), chrono::Duration::zero())
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(directory.room_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn touched_rooms_stay_out_of_the_idle_sweep() {
        let directory = InMemoryDirectory::new();
        let room = room_with_capacity(&directory, "PLY234", 4).await;
        directory
            .advance_status(&room.id, RoomStatus::Waiting)
            .await
            .unwrap();
        let mut changes = directory.subscribe_changes();
        let idle = chrono::Duration::milliseconds(40);

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert!(directory.touch_room(&room.id).await.unwrap());
        assert!(changes.try_recv().is_err());
        let removed = directory
            .cleanup_stale_rooms(chrono::Duration::zero(), idle)
            .await
            .unwrap();
        assert!(removed.is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        let removed = directory
            .cleanup_stale_rooms(chrono::Duration::zero(), idle)
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!directory.touch_room(&room.id).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_inserts_never_exceed_capacity() {
        let directory = Arc::new(InMemoryDirectory::new());
        let room = room_with_capacity(&directory, "CON234", 5).await;
        let task_count = 20;
        let barrier = Arc::new(tokio::sync::Barrier::new(task_count));

        let mut handles = Vec::with_capacity(task_count);
        for i in 0..task_count {
            let directory = Arc::clone(&directory);
            let barrier = Arc::clone(&barrier);
            let room_id = room.id;
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                directory
                    .insert_player(&room_id, member(&format!("P{i}")))
                    .await
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if let MembershipInsert::Inserted(_) = handle.await.unwrap().unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 5);
        assert_eq!(directory.list_players(&room.id).await.unwrap().len(), 5);
    }
}

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use boombox_core::Id;
use futures_util::Stream;
use tokio::sync::mpsc;

use crate::{Catalog, CollabContext, CollabEvent, Database, PrimaryKey};

use super::RoomId;

pub type RoomConnectionId = Id<RoomConnection>;

/// Represents a user's live presence in a room
#[derive(Debug, Clone)]
pub struct RoomConnection {
    pub id: RoomConnectionId,
    pub user_id: PrimaryKey,
    sender: mpsc::Sender<CollabEvent>,
}

/// A handle to a room connection, which streams the room's events and removes
/// the connection from the room when dropped
pub struct RoomConnectionHandle<C, Db>
where
    C: Catalog,
    Db: Database,
{
    connection_id: RoomConnectionId,
    room_id: RoomId,
    context: CollabContext<C, Db>,
    receiver: mpsc::Receiver<CollabEvent>,
}

impl RoomConnection {
    /// Creates a connection with a bounded delivery buffer, returning the
    /// receiving end the handle will stream from
    pub fn new(user_id: PrimaryKey, buffer: usize) -> (Self, mpsc::Receiver<CollabEvent>) {
        let (sender, receiver) = mpsc::channel(buffer);

        let connection = Self {
            id: RoomConnectionId::new(),
            user_id,
            sender,
        };

        (connection, receiver)
    }

    /// Queues an event for delivery without waiting on the consumer.
    /// Returns false when the consumer is gone or too slow to keep up.
    pub fn send(&self, event: CollabEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }
}

impl<C, Db> RoomConnectionHandle<C, Db>
where
    C: Catalog,
    Db: Database,
{
    pub fn new(
        context: &CollabContext<C, Db>,
        connection_id: RoomConnectionId,
        room_id: RoomId,
        receiver: mpsc::Receiver<CollabEvent>,
    ) -> Self {
        Self {
            connection_id,
            room_id,
            context: context.clone(),
            receiver,
        }
    }
}

impl<C, Db> Stream for RoomConnectionHandle<C, Db>
where
    C: Catalog,
    Db: Database,
{
    type Item = CollabEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl<C, Db> Drop for RoomConnectionHandle<C, Db>
where
    C: Catalog,
    Db: Database,
{
    fn drop(&mut self) {
        if let Some(room) = self.context.rooms.get(&self.room_id) {
            room.remove_connection(self.connection_id)
        }
    }
}

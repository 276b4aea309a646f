//! Outbound side of the server: the event interface the simulation emits
//! into, and the adapter that turns events and snapshots into queued packets.

use bincode::{deserialize, serialize};
use log::error;
use shared::{GameEvent, Packet, Snapshot};
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Receiver of the discrete notifications produced while a tick runs.
pub trait EventSink {
    fn emit(&mut self, event: GameEvent);
}

/// Collecting sink, used by tests and for events that need routing first.
impl EventSink for Vec<GameEvent> {
    fn emit(&mut self, event: GameEvent) {
        self.push(event);
    }
}

/// Messages sent from the game loop to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<u32>,
    },
}

/// Queues packets for the sender task without ever waiting on delivery.
pub struct Broadcaster {
    game_tx: mpsc::UnboundedSender<GameMessage>,
    queued: u64,
}

impl Broadcaster {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx, queued: 0 }
    }

    /// Number of messages handed to the sender task so far.
    pub fn queued(&self) -> u64 {
        self.queued
    }

    pub fn send_to(&mut self, packet: Packet, addr: SocketAddr) {
        self.queue(GameMessage::SendPacket { packet, addr });
    }

    pub fn broadcast(&mut self, packet: Packet, exclude: Option<u32>) {
        self.queue(GameMessage::BroadcastPacket { packet, exclude });
    }

    pub fn snapshot(&mut self, snapshot: Snapshot) {
        self.broadcast(Packet::Snapshot(snapshot), None);
    }

    fn queue(&mut self, message: GameMessage) {
        if let Err(e) = self.game_tx.send(message) {
            error!("Failed to queue outbound packet: {}", e);
            return;
        }
        self.queued += 1;
    }
}

impl EventSink for Broadcaster {
    fn emit(&mut self, event: GameEvent) {
        self.broadcast(Packet::Event(event), None);
    }
}

/// Serializes a packet into one datagram.
pub fn encode(packet: &Packet) -> Result<Vec<u8>, bincode::Error> {
    serialize(packet)
}

pub fn decode(bytes: &[u8]) -> Result<Packet, bincode::Error> {
    deserialize(bytes)
}

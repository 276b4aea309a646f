//! Client connection management and command buffering for the game server
//!
//! This module handles the server-side management of connected clients, including:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - A single "latest command" slot per client, drained once per tick
//! - Skin validation before a selection ever reaches the simulation
//! - Client capacity management and address tracking
//!
//! Commands arriving between two ticks overwrite each other instead of
//! queueing: only the newest direction, the newest valid skin and a single
//! shoot pulse survive until the simulation loop takes them.

use log::{debug, info};
use shared::{is_valid_skin, Direction, DEFAULT_SKIN};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Silence after which a client is considered gone.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Latest buffered command values of one client
///
/// Every field is overwritten by newer input; `take` hands the whole slot to
/// the simulation loop and leaves an empty one behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSlot {
    pub direction: Option<Direction>,
    pub skin: Option<String>,
    pub shoot: bool,
}

impl CommandSlot {
    pub fn is_empty(&self) -> bool {
        self.direction.is_none() && self.skin.is_none() && !self.shoot
    }

    pub fn take(&mut self) -> CommandSlot {
        std::mem::take(self)
    }
}

/// Represents a connected client and their buffered commands
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server, also the player id
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Skin used the next time this client joins
    pub skin: String,
    /// Commands waiting for the next tick
    pub inbox: CommandSlot,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            skin: DEFAULT_SKIN.to_string(),
            inbox: CommandSlot::default(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.touch();
        self.inbox.direction = Some(direction);
    }

    /// Records a skin selection. Unknown skins are ignored and the previous
    /// selection is kept.
    pub fn select_skin(&mut self, skin: &str) -> bool {
        self.touch();
        if !is_valid_skin(skin) {
            debug!("Client {} selected unknown skin {:?}", self.id, skin);
            return false;
        }
        self.skin = skin.to_string();
        self.inbox.skin = Some(skin.to_string());
        true
    }

    pub fn request_shot(&mut self) {
        self.touch();
        self.inbox.shoot = true;
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients and their pending commands
///
/// The ClientManager provides centralized control over client connections,
/// enforces server capacity limits, and hands buffered commands to the
/// simulation loop in a deterministic (ascending id) order.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self::with_timeout(max_clients, CLIENT_TIMEOUT)
    }

    pub fn with_timeout(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Returns the client registered for `addr`, registering it if needed.
    ///
    /// None means the address is unknown and the server is full.
    pub fn find_or_add(&mut self, addr: SocketAddr) -> Option<u32> {
        self.find_client_by_addr(addr)
            .or_else(|| self.add_client(addr))
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were
    /// already gone. This handles both explicit disconnections and timeouts.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn client(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn client_mut(&mut self, client_id: u32) -> Option<&mut Client> {
        self.clients.get_mut(&client_id)
    }

    /// Marks the client as alive. Returns false for unknown ids.
    pub fn touch(&mut self, client_id: u32) -> bool {
        self.client_mut(client_id).map(Client::touch).is_some()
    }

    /// Collects and clears every non-empty command slot, ordered by client id.
    pub fn take_commands(&mut self) -> Vec<(u32, CommandSlot)> {
        let mut commands: Vec<(u32, CommandSlot)> = self
            .clients
            .values_mut()
            .filter(|client| !client.inbox.is_empty())
            .map(|client| (client.id, client.inbox.take()))
            .collect();
        commands.sort_by_key(|(id, _)| *id);
        commands
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs so their players can be removed from
    /// the game as well.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timeout = self.timeout;
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            info!("Client {} timed out", client_id);
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all client IDs and their network addresses
    ///
    /// Used for broadcasting snapshots and events to all connected clients.
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

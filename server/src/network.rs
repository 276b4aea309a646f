//! Server network layer handling UDP communications and game loop coordination

use crate::broadcast::{self, Broadcaster, EventSink, GameMessage};
use crate::client_manager::ClientManager;
use crate::config::GameConfig;
use crate::game::Game;
use log::{debug, error, info, warn};
use shared::{GameEvent, Packet, DEFAULT_SKIN, SKINS};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Large enough for any client-to-server packet.
const RECV_BUFFER_SIZE: usize = 2048;
const STATS_EVERY_TICKS: u64 = 100;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Asks a running [`Server`] to stop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    /// Returns false if the server loop has already stopped.
    pub fn shutdown(&self) -> bool {
        self.server_tx.send(ServerMessage::Shutdown).is_ok()
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game: Game,
    broadcaster: Broadcaster,
    tick_duration: Duration,
    started: Instant,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: GameConfig,
        max_clients: usize,
        seed: Option<u64>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            tick_duration: Duration::from_millis(config.tick_ms),
            game: Game::new(config, seed),
            broadcaster: Broadcaster::new(game_tx),
            started: Instant::now(),
            server_tx,
            server_rx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Milliseconds since the server started; the game clock.
    fn now(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; RECV_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match broadcast::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                debug!("Server loop gone, stopping receiver");
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping malformed packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that drains the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };
                        let data = match broadcast::encode(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast: {}", e);
                                continue;
                            }
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;
                if server_tx.is_closed() {
                    break;
                }

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { client_id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    /// Processes one incoming packet. Only the per-client command slot is
    /// written here; the game itself changes on joins and departures alone.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Join { name } => self.handle_join(name, addr).await,

            Packet::SelectSkin { skin } => {
                if let Some(client_id) = self.register(addr).await {
                    let mut clients = self.clients.write().await;
                    if let Some(client) = clients.client_mut(client_id) {
                        client.select_skin(&skin);
                    }
                }
            }

            Packet::SetDirection { direction } => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    if let Some(client) = clients.client_mut(client_id) {
                        client.set_direction(direction);
                    }
                }
            }

            Packet::Shoot => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    if let Some(client) = clients.client_mut(client_id) {
                        client.request_shot();
                    }
                }
            }

            Packet::Heartbeat => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.touch(client_id);
                }
            }

            Packet::Disconnect => {
                let client_id = {
                    let mut clients = self.clients.write().await;
                    let client_id = clients.find_client_by_addr(addr);
                    if let Some(client_id) = client_id {
                        clients.remove_client(&client_id);
                    }
                    client_id
                };

                if let Some(client_id) = client_id {
                    let now = self.now();
                    self.game.remove_player(client_id, now, &mut self.broadcaster);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Looks up or registers the client at `addr`, rejecting it when full.
    async fn register(&mut self, addr: SocketAddr) -> Option<u32> {
        let client_id = {
            let mut clients = self.clients.write().await;
            clients.find_or_add(addr)
        };
        if client_id.is_none() {
            warn!("Rejecting {}: server full", addr);
            self.broadcaster.send_to(
                Packet::Rejected {
                    reason: "Server full".to_string(),
                },
                addr,
            );
        }
        client_id
    }

    async fn handle_join(&mut self, name: Option<String>, addr: SocketAddr) {
        let Some(client_id) = self.register(addr).await else {
            return;
        };
        let skin = {
            let mut clients = self.clients.write().await;
            clients.touch(client_id);
            clients
                .client(client_id)
                .map(|client| client.skin.clone())
                .unwrap_or_else(|| DEFAULT_SKIN.to_string())
        };

        let now = self.now();
        let mut events = Vec::new();
        if !self.game.add_player(client_id, name, &skin, now, &mut events) {
            debug!("Ignoring join from living player {}", client_id);
            return;
        }

        self.broadcaster.send_to(
            Packet::Joined {
                player_id: client_id,
                grid_size: self.game.grid.size(),
                skins: SKINS.iter().map(|skin| skin.to_string()).collect(),
            },
            addr,
        );
        self.broadcaster
            .send_to(Packet::Snapshot(self.game.snapshot()), addr);

        for event in events {
            match event {
                GameEvent::PlayerJoined { .. } => self
                    .broadcaster
                    .broadcast(Packet::Event(event), Some(client_id)),
                other => self.broadcaster.emit(other),
            }
        }
    }

    /// Drains buffered commands and advances the simulation by one tick.
    async fn run_tick(&mut self) {
        let commands = {
            let mut clients = self.clients.write().await;
            clients.take_commands()
        };
        self.game.apply_commands(commands);

        let now = self.now();
        if let Some(snapshot) = self.game.tick(now, &mut self.broadcaster) {
            self.broadcaster.snapshot(snapshot);
        }

        if self.game.tick % STATS_EVERY_TICKS == 0 {
            let client_count = self.clients.read().await.len();
            debug!(
                "Tick {}: {} clients, {} players alive, {} packets queued",
                self.game.tick,
                client_count,
                self.game.store.alive_count(),
                self.broadcaster.queued()
            );
        }
    }

    /// Main server loop coordinating all operations
    ///
    /// Returns once a shutdown is requested. The inbox is always polled
    /// before the tick timer, so no tick runs after a shutdown is seen.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                biased;

                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            let now = self.now();
                            self.game.remove_player(client_id, now, &mut self.broadcaster);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    self.run_tick().await;
                }
            }
        }

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let data = broadcast::encode(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

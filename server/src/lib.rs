//! # Snake Arena Server Library
//!
//! This library provides the authoritative server for a multiplayer grid
//! snake game. It owns the canonical game state, buffers player commands
//! between ticks, and pushes snapshots and discrete events to every client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Snakes, bullets, food and timed abilities live only on the server. Clients
//! send intentions (a heading, a skin, a shot) and render whatever the server
//! reports back.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Registration on the first join or skin selection, with a capacity limit
//! - One "latest command" slot per client, overwritten rather than queued
//! - Disconnection and timeout cleanup
//!
//! ### State Broadcasting
//! Every tick with at least one living player produces a full snapshot.
//! Discrete events (food eaten, kills, round over) are broadcast as they
//! happen inside the tick, in a fixed order.
//!
//! ## Architecture Design
//!
//! ### Single Writer
//! All mutation of game state happens in one task: the server loop that
//! handles incoming packets and runs ticks. No locks guard the game itself;
//! the client roster is shared with the timeout and sender tasks behind a
//! `tokio` `RwLock`.
//!
//! ### Fixed Tick Order
//! Within a tick, expiries run first, then bullets, then snake heads, then the
//! round-end check. Bullets therefore always resolve before heads.
//!
//! ## Module Organization
//!
//! - `grid`: the square tile space, bounds checks and wrap-around
//! - `entity`: players, snakes, bullets, abilities, food and the entity store
//! - `spawner`: food and snake placement with a bounded retry budget
//! - `collision`: head and bullet collision resolution
//! - `game`: the simulation loop and round lifecycle
//! - `client_manager`: client roster and per-client command slots
//! - `broadcast`: the event sink interface and the outbound packet queue
//! - `network`: UDP transport, timeouts and the server loop
//! - `config`: tunable constants loaded from TOML
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", GameConfig::default(), 16, None).await?;
//!
//!     // Stop the loop from anywhere with a cloned handle.
//!     let shutdown = server.shutdown_handle();
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.shutdown();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client_manager;
pub mod collision;
pub mod config;
pub mod entity;
pub mod game;
pub mod grid;
pub mod network;
pub mod spawner;

//! # Lexgrid
//!
//! Server for a real-time multiplayer word-grid game.
//!
//! Players meet in rooms identified by a short code, ready up, and play
//! timed rounds on a shared letter grid. The server is authoritative: it
//! validates words, collapses the board, and keeps every client's copy in
//! step with checksummed full resyncs and sequenced tile diffs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lexgrid::prelude::*;
//!
//! # async fn start() -> Result<(), LexgridError> {
//! init_tracing("info");
//! let server = LexgridServer::builder().bind("0.0.0.0:8080").build().await?;
//! server.run().await
//! # }
//! ```

mod engine;
mod error;
mod handler;
mod server;

pub use error::LexgridError;
pub use server::{LexgridServer, LexgridServerBuilder};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise every `lexgrid` crate logs at
/// `default_level`. Calling it twice is harmless.
pub fn init_tracing(default_level: &str) {
    let default_filter = [
        "lexgrid",
        "lexgrid_server",
        "lexgrid_transport",
        "lexgrid_protocol",
        "lexgrid_board",
        "lexgrid_session",
        "lexgrid_room",
        "lexgrid_timer",
    ]
    .iter()
    .map(|target| format!("{target}={default_level}"))
    .collect::<Vec<_>>()
    .join(",");

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{LexgridError, LexgridServer, LexgridServerBuilder, init_tracing};
    pub use lexgrid_protocol::{
        ClientEvent, Difficulty, MatchSettings, MatchStatus, PlayerId, RoomCode, ServerEvent,
    };
    pub use lexgrid_room::{AnyWord, Dictionary, RoomConfig, SyncConfig, WordList};
    pub use lexgrid_session::SessionConfig;
    pub use lexgrid_transport::TransportConfig;
}

//! `LexgridServer` builder and accept loop.
//!
//! This is the entry point for running a Lexgrid server. It ties together
//! all the layers: transport → protocol → engine (sessions + rooms).

use std::time::Instant;

use lexgrid_protocol::JsonCodec;
use lexgrid_room::{AnyWord, Dictionary, RoomConfig, SyncConfig};
use lexgrid_session::SessionConfig;
use lexgrid_transport::{Transport, TransportConfig, WebSocketTransport};
use tokio::sync::mpsc;

use crate::LexgridError;
use crate::engine::{Engine, EngineCommand};
use crate::handler::handle_connection;

/// Builder for configuring and starting a Lexgrid server.
///
/// # Example
///
/// ```rust,no_run
/// use lexgrid::prelude::*;
///
/// # async fn start() -> Result<(), LexgridError> {
/// let server = LexgridServer::builder()
///     .bind("0.0.0.0:8080")
///     .dictionary(WordList::from_words(["cat", "dog"]))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LexgridServerBuilder {
    bind_addr: String,
    transport_config: TransportConfig,
    room_config: RoomConfig,
    sync_config: SyncConfig,
    session_config: SessionConfig,
    dictionary: Box<dyn Dictionary>,
}

impl LexgridServerBuilder {
    /// Creates a new builder with default settings. Every alphabetic word
    /// is accepted until a dictionary is set.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            transport_config: TransportConfig::default(),
            room_config: RoomConfig::default(),
            sync_config: SyncConfig::default(),
            session_config: SessionConfig::default(),
            dictionary: Box::new(AnyWord),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn sync_config(mut self, config: SyncConfig) -> Self {
        self.sync_config = config;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the word validator and scorer.
    pub fn dictionary(mut self, dictionary: impl Dictionary) -> Self {
        self.dictionary = Box::new(dictionary);
        self
    }

    /// Binds the listener. Nothing is accepted until [`LexgridServer::run`].
    pub async fn build(self) -> Result<LexgridServer, LexgridError> {
        let transport = WebSocketTransport::bind_with(&self.bind_addr, self.transport_config).await?;
        let engine = Engine::new(
            self.room_config,
            self.sync_config,
            self.session_config,
            self.dictionary,
            Instant::now(),
        );
        Ok(LexgridServer {
            transport,
            engine,
            codec: JsonCodec,
        })
    }
}

impl Default for LexgridServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Lexgrid server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LexgridServer {
    transport: WebSocketTransport,
    engine: Engine,
    codec: JsonCodec,
}

impl LexgridServer {
    /// Creates a new builder.
    pub fn builder() -> LexgridServerBuilder {
        LexgridServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Starts the engine and runs the accept loop until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), LexgridError> {
        let (commands, queue) = mpsc::unbounded_channel::<EngineCommand>();
        tokio::spawn(self.engine.run(queue));
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Lexgrid server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let commands = commands.clone();
                    let codec = self.codec;
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, codec, commands).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

//! Lexgrid game server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lexgrid-server
//! cargo run --bin lexgrid-server -- --bind 0.0.0.0:8080 --words words.txt
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use lexgrid::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "lexgrid-server")]
#[command(about = "Real-time multiplayer word-grid game server", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Word list, one word per line. Without it any alphabetic word counts
    #[arg(short, long)]
    words: Option<PathBuf>,

    /// Minutes without activity before a room is evicted
    #[arg(long, default_value_t = 30)]
    idle_timeout_mins: u64,

    /// Seconds of countdown before each round
    #[arg(long, default_value_t = 3)]
    countdown_secs: u64,

    /// Largest inbound frame in bytes
    #[arg(long, default_value_t = 64 * 1024)]
    max_frame_bytes: usize,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), LexgridError> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let room_config = RoomConfig {
        idle_timeout: Duration::from_secs(args.idle_timeout_mins * 60),
        countdown: Duration::from_secs(args.countdown_secs),
        ..RoomConfig::default()
    };

    let mut builder = LexgridServer::builder()
        .bind(&args.bind)
        .transport_config(TransportConfig {
            max_frame_bytes: args.max_frame_bytes,
        })
        .room_config(room_config);
    if let Some(path) = &args.words {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LexgridError::WordList {
                path: path.display().to_string(),
                source,
            })?;
        let words = WordList::from_text(&text);
        tracing::info!(path = %path.display(), words = words.len(), "word list loaded");
        builder = builder.dictionary(words);
    }

    let server = builder.build().await?;
    server.run().await
}

//! huddle-relay: WebSocket signaling relay for huddle calls.
//!
//! Groups connections into rooms, forwards `signal` payloads between
//! members, and keeps the single authoritative call record per room. The
//! relay never inspects signal payloads and never carries media.

pub mod connection;
pub mod rooms;

use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

pub use connection::{handle_connection, RelaySettings};
pub use rooms::{ActiveCall, RoomStore};

/// Accept connections until the listener fails permanently.
pub async fn serve(listener: TcpListener, store: RoomStore, settings: RelaySettings) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let store = store.clone();
                let settings = settings.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, store, settings).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}

//! # TCP Transport
//!
//! Newline-delimited JSON over TCP. Socket I/O lives on a tokio runtime;
//! the simulation lives on one plain thread that owns the [`GameServer`].
//! The two sides only meet through channels:
//!
//! ```text
//! reader task ──NetworkEvent──► crossbeam ──► tick thread
//! writer task ◄──Outbound───── tokio mpsc ◄── tick thread
//! ```
//!
//! A slow or dead client can fill only its own outbound queue. The tick
//! thread never awaits and never blocks on a socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, trace, warn};

use terra_procedural::{FileStore, KeyValueStore};

use super::{ConnectionId, GameServer, Outgoing, OutgoingAction, ServerConfig, ServerError, TickLoop};
use crate::protocol::{encode, MAX_MESSAGE_BYTES};

/// Ticks between tick-time reports in the log.
const STATS_INTERVAL_TICKS: u64 = 1200;

/// What socket tasks tell the tick thread.
#[derive(Debug)]
pub enum NetworkEvent {
    /// A socket was accepted.
    Connected {
        /// Assigned id.
        connection: ConnectionId,
        /// Queue drained by the socket's writer task.
        outbound: UnboundedSender<Outbound>,
    },
    /// One inbound line, newline stripped.
    Message {
        /// Sender.
        connection: ConnectionId,
        /// Line text.
        text: String,
    },
    /// The socket closed or failed.
    Disconnected {
        /// Closed connection.
        connection: ConnectionId,
    },
}

/// What the tick thread tells a writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// One encoded message, without the trailing newline.
    Line(String),
    /// Flush and close the socket.
    Close,
}

/// Opens the world, binds the port and serves until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the world metadata
/// cannot be written, or the runtime or listener cannot be created.
pub fn run(config: ServerConfig) -> Result<(), ServerError> {
    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir)?);
    let recipes = config.recipe_book()?;
    info!(recipes = recipes.len(), "recipe table loaded");
    let server = GameServer::new(config.clone(), storage)?.with_recipes(recipes);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("terra-net")
        .enable_all()
        .build()?;
    let listener = runtime.block_on(TcpListener::bind(("0.0.0.0", config.port)))?;
    info!(addr = %listener.local_addr()?, room = %config.room_code, "listening");

    let (event_tx, event_rx) = unbounded();
    let shutdown = Arc::new(AtomicBool::new(false));
    runtime.spawn(accept_loop(listener, event_tx));
    let flag = Arc::clone(&shutdown);
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            flag.store(true, Ordering::SeqCst);
        }
    });

    run_tick_loop(server, &event_rx, &shutdown);

    // Give writer tasks a moment to flush the final Close actions.
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("server stopped");
    Ok(())
}

/// Drives `server` at its tick rate until `shutdown` is set, then saves
/// everything and closes every connection.
pub fn run_tick_loop(mut server: GameServer, events: &Receiver<NetworkEvent>, shutdown: &AtomicBool) {
    let mut ticks = TickLoop::new(server.config().tick_rate);
    let mut outbound: HashMap<ConnectionId, UnboundedSender<Outbound>> = HashMap::new();

    while !shutdown.load(Ordering::SeqCst) {
        match events.recv_timeout(ticks.time_until_next_tick()) {
            Ok(event) => handle_event(&mut server, &mut outbound, event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("network side is gone");
                break;
            }
        }

        while ticks.should_tick() {
            let start = ticks.begin_tick();
            server.tick();
            ticks.end_tick(start);

            if ticks.tick_count() % STATS_INTERVAL_TICKS == 0 {
                let stats = ticks.stats();
                debug!(
                    avg_us = stats.avg_tick_us,
                    max_us = stats.max_tick_us,
                    late = stats.late_ticks,
                    players = server.players().len(),
                    chunks = server.world().len(),
                    "tick stats"
                );
                ticks.reset_stats();
            }
        }
        dispatch(&mut server, &mut outbound);
    }

    server.shutdown();
    dispatch(&mut server, &mut outbound);
}

fn handle_event(
    server: &mut GameServer,
    outbound: &mut HashMap<ConnectionId, UnboundedSender<Outbound>>,
    event: NetworkEvent,
) {
    match event {
        NetworkEvent::Connected { connection, outbound: tx } => {
            outbound.insert(connection, tx);
            server.connect(connection);
        }
        NetworkEvent::Message { connection, text } => server.handle_raw(connection, &text),
        NetworkEvent::Disconnected { connection } => {
            outbound.remove(&connection);
            server.disconnect(connection);
        }
    }
}

fn dispatch(server: &mut GameServer, outbound: &mut HashMap<ConnectionId, UnboundedSender<Outbound>>) {
    for Outgoing { connection, action } in server.drain_outbox() {
        match action {
            OutgoingAction::Send(message) => {
                let Some(tx) = outbound.get(&connection) else {
                    continue;
                };
                if tx.send(Outbound::Line(encode(&message))).is_err() {
                    trace!(%connection, "writer already gone");
                }
            }
            OutgoingAction::Close => {
                if let Some(tx) = outbound.remove(&connection) {
                    let _ = tx.send(Outbound::Close);
                }
            }
        }
    }
}

async fn accept_loop(listener: TcpListener, events: Sender<NetworkEvent>) {
    let mut next_id = 1;
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let connection = ConnectionId(next_id);
                next_id += 1;
                info!(%connection, %addr, "accepted");
                tokio::spawn(serve_connection(stream, connection, events.clone()));
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, connection: ConnectionId, events: Sender<NetworkEvent>) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%connection, error = %e, "set_nodelay failed");
    }
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    if events.send(NetworkEvent::Connected { connection, outbound: tx }).is_err() {
        return;
    }

    let mut writer = tokio::spawn(write_lines(write_half, rx, connection));
    tokio::select! {
        () = read_lines(read_half, connection, &events) => {}
        _ = &mut writer => {}
    }
    let _ = events.send(NetworkEvent::Disconnected { connection });
}

/// Forwards complete lines until EOF. An overlong line is forwarded cut at
/// the size limit (so the server answers `bad_message`) and its remainder is
/// skipped.
async fn read_lines(read_half: OwnedReadHalf, connection: ConnectionId, events: &Sender<NetworkEvent>) {
    let limit = MAX_MESSAGE_BYTES as u64 + 1;
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    let mut discarding = false;

    loop {
        buf.clear();
        match (&mut reader).take(limit).read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let complete = buf.last() == Some(&b'\n');
                if discarding {
                    discarding = !complete;
                    continue;
                }
                if !complete && buf.len() as u64 >= limit {
                    debug!(%connection, "overlong line");
                    discarding = true;
                }
                let text = String::from_utf8_lossy(&buf);
                let text = text.trim_end_matches(['\r', '\n']);
                if text.is_empty() {
                    continue;
                }
                let message = NetworkEvent::Message { connection, text: text.to_owned() };
                if events.send(message).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(%connection, error = %e, "read failed");
                break;
            }
        }
    }
}

async fn write_lines(mut write_half: OwnedWriteHalf, mut rx: UnboundedReceiver<Outbound>, connection: ConnectionId) {
    while let Some(out) = rx.recv().await {
        match out {
            Outbound::Line(mut text) => {
                text.push('\n');
                if let Err(e) = write_half.write_all(text.as_bytes()).await {
                    debug!(%connection, error = %e, "write failed");
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = write_half.shutdown().await;
    trace!(%connection, "writer finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_procedural::MemoryStore;

    #[test]
    fn test_tick_loop_serves_and_closes_on_shutdown() {
        let config = ServerConfig { view_distance: 1, ..ServerConfig::default() };
        let server = GameServer::new(config, Arc::new(MemoryStore::new())).unwrap();
        let (event_tx, event_rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || run_tick_loop(server, &event_rx, &flag));

        let connection = ConnectionId(1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        event_tx.send(NetworkEvent::Connected { connection, outbound: tx }).unwrap();
        let hello = r#"{"type":"hello","nickname":"ann","roomCode":"lobby","clientVersion":3}"#;
        event_tx.send(NetworkEvent::Message { connection, text: hello.to_owned() }).unwrap();

        std::thread::sleep(Duration::from_millis(300));
        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        let mut received = Vec::new();
        while let Ok(out) = rx.try_recv() {
            received.push(out);
        }
        let Some(Outbound::Line(first)) = received.first() else {
            panic!("no welcome: {received:?}");
        };
        assert!(first.contains(r#""type":"welcome""#));
        assert!(received.iter().any(|o| matches!(o, Outbound::Line(l) if l.contains("chunk_data"))));
        assert_eq!(received.last(), Some(&Outbound::Close));
    }
}

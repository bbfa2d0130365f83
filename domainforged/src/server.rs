use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use shared::protocol::{Command, ParseError, NO_DOMAINS, REGISTERED_HEADER};
use crate::registry::Registry;

/// Connections waiting between the acceptor and the dispatcher
const HANDOFF_CAPACITY: usize = 64;

/// Longest request line accepted from a client
const MAX_LINE_BYTES: u64 = 4096;

/// Back-off after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Serve the admin protocol until `cancel` fires.
///
/// One task accepts connections and hands them over a bounded channel to
/// the dispatcher, which runs each connection in its own task. On
/// cancellation the listener is closed first, then in-flight connections
/// are allowed to finish before this returns. A `stop` request fires
/// `stop`; the caller decides what that means.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<Registry>,
    stop: CancellationToken,
    cancel: CancellationToken,
) {
    let (tx, mut rx) = mpsc::channel(HANDOFF_CAPACITY);
    let acceptor = tokio::spawn(accept_loop(listener, tx, cancel.clone()));
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            Some((stream, peer)) = rx.recv() => {
                let registry = registry.clone();
                let stop = stop.clone();
                let cancel = cancel.clone();
                tracker.spawn(async move {
                    if let Err(e) = handle_connection(stream, &registry, &stop, &cancel).await {
                        tracing::debug!("Connection from {} failed: {}", peer, e);
                    }
                });
            }
            _ = cancel.cancelled() => {
                break;
            }
        }
    }

    drop(rx);
    if let Err(e) = acceptor.await {
        tracing::error!("Admin acceptor task failed: {}", e);
    }

    tracker.close();
    tracker.wait().await;
    tracing::info!("Admin server stopped");
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<(TcpStream, SocketAddr)>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok(conn) => {
                        tokio::select! {
                            sent = tx.send(conn) => {
                                if sent.is_err() {
                                    break;
                                }
                            }
                            _ = cancel.cancelled() => break,
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error accepting connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

/// One connection carries exactly one request line and gets one response.
async fn handle_connection(
    mut stream: TcpStream,
    registry: &Registry,
    stop: &CancellationToken,
    cancel: &CancellationToken,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader.take(MAX_LINE_BYTES));
    let mut line = String::new();

    let read = tokio::select! {
        // A line that is already buffered wins over a concurrent shutdown
        biased;
        read = reader.read_line(&mut line) => read?,
        // Don't hold up shutdown for a client that never sends anything
        _ = cancel.cancelled() => return Ok(()),
    };
    if read == 0 {
        tracing::debug!("Connection closed before sending a command");
        return Ok(());
    }

    let responses = if !line.ends_with('\n') && read as u64 == MAX_LINE_BYTES {
        tracing::debug!("Request exceeded {} bytes", MAX_LINE_BYTES);
        vec![ParseError::TooLong(MAX_LINE_BYTES as usize).to_string()]
    } else {
        tracing::debug!("Request: {}", line.trim_end());
        respond(&line, registry, stop).await
    };
    for response in responses {
        writer.write_all(response.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.shutdown().await?;

    Ok(())
}

/// Parse one request line, run it, and return the response lines.
pub async fn respond(line: &str, registry: &Registry, stop: &CancellationToken) -> Vec<String> {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(e) => return vec![e.to_string()],
    };

    match command {
        Command::Add { name, port } => match registry.add(&name, port).await {
            Ok(domain) => vec![format!("Added domain: {domain} with port: {port}")],
            Err(e) => vec![format!("Error: {e}")],
        },
        Command::Remove { name } => match registry.remove(&name).await {
            Ok(domain) => vec![format!("Removed domain: {domain}")],
            Err(e) => vec![format!("Error: {e}")],
        },
        Command::List => {
            let domains = registry.list().await;
            if domains.is_empty() {
                return vec![NO_DOMAINS.to_string()];
            }
            std::iter::once(REGISTERED_HEADER.to_string())
                .chain(domains.iter().map(|domain| format!("- {domain}")))
                .collect()
        }
        Command::Stop => {
            tracing::info!("Stop requested over admin connection");
            stop.cancel();
            Vec::new()
        }
    }
}

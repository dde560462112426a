//! Signaling relay server.
//!
//! Accepts persistent TCP connections, runs one task per connection, and
//! relays typed JSON messages between registered identities. The registry
//! is the only state shared across connections; everything else lives in
//! the per-connection task.

use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::framing::{read_frame, write_message};
use crate::protocol::SignalMessage;
use crate::registry::{next_conn_id, ClientHandle, Registry, OUTBOUND_QUEUE_SIZE};

/// Signaling relay server.
pub struct RelayServer {
    listener: TcpListener,
    registry: Registry,
}

impl RelayServer {
    /// Bind the relay listener. Failure to bind is the only fatal
    /// startup error.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind signaling listener on {}", addr))?;
        Ok(Self {
            listener,
            registry: Registry::new(),
        })
    }

    /// Actual bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one task per connection.
    pub async fn run(self) -> Result<()> {
        info!("Signaling relay listening on {}", self.listener.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("Connection from {}", peer_addr);
                    let registry = self.registry.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer_addr, registry).await {
                            debug!("Connection {} closed: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single endpoint connection until it closes.
async fn handle_connection<S>(stream: S, peer_addr: SocketAddr, registry: Registry) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let conn_id = next_conn_id();

    // Single consumer of the outbound queue. Relayed traffic from other
    // connections and this connection's own replies go through the same
    // queue, keeping frame writes ordered without blocking the read loop.
    let (tx, mut rx) = mpsc::channel::<SignalMessage>(OUTBOUND_QUEUE_SIZE);
    let writer_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = write_message(&mut writer, &message).await {
                debug!("Write failed: {}", e);
                break;
            }
        }
    });

    let mut user_id: Option<String> = None;
    let mut loop_error: Option<anyhow::Error> = None;

    loop {
        // Connection close, transport failure, or a bogus length prefix
        // all end the session here.
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(e) => {
                loop_error = Some(e);
                break;
            }
        };

        // Malformed messages are dropped; the connection survives and no
        // reply is sent.
        let message: SignalMessage = match serde_json::from_slice(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    "Invalid message from {} ({}): {}",
                    sender_name(&user_id),
                    peer_addr,
                    e
                );
                continue;
            }
        };

        debug!(
            "Received {} from {}",
            message.type_name(),
            sender_name(&user_id)
        );

        if let Err(e) = dispatch(message, conn_id, &tx, &mut user_id, &registry).await {
            loop_error = Some(e);
            break;
        }
    }

    // Guaranteed finalization: drop the registry binding on every exit
    // path, but never a newer binding made by another connection.
    if let Some(id) = &user_id {
        if registry.compare_and_remove(id, conn_id).await {
            info!(
                "User disconnected: {}. Total clients: {}",
                id,
                registry.len().await
            );
        }
    }

    writer_task.abort();

    match loop_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Route one inbound message.
///
/// Per-message failures (unroutable target, full target queue) are
/// contained here; an `Err` means this connection's own outbound path is
/// gone and the session should end.
async fn dispatch(
    message: SignalMessage,
    conn_id: u64,
    tx: &mpsc::Sender<SignalMessage>,
    user_id: &mut Option<String>,
    registry: &Registry,
) -> Result<()> {
    match message {
        SignalMessage::Register { user_id: id } => {
            registry
                .insert(
                    &id,
                    ClientHandle {
                        conn_id,
                        tx: tx.clone(),
                    },
                )
                .await;
            *user_id = Some(id.clone());
            info!(
                "User registered: {}. Total clients: {}",
                id,
                registry.len().await
            );
            reply(tx, SignalMessage::Registered { user_id: id }).await?;
        }

        SignalMessage::Offer {
            target_user_id,
            offer,
            ..
        } => {
            let forwarded = SignalMessage::Offer {
                target_user_id: None,
                offer,
                from_user_id: user_id.clone(),
            };
            if !relay(registry, target_user_id.as_deref(), forwarded, user_id).await {
                // Only the offer path reports a missing target.
                reply(tx, SignalMessage::error("Target user not available")).await?;
            }
        }

        SignalMessage::Answer {
            target_user_id,
            answer,
            ..
        } => {
            let forwarded = SignalMessage::Answer {
                target_user_id: None,
                answer,
                from_user_id: user_id.clone(),
            };
            relay(registry, target_user_id.as_deref(), forwarded, user_id).await;
        }

        SignalMessage::IceCandidate {
            target_user_id,
            candidate,
            ..
        } => {
            let forwarded = SignalMessage::IceCandidate {
                target_user_id: None,
                candidate,
                from_user_id: user_id.clone(),
            };
            relay(registry, target_user_id.as_deref(), forwarded, user_id).await;
        }

        SignalMessage::EndCall { target_user_id, .. } => {
            let forwarded = SignalMessage::EndCall {
                target_user_id: None,
                from_user_id: user_id.clone(),
            };
            relay(registry, target_user_id.as_deref(), forwarded, user_id).await;
        }

        // Relay → endpoint messages; inbound copies are ignored.
        SignalMessage::Registered { .. } | SignalMessage::Error { .. } => {
            debug!(
                "Ignoring relay-directed message from {}",
                sender_name(user_id)
            );
        }
    }

    Ok(())
}

/// Enqueue a forwarded message onto the target's outbound queue.
/// Returns false when the target identity is not registered.
async fn relay(
    registry: &Registry,
    target: Option<&str>,
    forwarded: SignalMessage,
    sender: &Option<String>,
) -> bool {
    let Some(target) = target else {
        warn!(
            "{} from {} has no targetUserId",
            forwarded.type_name(),
            sender_name(sender)
        );
        return false;
    };

    match registry.lookup(target).await {
        Some(handle) => {
            info!(
                "Forwarding {} from {} to {}",
                forwarded.type_name(),
                sender_name(sender),
                target
            );
            // A slow or unresponsive target must not block the sender.
            if let Err(e) = handle.tx.try_send(forwarded) {
                warn!("Outbound queue for {} unavailable, dropping message: {}", target, e);
            }
            true
        }
        None => {
            warn!("Target user {} not found", target);
            false
        }
    }
}

/// Send a reply on this connection's own outbound queue.
async fn reply(tx: &mpsc::Sender<SignalMessage>, message: SignalMessage) -> Result<()> {
    tx.send(message)
        .await
        .map_err(|_| anyhow!("Connection writer closed"))
}

fn sender_name(user_id: &Option<String>) -> &str {
    user_id.as_deref().unwrap_or("unregistered")
}

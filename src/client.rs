//! Programmatic client for the signaling relay.
//!
//! Used by endpoint programs to register an identity and exchange
//! negotiation payloads with a named peer through the relay.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::framing::{read_message, write_message};
use crate::protocol::SignalMessage;

/// Client endpoint of the signaling relay.
pub struct SignalingClient<S> {
    stream: S,
    user_id: Option<String>,
}

impl SignalingClient<TcpStream> {
    /// Connect to a signaling relay via TCP.
    pub async fn connect(server_addr: &str) -> Result<Self> {
        info!("Connecting to signaling relay at {}", server_addr);
        let stream = TcpStream::connect(server_addr)
            .await
            .context("Failed to connect to signaling relay")?;
        Ok(Self::new(stream))
    }
}

impl<S> SignalingClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a client over an existing stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            user_id: None,
        }
    }

    /// Register this endpoint's identity and wait for the relay's
    /// acknowledgment.
    pub async fn register(&mut self, user_id: &str) -> Result<()> {
        self.send(SignalMessage::Register {
            user_id: user_id.to_string(),
        })
        .await?;

        match self.recv().await? {
            SignalMessage::Registered { user_id: acked } if acked == user_id => {
                info!("Registered with signaling relay as '{}'", acked);
                self.user_id = Some(acked);
                Ok(())
            }
            SignalMessage::Error { message } => Err(anyhow!("Registration failed: {}", message)),
            other => Err(anyhow!("Unexpected reply to register: {:?}", other)),
        }
    }

    /// Send a session offer to a named peer.
    pub async fn send_offer(&mut self, target_user_id: &str, offer: Value) -> Result<()> {
        self.send(SignalMessage::Offer {
            target_user_id: Some(target_user_id.to_string()),
            offer,
            from_user_id: None,
        })
        .await
    }

    /// Send a session answer to a named peer.
    pub async fn send_answer(&mut self, target_user_id: &str, answer: Value) -> Result<()> {
        self.send(SignalMessage::Answer {
            target_user_id: Some(target_user_id.to_string()),
            answer,
            from_user_id: None,
        })
        .await
    }

    /// Send a network-path candidate to a named peer.
    pub async fn send_candidate(&mut self, target_user_id: &str, candidate: Value) -> Result<()> {
        self.send(SignalMessage::IceCandidate {
            target_user_id: Some(target_user_id.to_string()),
            candidate,
            from_user_id: None,
        })
        .await
    }

    /// Tell a named peer the call is over.
    pub async fn send_end_call(&mut self, target_user_id: &str) -> Result<()> {
        self.send(SignalMessage::EndCall {
            target_user_id: Some(target_user_id.to_string()),
            from_user_id: None,
        })
        .await
    }

    /// Next message from the relay: forwarded peer traffic,
    /// acknowledgments, or routing errors.
    pub async fn recv(&mut self) -> Result<SignalMessage> {
        read_message(&mut self.stream).await
    }

    /// Identity this client registered as, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    async fn send(&mut self, message: SignalMessage) -> Result<()> {
        debug!("Sending {} to relay", message.type_name());
        write_message(&mut self.stream, &message).await
    }
}

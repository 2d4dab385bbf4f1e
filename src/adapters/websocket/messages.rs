//! WebSocket message types for live booking notifications.
//!
//! Defines the protocol between server and connected clients:
//! - Server → Client: Connection outcome, booking events, pongs
//! - Client → Server: Pings

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::booking::Booking;
use crate::domain::foundation::AuthError;

/// A serialized server message, shared between every recipient.
pub type Frame = Arc<str>;

// ============================================
// Server → Client Messages
// ============================================

/// All message types that can be sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication succeeded and group membership is in place.
    ConnectionSuccess { status: String },

    /// Authentication failed. The server closes the socket afterwards.
    ConnectionError { message: String },

    /// A booking was created.
    #[serde(rename = "booking.created")]
    BookingCreated(Booking),

    /// Heartbeat response.
    Pong {
        /// Unix epoch milliseconds.
        timestamp: i64,
    },
}

impl ServerMessage {
    pub fn authenticated() -> Self {
        ServerMessage::ConnectionSuccess {
            status: "authenticated".to_string(),
        }
    }

    /// Notice for a rejected connection. Only the two public messages are
    /// ever sent; other auth failures read as "Authentication failed".
    pub fn rejected(error: &AuthError) -> Self {
        let message = match error {
            AuthError::TokenRequired => AuthError::TokenRequired.to_string(),
            _ => AuthError::InvalidToken.to_string(),
        };
        ServerMessage::ConnectionError { message }
    }

    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }
}

// ============================================
// Client → Server Messages
// ============================================

/// All message types that can be received from client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Heartbeat request.
    Ping,
}

//! WebSocket adapters for live booking notifications.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     NotificationFanOut                               │
//! │   bus subscription + reminder path → AudienceBroadcaster::deliver   │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      AudienceRegistry                                │
//! │   Group: admin.bookings    Group: provider.7    Group: provider.9   │
//! │   ├── client-a             ├── client-c         └── client-d        │
//! │   └── client-b             └── client-a                             │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     ▼
//!                           live_handler sockets
//! ```
//!
//! # Components
//!
//! - [`messages`] - WebSocket message protocol types
//! - [`rooms`] - Audience group membership and delivery
//! - [`handler`] - Axum WebSocket upgrade handler

pub mod handler;
pub mod messages;
pub mod rooms;

pub use handler::{authenticate, gateway_router, live_handler, GatewayState, LiveParams};
pub use messages::{ClientMessage, Frame, ServerMessage};
pub use rooms::{AudienceRegistry, ClientId};

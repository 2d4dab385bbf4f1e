//! Audience group membership for live connections.
//!
//! # Architecture
//!
//! ```text
//! Group: admin.bookings    Group: provider.7
//! ├── client-a             ├── client-c
//! └── client-b             └── client-a
//! ```
//!
//! Each group owns a broadcast channel of pre-serialized frames. Sending
//! never waits on a peer; a peer that falls behind lags and loses only its
//! own oldest frames.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::domain::audience::AudienceGroup;
use crate::domain::booking::Booking;
use crate::ports::{AudienceBroadcaster, DeliveryError};

use super::messages::{Frame, ServerMessage};

/// Unique identifier for a WebSocket client connection.
///
/// Generated server-side when a client connects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Group {
    sender: broadcast::Sender<Frame>,
    members: HashSet<ClientId>,
}

/// Registry of audience groups and their live members.
pub struct AudienceRegistry {
    groups: RwLock<HashMap<AudienceGroup, Group>>,

    /// client_id → groups joined, for cleanup on disconnect.
    client_groups: RwLock<HashMap<ClientId, Vec<AudienceGroup>>>,

    channel_capacity: usize,
}

impl AudienceRegistry {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            client_groups: RwLock::new(HashMap::new()),
            channel_capacity,
        }
    }

    /// Create with default capacity (128 frames).
    pub fn with_default_capacity() -> Self {
        Self::new(128)
    }

    /// Adds a client to a group, creating the group on first join.
    ///
    /// Returns a receiver for every frame later sent to the group.
    pub async fn join(&self, group: AudienceGroup, client_id: ClientId) -> broadcast::Receiver<Frame> {
        let rx = {
            let mut groups = self.groups.write().await;
            let entry = groups.entry(group).or_insert_with(|| Group {
                sender: broadcast::channel(self.channel_capacity).0,
                members: HashSet::new(),
            });
            entry.members.insert(client_id.clone());
            entry.sender.subscribe()
        };

        let mut client_groups = self.client_groups.write().await;
        let joined = client_groups.entry(client_id.clone()).or_default();
        if !joined.contains(&group) {
            joined.push(group);
        }
        tracing::debug!(client_id = %client_id, group = %group, "Joined audience group");

        rx
    }

    /// Removes a client from every group it joined. Groups left empty are
    /// dropped. Returns the groups the client was removed from.
    pub async fn leave_all(&self, client_id: &ClientId) -> Vec<AudienceGroup> {
        let joined = self
            .client_groups
            .write()
            .await
            .remove(client_id)
            .unwrap_or_default();

        if !joined.is_empty() {
            let mut groups = self.groups.write().await;
            for group in &joined {
                let now_empty = match groups.get_mut(group) {
                    Some(entry) => {
                        entry.members.remove(client_id);
                        entry.members.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    groups.remove(group);
                }
            }
        }

        joined
    }

    /// Sends a frame to every member of `group`. Returns the number of
    /// receivers it was handed to; zero for an unknown or empty group.
    pub async fn send_frame(&self, group: AudienceGroup, frame: Frame) -> usize {
        let groups = self.groups.read().await;
        match groups.get(&group) {
            // Err means no receivers, which is fine
            Some(entry) => entry.sender.send(frame).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn member_count(&self, group: AudienceGroup) -> usize {
        self.groups
            .read()
            .await
            .get(&group)
            .map(|entry| entry.members.len())
            .unwrap_or(0)
    }

    pub async fn active_groups(&self) -> Vec<AudienceGroup> {
        self.groups.read().await.keys().copied().collect()
    }

    pub async fn total_client_count(&self) -> usize {
        self.client_groups.read().await.len()
    }
}

impl Default for AudienceRegistry {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl AudienceBroadcaster for AudienceRegistry {
    async fn deliver(&self, group: AudienceGroup, booking: &Booking) -> Result<usize, DeliveryError> {
        let frame = ServerMessage::BookingCreated(booking.clone())
            .to_frame()
            .map_err(|e| DeliveryError::Encode(e.to_string()))?;

        let recipients = self.send_frame(group, frame).await;
        tracing::debug!(group = %group, booking_id = %booking.id, recipients, "Delivered booking event");
        Ok(recipients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{BookingStatus, ServiceType};
    use crate::domain::foundation::{BookingId, Timestamp, UserId};

    fn booking(provider: i64) -> Booking {
        let start = Timestamp::from_unix_secs(1_900_000_000);
        Booking {
            id: BookingId::from_raw(9),
            user_id: UserId::from_raw(1),
            provider_id: UserId::from_raw(provider),
            service_type: ServiceType::Checkup,
            start_time: start,
            end_time: start.plus_minutes(20),
            status: BookingStatus::Confirmed,
            created_at: start,
            updated_at: start,
        }
    }

    fn provider(id: i64) -> AudienceGroup {
        AudienceGroup::Provider(UserId::from_raw(id))
    }

    #[tokio::test]
    async fn members_of_group_receive_delivery() {
        let registry = AudienceRegistry::with_default_capacity();
        let mut rx1 = registry.join(AudienceGroup::Admins, ClientId::new()).await;
        let mut rx2 = registry.join(AudienceGroup::Admins, ClientId::new()).await;

        let recipients = registry.deliver(AudienceGroup::Admins, &booking(2)).await.unwrap();

        assert_eq!(recipients, 2);
        let frame = rx1.recv().await.unwrap();
        assert!(frame.contains("\"type\":\"booking.created\""));
        assert_eq!(rx2.recv().await.unwrap(), frame);
    }

    #[tokio::test]
    async fn delivery_to_empty_group_succeeds_with_zero_recipients() {
        let registry = AudienceRegistry::with_default_capacity();

        let recipients = registry.deliver(provider(5), &booking(5)).await.unwrap();

        assert_eq!(recipients, 0);
    }

    #[tokio::test]
    async fn groups_are_isolated() {
        let registry = AudienceRegistry::with_default_capacity();
        let mut admin_rx = registry.join(AudienceGroup::Admins, ClientId::new()).await;
        let mut other_rx = registry.join(provider(8), ClientId::new()).await;

        registry.deliver(provider(7), &booking(7)).await.unwrap();
        registry.deliver(AudienceGroup::Admins, &booking(7)).await.unwrap();

        assert!(admin_rx.recv().await.is_ok());
        assert!(matches!(
            other_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn leave_all_removes_every_membership_and_drops_empty_groups() {
        let registry = AudienceRegistry::with_default_capacity();
        let client = ClientId::new();
        let other = ClientId::new();
        let _a = registry.join(AudienceGroup::Admins, client.clone()).await;
        let _b = registry.join(provider(3), client.clone()).await;
        let _c = registry.join(AudienceGroup::Admins, other.clone()).await;

        let left = registry.leave_all(&client).await;

        assert_eq!(left.len(), 2);
        assert_eq!(registry.member_count(AudienceGroup::Admins).await, 1);
        assert_eq!(registry.member_count(provider(3)).await, 0);
        assert_eq!(registry.active_groups().await, vec![AudienceGroup::Admins]);
        assert_eq!(registry.total_client_count().await, 1);
    }

    #[tokio::test]
    async fn leave_all_for_unknown_client_is_noop() {
        let registry = AudienceRegistry::with_default_capacity();
        assert!(registry.leave_all(&ClientId::new()).await.is_empty());
    }

    #[tokio::test]
    async fn slow_member_lags_without_blocking_others() {
        let registry = AudienceRegistry::new(2);
        let mut slow = registry.join(AudienceGroup::Admins, ClientId::new()).await;
        let mut fast = registry.join(AudienceGroup::Admins, ClientId::new()).await;

        for _ in 0..3 {
            registry.deliver(AudienceGroup::Admins, &booking(1)).await.unwrap();
            assert!(fast.recv().await.is_ok());
        }

        assert!(matches!(slow.recv().await, Err(broadcast::error::RecvError::Lagged(1))));
        assert!(slow.recv().await.is_ok());
    }

    #[test]
    fn client_ids_are_unique_uuids() {
        let a = ClientId::new();
        assert_ne!(a, ClientId::new());
        assert_eq!(a.to_string().len(), 36);
    }
}

//! Audience groups: the named sets of live connections that receive
//! booking notifications.

use std::fmt;

use crate::domain::booking::Booking;
use crate::domain::foundation::{Identity, Role, UserId};

/// A named set of live connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudienceGroup {
    /// Every connected administrator (`admin.bookings`).
    Admins,
    /// Connections of one provider (`provider.<id>`).
    Provider(UserId),
}

impl AudienceGroup {
    /// Groups that should hear about a booking.
    pub fn for_booking(booking: &Booking) -> [AudienceGroup; 2] {
        [AudienceGroup::Admins, AudienceGroup::Provider(booking.provider_id)]
    }

    /// Groups a freshly authenticated connection joins.
    pub fn for_identity(identity: &Identity) -> Vec<AudienceGroup> {
        let mut groups = Vec::new();
        if identity.has_role(Role::Admin) {
            groups.push(AudienceGroup::Admins);
        }
        if identity.has_role(Role::Provider) {
            groups.push(AudienceGroup::Provider(identity.subject));
        }
        groups
    }

    /// Wire name of the group.
    pub fn name(&self) -> String {
        match self {
            AudienceGroup::Admins => "admin.bookings".to_string(),
            AudienceGroup::Provider(id) => format!("provider.{}", id),
        }
    }
}

impl fmt::Display for AudienceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

//! Guardian/child relationships and the "acting as" selection.

use std::collections::BTreeMap;

use courtside_shared::{FamilyMember, GuardianConsentGranted};

use super::RealtimeStore;
use crate::realtime::status::{self, ConnectionStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyStore {
    members: BTreeMap<String, FamilyMember>,
    /// Member the user currently acts on behalf of.
    acting_as: Option<String>,
    status: ConnectionStatus,
}

impl FamilyStore {
    pub fn member(&self, user_id: &str) -> Option<&FamilyMember> {
        self.members.get(user_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &FamilyMember> {
        self.members.values()
    }

    pub fn acting_as(&self) -> Option<&str> {
        self.acting_as.as_deref()
    }

    pub fn upsert_member(&mut self, member: FamilyMember) -> bool {
        if self.members.get(&member.user_id) == Some(&member) {
            return false;
        }
        self.members.insert(member.user_id.clone(), member);
        true
    }

    pub fn set_members(&mut self, members: Vec<FamilyMember>) {
        self.members = members
            .into_iter()
            .map(|m| (m.user_id.clone(), m))
            .collect();
        if let Some(id) = &self.acting_as {
            if !self.members.contains_key(id) {
                self.acting_as = None;
            }
        }
    }

    pub fn apply_guardian_consent_granted(&mut self, event: &GuardianConsentGranted) -> bool {
        let Some(member) = self.members.get_mut(&event.child_user_id) else {
            return false;
        };
        if member.consent_granted {
            return false;
        }
        member.consent_granted = true;
        member.consent_granted_at = Some(event.granted_at);
        true
    }

    /// Act on behalf of a family member, or `None` to act as yourself.
    /// Unknown members are refused.
    pub fn set_acting_as(&mut self, user_id: Option<&str>) -> bool {
        if let Some(id) = user_id {
            if !self.members.contains_key(id) {
                crate::log_warn!("refusing to act as unknown family member {}", id);
                return false;
            }
        }
        if self.acting_as.as_deref() == user_id {
            return false;
        }
        self.acting_as = user_id.map(str::to_string);
        true
    }
}

impl RealtimeStore for FamilyStore {
    fn connection_status(&self) -> ConnectionStatus {
        self.status
    }

    fn set_connection_status(&mut self, next: ConnectionStatus) -> bool {
        status::transition(&mut self.status, next)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

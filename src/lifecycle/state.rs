//! Per-guild ticket state

use crate::core::{ChannelId, UserId};
use crate::registry::TicketRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lifecycle of one member's ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    NoTicket,
    /// Reaction observed, channel creation in flight
    Pending,
    Open,
    /// Close authorized, deletion scheduled
    Closing,
    Closed,
}

impl TicketState {
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NoTicket | Self::Closed, Self::Pending)
                | (Self::Pending, Self::Open | Self::NoTicket)
                | (Self::NoTicket | Self::Closed, Self::Open)
                | (Self::Open, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }
}

impl std::fmt::Display for TicketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTicket => write!(f, "no-ticket"),
            Self::Pending => write!(f, "pending"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRecord {
    pub state: TicketState,
    pub channel_id: Option<ChannelId>,
    pub updated_at: DateTime<Utc>,
}

/// Ticket records of one guild, keyed by member
///
/// An absent record means [`TicketState::NoTicket`]; closed records are
/// dropped once the channel is gone.
#[derive(Debug, Default)]
pub struct TicketLedger {
    records: Mutex<HashMap<UserId, TicketRecord>>,
}

impl TicketLedger {
    fn records(&self) -> MutexGuard<'_, HashMap<UserId, TicketRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(
        records: &mut HashMap<UserId, TicketRecord>,
        user_id: UserId,
        next: TicketState,
    ) -> bool {
        let current = records
            .get(&user_id)
            .map_or(TicketState::NoTicket, |record| record.state);
        if !current.can_transition_to(next) {
            tracing::debug!(
                "Ignoring ticket transition {} -> {} for user {}",
                current,
                next,
                user_id
            );
            return false;
        }
        if next == TicketState::NoTicket || next == TicketState::Closed {
            records.remove(&user_id);
        } else {
            let channel_id = records.get(&user_id).and_then(|r| r.channel_id);
            records.insert(
                user_id,
                TicketRecord {
                    state: next,
                    channel_id,
                    updated_at: Utc::now(),
                },
            );
        }
        tracing::debug!("Ticket of user {} is now {}", user_id, next);
        true
    }

    pub fn state(&self, user_id: UserId) -> TicketState {
        self.records()
            .get(&user_id)
            .map_or(TicketState::NoTicket, |record| record.state)
    }

    pub fn record(&self, user_id: UserId) -> Option<TicketRecord> {
        self.records().get(&user_id).cloned()
    }

    /// `NoTicket -> Pending`; false when the member already has a ticket
    /// or a request in flight
    pub fn begin(&self, user_id: UserId) -> bool {
        Self::transition(&mut self.records(), user_id, TicketState::Pending)
    }

    /// Record `channel_id` as the member's open ticket, whatever the record
    /// held before
    ///
    /// The platform is authoritative: a record pointing at a channel that is
    /// gone is replaced. A record already tracking `channel_id` keeps its
    /// state so that a countdown in progress is not interrupted.
    pub fn reopen(&self, user_id: UserId, channel_id: ChannelId) {
        let mut records = self.records();
        if let Some(record) = records.get(&user_id) {
            if record.channel_id == Some(channel_id) && record.state != TicketState::Pending {
                return;
            }
        }
        records.insert(
            user_id,
            TicketRecord {
                state: TicketState::Open,
                channel_id: Some(channel_id),
                updated_at: Utc::now(),
            },
        );
        tracing::debug!("Ticket of user {} is now open in {}", user_id, channel_id);
    }

    /// `Pending -> NoTicket` after a failed or duplicate request
    pub fn revert(&self, user_id: UserId) -> bool {
        Self::transition(&mut self.records(), user_id, TicketState::NoTicket)
    }

    fn owner_of(records: &HashMap<UserId, TicketRecord>, channel_id: ChannelId) -> Option<UserId> {
        records
            .iter()
            .find(|(_, record)| record.channel_id == Some(channel_id))
            .map(|(user_id, _)| *user_id)
    }

    /// `Open -> Closing` for whoever owns `channel_id`
    pub fn closing(&self, channel_id: ChannelId) -> Option<UserId> {
        let mut records = self.records();
        let owner = Self::owner_of(&records, channel_id)?;
        Self::transition(&mut records, owner, TicketState::Closing).then_some(owner)
    }

    /// `Closing -> Closed` once the channel is deleted
    pub fn closed(&self, channel_id: ChannelId) -> Option<UserId> {
        let mut records = self.records();
        let owner = Self::owner_of(&records, channel_id)?;
        Self::transition(&mut records, owner, TicketState::Closed).then_some(owner)
    }

    /// `Closing -> Open` when the deletion did not go through
    pub fn abort_closing(&self, channel_id: ChannelId) -> Option<UserId> {
        let mut records = self.records();
        let owner = Self::owner_of(&records, channel_id)?;
        let record = records.get_mut(&owner)?;
        if record.state != TicketState::Closing {
            return None;
        }
        record.state = TicketState::Open;
        record.updated_at = Utc::now();
        Some(owner)
    }

    pub fn open_tickets(&self) -> usize {
        self.records()
            .values()
            .filter(|record| record.state == TicketState::Open)
            .count()
    }
}

/// Everything the engine tracks for one guild
#[derive(Debug, Default)]
pub struct GuildState {
    pub registry: TicketRegistry,
    pub ledger: TicketLedger,
}

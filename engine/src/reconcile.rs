//! Reconciliation of remote responses against local state.
//!
//! After a remote mutation answers, the engine holds three records for the
//! same id: what is in the local store now, what was dispatched, and what the
//! remote returned. This module decides which one is authoritative.
//!
//! # Rules
//!
//! 1. Local record gone (removed while the dispatch was in flight): nothing to do
//! 2. Remote stale against local: discard the response, local stands
//! 3. Remote identical to local: confirmed as-is
//! 4. Remote newer than what was dispatched: a concurrent writer won, remote
//!    overwrites local
//! 5. Otherwise the remote value is adopted as the confirmed record

use crate::{Record, VersionClock};
use serde::{Deserialize, Serialize};

/// How a remote response was reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Remote matched local; nothing written
    Unchanged,
    /// Remote value replaced local as the confirmed record
    Adopted,
    /// Remote carried a newer version from another writer and replaced local
    RemoteWins,
    /// Remote was stale against local and was ignored
    Discarded,
    /// The record was removed locally before the response arrived
    Vanished,
    /// The remote confirmed a deletion
    Deleted,
}

impl Resolution {
    /// Whether the local store must be written.
    pub fn writes_local(self) -> bool {
        matches!(self, Resolution::Adopted | Resolution::RemoteWins)
    }
}

/// Outcome of comparing a remote response with local state.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub resolution: Resolution,
    /// Record to write when [`Resolution::writes_local`] holds
    pub record: Option<Record>,
}

/// Decide what to do with a remote response.
///
/// `local` is the current local record under the dispatched id, `sent` is what
/// was dispatched, `incoming` is the decoded remote record.
pub fn reconcile(local: Option<&Record>, sent: &Record, incoming: Record) -> Decision {
    let Some(local) = local else {
        return Decision {
            resolution: Resolution::Vanished,
            record: None,
        };
    };

    if VersionClock::is_stale(local, &incoming) {
        return Decision {
            resolution: Resolution::Discarded,
            record: None,
        };
    }

    if &incoming == local {
        return Decision {
            resolution: Resolution::Unchanged,
            record: None,
        };
    }

    let resolution = if incoming.stamp() > sent.stamp() {
        Resolution::RemoteWins
    } else {
        Resolution::Adopted
    };
    Decision {
        resolution,
        record: Some(incoming),
    }
}

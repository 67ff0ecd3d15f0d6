//! Optimistic concurrency check on `updated_at`.
//!
//! A writer remembers the `updated_at` it last observed. If the stored record
//! has moved past that point, somebody else wrote in between and the write is
//! refused. Gateways run this check under the same lock as the write itself.

use crate::model::Timestamp;
use thiserror::Error;

/// The record was modified after the writer last observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("record was modified at {current} after it was last observed at {last_known}")]
pub struct Conflict {
    pub last_known: Timestamp,
    pub current: Timestamp,
}

/// Check a pending write against the authoritative timestamp.
///
/// With no `last_known` timestamp the check is skipped.
pub fn check(last_known: Option<Timestamp>, current: Timestamp) -> Result<(), Conflict> {
    match last_known {
        Some(last_known) if current > last_known => Err(Conflict {
            last_known,
            current,
        }),
        _ => Ok(()),
    }
}

//! Two-state approval gate shared by containers and requisitions
//!
//! Bulk approval is all-or-nothing: if any requested id is unknown in the plant
//! the whole call fails and nothing is approved. Ids that are already approved
//! are reported back as no-ops.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// What a bulk approval did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApprovalReport {
    /// Ids moved from pending to approved by this call
    pub approved: Vec<Uuid>,
    /// Ids that were approved before the call
    pub already_approved: Vec<Uuid>,
}

impl ApprovalReport {
    pub fn total(&self) -> usize {
        self.approved.len() + self.already_approved.len()
    }

    /// Compare the guarded update's row count with the pending ids it was meant to flip
    ///
    /// Rows are locked before the update, so a mismatch means another writer changed
    /// the approval flag outside the lock.
    pub fn ensure_applied(&self, resource: &str, updated: u64) -> DomainResult<()> {
        if updated != self.approved.len() as u64 {
            return Err(DomainError::conflict(
                resource,
                "approval state changed while approving",
            ));
        }
        Ok(())
    }
}

/// Current approval flag (and owning store, when gated by store) of a row read under lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalRow {
    pub id: Uuid,
    pub approved: bool,
    pub store_id: Option<Uuid>,
}

/// Rows the approver may not touch: those outside `stores`, or with no store at all
pub fn outside_approver_stores(rows: &[ApprovalRow], stores: &[Uuid]) -> Vec<Uuid> {
    rows.iter()
        .filter(|r| !r.store_id.is_some_and(|s| stores.contains(&s)))
        .map(|r| r.id)
        .collect()
}

/// Deduplicate requested ids, keeping first-seen order
pub fn dedupe_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Decide a bulk approval from the rows found under lock
///
/// `rows` must be the plant-scoped rows matching `requested`; ids missing from it
/// fail the whole batch.
pub fn plan_bulk_approval(
    resource: &str,
    requested: &[Uuid],
    rows: &[ApprovalRow],
) -> DomainResult<ApprovalReport> {
    let requested = dedupe_ids(requested);
    if requested.is_empty() {
        return Err(DomainError::missing("ids", "at least one id is required"));
    }

    let found: HashMap<Uuid, bool> = rows.iter().map(|r| (r.id, r.approved)).collect();

    let missing: Vec<String> = requested
        .iter()
        .filter(|id| !found.contains_key(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DomainError::not_found(resource, missing.join(",")));
    }

    let mut report = ApprovalReport::default();
    for id in requested {
        if found[&id] {
            report.already_approved.push(id);
        } else {
            report.approved.push(id);
        }
    }
    Ok(report)
}

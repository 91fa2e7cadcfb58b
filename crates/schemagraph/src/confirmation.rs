//! Review lifecycle of logical foreign keys.
//!
//! Logical edges move `SUGGESTED -> CONFIRMED` or `SUGGESTED -> REJECTED`,
//! and a rejected edge can still be confirmed. Every transition is split in
//! two phases so that the network call can happen in between:
//!
//! 1. [`FkConfirmationStateMachine::begin`] checks the guards, applies the
//!    target status tentatively and hands out a [`MutationTicket`].
//! 2. [`FkConfirmationStateMachine::complete`] settles the ticket with the
//!    service's answer. Success turns the tentative value into the settled
//!    one; failure discards it and reports the status that was restored.
//!
//! At most one ticket per edge is outstanding. Independent edges may have
//! tickets in flight at the same time.
//!
//! A successful reject opens an undo offer for a configurable window. Undo
//! issues a *confirm*: the edge ends up `CONFIRMED`, not back at
//! `SUGGESTED`. Any later action on the same edge cancels the offer.

use crate::domain::{EdgeAction, LogicalStatus, NeighborhoodGraph, RelationshipId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// An in-flight mutation for one edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    /// The edge being changed
    pub edge_id: RelationshipId,
    /// What was requested
    pub action: EdgeAction,
    /// Token matching the [`MutationTicket`] that settles it
    pub request_token: u64,
}

/// Permission to issue one mutation. Must be handed back to
/// [`FkConfirmationStateMachine::complete`] with the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationTicket {
    /// The edge being changed
    pub edge_id: RelationshipId,
    /// What to send
    pub action: EdgeAction,
    /// Token identifying this attempt
    pub request_token: u64,
    /// Reviewer notes forwarded to the service
    pub notes: Option<String>,
    /// Whether this confirm compensates a reject
    pub via_undo: bool,
}

/// An open chance to take back a reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoOffer {
    /// Token of the reject that opened the offer
    pub token: u64,
    /// The offer closes at this instant
    pub expires_at: Instant,
}

impl UndoOffer {
    /// Time left before the offer closes
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    fn is_open(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// How a ticket was settled.
#[derive(Debug)]
pub enum Settlement {
    /// The service acknowledged the change.
    Applied {
        /// The edge
        edge_id: RelationshipId,
        /// Its new settled status
        status: LogicalStatus,
        /// Confirmation timestamp, for confirms
        confirmed_at: Option<DateTime<Utc>>,
        /// Undo deadline, for rejects
        undo_until: Option<Instant>,
    },
    /// The mutation failed and the tentative value was discarded.
    RolledBack {
        /// The edge
        edge_id: RelationshipId,
        /// The last settled status, now visible again
        restored: LogicalStatus,
        /// Why the mutation failed
        error: Error,
    },
    /// The ticket no longer matches the edge's pending request.
    Stale,
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    settled: LogicalStatus,
    confirmed_at: Option<DateTime<Utc>>,
    tentative: Option<LogicalStatus>,
    pending: Option<PendingConfirmation>,
    undo: Option<UndoOffer>,
    in_view: bool,
}

impl EdgeRecord {
    fn effective(&self) -> LogicalStatus {
        self.tentative.unwrap_or(self.settled)
    }
}

/// Per-edge review state for the logical edges in view.
#[derive(Debug, Clone)]
pub struct FkConfirmationStateMachine {
    edges: BTreeMap<RelationshipId, EdgeRecord>,
    physical: BTreeSet<RelationshipId>,
    next_token: u64,
    undo_window: Duration,
}

impl FkConfirmationStateMachine {
    /// Create a state machine whose undo offers last `undo_window`
    #[must_use]
    pub fn new(undo_window: Duration) -> Self {
        Self {
            edges: BTreeMap::new(),
            physical: BTreeSet::new(),
            next_token: 1,
            undo_window,
        }
    }

    /// The configured undo window
    #[must_use]
    pub fn undo_window(&self) -> Duration {
        self.undo_window
    }

    /// Take the server's statuses from a freshly fetched graph.
    ///
    /// Edges with a pending mutation keep their tentative value. Edges that
    /// left the view are dropped unless they still have a pending mutation
    /// or an undo offer.
    pub fn track(&mut self, graph: &NeighborhoodGraph) {
        for record in self.edges.values_mut() {
            record.in_view = false;
        }
        self.physical.clear();

        for edge in &graph.edges {
            let Some(status) = edge.logical_status() else {
                self.physical.insert(edge.id.clone());
                continue;
            };
            let record = self
                .edges
                .entry(edge.id.clone())
                .or_insert_with(|| EdgeRecord {
                    settled: status,
                    confirmed_at: edge.confirmed_at,
                    tentative: None,
                    pending: None,
                    undo: None,
                    in_view: true,
                });
            record.settled = status;
            record.confirmed_at = edge.confirmed_at;
            record.in_view = true;
            // An offer only makes sense while the edge is still rejected.
            if status != LogicalStatus::Rejected {
                record.undo = None;
            }
        }

        self.edges
            .retain(|_, r| r.in_view || r.pending.is_some() || r.undo.is_some());
    }

    /// Status to display: tentative if a mutation is pending, else settled.
    /// `None` for physical or unknown edges.
    #[must_use]
    pub fn status(&self, id: &RelationshipId) -> Option<LogicalStatus> {
        self.edges.get(id).map(EdgeRecord::effective)
    }

    /// Last server-acknowledged status
    #[must_use]
    pub fn settled_status(&self, id: &RelationshipId) -> Option<LogicalStatus> {
        self.edges.get(id).map(|r| r.settled)
    }

    /// Confirmation timestamp of a settled confirm
    #[must_use]
    pub fn confirmed_at(&self, id: &RelationshipId) -> Option<DateTime<Utc>> {
        self.edges.get(id).and_then(|r| r.confirmed_at)
    }

    /// Whether a mutation for the edge is in flight
    #[must_use]
    pub fn is_pending(&self, id: &RelationshipId) -> bool {
        self.pending(id).is_some()
    }

    /// The in-flight mutation for the edge, if any
    #[must_use]
    pub fn pending(&self, id: &RelationshipId) -> Option<&PendingConfirmation> {
        self.edges.get(id).and_then(|r| r.pending.as_ref())
    }

    /// The open undo offer for the edge, if any
    #[must_use]
    pub fn undo_offer(&self, id: &RelationshipId) -> Option<&UndoOffer> {
        self.edges.get(id).and_then(|r| r.undo.as_ref())
    }

    /// All undo offers, ordered by edge id
    pub fn undo_offers(&self) -> impl Iterator<Item = (&RelationshipId, &UndoOffer)> {
        self.edges
            .iter()
            .filter_map(|(id, r)| r.undo.as_ref().map(|offer| (id, offer)))
    }

    /// Earliest instant at which an undo offer closes
    #[must_use]
    pub fn next_undo_deadline(&self) -> Option<Instant> {
        self.undo_offers().map(|(_, o)| o.expires_at).min()
    }

    /// Start a confirm or reject on an edge in view.
    ///
    /// Returns `Ok(None)` when confirming an edge that is already confirmed.
    ///
    /// # Errors
    ///
    /// - `Error::ImmutableRelationship` for physical edges
    /// - `Error::UnknownEdge` if the edge is not in view
    /// - `Error::EdgeBusy` if a mutation for the edge is pending
    /// - `Error::InvalidTransition` when rejecting an edge that is not suggested
    pub fn begin(
        &mut self,
        id: &RelationshipId,
        action: EdgeAction,
        notes: Option<String>,
    ) -> Result<Option<MutationTicket>> {
        if self.physical.contains(id) {
            return Err(Error::ImmutableRelationship(id.clone()));
        }
        match self.edges.get(id) {
            Some(record) if record.in_view => {}
            _ => return Err(Error::UnknownEdge(id.clone())),
        }
        self.start(id, action, notes, false)
    }

    /// Take back a reject by confirming the edge.
    ///
    /// # Errors
    ///
    /// Returns `Error::UndoExpired` if no offer is open for the edge at `now`,
    /// and `Error::EdgeBusy` if a mutation for it is pending.
    pub fn undo(&mut self, id: &RelationshipId, now: Instant) -> Result<MutationTicket> {
        let Some(record) = self.edges.get_mut(id) else {
            return Err(Error::UndoExpired(id.clone()));
        };
        match record.undo.take() {
            Some(offer) if offer.is_open(now) => {
                debug!(edge = %id, reject_token = offer.token, "Undoing reject");
            }
            _ => return Err(Error::UndoExpired(id.clone())),
        }
        match self.start(id, EdgeAction::Confirm, None, true)? {
            Some(ticket) => Ok(ticket),
            // Settled status changed under the offer; nothing left to undo.
            None => Err(Error::UndoExpired(id.clone())),
        }
    }

    fn start(
        &mut self,
        id: &RelationshipId,
        action: EdgeAction,
        notes: Option<String>,
        via_undo: bool,
    ) -> Result<Option<MutationTicket>> {
        let Some(record) = self.edges.get_mut(id) else {
            return Err(Error::UnknownEdge(id.clone()));
        };
        if record.pending.is_some() {
            debug!(edge = %id, %action, "Refusing action while a mutation is pending");
            return Err(Error::EdgeBusy(id.clone()));
        }

        let status = record.effective();
        match action {
            EdgeAction::Confirm if status == LogicalStatus::Confirmed => return Ok(None),
            EdgeAction::Reject if status != LogicalStatus::Suggested => {
                return Err(Error::InvalidTransition {
                    id: id.clone(),
                    action,
                    status,
                });
            }
            _ => {}
        }

        let request_token = self.next_token;
        self.next_token += 1;

        if record.undo.take().is_some() {
            debug!(edge = %id, "Superseded undo offer");
        }
        record.tentative = Some(action.target_status());
        record.pending = Some(PendingConfirmation {
            edge_id: id.clone(),
            action,
            request_token,
        });

        debug!(edge = %id, %action, request_token, "Applied tentative status");
        Ok(Some(MutationTicket {
            edge_id: id.clone(),
            action,
            request_token,
            notes,
            via_undo,
        }))
    }

    /// Settle a ticket with the service's answer.
    pub fn complete(
        &mut self,
        ticket: &MutationTicket,
        outcome: Result<()>,
        now: Instant,
        now_utc: DateTime<Utc>,
    ) -> Settlement {
        let Some(record) = self.edges.get_mut(&ticket.edge_id) else {
            return Settlement::Stale;
        };
        match &record.pending {
            Some(p) if p.request_token == ticket.request_token => {}
            _ => return Settlement::Stale,
        }
        record.pending = None;
        record.tentative = None;

        match outcome {
            Ok(()) => {
                let status = ticket.action.target_status();
                record.settled = status;
                let (confirmed_at, undo_until) = match ticket.action {
                    EdgeAction::Confirm => {
                        record.confirmed_at = Some(now_utc);
                        (Some(now_utc), None)
                    }
                    EdgeAction::Reject => {
                        let offer = UndoOffer {
                            token: ticket.request_token,
                            expires_at: now + self.undo_window,
                        };
                        record.undo = Some(offer);
                        (None, Some(offer.expires_at))
                    }
                };
                info!(edge = %ticket.edge_id, %status, via_undo = ticket.via_undo, "Relationship updated");
                Settlement::Applied {
                    edge_id: ticket.edge_id.clone(),
                    status,
                    confirmed_at,
                    undo_until,
                }
            }
            Err(error) => {
                info!(edge = %ticket.edge_id, action = %ticket.action, %error, "Relationship update rolled back");
                Settlement::RolledBack {
                    edge_id: ticket.edge_id.clone(),
                    restored: record.settled,
                    error,
                }
            }
        }
    }

    /// Close the undo offers whose window has passed. Returns their edges.
    pub fn expire_undo_offers(&mut self, now: Instant) -> Vec<RelationshipId> {
        let mut expired = Vec::new();
        for (id, record) in &mut self.edges {
            if record.undo.is_some_and(|o| !o.is_open(now)) {
                record.undo = None;
                expired.push(id.clone());
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Undo offers expired");
        }
        expired
    }
}

//! The ER view session.
//!
//! [`ErdSession`] is the single owner of the shared view state: the current
//! neighborhood, its model and layout, the selection and the review state of
//! logical edges. Nothing outside the session writes to those records.
//!
//! Network work is split from state changes so that callers can interleave
//! several requests on one event loop:
//!
//! ```text
//! dispatch(command) -> FetchRequest --fetcher().execute()--> FetchOutcome -> apply_fetch()
//! begin_edge_action() -> MutationTicket --mutation_client().send()--> MutationOutcome -> complete_mutation()
//! ```
//!
//! The `async` convenience methods ([`ErdSession::select_focus`],
//! [`ErdSession::confirm`], ...) run both halves back to back.

use crate::config::SchemaGraphConfig;
use crate::confirmation::{FkConfirmationStateMachine, MutationTicket, Settlement};
use crate::domain::{
    EdgeAction, LayoutDirection, LogicalStatus, NeighborhoodGraph, ObjectId, ObjectSummary,
    ProjectId, RelationshipId,
};
use crate::error::{Error, Result};
use crate::fetcher::{FetchOutcome, NeighborhoodFetcher};
use crate::layout::{LayeredLayout, Layout, LayoutEngine};
use crate::model::{GraphModelBuilder, RenderableGraph};
use crate::render::{RenderAdapter, Scene};
use crate::selection::{FetchRequest, SelectionCommand, SelectionController, SelectionState};
use crate::service::RelationshipService;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A non-blocking message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Edge the message is about, if any
    pub edge_id: Option<RelationshipId>,
    /// Text to show
    pub message: String,
}

/// Sends mutations without borrowing the session.
#[derive(Clone)]
pub struct MutationClient {
    service: Arc<dyn RelationshipService>,
    project: ProjectId,
}

impl std::fmt::Debug for MutationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationClient")
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl MutationClient {
    /// Issue the mutation a ticket stands for
    pub async fn send(&self, ticket: MutationTicket) -> MutationOutcome {
        debug!(edge = %ticket.edge_id, action = %ticket.action, token = ticket.request_token, "Sending mutation");
        let result = self
            .service
            .mutate_logical_fk(
                &self.project,
                &ticket.edge_id,
                ticket.action,
                ticket.notes.as_deref(),
            )
            .await;
        MutationOutcome { ticket, result }
    }
}

/// A ticket together with the service's answer
#[derive(Debug)]
pub struct MutationOutcome {
    /// The ticket that was sent
    pub ticket: MutationTicket,
    /// The service's answer
    pub result: Result<()>,
}

struct View {
    graph: NeighborhoodGraph,
    model: RenderableGraph,
    layout: Layout,
}

/// Owns the state of one ER view.
pub struct ErdSession {
    fetcher: Arc<NeighborhoodFetcher>,
    selection: SelectionController,
    builder: GraphModelBuilder,
    engine: Box<dyn LayoutEngine>,
    review: FkConfirmationStateMachine,
    renderer: RenderAdapter,
    view: Option<View>,
    notifications: Vec<Notification>,
    /// Fetcher epoch right after each edge's last settled change
    settled_epochs: HashMap<RelationshipId, u64>,
}

impl std::fmt::Debug for ErdSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErdSession")
            .field("fetcher", &self.fetcher)
            .field("selection", self.selection.state())
            .field("review", &self.review)
            .finish_non_exhaustive()
    }
}

impl ErdSession {
    /// Create a session for the configured project
    pub fn new(config: &SchemaGraphConfig, service: Arc<dyn RelationshipService>) -> Self {
        let fetcher = NeighborhoodFetcher::new(
            service,
            config.project_id.clone(),
            config.cache_capacity,
        );
        Self {
            fetcher: Arc::new(fetcher),
            selection: SelectionController::new(config.default_hops, config.default_direction),
            builder: GraphModelBuilder::new(config.node_metrics, config.show_rejected),
            engine: Box::new(LayeredLayout::new(config.layout)),
            review: FkConfirmationStateMachine::new(config.undo_window()),
            renderer: RenderAdapter::new(config.show_rejected),
            view: None,
            notifications: Vec::new(),
            settled_epochs: HashMap::new(),
        }
    }

    /// Replace the layout engine
    #[must_use]
    pub fn with_layout_engine(mut self, engine: Box<dyn LayoutEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Shared handle to the fetcher, for running requests outside the session
    #[must_use]
    pub fn fetcher(&self) -> Arc<NeighborhoodFetcher> {
        Arc::clone(&self.fetcher)
    }

    /// Handle for sending mutations outside the session
    #[must_use]
    pub fn mutation_client(&self) -> MutationClient {
        MutationClient {
            service: self.fetcher.service(),
            project: self.fetcher.project().clone(),
        }
    }

    /// Current selection state
    #[must_use]
    pub fn state(&self) -> &SelectionState {
        self.selection.state()
    }

    /// The neighborhood on screen
    #[must_use]
    pub fn graph(&self) -> Option<&NeighborhoodGraph> {
        self.view.as_ref().map(|v| &v.graph)
    }

    /// The renderable model on screen
    #[must_use]
    pub fn model(&self) -> Option<&RenderableGraph> {
        self.view.as_ref().map(|v| &v.model)
    }

    /// The layout on screen
    #[must_use]
    pub fn layout(&self) -> Option<&Layout> {
        self.view.as_ref().map(|v| &v.layout)
    }

    /// Review state of logical edges
    #[must_use]
    pub fn review(&self) -> &FkConfirmationStateMachine {
        &self.review
    }

    /// Compose the current frame
    #[must_use]
    pub fn scene(&self) -> Option<Scene> {
        self.scene_at(Instant::now())
    }

    /// Compose the frame as of `now`
    #[must_use]
    pub fn scene_at(&self, now: Instant) -> Option<Scene> {
        self.view
            .as_ref()
            .map(|v| self.renderer.render(&v.model, &v.layout, &self.review, now))
    }

    /// Drain pending user messages
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Apply a selection command.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for invalid values, and
    /// `Error::UnknownEdge` when opening an edge that is not in view.
    pub fn dispatch(&mut self, command: SelectionCommand) -> Result<Option<FetchRequest>> {
        if let SelectionCommand::OpenEdge(id) = &command {
            if !self.graph().is_some_and(|g| g.contains_edge(id)) {
                return Err(Error::UnknownEdge(id.clone()));
            }
        }
        self.selection.dispatch(command)
    }

    /// Apply a fetch outcome.
    ///
    /// Returns `Ok(false)` if the outcome answers an outdated request and was
    /// discarded, `Ok(true)` once the new neighborhood is on screen.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when the current request failed. The previous
    /// neighborhood stays on screen and the load state records the failure.
    pub fn apply_fetch(&mut self, outcome: FetchOutcome) -> Result<bool> {
        let FetchOutcome {
            request,
            result,
            epoch,
        } = outcome;
        if !self.selection.resolve(&request, result.as_ref().err()) {
            return Ok(false);
        }
        let mut graph = result?;
        self.keep_newer_settlements(&mut graph, epoch);

        self.review.track(&graph);
        let model = self.builder.build(&graph);
        let layout = self.engine.layout(&model, request.direction, graph.focus_object_id);
        info!(
            focus = %graph.focus_object_id,
            hops = %request.hops,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Neighborhood on screen"
        );
        self.view = Some(View {
            graph,
            model,
            layout,
        });
        Ok(true)
    }

    /// Dispatch a command and load whatever it asks for.
    ///
    /// # Errors
    ///
    /// Returns validation errors from the command and fetch errors from the
    /// load it triggered.
    pub async fn run(&mut self, command: SelectionCommand) -> Result<()> {
        if let Some(request) = self.dispatch(command)? {
            let outcome = self.fetcher.execute(request).await;
            self.apply_fetch(outcome)?;
        }
        Ok(())
    }

    /// Center the view on `focus`
    ///
    /// # Errors
    ///
    /// See [`ErdSession::run`].
    pub async fn select_focus(&mut self, focus: ObjectId) -> Result<()> {
        self.run(SelectionCommand::SelectFocus(focus)).await
    }

    /// Change the hop depth
    ///
    /// # Errors
    ///
    /// See [`ErdSession::run`].
    pub async fn set_hops(&mut self, hops: u8) -> Result<()> {
        self.run(SelectionCommand::SetHops(hops)).await
    }

    /// Change the layering axis
    ///
    /// # Errors
    ///
    /// See [`ErdSession::run`].
    pub async fn set_direction(&mut self, direction: LayoutDirection) -> Result<()> {
        self.run(SelectionCommand::SetDirection(direction)).await
    }

    /// Reload the current selection
    ///
    /// # Errors
    ///
    /// See [`ErdSession::run`].
    pub async fn retry(&mut self) -> Result<()> {
        self.run(SelectionCommand::Retry).await
    }

    /// Fetch the catalog used for search. Returns the number of objects.
    ///
    /// # Errors
    ///
    /// Returns the service error; the previous catalog is kept.
    pub async fn load_catalog(&mut self) -> Result<usize> {
        let catalog = self.fetcher.list_objects().await?;
        let count = catalog.len();
        self.selection.set_catalog(catalog);
        Ok(count)
    }

    /// Set the search text and return the matching catalog entries
    pub fn search(&mut self, text: impl Into<String>, limit: usize) -> Vec<ObjectSummary> {
        self.selection.set_search(text);
        self.selection
            .search_results(limit)
            .into_iter()
            .cloned()
            .collect()
    }

    /// First half of a confirm or reject.
    ///
    /// # Errors
    ///
    /// See [`FkConfirmationStateMachine::begin`].
    pub fn begin_edge_action(
        &mut self,
        id: &RelationshipId,
        action: EdgeAction,
        notes: Option<String>,
    ) -> Result<Option<MutationTicket>> {
        self.review.begin(id, action, notes)
    }

    /// First half of an undo.
    ///
    /// # Errors
    ///
    /// See [`FkConfirmationStateMachine::undo`].
    pub fn begin_undo(&mut self, id: &RelationshipId) -> Result<MutationTicket> {
        self.review.undo(id, Instant::now())
    }

    /// Second half of a mutation.
    ///
    /// On success the new status is written into the neighborhood on screen,
    /// cached neighborhoods containing the edge are dropped and the view is
    /// rebuilt. On failure the tentative status is discarded, the error is
    /// queued as a notification and the neighborhood is fetched again.
    ///
    /// # Errors
    ///
    /// Returns the mutation error, or `Error::SupersededMutation` for a
    /// ticket that no longer matches the edge's pending request.
    pub async fn complete_mutation(&mut self, outcome: MutationOutcome) -> Result<LogicalStatus> {
        let MutationOutcome { ticket, result } = outcome;
        match self
            .review
            .complete(&ticket, result, Instant::now(), Utc::now())
        {
            Settlement::Applied {
                edge_id,
                status,
                confirmed_at,
                ..
            } => {
                let edge = self
                    .view
                    .as_mut()
                    .and_then(|view| view.graph.edge_mut(&edge_id));
                if let Some(edge) = edge {
                    edge.status = Some(status);
                    if confirmed_at.is_some() {
                        edge.confirmed_at = confirmed_at;
                    }
                }
                self.fetcher.invalidate_edge(&edge_id).await;
                let epoch = self.fetcher.epoch().await;
                self.settled_epochs.insert(edge_id, epoch);
                self.rebuild();
                Ok(status)
            }
            Settlement::RolledBack {
                edge_id,
                restored,
                error,
            } => {
                warn!(edge = %edge_id, %restored, %error, "Mutation failed, refreshing neighborhood");
                self.notifications.push(Notification {
                    edge_id: Some(edge_id.clone()),
                    message: format!("Could not {} {edge_id}: {error}", ticket.action),
                });
                self.fetcher.invalidate_edge(&edge_id).await;
                if let Err(refresh) = self.retry().await {
                    self.notifications.push(Notification {
                        edge_id: None,
                        message: format!("Could not refresh the neighborhood: {refresh}"),
                    });
                }
                Err(error)
            }
            Settlement::Stale => {
                debug!(edge = %ticket.edge_id, token = ticket.request_token, "Ignoring stale mutation outcome");
                Err(Error::SupersededMutation(ticket.edge_id))
            }
        }
    }

    /// Overwrite statuses in a graph fetched at `epoch` with changes that
    /// settled after that fetch started.
    fn keep_newer_settlements(&mut self, graph: &mut NeighborhoodGraph, epoch: u64) {
        for (id, &settled_epoch) in &self.settled_epochs {
            if settled_epoch <= epoch {
                continue;
            }
            let (Some(status), Some(edge)) = (self.review.settled_status(id), graph.edge_mut(id))
            else {
                continue;
            };
            if edge.status != Some(status) {
                debug!(edge = %id, fetched = ?edge.status, %status, "Keeping status settled after the fetch started");
                edge.status = Some(status);
                if let Some(at) = self.review.confirmed_at(id) {
                    edge.confirmed_at = Some(at);
                }
            }
        }
        self.settled_epochs.retain(|_, e| *e > epoch);
    }

    /// Rebuild the model and layout from the neighborhood on screen.
    fn rebuild(&mut self) {
        let direction = self.selection.state().direction;
        if let Some(view) = self.view.as_mut() {
            view.model = self.builder.build(&view.graph);
            view.layout = self
                .engine
                .layout(&view.model, direction, view.graph.focus_object_id);
        }
    }

    async fn settle(&mut self, ticket: MutationTicket) -> Result<LogicalStatus> {
        let outcome = self.mutation_client().send(ticket).await;
        self.complete_mutation(outcome).await
    }

    /// Run both halves of an action. An action that leaves nothing to send
    /// means the edge already has the requested status.
    async fn act(
        &mut self,
        id: &RelationshipId,
        action: EdgeAction,
        notes: Option<String>,
    ) -> Result<LogicalStatus> {
        match self.begin_edge_action(id, action, notes)? {
            Some(ticket) => self.settle(ticket).await,
            None => Ok(action.target_status()),
        }
    }

    /// Confirm a logical edge. Confirming a confirmed edge does nothing.
    ///
    /// # Errors
    ///
    /// Refused actions and mutation failures, see
    /// [`ErdSession::begin_edge_action`] and [`ErdSession::complete_mutation`].
    pub async fn confirm(
        &mut self,
        id: &RelationshipId,
        notes: Option<String>,
    ) -> Result<LogicalStatus> {
        self.act(id, EdgeAction::Confirm, notes).await
    }

    /// Reject a suggested logical edge and open an undo offer.
    ///
    /// # Errors
    ///
    /// Refused actions and mutation failures, see
    /// [`ErdSession::begin_edge_action`] and [`ErdSession::complete_mutation`].
    pub async fn reject(
        &mut self,
        id: &RelationshipId,
        notes: Option<String>,
    ) -> Result<LogicalStatus> {
        self.act(id, EdgeAction::Reject, notes).await
    }

    /// Take back a reject. The edge ends up confirmed.
    ///
    /// # Errors
    ///
    /// `Error::UndoExpired` once the window closed, and mutation failures.
    pub async fn undo(&mut self, id: &RelationshipId) -> Result<LogicalStatus> {
        let ticket = self.begin_undo(id)?;
        self.settle(ticket).await
    }

    /// Close undo offers whose window has passed
    pub fn expire_undo_offers(&mut self) -> Vec<RelationshipId> {
        self.review.expire_undo_offers(Instant::now())
    }

    /// Wait until the earliest open undo offer closes.
    ///
    /// Never completes while no offer is open. Dropping the future cancels
    /// the wait.
    pub async fn wait_for_undo_expiry(&self) {
        match self.review.next_undo_deadline() {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::orders_graph;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves the orders neighborhood for every focus and acks every mutation.
    #[derive(Default)]
    struct OrdersService {
        mutations: AtomicUsize,
    }

    #[async_trait]
    impl RelationshipService for OrdersService {
        async fn fetch_neighborhood(
            &self,
            _project: &ProjectId,
            focus: ObjectId,
            _hops: crate::domain::HopDepth,
        ) -> Result<NeighborhoodGraph> {
            if focus == ObjectId(42) {
                Ok(orders_graph())
            } else {
                Err(Error::NotFound(focus))
            }
        }

        async fn mutate_logical_fk(
            &self,
            _project: &ProjectId,
            _id: &RelationshipId,
            _action: EdgeAction,
            _notes: Option<&str>,
        ) -> Result<()> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn list_objects(&self, _project: &ProjectId) -> Result<Vec<ObjectSummary>> {
            Ok(Vec::new())
        }
    }

    fn session() -> (ErdSession, Arc<OrdersService>) {
        let service = Arc::new(OrdersService::default());
        let config = SchemaGraphConfig::default();
        (ErdSession::new(&config, service.clone()), service)
    }

    #[tokio::test]
    async fn opening_unknown_edge_is_refused() {
        let (mut session, _) = session();
        let err = session
            .dispatch(SelectionCommand::OpenEdge(RelationshipId::new("lfk-1")))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEdge(_)));

        session.select_focus(ObjectId(42)).await.unwrap();
        session
            .dispatch(SelectionCommand::OpenEdge(RelationshipId::new("lfk-1")))
            .unwrap();
        assert!(session.state().open_edge.is_some());
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_view() {
        let (mut session, _) = session();
        session.select_focus(ObjectId(42)).await.unwrap();

        let err = session.select_focus(ObjectId(5)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(session.graph().unwrap().focus_object_id, ObjectId(42));
        assert!(matches!(
            session.state().load,
            crate::selection::LoadState::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn confirm_writes_status_into_view() {
        let (mut session, service) = session();
        session.select_focus(ObjectId(42)).await.unwrap();

        let id = RelationshipId::new("lfk-1");
        let status = session.confirm(&id, None).await.unwrap();
        assert_eq!(status, LogicalStatus::Confirmed);

        let edge = session.graph().unwrap().edge(&id).unwrap();
        assert_eq!(edge.status, Some(LogicalStatus::Confirmed));
        assert!(edge.confirmed_at.is_some());
        assert_eq!(
            session.model().unwrap().edge(&id).unwrap().label.as_deref(),
            Some("CONFIRMED (82%)")
        );

        // Second confirm is a no-op without a network call.
        assert_eq!(
            session.confirm(&id, None).await.unwrap(),
            LogicalStatus::Confirmed
        );
        assert_eq!(service.mutations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn direction_change_relays_out() {
        let (mut session, _) = session();
        session.select_focus(ObjectId(42)).await.unwrap();
        session.set_direction(LayoutDirection::TopBottom).await.unwrap();

        let layout = session.layout().unwrap();
        assert_eq!(layout.direction, LayoutDirection::TopBottom);
        assert_eq!(session.scene().unwrap().direction, LayoutDirection::TopBottom);
    }
}

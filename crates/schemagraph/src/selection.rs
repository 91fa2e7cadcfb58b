//! View control state and the commands that change it.
//!
//! All view state lives in one serializable [`SelectionState`] and is changed
//! only through [`SelectionController::dispatch`]. Commands that change what
//! should be on screen (focus, hop depth, direction, retry) return a
//! [`FetchRequest`] stamped with a fresh generation. Results are applied only
//! if their generation is still the latest one, so a slow response to an
//! older selection can never overwrite a newer one.

use crate::domain::{HopDepth, LayoutDirection, ObjectId, ObjectSummary, RelationshipId};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Progress of the neighborhood shown in the view.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum LoadState {
    /// Nothing selected yet
    #[default]
    Idle,
    /// A fetch for `generation` is outstanding
    Loading {
        /// Generation being loaded
        generation: u64,
    },
    /// The neighborhood of `generation` is displayed
    Ready {
        /// Generation displayed
        generation: u64,
    },
    /// Loading `generation` failed; the view shows an inline error
    Failed {
        /// Generation that failed
        generation: u64,
        /// What went wrong
        message: String,
    },
}

/// Everything the view is currently asked to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    /// Focus object, once one was chosen
    pub focus: Option<ObjectId>,
    /// Neighborhood radius
    pub hops: HopDepth,
    /// Layering axis
    pub direction: LayoutDirection,
    /// Catalog filter text
    pub search_text: String,
    /// Generation of the latest fetch request
    pub generation: u64,
    /// Edge whose detail view is open
    pub open_edge: Option<RelationshipId>,
    /// Load progress
    pub load: LoadState,
}

impl SelectionState {
    /// Initial state with no focus
    #[must_use]
    pub fn new(hops: HopDepth, direction: LayoutDirection) -> Self {
        Self {
            focus: None,
            hops,
            direction,
            search_text: String::new(),
            generation: 0,
            open_edge: None,
            load: LoadState::Idle,
        }
    }
}

/// A neighborhood fetch the view needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    /// Generation stamped at issue time
    pub generation: u64,
    /// Focus object
    pub focus: ObjectId,
    /// Neighborhood radius
    pub hops: HopDepth,
    /// Direction to lay the result out in
    pub direction: LayoutDirection,
}

/// Named operations on the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCommand {
    /// Center the view on an object
    SelectFocus(ObjectId),
    /// Change the neighborhood radius (1..=3)
    SetHops(u8),
    /// Change the layering axis
    SetDirection(LayoutDirection),
    /// Change the catalog filter text
    SetSearch(String),
    /// Open the detail view of an edge
    OpenEdge(RelationshipId),
    /// Close the edge detail view
    CloseEdge,
    /// Re-issue the current request
    Retry,
}

/// Owns the [`SelectionState`] and the catalog it searches.
#[derive(Debug, Clone)]
pub struct SelectionController {
    state: SelectionState,
    catalog: Vec<ObjectSummary>,
}

impl SelectionController {
    /// Create a controller with nothing selected
    #[must_use]
    pub fn new(hops: HopDepth, direction: LayoutDirection) -> Self {
        Self::from_state(SelectionState::new(hops, direction))
    }

    /// Resume from a previously captured state
    #[must_use]
    pub fn from_state(state: SelectionState) -> Self {
        Self {
            state,
            catalog: Vec::new(),
        }
    }

    /// The current state
    #[must_use]
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Apply a command.
    ///
    /// Returns the fetch the view now needs, or `None` if nothing has to be
    /// loaded (unchanged value, no focus yet, or a command that only affects
    /// local state).
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for a non-positive focus id or a hop depth
    /// outside 1..=3. The state is left unchanged.
    pub fn dispatch(&mut self, command: SelectionCommand) -> Result<Option<FetchRequest>> {
        match command {
            SelectionCommand::SelectFocus(focus) => {
                if focus.0 <= 0 {
                    return Err(Error::Validation {
                        field: "focus",
                        value: focus.to_string(),
                        reason: "object ids are positive".to_string(),
                    });
                }
                if self.state.focus == Some(focus) {
                    return Ok(None);
                }
                self.state.focus = Some(focus);
                self.state.open_edge = None;
                Ok(self.issue())
            }
            SelectionCommand::SetHops(hops) => {
                let hops = HopDepth::new(hops)?;
                if self.state.hops == hops {
                    return Ok(None);
                }
                self.state.hops = hops;
                Ok(self.issue())
            }
            SelectionCommand::SetDirection(direction) => {
                if self.state.direction == direction {
                    return Ok(None);
                }
                self.state.direction = direction;
                Ok(self.issue())
            }
            SelectionCommand::SetSearch(text) => {
                self.set_search(text);
                Ok(None)
            }
            SelectionCommand::OpenEdge(id) => {
                self.state.open_edge = Some(id);
                Ok(None)
            }
            SelectionCommand::CloseEdge => {
                self.state.open_edge = None;
                Ok(None)
            }
            SelectionCommand::Retry => Ok(self.issue()),
        }
    }

    /// Start a new generation for the current selection.
    fn issue(&mut self) -> Option<FetchRequest> {
        let focus = self.state.focus?;
        self.state.generation += 1;
        self.state.load = LoadState::Loading {
            generation: self.state.generation,
        };
        debug!(
            generation = self.state.generation,
            %focus,
            hops = %self.state.hops,
            direction = %self.state.direction,
            "Issued fetch request"
        );
        self.current_request()
    }

    /// The request matching the current generation, if a focus is set
    #[must_use]
    pub fn current_request(&self) -> Option<FetchRequest> {
        self.state.focus.map(|focus| FetchRequest {
            generation: self.state.generation,
            focus,
            hops: self.state.hops,
            direction: self.state.direction,
        })
    }

    /// Whether `request` is still the latest one
    #[must_use]
    pub fn is_current(&self, request: &FetchRequest) -> bool {
        request.generation == self.state.generation
    }

    /// Record the outcome of `request`.
    ///
    /// Returns `false`, leaving the state untouched, if a newer request was
    /// issued in the meantime.
    pub fn resolve(&mut self, request: &FetchRequest, error: Option<&Error>) -> bool {
        if !self.is_current(request) {
            debug!(
                stale = request.generation,
                current = self.state.generation,
                "Discarding stale fetch result"
            );
            return false;
        }
        self.state.load = match error {
            None => LoadState::Ready {
                generation: request.generation,
            },
            Some(e) => LoadState::Failed {
                generation: request.generation,
                message: e.to_string(),
            },
        };
        true
    }

    /// Change the catalog filter text. Never starts a fetch.
    pub fn set_search(&mut self, text: impl Into<String>) {
        self.state.search_text = text.into();
    }

    /// Replace the searchable catalog
    pub fn set_catalog(&mut self, catalog: Vec<ObjectSummary>) {
        self.catalog = catalog;
    }

    /// The searchable catalog
    #[must_use]
    pub fn catalog(&self) -> &[ObjectSummary] {
        &self.catalog
    }

    /// Catalog entries matching the search text, in catalog order.
    ///
    /// Matches case-insensitively against the object name and the
    /// schema-qualified name. Blank text matches everything.
    #[must_use]
    pub fn search_results(&self, limit: usize) -> Vec<&ObjectSummary> {
        let needle = self.state.search_text.trim().to_lowercase();
        self.catalog
            .iter()
            .filter(|o| {
                needle.is_empty()
                    || o.name.to_lowercase().contains(&needle)
                    || o.qualified_name().to_lowercase().contains(&needle)
            })
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn controller() -> SelectionController {
        SelectionController::new(HopDepth::default(), LayoutDirection::LeftRight)
    }

    fn summary(id: i64, schema: &str, name: &str) -> ObjectSummary {
        ObjectSummary {
            object_id: ObjectId(id),
            name: name.to_string(),
            schema_name: schema.to_string(),
        }
    }

    #[test]
    fn selecting_focus_issues_request() {
        let mut ctl = controller();
        let request = ctl
            .dispatch(SelectionCommand::SelectFocus(ObjectId(42)))
            .unwrap()
            .unwrap();
        assert_eq!(request.focus, ObjectId(42));
        assert_eq!(request.hops.get(), 2);
        assert_eq!(request.generation, 1);
        assert_eq!(ctl.state().load, LoadState::Loading { generation: 1 });
    }

    #[test]
    fn settings_without_focus_do_not_fetch() {
        let mut ctl = controller();
        assert!(ctl.dispatch(SelectionCommand::SetHops(3)).unwrap().is_none());
        assert!(
            ctl.dispatch(SelectionCommand::SetDirection(LayoutDirection::TopBottom))
                .unwrap()
                .is_none()
        );
        assert!(ctl.dispatch(SelectionCommand::Retry).unwrap().is_none());
        assert_eq!(ctl.state().hops.get(), 3);
        assert_eq!(ctl.state().generation, 0);
    }

    #[rstest]
    #[case::hops(SelectionCommand::SetHops(1))]
    #[case::direction(SelectionCommand::SetDirection(LayoutDirection::TopBottom))]
    #[case::retry(SelectionCommand::Retry)]
    fn view_changes_issue_new_generation(#[case] command: SelectionCommand) {
        let mut ctl = controller();
        ctl.dispatch(SelectionCommand::SelectFocus(ObjectId(42))).unwrap();

        let request = ctl.dispatch(command).unwrap().unwrap();
        assert_eq!(request.generation, 2);
        assert_eq!(request.focus, ObjectId(42));
    }

    #[rstest]
    #[case::focus(SelectionCommand::SelectFocus(ObjectId(42)))]
    #[case::hops(SelectionCommand::SetHops(2))]
    #[case::direction(SelectionCommand::SetDirection(LayoutDirection::LeftRight))]
    fn unchanged_values_do_not_fetch(#[case] command: SelectionCommand) {
        let mut ctl = controller();
        ctl.dispatch(SelectionCommand::SelectFocus(ObjectId(42))).unwrap();

        assert!(ctl.dispatch(command).unwrap().is_none());
        assert_eq!(ctl.state().generation, 1);
    }

    #[rstest]
    #[case::zero_hops(SelectionCommand::SetHops(0))]
    #[case::four_hops(SelectionCommand::SetHops(4))]
    #[case::zero_focus(SelectionCommand::SelectFocus(ObjectId(0)))]
    #[case::negative_focus(SelectionCommand::SelectFocus(ObjectId(-5)))]
    fn invalid_values_are_refused(#[case] command: SelectionCommand) {
        let mut ctl = controller();
        let before = ctl.state().clone();
        let err = ctl.dispatch(command).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(ctl.state(), &before);
    }

    #[test]
    fn new_focus_closes_edge_detail() {
        let mut ctl = controller();
        ctl.dispatch(SelectionCommand::SelectFocus(ObjectId(42))).unwrap();
        ctl.dispatch(SelectionCommand::OpenEdge(RelationshipId::new("lfk-1")))
            .unwrap();
        ctl.dispatch(SelectionCommand::SetHops(1)).unwrap();
        assert!(ctl.state().open_edge.is_some());

        ctl.dispatch(SelectionCommand::SelectFocus(ObjectId(7))).unwrap();
        assert!(ctl.state().open_edge.is_none());
    }

    #[test]
    fn search_never_fetches() {
        let mut ctl = controller();
        ctl.dispatch(SelectionCommand::SelectFocus(ObjectId(42))).unwrap();
        let result = ctl
            .dispatch(SelectionCommand::SetSearch("ord".to_string()))
            .unwrap();
        assert!(result.is_none());
        assert_eq!(ctl.state().generation, 1);

        ctl.set_search("cust");
        assert_eq!(ctl.state().search_text, "cust");
        assert_eq!(ctl.state().generation, 1);
    }

    #[test]
    fn last_request_wins() {
        let mut ctl = controller();
        let first = ctl
            .dispatch(SelectionCommand::SelectFocus(ObjectId(1)))
            .unwrap()
            .unwrap();
        let second = ctl
            .dispatch(SelectionCommand::SelectFocus(ObjectId(2)))
            .unwrap()
            .unwrap();

        assert!(ctl.resolve(&second, None));
        assert!(!ctl.resolve(&first, None));
        assert_eq!(ctl.state().load, LoadState::Ready { generation: 2 });
        assert_eq!(ctl.state().focus, Some(ObjectId(2)));
    }

    #[test]
    fn failed_load_is_recorded_and_retryable() {
        let mut ctl = controller();
        let request = ctl
            .dispatch(SelectionCommand::SelectFocus(ObjectId(1)))
            .unwrap()
            .unwrap();
        assert!(ctl.resolve(&request, Some(&Error::Network("down".into()))));
        assert!(matches!(
            &ctl.state().load,
            LoadState::Failed { generation: 1, message } if message.contains("down")
        ));

        let retry = ctl.dispatch(SelectionCommand::Retry).unwrap().unwrap();
        assert_eq!(retry.generation, 2);
        assert_eq!(retry.focus, ObjectId(1));
    }

    #[rstest]
    #[case::name("ORD", vec![1, 2])]
    #[case::schema("sales.", vec![1, 3])]
    #[case::qualified("sales.cust", vec![3])]
    #[case::blank("  ", vec![1, 2, 3, 4])]
    #[case::none("zzz", vec![])]
    fn search_filters_catalog(#[case] text: &str, #[case] expected: Vec<i64>) {
        let mut ctl = controller();
        ctl.set_catalog(vec![
            summary(1, "sales", "orders"),
            summary(2, "archive", "old_orders"),
            summary(3, "sales", "customers"),
            summary(4, "public", "regions"),
        ]);
        ctl.dispatch(SelectionCommand::SetSearch(text.to_string()))
            .unwrap();

        let ids: Vec<i64> = ctl.search_results(10).iter().map(|o| o.object_id.0).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn search_results_respect_limit() {
        let mut ctl = controller();
        ctl.set_catalog((1..=20).map(|i| summary(i, "s", "t")).collect());
        assert_eq!(ctl.search_results(5).len(), 5);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut ctl = controller();
        ctl.dispatch(SelectionCommand::SelectFocus(ObjectId(42))).unwrap();
        ctl.dispatch(SelectionCommand::SetSearch("ord".into())).unwrap();

        let json = serde_json::to_value(ctl.state()).unwrap();
        assert_eq!(json["focus"], 42);
        assert_eq!(json["load"]["state"], "loading");

        let restored: SelectionState = serde_json::from_value(json).unwrap();
        let resumed = SelectionController::from_state(restored);
        assert_eq!(resumed.state(), ctl.state());
        assert_eq!(resumed.current_request().unwrap().generation, 1);
    }
}

//! End-to-end review flows over the in-memory relationship service.

mod common;

use common::{rel, session, warehouse_service};
use schemagraph::domain::{HopDepth, LogicalStatus, ObjectId};
use schemagraph::error::Error;
use schemagraph::model::{EdgeColor, LineStyle};
use schemagraph::selection::{LoadState, SelectionCommand};

#[tokio::test]
async fn orders_neighborhood_shows_suggested_edge() {
    let service = warehouse_service();
    let mut session = session(&service);

    session.select_focus(ObjectId(42)).await.unwrap();

    let graph = session.graph().unwrap();
    let depths: Vec<(i64, u32)> = graph
        .nodes
        .iter()
        .map(|n| (n.object_id.0, n.depth))
        .collect();
    assert_eq!(depths, vec![(42, 0), (7, 1), (3, 2)]);
    assert_eq!(session.state().load, LoadState::Ready { generation: 1 });

    let scene = session.scene().unwrap();
    let edge = scene.edge(&rel("lfk-1")).unwrap();
    assert_eq!(edge.style.line, LineStyle::Dashed);
    assert_eq!(edge.style.color, EdgeColor::Amber);
    assert_eq!(edge.label.as_deref(), Some("SUGGESTED (82%)"));

    let physical = scene.edge(&rel("fk-orders-customers")).unwrap();
    assert_eq!(physical.style.line, LineStyle::Solid);
    assert!(physical.label.is_none());
}

#[tokio::test]
async fn confirming_turns_edge_green_and_drops_cache() {
    let service = warehouse_service();
    let mut session = session(&service);
    session.select_focus(ObjectId(42)).await.unwrap();
    let fetcher = session.fetcher();
    assert!(fetcher.is_cached(ObjectId(42), HopDepth::default()).await);

    let status = session.confirm(&rel("lfk-1"), None).await.unwrap();
    assert_eq!(status, LogicalStatus::Confirmed);

    let scene = session.scene().unwrap();
    let edge = scene.edge(&rel("lfk-1")).unwrap();
    assert_eq!(edge.style.line, LineStyle::Dashed);
    assert_eq!(edge.style.color, EdgeColor::Green);
    assert_eq!(edge.label.as_deref(), Some("CONFIRMED (82%)"));
    assert!(!edge.pending);

    assert!(!fetcher.is_cached(ObjectId(42), HopDepth::default()).await);
    let server = service.relationship(&rel("lfk-1")).await.unwrap();
    assert_eq!(server.status, Some(LogicalStatus::Confirmed));
    assert!(server.confirmed_at.is_some());
    assert_eq!(service.mutation_calls(), 1);
}

#[tokio::test]
async fn refetch_after_confirm_reflects_server_truth() {
    let service = warehouse_service();
    let mut session = session(&service);
    session.select_focus(ObjectId(42)).await.unwrap();
    session.confirm(&rel("lfk-1"), None).await.unwrap();

    let calls = service.fetch_calls();
    session.retry().await.unwrap();
    assert_eq!(service.fetch_calls(), calls + 1);

    let edge = session.graph().unwrap().edge(&rel("lfk-1")).unwrap();
    assert_eq!(edge.status, Some(LogicalStatus::Confirmed));
}

#[tokio::test]
async fn rejecting_hides_edge_and_undo_confirms_it() {
    let service = warehouse_service();
    let mut session = session(&service);
    session.select_focus(ObjectId(42)).await.unwrap();

    let status = session.reject(&rel("lfk-1"), Some("different code sets".into())).await.unwrap();
    assert_eq!(status, LogicalStatus::Rejected);

    let scene = session.scene().unwrap();
    assert!(scene.edge(&rel("lfk-1")).is_none());
    assert!(scene.undo_offer(&rel("lfk-1")).is_some());

    let status = session.undo(&rel("lfk-1")).await.unwrap();
    assert_eq!(status, LogicalStatus::Confirmed);

    let scene = session.scene().unwrap();
    assert_eq!(
        scene.edge(&rel("lfk-1")).unwrap().label.as_deref(),
        Some("CONFIRMED (82%)")
    );
    assert!(scene.undo_offers.is_empty());
    assert_eq!(service.mutation_calls(), 2);
}

#[tokio::test]
async fn rejecting_twice_is_refused_without_network_call() {
    let service = warehouse_service();
    let mut session = session(&service);
    session.select_focus(ObjectId(42)).await.unwrap();
    session.reject(&rel("lfk-1"), None).await.unwrap();

    let err = session.reject(&rel("lfk-1"), None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidTransition {
            status: LogicalStatus::Rejected,
            ..
        }
    ));
    assert_eq!(service.mutation_calls(), 1);
}

#[tokio::test]
async fn physical_edges_cannot_be_reviewed() {
    let service = warehouse_service();
    let mut session = session(&service);
    session.select_focus(ObjectId(42)).await.unwrap();

    let err = session
        .confirm(&rel("fk-orders-customers"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ImmutableRelationship(_)));
    assert_eq!(service.mutation_calls(), 0);
}

#[tokio::test]
async fn confirming_rejected_edge_from_server() {
    let service = warehouse_service();
    service
        .set_status(&rel("lfk-1"), LogicalStatus::Rejected)
        .await
        .unwrap();
    let mut session = session(&service);
    session.select_focus(ObjectId(42)).await.unwrap();

    // Hidden by default while rejected.
    assert!(session.scene().unwrap().edge(&rel("lfk-1")).is_none());

    let status = session.confirm(&rel("lfk-1"), None).await.unwrap();
    assert_eq!(status, LogicalStatus::Confirmed);
    assert!(session.scene().unwrap().edge(&rel("lfk-1")).is_some());
}

#[tokio::test]
async fn hop_depth_bounds_the_neighborhood() {
    let service = warehouse_service();
    let mut session = session(&service);
    session.set_hops(1).await.unwrap();
    session.select_focus(ObjectId(42)).await.unwrap();

    let ids: Vec<i64> = session
        .graph()
        .unwrap()
        .nodes
        .iter()
        .map(|n| n.object_id.0)
        .collect();
    assert_eq!(ids, vec![42, 7]);
    assert!(!session.graph().unwrap().contains_edge(&rel("lfk-1")));

    session.set_hops(2).await.unwrap();
    assert_eq!(session.graph().unwrap().nodes.len(), 3);
}

#[tokio::test]
async fn unknown_focus_is_not_found_and_view_stays_usable() {
    let service = warehouse_service();
    let mut session = session(&service);

    let err = session.select_focus(ObjectId(1234)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(ObjectId(1234))));
    assert!(session.graph().is_none());
    assert!(matches!(session.state().load, LoadState::Failed { .. }));

    session.select_focus(ObjectId(42)).await.unwrap();
    assert!(session.graph().is_some());
}

#[tokio::test]
async fn invalid_input_never_reaches_the_service() {
    let service = warehouse_service();
    let mut session = session(&service);

    assert!(matches!(
        session.select_focus(ObjectId(0)).await.unwrap_err(),
        Error::Validation { .. }
    ));
    assert!(matches!(
        session.set_hops(4).await.unwrap_err(),
        Error::Validation { .. }
    ));
    assert_eq!(service.fetch_calls(), 0);
}

#[tokio::test]
async fn catalog_search_drives_focus_selection() {
    let service = warehouse_service();
    let mut session = session(&service);
    assert_eq!(session.load_catalog().await.unwrap(), 6);

    let hits = session.search("ORDERS", 10);
    let ids: Vec<i64> = hits.iter().map(|o| o.object_id.0).collect();
    assert_eq!(ids, vec![42, 99]);
    assert_eq!(service.fetch_calls(), 0);

    let hr = session.search("hr.", 10);
    assert_eq!(hr.len(), 2);

    session.select_focus(hits[0].object_id).await.unwrap();
    assert_eq!(session.state().focus, Some(ObjectId(42)));
}

#[tokio::test]
async fn new_focus_closes_edge_detail() {
    let service = warehouse_service();
    let mut session = session(&service);
    session.select_focus(ObjectId(42)).await.unwrap();
    session
        .dispatch(SelectionCommand::OpenEdge(rel("lfk-1")))
        .unwrap();
    assert_eq!(session.state().open_edge, Some(rel("lfk-1")));

    session.select_focus(ObjectId(7)).await.unwrap();
    assert!(session.state().open_edge.is_none());
}

#[tokio::test]
async fn cyclic_neighborhood_is_laid_out() {
    let service = warehouse_service();
    let mut session = session(&service);
    session.select_focus(ObjectId(20)).await.unwrap();

    let layout = session.layout().unwrap();
    assert_eq!(layout.positions.len(), 2);
    let back: Vec<&str> = layout
        .routes
        .iter()
        .filter(|r| r.back_edge)
        .map(|r| r.id.as_str())
        .collect();
    assert_eq!(back, vec!["fk-employees-manager", "lfk-departments-head"]);
}

//! Schemagraph - entity-relationship neighborhoods of database schemas.
//!
//! Given a focus database object, the crate fetches its bounded neighborhood
//! of declared ("physical") and inferred ("logical") foreign keys, turns it
//! into a renderable model, lays it out in layers and runs the review
//! workflow for inferred relationships with optimistic updates and undo.
//!
//! The pieces, leaves first:
//!
//! - [`fetcher`]: cached neighborhood fetches over a [`service::RelationshipService`]
//! - [`model`]: pure graph model builder with edge styles and labels
//! - [`layout`]: deterministic layered layout behind the [`layout::LayoutEngine`] trait
//! - [`selection`]: serializable view state and its commands
//! - [`confirmation`]: per-edge review state machine
//! - [`render`]: presentation of model, layout and review state
//! - [`session`]: the owner that wires them together

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod config;
pub mod confirmation;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod layout;
pub mod model;
pub mod render;
pub mod selection;
pub mod service;
pub mod session;

// Public CLI modules (needed by binary)
pub mod app;
pub mod cli;
pub mod output;

// Command implementations
pub mod commands;

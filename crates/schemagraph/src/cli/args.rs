//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::Parser;

use super::types::DirectionArg;
use super::validators::{validate_object_id, validate_relationship_id};
use crate::domain::{MAX_HOPS, MIN_HOPS, ObjectId, RelationshipId};

/// Arguments for the `init-config` command
#[derive(Parser, Debug, Clone)]
pub struct InitConfigArgs {
    /// Base URL of the relationship service
    #[arg(long)]
    pub base_url: Option<String>,

    /// Project whose schema is browsed
    #[arg(short, long)]
    pub project: Option<String>,

    /// Overwrite an existing schemagraph.yaml
    #[arg(short, long)]
    pub force: bool,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `search` command
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Text matched against object and schema-qualified names
    #[arg(default_value = "")]
    pub text: String,

    /// Maximum number of results
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

/// Arguments for the `show` command
#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    /// Focus object id
    #[arg(value_parser = validate_object_id)]
    pub focus: ObjectId,

    /// Neighborhood radius in hops (1-3, defaults to the configured value)
    #[arg(long, value_parser = clap::value_parser!(u8).range(i64::from(MIN_HOPS)..=i64::from(MAX_HOPS)))]
    pub hops: Option<u8>,

    /// Layering direction (defaults to the configured value)
    #[arg(short, long, value_enum)]
    pub direction: Option<DirectionArg>,

    /// Draw rejected relationships de-emphasized instead of hiding them
    #[arg(long)]
    pub show_rejected: bool,
}

/// Arguments for the `confirm` and `reject` commands
#[derive(Parser, Debug, Clone)]
pub struct EdgeActionArgs {
    /// Logical relationship id
    #[arg(value_parser = validate_relationship_id)]
    pub id: RelationshipId,

    /// Focus object whose neighborhood contains the relationship
    #[arg(long, value_parser = validate_object_id)]
    pub focus: ObjectId,

    /// Neighborhood radius in hops (1-3, defaults to the configured value)
    #[arg(long, value_parser = clap::value_parser!(u8).range(i64::from(MIN_HOPS)..=i64::from(MAX_HOPS)))]
    pub hops: Option<u8>,

    /// Reviewer notes sent with the decision
    #[arg(short, long)]
    pub notes: Option<String>,
}

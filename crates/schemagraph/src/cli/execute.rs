//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands.

use anyhow::{Context, Result};

use super::args::{EdgeActionArgs, InitConfigArgs, SearchArgs, ShowArgs};
use crate::app::App;
use crate::domain::LayoutDirection;
use crate::output::{self, OutputMode};
use crate::session::ErdSession;

/// Execute the init-config command
pub async fn execute_init_config(args: &InitConfigArgs) -> Result<()> {
    use crate::commands::init;

    let current_dir = std::env::current_dir()?;
    let result = init::init_config(
        &current_dir,
        args.base_url.as_deref(),
        args.project.as_deref(),
        args.force,
    )
    .await?;

    if !args.quiet {
        println!("Wrote {}", result.config_file.display());
        println!("  Service: {}", result.config.base_url);
        println!("  Project: {}", result.config.project_id);
    }
    Ok(())
}

/// Execute the search command
pub async fn execute_search(app: &App, args: &SearchArgs, output_mode: OutputMode) -> Result<()> {
    let mut session = app.session();
    let total = session
        .load_catalog()
        .await
        .context("Failed to load the object catalog")?;
    tracing::debug!(total, "Catalog loaded");

    let results = session.search(args.text.as_str(), args.limit);
    output::print_search_results(&results, output_mode)?;
    Ok(())
}

/// Apply hop/direction overrides, then load the focus neighborhood.
async fn open_neighborhood(
    session: &mut ErdSession,
    focus: crate::domain::ObjectId,
    hops: Option<u8>,
    direction: Option<LayoutDirection>,
) -> Result<()> {
    // Without a focus these only update the selection; nothing is fetched yet.
    if let Some(hops) = hops {
        session.set_hops(hops).await?;
    }
    if let Some(direction) = direction {
        session.set_direction(direction).await?;
    }
    session
        .select_focus(focus)
        .await
        .with_context(|| format!("Failed to load the neighborhood of {focus}"))
}

/// Execute the show command
pub async fn execute_show(app: &mut App, args: &ShowArgs, output_mode: OutputMode) -> Result<()> {
    if args.show_rejected {
        app.config_mut().show_rejected = true;
    }
    let mut session = app.session();
    open_neighborhood(
        &mut session,
        args.focus,
        args.hops,
        args.direction.map(LayoutDirection::from),
    )
    .await?;

    let scene = session
        .scene()
        .context("Neighborhood was loaded but nothing is on screen")?;
    output::print_scene(&scene, output_mode)?;
    Ok(())
}

/// Execute the confirm command
pub async fn execute_confirm(app: &App, args: &EdgeActionArgs, output_mode: OutputMode) -> Result<()> {
    let mut session = app.session();
    open_neighborhood(&mut session, args.focus, args.hops, None).await?;

    let status = session
        .confirm(&args.id, args.notes.clone())
        .await
        .with_context(|| format!("Failed to confirm {}", args.id))?;
    output::print_edge_update(&args.id, status, output_mode)?;
    Ok(())
}

/// Execute the reject command
pub async fn execute_reject(app: &App, args: &EdgeActionArgs, output_mode: OutputMode) -> Result<()> {
    let mut session = app.session();
    open_neighborhood(&mut session, args.focus, args.hops, None).await?;

    let status = session
        .reject(&args.id, args.notes.clone())
        .await
        .with_context(|| format!("Failed to reject {}", args.id))?;
    output::print_edge_update(&args.id, status, output_mode)?;
    Ok(())
}

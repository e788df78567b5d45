//! Example binary demonstrating the tharsis_sdk library.
//!
//! This example looks up one group and lists all of its workspaces.
//!
//! ## Usage
//!
//! 1. Create a `.env` file with `THARSIS_ENDPOINT`, a token and
//!    `THARSIS_GROUP_PATH`
//! 2. Run: `cargo run`

#![allow(clippy::print_stdout)] // Allow println! in the binary example

use tharsis_sdk::resources::groups::GetGroupInput;
use tharsis_sdk::resources::workspaces::ListWorkspacesInput;
use tharsis_sdk::{PaginationOptions, TharsisClient, collect_all};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration from environment
    let client = TharsisClient::from_env()?;
    let group_path = std::env::var("THARSIS_GROUP_PATH")?;
    println!("Endpoint: {}", client.config().endpoint);

    let group = client.groups().get(&GetGroupInput::by_path(&group_path)).await?;
    println!("\nGroup:");
    println!("  ID: {}", group.id);
    println!("  Path: {}", group.full_path);
    println!("  Version: {}", group.metadata.version);

    let workspaces = client.workspaces();
    let all = collect_all(None, None, |cursor| {
        let input = ListWorkspacesInput {
            group_path: Some(group_path.clone()),
            search: None,
            pagination: PaginationOptions::with_limit(50).after(cursor),
        };
        async move { workspaces.list(&input).await }
    })
    .await?;

    println!("\nWorkspaces ({}):", all.len());
    for ws in &all {
        let lock = if ws.locked { " [locked]" } else { "" };
        println!("  {}{}", ws.full_path, lock);
    }

    Ok(())
}

//! Fetches a JSON document on mount and prints the result. Every Enter press
//! fetches it again, `q` unmounts the controller and exits.
//!
//!     RUST_LOG=gosub_fetch=debug cargo run --example users -- https://jsonplaceholder.typicode.com/users

use gosub_fetch::config::ControllerConfig;
use gosub_fetch::events::FetchEvent;
use gosub_fetch::{worker, FetchState, FetchStatus};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_URL: &str = "https://jsonplaceholder.typicode.com/users";

#[derive(Debug, Clone, Deserialize)]
struct User {
    id: u64,
    name: String,
    #[serde(default)]
    email: Option<String>,
}

fn render(state: &FetchState<Vec<User>>) {
    match state.status() {
        FetchStatus::Idle => println!("Nothing loaded yet"),
        FetchStatus::Loading => println!("Loading..."),
        FetchStatus::Success => {
            for user in state.data().into_iter().flatten() {
                println!(
                    "{:>4}  {:<30} {}",
                    user.id,
                    user.name,
                    user.email.as_deref().unwrap_or("-")
                );
            }
        }
        FetchStatus::Error => println!("Error: {}", state.error_message().unwrap_or_default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let url = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());

    let cfg = ControllerConfig::builder()
        .default_url(url)
        .request_timeout(Duration::from_secs(10))
        .build()?;

    let (users, join_handle) = worker::spawn_http::<Vec<User>>(cfg)?;

    // Log lifecycle events in the background
    let mut events = users.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                FetchEvent::Superseded { token, by, .. } => log::info!("fetch {token} replaced by {by}"),
                FetchEvent::Discarded { token, .. } => log::info!("dropped result of {token}"),
                FetchEvent::Unmounted { .. } => break,
                other => log::debug!("{other:?}"),
            }
        }
    });

    users.on_mount().await?;
    render(&users.settled().await);

    println!("Press Enter to reload, q + Enter to quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "q" {
            break;
        }

        users.refetch().await?;
        render(&users.current_state());
        render(&users.settled().await);
    }

    users.on_unmount().await;
    join_handle.await?;

    Ok(())
}

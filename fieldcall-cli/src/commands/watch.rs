use std::time::Duration;

use colored::Colorize;
use fieldcall_core::{FieldcallConfig, Role};

use super::print_notification;
use crate::context::CliContext;

/// Runs the reconciliation poller in the foreground and prints every
/// notification it leads to, until Ctrl-C or the optional deadline.
pub async fn handle_watch_command(
    config: &FieldcallConfig,
    duration: Option<u64>,
) -> anyhow::Result<()> {
    let ctx = CliContext::new(config)?;
    let controller = ctx.controller().await?;

    // Seeds the store so a requester's poller knows about pending requests.
    controller.refresh_requests().await?;
    let mut feed = controller.notifications().subscribe();
    controller.set_view_visible(true).await;

    let what = match ctx.identity.role {
        Role::Requester => "your video requests",
        Role::Responder => "incoming requests and waiting calls",
    };
    println!(
        "{} {} (every {}s, Ctrl-C to stop)",
        "Watching".cyan().bold(),
        what,
        config.polling.interval_secs
    );
    if !controller.poller().is_running().await {
        println!(
            "{}",
            "Nothing to follow right now: no pending requests or polling is disabled.".yellow()
        );
    }
    println!();

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut last_shown = None;
    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = feed.borrow_and_update().current.clone();
                if let Some(notification) = current {
                    if last_shown != Some(notification.id) {
                        last_shown = Some(notification.id);
                        print_notification(&notification);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            _ = &mut deadline => break,
        }
    }

    let status = controller.poller().status().await;
    println!(
        "{} {} polls, {} failed",
        "Stopped.".dimmed(),
        status.polls,
        status.failures
    );
    if let Some(error) = status.last_error {
        println!("  {} {}", "Last error:".dimmed(), error);
    }

    controller.shutdown().await;
    Ok(())
}

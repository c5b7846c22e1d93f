use anyhow::anyhow;
use colored::Colorize;
use fieldcall_core::{FieldcallConfig, Urgency};

use crate::context::CliContext;

pub async fn handle_request_command(
    config: &FieldcallConfig,
    responder_id: &str,
    topic: &str,
    description: Option<String>,
    urgency: &str,
) -> anyhow::Result<()> {
    let urgency: Urgency = urgency.parse().map_err(|e: String| anyhow!(e))?;
    let ctx = CliContext::new(config)?;
    let controller = ctx.controller().await?;

    // Fills in the specialist's name for the confirmation.
    if let Err(e) = controller.refresh_responders().await {
        tracing::debug!("Could not load specialists: {}", e);
    }

    let request = controller
        .request_call(responder_id, topic, description, urgency)
        .await?;

    let who = request
        .responder_name
        .clone()
        .unwrap_or_else(|| responder_id.to_string());

    println!("{} {}", "✓".green().bold(), "Video call request sent!".green());
    println!();
    println!("  {:<12} {}", "Request:".bold(), request.id);
    println!("  {:<12} {}", "Specialist:".bold(), who);
    println!("  {:<12} {}", "Topic:".bold(), request.topic);
    println!("  {:<12} {}", "Urgency:".bold(), request.urgency);
    println!();
    println!(
        "{}",
        "Run 'fieldcall watch' to be told when the specialist accepts.".dimmed()
    );

    controller.shutdown().await;
    Ok(())
}

pub async fn handle_accept_command(
    config: &FieldcallConfig,
    request_id: &str,
) -> anyhow::Result<()> {
    let ctx = CliContext::new(config)?;
    let controller = ctx.controller().await?;

    controller.refresh_requests().await?;
    controller.accept_call(request_id).await?;

    let requester = controller
        .requests()
        .await
        .into_iter()
        .find(|r| r.id == request_id)
        .map(|r| r.requester_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "The farmer".to_string());

    println!(
        "{} Request accepted! {} can now start the call.",
        "✓".green().bold(),
        requester
    );

    controller.shutdown().await;
    Ok(())
}

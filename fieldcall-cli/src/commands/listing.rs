use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use fieldcall_core::{FieldcallConfig, RequestStatus, Role, Urgency};

use crate::context::CliContext;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::White))
                .collect::<Vec<_>>(),
        );
    table
}

pub async fn handle_responders_command(
    config: &FieldcallConfig,
    format: &str,
) -> anyhow::Result<()> {
    let ctx = CliContext::new(config)?;
    let responders = ctx.directory.list_responders().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&responders)?);
        return Ok(());
    }

    if responders.is_empty() {
        println!("{}", "No specialists available right now.".yellow());
        return Ok(());
    }

    println!("{}", "Available Specialists".cyan().bold());
    println!();

    let mut table = new_table(&["ID", "Name", "Specialization", "Experience", "Rating", "Status"]);
    for responder in &responders {
        let experience = responder
            .experience_years
            .map(|y| format!("{} yrs", y))
            .unwrap_or_else(|| "-".to_string());
        let rating = responder
            .average_rating
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "-".to_string());
        let status = if responder.is_online {
            Cell::new("online").fg(Color::Green)
        } else {
            Cell::new("offline").fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(&responder.id),
            Cell::new(&responder.name),
            Cell::new(responder.specialization.as_deref().unwrap_or("-")),
            Cell::new(experience),
            Cell::new(rating),
            status,
        ]);
    }

    println!("{}", table);
    println!();
    println!("  {} {}", "Total:".dimmed(), responders.len());
    Ok(())
}

pub async fn handle_requests_command(
    config: &FieldcallConfig,
    mine: bool,
    format: &str,
) -> anyhow::Result<()> {
    let ctx = CliContext::new(config)?;
    let own = mine || ctx.identity.role == Role::Requester;
    let requests = if own {
        ctx.directory.list_own_requests().await?
    } else {
        ctx.directory.list_pending_requests().await?
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&requests)?);
        return Ok(());
    }

    if requests.is_empty() {
        if own {
            println!("{}", "You have no video requests.".yellow());
            println!(
                "{}",
                "Create one with 'fieldcall request <specialist-id> --topic ...'".dimmed()
            );
        } else {
            println!("{}", "No pending video requests.".yellow());
        }
        return Ok(());
    }

    let title = if own { "My Video Requests" } else { "Pending Video Requests" };
    println!("{}", title.cyan().bold());
    println!();

    let mut table = new_table(&[
        "ID",
        "Farmer",
        "Specialist",
        "Topic",
        "Urgency",
        "Status",
        "Created",
    ]);
    for request in &requests {
        let urgency = match request.urgency {
            Urgency::High | Urgency::Urgent => Cell::new(request.urgency).fg(Color::Red),
            _ => Cell::new(request.urgency),
        };
        let status = match request.status {
            RequestStatus::Pending => Cell::new(request.status).fg(Color::Yellow),
            RequestStatus::Accepted => Cell::new(request.status).fg(Color::Green),
            RequestStatus::Ended => Cell::new(request.status).fg(Color::DarkGrey),
        };

        table.add_row(vec![
            Cell::new(&request.id),
            Cell::new(&request.requester_name),
            Cell::new(request.responder_name.as_deref().unwrap_or("-")),
            Cell::new(truncate(&request.topic, 32)),
            urgency,
            status,
            Cell::new(request.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub async fn handle_calls_command(config: &FieldcallConfig, format: &str) -> anyhow::Result<()> {
    let ctx = CliContext::new(config)?;
    let calls = ctx.directory.list_active_calls().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&calls)?);
        return Ok(());
    }

    if calls.is_empty() {
        println!("{}", "No active calls.".yellow());
        return Ok(());
    }

    println!("{}", "Active Calls".cyan().bold());
    println!();

    let mut table = new_table(&["ID", "Farmer", "Specialist", "Topic", "Started"]);
    for call in &calls {
        let started = call
            .started_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&call.id),
            Cell::new(&call.requester_name),
            Cell::new(call.responder_name.as_deref().unwrap_or("-")),
            Cell::new(call.topic.as_deref().map(|t| truncate(t, 32)).unwrap_or_default()),
            Cell::new(started),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub async fn handle_chats_command(config: &FieldcallConfig, format: &str) -> anyhow::Result<()> {
    let ctx = CliContext::new(config)?;
    let chats = ctx.directory.list_chats().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!("{}", "No chats yet.".yellow());
        return Ok(());
    }

    println!("{}", "Chats".cyan().bold());
    println!();

    let mut table = new_table(&["ID", "With", "Topic", "Last Message", "Unread"]);
    for chat in &chats {
        let counterpart = chat.counterpart_for(&ctx.identity);
        let unread = if chat.unread_count > 0 {
            Cell::new(chat.unread_count).fg(Color::Yellow)
        } else {
            Cell::new("-")
        };
        table.add_row(vec![
            Cell::new(&chat.id),
            Cell::new(counterpart.name),
            Cell::new(truncate(&chat.topic, 28)),
            Cell::new(
                chat.last_message
                    .as_deref()
                    .map(|m| truncate(m, 36))
                    .unwrap_or_default(),
            ),
            unread,
        ]);
    }

    println!("{}", table);
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

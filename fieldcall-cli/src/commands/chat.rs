use std::time::Duration;

use anyhow::{anyhow, bail};
use colored::Colorize;
use fieldcall_core::{Delivery, FieldcallConfig, Message, Session, SessionController};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

use super::print_notification;
use crate::context::CliContext;

pub async fn handle_chat_command(
    config: &FieldcallConfig,
    session_id: Option<&str>,
    with: Option<&str>,
    topic: &str,
) -> anyhow::Result<()> {
    let ctx = CliContext::new(config)?;
    let controller = ctx.controller().await?;

    let session = match (session_id, with) {
        (Some(id), _) => {
            let chats = controller.refresh_chats().await?;
            let chat = chats
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| anyhow!("No chat with id {}", id))?;
            controller.open_chat(chat).await?
        }
        (None, Some(responder_id)) => {
            if let Err(e) = controller.refresh_responders().await {
                tracing::debug!("Could not load specialists: {}", e);
            }
            controller.start_chat(responder_id, topic).await?
        }
        (None, None) => bail!("Give a chat session ID, or --with <specialist-id> to start one"),
    };

    let result = run_chat(&controller, &session).await;
    controller.shutdown().await;
    result
}

async fn run_chat(controller: &SessionController, session: &Session) -> anyhow::Result<()> {
    let title = if session.counterpart.name.is_empty() {
        format!("Chat {}", session.id)
    } else {
        format!("Chat with {}", session.counterpart.name)
    };
    println!("{}", title.cyan().bold());
    println!("{}", "Type a message and press Enter. /quit ends the chat.".dimmed());
    println!();

    let me = controller.identity().user_id.clone();
    let mut printed = 0;
    let mut feed = controller.notifications().subscribe();
    let mut last_notification = None;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut refresh = interval(Duration::from_millis(250));
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim() == "/quit" => break,
                    Some(line) => {
                        if let Err(e) = controller.send_chat(&line).await {
                            println!("{} {}", "✗".red(), format!("Not sent: {}", e).red());
                        }
                    }
                    None => break,
                }
            }
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = feed.borrow_and_update().current.clone();
                if let Some(notification) = current {
                    if last_notification != Some(notification.id) {
                        last_notification = Some(notification.id);
                        print_notification(&notification);
                    }
                }
            }
            _ = refresh.tick() => {
                if controller.session().await.is_none() {
                    break;
                }
            }
        }

        let messages = controller.messages().await;
        for message in messages.iter().skip(printed) {
            print_message(message, &me);
        }
        printed = messages.len();
    }

    controller.end_session().await?;
    Ok(())
}

fn print_message(message: &Message, me: &str) {
    let time = message.timestamp.format("%H:%M");
    let marker = match message.delivery {
        Delivery::Pending => "…".dimmed().to_string(),
        Delivery::Confirmed => String::new(),
        Delivery::Failed => "✗".red().to_string(),
    };

    if message.sender_id == me {
        println!(
            "  {} {} {} {}",
            time.to_string().dimmed(),
            "you:".green().bold(),
            message.text,
            marker
        );
    } else {
        let name = if message.sender_name.is_empty() {
            message.sender_role.to_string()
        } else {
            message.sender_name.clone()
        };
        println!(
            "  {} {} {}",
            time.to_string().dimmed(),
            format!("{}:", name).blue().bold(),
            message.text
        );
    }
}

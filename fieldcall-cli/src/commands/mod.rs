pub mod chat;
pub mod config;
pub mod demo;
pub mod listing;
pub mod request;
pub mod watch;

pub use chat::handle_chat_command;
pub use config::{handle_config_command, ConfigCommand};
pub use demo::{handle_demo_command, DemoArgs};
pub use listing::{
    handle_calls_command, handle_chats_command, handle_requests_command,
    handle_responders_command,
};
pub use request::{handle_accept_command, handle_request_command};
pub use watch::handle_watch_command;

use colored::Colorize;
use fieldcall_core::{Notification, NotificationAction, NotificationKind};

/// One notification as a terminal line, with the follow-up hint if any.
pub(crate) fn print_notification(notification: &Notification) {
    let icon = notification.kind.icon();
    let line = match notification.kind {
        NotificationKind::Info => format!("{} {}", icon.blue(), notification.message),
        NotificationKind::Success => format!("{} {}", icon.green(), notification.message.green()),
        NotificationKind::Error => format!("{} {}", icon.red(), notification.message.red()),
    };
    println!("{}", line);

    if let Some(action) = &notification.action {
        let hint = match action {
            NotificationAction::StartCall { request_id } => {
                format!("start the call for request {}", request_id)
            }
            NotificationAction::JoinCall { call } => format!("join call {}", call.id),
        };
        println!("    {} {}: {}", "→".blue(), action.label().bold(), hint.dimmed());
    }
}

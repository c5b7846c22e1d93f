use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Args;
use colored::Colorize;
use fieldcall_core::testing::{FakeMediaDevices, LoopbackPeerFactory, MemoryDirectory};
use fieldcall_core::{
    FieldcallConfig, Identity, MemoryHub, NotificationAction, Responder, Role, SessionController,
    SessionState, Urgency,
};
use serde::Serialize;

#[derive(Args)]
pub struct DemoArgs {
    #[arg(short, long, default_value = "3", help = "How long the call stays up, in seconds")]
    seconds: u64,

    #[arg(long, help = "Refuse camera access on the farmer's side")]
    deny_media: bool,

    #[arg(long, help = "Also exchange a few chat messages")]
    chat: bool,

    #[arg(short, long, default_value = "text", help = "Output format (text, json)")]
    format: String,
}

#[derive(Debug, Default, Serialize)]
struct DemoReport {
    request_id: String,
    accepted: bool,
    farmer_state: String,
    specialist_state: String,
    call_time: Option<String>,
    offers: usize,
    answers: usize,
    chat_messages: usize,
    media_denied: bool,
}

struct Actor {
    controller: SessionController,
    devices: Arc<FakeMediaDevices>,
    peers: Arc<LoopbackPeerFactory>,
}

async fn actor(
    identity: Identity,
    directory: &MemoryDirectory,
    hub: &MemoryHub,
) -> anyhow::Result<Actor> {
    let devices = Arc::new(FakeMediaDevices::new());
    let peers = Arc::new(LoopbackPeerFactory::new());
    let controller = SessionController::builder()
        .identity(identity.clone())
        .config(FieldcallConfig::default())
        .directory(directory.client_for(&identity))
        .connector(Arc::new(hub.clone()))
        .media_devices(devices.clone())
        .peer_factory(peers.clone())
        .build()
        .await?;

    Ok(Actor {
        controller,
        devices,
        peers,
    })
}

pub async fn handle_demo_command(args: DemoArgs) -> anyhow::Result<()> {
    let text = args.format != "json";
    let step = |n: u32, message: &str| {
        if text {
            println!("{} {}", format!("[{}]", n).cyan().bold(), message);
        }
    };

    let hub = MemoryHub::new();
    let directory = MemoryDirectory::with_hub(hub.clone());
    directory
        .add_responder(Responder {
            id: "s-7".to_string(),
            name: "Dr. Rao".to_string(),
            specialization: Some("Plant pathology".to_string()),
            experience_years: Some(12),
            average_rating: Some(4.8),
            is_online: true,
        })
        .await;

    let farmer = actor(Identity::new("f-1", "Ravi", Role::Requester), &directory, &hub).await?;
    let specialist = actor(
        Identity::new("s-7", "Dr. Rao", Role::Responder),
        &directory,
        &hub,
    )
    .await?;
    farmer.devices.deny(args.deny_media);

    let mut report = DemoReport {
        media_denied: args.deny_media,
        ..Default::default()
    };

    if text {
        println!("{}", "Fieldcall demo".cyan().bold());
        println!("{}", "═".repeat(40).dimmed());
    }

    farmer.controller.refresh_responders().await?;
    let request = farmer
        .controller
        .request_call("s-7", "Yellow spots on tomato leaves", None, Urgency::High)
        .await?;
    report.request_id = request.id.clone();
    step(1, &format!("Ravi requested a call with Dr. Rao ({})", request.id));

    specialist.controller.refresh_requests().await?;
    specialist.controller.accept_call(&request.id).await?;
    farmer.controller.refresh_requests().await?;
    report.accepted = true;
    step(2, "Dr. Rao accepted the request");

    if args.chat {
        run_chat(&farmer, &specialist, &mut report, text).await?;
    }

    match farmer.controller.start_call(&request.id).await {
        Ok(session) => step(3, &format!("Ravi started the call ({})", session.state)),
        Err(e) if e.is_media_error() => {
            step(3, &format!("Ravi could not start the call: {}", e));
            report.farmer_state = farmer.controller.state().await.to_string();
            report.specialist_state = specialist.controller.state().await.to_string();
            return finish(&farmer, &specialist, report, text).await;
        }
        Err(e) => return Err(e.into()),
    }

    specialist.controller.refresh_active_calls().await?;
    let offer = specialist
        .controller
        .notifications()
        .history()
        .into_iter()
        .rev()
        .find_map(|n| match n.action {
            Some(action @ NotificationAction::JoinCall { .. }) => Some(action),
            _ => None,
        })
        .ok_or_else(|| anyhow!("Dr. Rao was not offered the call"))?;
    specialist.controller.perform_action(&offer).await?;
    step(4, "Dr. Rao joined the call");

    wait_for_active(&farmer.controller).await?;
    wait_for_active(&specialist.controller).await?;
    step(5, "Both sides connected");

    for _ in 0..args.seconds {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if text {
            let snapshot = farmer.controller.snapshot().await;
            println!(
                "    {} {}",
                "call time".dimmed(),
                snapshot.call_time().unwrap_or_default()
            );
        }
    }

    report.call_time = farmer.controller.snapshot().await.call_time();
    if let Some(peer) = farmer.peers.last_peer().await {
        report.offers = peer.offers_created();
    }
    if let Some(peer) = specialist.peers.last_peer().await {
        report.answers = peer.answers_created();
    }

    farmer.controller.end_session().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    step(6, "Ravi ended the call");

    report.farmer_state = farmer.controller.state().await.to_string();
    report.specialist_state = specialist.controller.state().await.to_string();
    finish(&farmer, &specialist, report, text).await
}

async fn run_chat(
    farmer: &Actor,
    specialist: &Actor,
    report: &mut DemoReport,
    text: bool,
) -> anyhow::Result<()> {
    let session = farmer.controller.start_chat("s-7", "").await?;
    let chats = specialist.controller.refresh_chats().await?;
    let chat = chats
        .iter()
        .find(|c| c.id == session.id)
        .context("chat thread missing from the specialist's list")?;
    specialist.controller.open_chat(chat).await?;

    farmer.controller.send_chat("Namaskara, the leaves have yellow spots.").await?;
    specialist
        .controller
        .send_chat("Please send a close photo of the underside.")
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let messages = farmer.controller.messages().await;
    report.chat_messages = messages.len();
    if text {
        println!("{} Chat {}", "[+]".cyan().bold(), session.id);
        for message in &messages {
            println!("    {}: {}", message.sender_name.bold(), message.text);
        }
    }

    specialist.controller.end_session().await?;
    farmer.controller.end_session().await?;
    Ok(())
}

async fn wait_for_active(controller: &SessionController) -> anyhow::Result<()> {
    for _ in 0..50 {
        if controller.state().await == SessionState::Active {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Err(anyhow!(
        "{} did not connect within 5s",
        controller.identity().display_name
    ))
}

async fn finish(
    farmer: &Actor,
    specialist: &Actor,
    report: DemoReport,
    text: bool,
) -> anyhow::Result<()> {
    let released = farmer.devices.all_stopped().await && specialist.devices.all_stopped().await;
    farmer.controller.shutdown().await;
    specialist.controller.shutdown().await;

    if !text {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("{}", "Summary".yellow().bold());
    println!("  {:<18} {}", "Request:".bold(), report.request_id);
    println!("  {:<18} {}", "Farmer state:".bold(), report.farmer_state);
    println!("  {:<18} {}", "Specialist state:".bold(), report.specialist_state);
    if let Some(call_time) = &report.call_time {
        println!("  {:<18} {}", "Call time:".bold(), call_time);
    }
    println!(
        "  {:<18} {} offer(s), {} answer(s)",
        "Negotiation:".bold(),
        report.offers,
        report.answers
    );
    if report.chat_messages > 0 {
        println!("  {:<18} {}", "Chat messages:".bold(), report.chat_messages);
    }
    let media = if released { "released".green() } else { "still held".red() };
    println!("  {:<18} {}", "Capture devices:".bold(), media);
    Ok(())
}

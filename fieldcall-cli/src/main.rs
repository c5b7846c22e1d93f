use clap::{Parser, Subcommand};
use colored::Colorize;
use fieldcall_core::{CliErrorDisplay, FieldcallConfig, FieldcallError, LoggingConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

mod commands;
mod context;

use commands::{
    handle_accept_command, handle_calls_command, handle_chat_command, handle_chats_command,
    handle_config_command, handle_demo_command, handle_request_command,
    handle_requests_command, handle_responders_command, handle_watch_command, ConfigCommand,
    DemoArgs,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Parser)]
#[command(name = "fieldcall")]
#[command(version = VERSION)]
#[command(about = "Fieldcall - chat and live video consultations between farmers and specialists")]
#[command(long_about = r#"
Fieldcall talks to the consultation service on behalf of one farmer or
specialist. Farmers request calls and open chats; specialists accept
requests and join calls that are waiting for them.

Set FIELDCALL_IDENTITY__USER_ID, FIELDCALL_IDENTITY__ROLE and FIELDCALL_TOKEN
(or a fieldcall.toml) and run 'fieldcall watch' to follow your requests.
'fieldcall demo' runs a complete call in-process without a service.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, help = "Load environment variables from this file first")]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List specialists available for consultation")]
    Responders {
        #[arg(short, long, default_value = "text", help = "Output format (text, json)")]
        format: String,
    },

    #[command(about = "List video requests (pending for specialists, own for farmers)")]
    Requests {
        #[arg(long, help = "Show requests you created")]
        mine: bool,

        #[arg(short, long, default_value = "text", help = "Output format (text, json)")]
        format: String,
    },

    #[command(about = "List calls that are currently active")]
    Calls {
        #[arg(short, long, default_value = "text", help = "Output format (text, json)")]
        format: String,
    },

    #[command(about = "List chat threads")]
    Chats {
        #[arg(short, long, default_value = "text", help = "Output format (text, json)")]
        format: String,
    },

    #[command(about = "Request a video call with a specialist")]
    Request {
        #[arg(help = "Specialist ID")]
        responder_id: String,

        #[arg(short, long, help = "What the call is about")]
        topic: String,

        #[arg(short, long, help = "Longer description of the problem")]
        description: Option<String>,

        #[arg(
            short,
            long,
            default_value = "normal",
            help = "Urgency (low, normal, high, urgent)"
        )]
        urgency: String,
    },

    #[command(about = "Accept a pending video request")]
    Accept {
        #[arg(help = "Request ID")]
        request_id: String,
    },

    #[command(about = "Chat with a specialist, or reopen an existing chat")]
    Chat {
        #[arg(help = "Existing chat session ID")]
        session_id: Option<String>,

        #[arg(long = "with", help = "Start a new chat with this specialist")]
        with: Option<String>,

        #[arg(short, long, default_value = "", help = "Topic for a new chat")]
        topic: String,
    },

    #[command(about = "Follow requests and calls, printing notifications as they arrive")]
    Watch {
        #[arg(short, long, help = "Stop after this many seconds")]
        duration: Option<u64>,
    },

    #[command(about = "Run a complete farmer/specialist session in-process")]
    Demo(DemoArgs),

    #[command(about = "Show the effective configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommand>,
    },

    #[command(about = "Show version information")]
    Version {
        #[arg(short, long)]
        detailed: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(path) = &cli.env_file {
        if let Err(e) = dotenvy::from_path(path) {
            eprintln!(
                "{}: could not read {}: {}",
                "Error".red().bold(),
                path.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    }

    let config = FieldcallConfig::load();
    init_logging(cli.verbose, config.as_ref().ok().map(|c| &c.logging));

    match run(cli, config.map_err(FieldcallError::from)).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<FieldcallError>() {
                Some(err) => eprint!("{}: {}", "Error".red().bold(), CliErrorDisplay::new(err)),
                None => eprintln!("{}: {:#}", "Error".red().bold(), e),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, logging: Option<&LoggingConfig>) {
    let level = match (verbose, logging) {
        (true, _) => "debug".to_string(),
        (false, Some(logging)) => logging.level.clone(),
        (false, None) => "warn".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let json = logging.map(|l| l.json_format).unwrap_or(false);
    let layer = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry().with(layer).with(filter).init();
}

async fn run(cli: Cli, config: Result<FieldcallConfig, FieldcallError>) -> anyhow::Result<()> {
    match cli.command {
        Commands::Version { detailed } => cmd_version(detailed),
        Commands::Demo(args) => handle_demo_command(args).await,
        Commands::Config { action } => handle_config_command(action, config),
        Commands::Responders { format } => handle_responders_command(&config?, &format).await,
        Commands::Requests { mine, format } => {
            handle_requests_command(&config?, mine, &format).await
        }
        Commands::Calls { format } => handle_calls_command(&config?, &format).await,
        Commands::Chats { format } => handle_chats_command(&config?, &format).await,
        Commands::Request {
            responder_id,
            topic,
            description,
            urgency,
        } => handle_request_command(&config?, &responder_id, &topic, description, &urgency).await,
        Commands::Accept { request_id } => handle_accept_command(&config?, &request_id).await,
        Commands::Chat {
            session_id,
            with,
            topic,
        } => handle_chat_command(&config?, session_id.as_deref(), with.as_deref(), &topic).await,
        Commands::Watch { duration } => handle_watch_command(&config?, duration).await,
    }
}

fn cmd_version(detailed: bool) -> anyhow::Result<()> {
    if detailed {
        println!("{}", "Fieldcall Version Information".cyan().bold());
        println!("{}", "═".repeat(40).dimmed());
        println!("  {:<15} {}", "Version:".bold(), VERSION);
        println!("  {:<15} {}", "Name:".bold(), NAME);
        println!("  {:<15} Apache-2.0", "License:".bold());
        println!(
            "  {:<15} https://github.com/fieldcall/fieldcall",
            "Repository:".bold()
        );
        println!();
        println!("  {}", "Session Kinds:".bold());
        println!("    ✉ Chat");
        println!("    ▶ Video call");
        println!();
        println!("  {}", "Build Information:".bold());
        println!("    Rust Edition: 2021");
        #[cfg(debug_assertions)]
        println!("    Build:        Debug");
        #[cfg(not(debug_assertions))]
        println!("    Build:        Release");
    } else {
        println!("fieldcall {}", VERSION);
    }

    Ok(())
}

use clap::Subcommand;
use colored::Colorize;
use fieldcall_core::{get_config_dir, FieldcallConfig, FieldcallError};

#[derive(Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Print the effective configuration")]
    Show {
        #[arg(short, long, default_value = "toml", help = "Output format (toml, json)")]
        format: String,
    },

    #[command(about = "Check the configuration and the identity it defines")]
    Check,

    #[command(about = "Show where configuration files are read from")]
    Path,
}

pub fn handle_config_command(
    cmd: Option<ConfigCommand>,
    config: Result<FieldcallConfig, FieldcallError>,
) -> anyhow::Result<()> {
    match cmd.unwrap_or(ConfigCommand::Show {
        format: "toml".to_string(),
    }) {
        ConfigCommand::Show { format } => cmd_config_show(&config?, &format),
        ConfigCommand::Check => cmd_config_check(config),
        ConfigCommand::Path => cmd_config_path(),
    }
}

fn redacted(config: &FieldcallConfig) -> FieldcallConfig {
    let mut shown = config.clone();
    if shown.identity.token.is_some() {
        shown.identity.token = Some("****".to_string());
    }
    shown
}

fn cmd_config_show(config: &FieldcallConfig, format: &str) -> anyhow::Result<()> {
    let shown = redacted(config);
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        print!("{}", toml::to_string_pretty(&shown)?);
    }
    Ok(())
}

fn cmd_config_check(config: Result<FieldcallConfig, FieldcallError>) -> anyhow::Result<()> {
    let config = config?;
    println!("  {} Configuration is valid", "✓".green());

    match config.identity() {
        Ok(identity) => println!(
            "  {} Acting as {} ({}, {})",
            "✓".green(),
            identity.display_name.bold(),
            identity.user_id,
            identity.role
        ),
        Err(e) => println!("  {} {}", "!".yellow(), e),
    }

    if config.token().is_none() {
        println!("  {} No token set (FIELDCALL_TOKEN)", "!".yellow());
    }
    Ok(())
}

fn cmd_config_path() -> anyhow::Result<()> {
    println!("{}", "Configuration sources, later ones win:".bold());
    println!("  ./config/default.toml");
    println!("  ./config/local.toml");
    println!("  ./fieldcall.toml");
    match get_config_dir() {
        Some(dir) => println!("  {}", dir.join("config.toml").display()),
        None => println!("  {}", "(no platform config directory)".dimmed()),
    }
    println!("  ~/.fieldcall/config.toml");
    println!("  FIELDCALL_* environment variables (nested keys use __)");
    Ok(())
}

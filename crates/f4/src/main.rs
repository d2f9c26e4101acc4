#![doc = include_str!("../README.md")]

use std::sync::Arc;

use clap::{CommandFactory, Parser};
use color_eyre::eyre::Result;
use for4_core::{ChannelNotifier, LogNotifier};
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter,
};

use crate::{
    app::App,
    color::install_color_eyre,
    command::*,
    config::CliConfig,
    render::CommandResult,
};

mod app;
mod auth;
mod color;
mod command;
mod config;
mod dashboard;
mod render;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // the log level hierarchy is determined by:
    //    - if RUST_LOG is detected at runtime
    //    - if RUST_LOG is provided at compile time
    //    - default to INFO
    let filter = EnvFilter::builder()
        .with_default_directive(
            option_env!("RUST_LOG")
                .unwrap_or("info")
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        )
        // parse directives from the RUST_LOG environment variable,
        // overriding the default directive for matching targets.
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    install_color_eyre(cli.color)?;
    let render_config = render::RenderConfig::new(&cli);

    let Some(command) = cli.command else {
        let mut cmd = Cli::command();
        cmd.print_help()?;
        return Ok(());
    };

    let result = process_commands(command, cli.socket_url.as_deref()).await;

    // Render the result of the command
    render_config.render_result(result)
}

async fn process_commands(command: Commands, socket_url: Option<&str>) -> CommandResult {
    let config = CliConfig::locate()?;
    // Opened per command so that config commands work without configured secrets
    let app = || App::open(&config, socket_url, Arc::new(LogNotifier));

    match command {
        // Auth commands
        Commands::Login(args) => args.run(&app()?).await,
        Commands::Logout => auth::logout(&app()?).await,
        Commands::Register(args) => args.run(&app()?).await,
        Commands::ForgotPassword(args) => args.run(&app()?).await,
        Commands::ResetPassword(args) => args.run(&app()?).await,
        Commands::Status => auth::status(&app()?).await,

        // Dashboard commands
        Commands::Dashboard { command } => command.run(&app()?).await,
        Commands::Notifications { command } => command.run(&app()?).await,
        Commands::Watch => {
            let notices = ChannelNotifier::default();
            let app = App::open(&config, socket_url, Arc::new(notices.clone()))?;
            dashboard::watch(&app, &notices).await
        }

        // Platform commands
        Commands::Config { command } => command.run(&config, socket_url),
    }
}

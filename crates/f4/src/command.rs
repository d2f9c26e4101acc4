use clap::{Parser, Subcommand};

use crate::{
    auth::{ForgotPasswordArgs, LoginArgs, RegisterArgs, ResetPasswordArgs},
    color::Color,
    config::ConfigCommand,
    dashboard::{DashboardCommands, NotificationsCommands},
    render::Output,
};

pub const SOCKET_URL_ENV: &str = "FOR4_SOCKET_URL";

#[derive(Parser, Clone)]
#[command(name = "For4 CLI", version, about = "For4 CLI", long_about = None, disable_version_flag = true)]
pub struct Cli {
    // Optional so that running without arguments prints the help
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short = 'o', long, global = true, value_enum, default_value_t = Output::JSON)]
    pub output: Output,

    #[arg(short = 'c', long, global = true, value_enum, default_value_t = Color::Auto)]
    pub color: Color,

    #[arg(
        long,
        global = true,
        env = SOCKET_URL_ENV,
        help = "Realtime server URL. Overrides the configured one."
    )]
    pub socket_url: Option<String>,

    #[arg(
        short = 'q',
        long,
        global = true,
        help = "Don't return anything to stdout."
    )]
    pub quiet: bool,

    #[arg(short = 'v', long, action = clap::builder::ArgAction::Version)]
    pub version: (),
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    // Auth commands
    #[command(long_about = "Log into a user account.")]
    Login(LoginArgs),

    #[command(long_about = "Log out of the current user account.")]
    Logout,

    #[command(long_about = "Register a new user account.")]
    Register(RegisterArgs),

    #[command(long_about = "Request a password recovery email.")]
    ForgotPassword(ForgotPasswordArgs),

    #[command(long_about = "Set a new password using a recovery token.")]
    ResetPassword(ResetPasswordArgs),

    #[command(
        long_about = "Show the server and the logged in user.",
        after_help = r#"Example return value:
  {
    "socketUrl": "http://localhost:5000",
    "status": "authenticated",
    "user": { "id": 1, "name": "Ana", "email": "ana@example.com" }
  }

Notes:
  `status` is one of:
    - `anonymous` when nobody is logged in or the saved login was rejected
    - `authenticated` when the saved login is valid"#
    )]
    Status,

    // Dashboard commands
    #[command(long_about = "Show dashboard data.")]
    Dashboard {
        #[command(subcommand)]
        command: DashboardCommands,
    },

    #[command(long_about = "List and manage notifications.")]
    Notifications {
        #[command(subcommand)]
        command: NotificationsCommands,
    },

    #[command(long_about = "Follow live sales, notifications and payment events until interrupted.")]
    Watch,

    // Platform commands
    #[command(long_about = "Configure CLI settings.")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

use clap::Args;
use color_eyre::eyre::Result;
use for4_auth::{exchanges::RegisterRequest, SessionState};
use inquire::{Password, Text};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    app::App,
    render::{CommandOutput, CommandResult},
};

pub const PASSWORD_ENV: &str = "FOR4_PASSWORD";

fn text_prompt_when_none(prompt: &str, value: Option<String>) -> Result<String> {
    Ok(match value {
        Some(value) => value,
        None => Text::new(prompt).prompt()?,
    })
}

fn password_prompt_when_none(prompt: &str, value: Option<String>, confirm: bool) -> Result<String> {
    Ok(match value {
        Some(value) => value,
        None if confirm => Password::new(prompt).prompt()?,
        None => Password::new(prompt).without_confirmation().prompt()?,
    })
}

#[derive(Args, Clone)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: Option<String>,

    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,
}

impl LoginArgs {
    pub async fn run(self, app: &App) -> CommandResult {
        let email = text_prompt_when_none("Email", self.email)?;
        let password = password_prompt_when_none("Password", self.password, false)?;

        let user = app.session.login(&email, &password).await?;
        CommandOutput::object(&user)
    }
}

#[derive(Args, Clone)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, help = "Additional sign up fields as a JSON object.")]
    pub extra: Option<String>,
}

impl RegisterArgs {
    pub async fn run(self, app: &App) -> CommandResult {
        let extra = match self.extra {
            Some(text) => serde_json::from_str::<Map<String, Value>>(&text)?,
            None => Map::new(),
        };
        let request = RegisterRequest {
            name: text_prompt_when_none("Name", self.name)?,
            email: text_prompt_when_none("Email", self.email)?,
            password: password_prompt_when_none("Password", self.password, true)?,
            extra,
        };

        app.session.register(request).await?;
        Ok(().into())
    }
}

#[derive(Args, Clone)]
pub struct ForgotPasswordArgs {
    #[arg(long)]
    pub email: Option<String>,
}

impl ForgotPasswordArgs {
    pub async fn run(self, app: &App) -> CommandResult {
        let email = text_prompt_when_none("Email", self.email)?;
        app.session.forgot_password(&email).await?;
        Ok(().into())
    }
}

#[derive(Args, Clone)]
pub struct ResetPasswordArgs {
    #[arg(long, help = "Recovery token from the email.")]
    pub token: Option<String>,

    #[arg(long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,
}

impl ResetPasswordArgs {
    pub async fn run(self, app: &App) -> CommandResult {
        let token = text_prompt_when_none("Recovery token", self.token)?;
        let password = password_prompt_when_none("New password", self.password, true)?;
        app.session.reset_password(&token, &password).await?;
        Ok(().into())
    }
}

pub async fn logout(app: &App) -> CommandResult {
    app.session.logout().await?;
    Ok(().into())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status<'a> {
    socket_url: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a for4_core::Identity>,
}

pub async fn status(app: &App) -> CommandResult {
    let state = app.session.initialize().await?;
    let status = Status {
        socket_url: &app.settings.socket_url,
        status: match state {
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Anonymous | SessionState::Unknown => "anonymous",
        },
        user: state.identity(),
    };
    CommandOutput::object(&status)
}

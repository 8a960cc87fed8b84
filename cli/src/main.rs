use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use huchno::config::{ClientConfig, ConfigError};
use huchno::net::api::ApiClient;
use huchno::net::types::{ApiError, DraftProfile, ProfileError, TokenResponse};
use huchno::provider::SessionProvider;
use huchno::state::route::{Route, RouteArea, Router};
use huchno::state::users::{UserListState, chat_route};
use serde::Serialize;
use uuid::Uuid;

const NAVIGATION_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{}", .0.alert_message())]
    Api(#[from] ApiError),
    #[error("invalid registration form: {0}")]
    Profile(#[from] ProfileError),
    #[error("user list unavailable")]
    ListUnavailable,
    #[error("timed out waiting for the {0:?} area")]
    Navigation(RouteArea),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "huchno-cli", about = "Huchno chat client session driver")]
struct Cli {
    /// Backend base URL; falls back to `API_HOST` from the environment or `.env`.
    #[arg(long)]
    api_host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print the issued token.
    Login(LoginArgs),
    /// Create an account. Does not sign in.
    Register(RegisterArgs),
    /// Sign in and list users.
    Users(LoginArgs),
    /// Sign in, open a chat with a user, and print their record.
    User {
        id: Uuid,
        #[command(flatten)]
        login: LoginArgs,
    },
}

#[derive(Args, Debug)]
struct LoginArgs {
    #[arg(long, env = "HUCHNO_EMAIL")]
    email: String,

    #[arg(long, env = "HUCHNO_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    fullname: String,
    #[arg(long, help = "YYYY-MM-DD or an RFC 3339 timestamp")]
    birthdate: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match cli.api_host.as_deref() {
        Some(host) => ClientConfig::new(host)?,
        None => ClientConfig::from_env()?,
    };
    let api = ApiClient::new(&config)?;
    tracing::info!(api_host = api.base_url(), "session client starting");

    let provider = SessionProvider::new(Arc::new(api), Router::new(Route::Home));
    provider.restore();
    wait_for_area(&provider, RouteArea::Auth).await?;

    match cli.command {
        Command::Login(args) => {
            let token = sign_in(&provider, &args).await?;
            print_json(&token)
        }
        Command::Register(args) => {
            provider.router().push(Route::Register);
            let profile = DraftProfile::new()
                .username(args.username)
                .email(args.email)
                .password(args.password)
                .fullname(args.fullname)
                .birthdate(&args.birthdate)?
                .finalize()?;
            let user = provider.register(&profile).await?;
            println!("User registered successfully");
            print_json(&user)
        }
        Command::Users(args) => {
            sign_in(&provider, &args).await?;
            let mut list = UserListState::default();
            if !list.refresh(&provider).await {
                return Err(CliError::ListUnavailable);
            }
            print_json(&list.users)
        }
        Command::User { id, login } => {
            sign_in(&provider, &login).await?;
            let user = provider.get_user(id).await?;
            provider.router().push(chat_route(&user));
            tracing::info!(route = %provider.router().current(), "opened chat");
            print_json(&user)
        }
    }
}

async fn sign_in(provider: &SessionProvider, args: &LoginArgs) -> Result<TokenResponse, CliError> {
    let token = provider.login(&args.email, &args.password).await?;
    wait_for_area(provider, RouteArea::App).await?;
    Ok(token)
}

async fn wait_for_area(provider: &SessionProvider, area: RouteArea) -> Result<(), CliError> {
    let mut rx = provider.router().subscribe();
    let reached = tokio::time::timeout(NAVIGATION_WAIT, rx.wait_for(|route| route.area() == area)).await;
    match reached {
        Ok(Ok(route)) => {
            tracing::debug!(route = %route.path(), "navigation settled");
            Ok(())
        }
        _ => Err(CliError::Navigation(area)),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

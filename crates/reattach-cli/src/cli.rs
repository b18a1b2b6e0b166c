//! Argument parsing, command dispatch, and user-facing error handling.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use reattach_client::{ApiError, ApiSession, Credentials};
use reattach_core::{RunOptions, WriteStrategy};
use reattach_engine::Migrator;
use reattach_events::{Event, EventBus};

use crate::output::render_report;

const HEADER_REQUEST_ID: &str = "x-request-id";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STAGING_DIR: &str = "temp_renamed_attachments";

pub(crate) type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    init_logging();
    let cli = Cli::parse();
    let trace_id = Uuid::new_v4().to_string();
    match dispatch(cli, &trace_id).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, trace_id: &str) -> CliResult<()> {
    let api_url = cli.api_url.clone().ok_or_else(|| {
        CliError::validation(
            "an instance URL is required; pass --api-url or set REATTACH_API_URL",
        )
    })?;
    debug!(%trace_id, "dispatching command");
    let client = build_client(cli.timeout, trace_id)?;
    match cli.command {
        Command::Check(args) => handle_check(client, api_url, &args).await,
        Command::Run(args) => handle_run(client, api_url, cli.output, args).await,
    }
}

fn build_client(timeout: u64, trace_id: &str) -> CliResult<Client> {
    let mut default_headers = HeaderMap::new();
    let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
        CliError::failure(anyhow!("trace identifier contains invalid characters"))
    })?;
    default_headers.insert(HEADER_REQUEST_ID, request_id);

    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .default_headers(default_headers)
        .build()
        .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))
}

#[derive(Parser)]
#[command(
    name = "reattach",
    about = "Renames 'image' attachments and re-uploads their content via the REST API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "REATTACH_API_URL",
        value_parser = parse_url,
        help = "Base URL of the target instance"
    )]
    api_url: Option<Url>,
    #[arg(
        long,
        global = true,
        env = "REATTACH_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for the run summary"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify credentials against the instance and exit.
    Check(CheckArgs),
    /// Rename matching attachments and re-upload their content.
    Run(RunArgs),
}

#[derive(Args)]
struct CheckArgs {
    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args)]
struct AuthArgs {
    #[arg(
        long,
        value_enum,
        default_value_t = AuthMethod::Basic,
        help = "Authentication method"
    )]
    auth: AuthMethod,
    #[arg(
        long,
        env = "REATTACH_USERNAME",
        help = "Username (basic) or client id (oauth)"
    )]
    username: String,
    #[arg(
        long,
        env = "REATTACH_SECRET",
        help = "Password (basic) or client secret (oauth); prompted when omitted"
    )]
    secret: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum AuthMethod {
    #[default]
    Basic,
    Oauth,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    auth: AuthArgs,
    #[arg(long, help = "API identifier of the project to operate on")]
    project: i64,
    #[arg(
        long,
        help = "Attachment item-type identifier; required by the in-place modes"
    )]
    item_type: Option<i64>,
    #[arg(long, default_value = "", help = "Prefix prepended to every computed name")]
    prefix: String,
    #[arg(
        long,
        default_value_t = 1,
        help = "Rename counter seed; the by-item mode always starts at 1"
    )]
    start_index: u32,
    #[arg(
        long,
        value_enum,
        default_value_t = Mode::InPlace,
        help = "Write sequence applied after the download phase"
    )]
    mode: Mode,
    #[arg(
        long,
        default_value = DEFAULT_STAGING_DIR,
        help = "Local staging directory for downloaded copies"
    )]
    staging_dir: PathBuf,
    #[arg(long, help = "Remove the staging directory after the run")]
    delete_after_run: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Mode {
    ByItem,
    #[default]
    InPlace,
    InPlaceRename,
}

impl Mode {
    const fn strategy(self) -> WriteStrategy {
        match self {
            Self::ByItem => WriteStrategy::ByItem,
            Self::InPlace => WriteStrategy::InPlace,
            Self::InPlaceRename => WriteStrategy::InPlaceRename,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

async fn handle_check(client: Client, api_url: Url, args: &CheckArgs) -> CliResult<()> {
    let credentials = build_credentials(&args.auth)?;
    let method = credentials.method_label();
    ApiSession::connect(client, api_url, credentials)
        .await
        .map_err(map_api_error)?;
    println!("authentication check passed ({method})");
    Ok(())
}

async fn handle_run(
    client: Client,
    api_url: Url,
    output: OutputFormat,
    args: RunArgs,
) -> CliResult<()> {
    let strategy = args.mode.strategy();
    if !strategy.fetches_by_item() && args.item_type.is_none() {
        return Err(CliError::validation(
            "--item-type is required for the in-place modes",
        ));
    }
    let credentials = build_credentials(&args.auth)?;
    let method = credentials.method_label().to_string();
    let session = ApiSession::connect(client, api_url, credentials)
        .await
        .map_err(map_api_error)?;

    let bus = EventBus::new();
    let mut receiver = bus.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(envelope) => println!("{}", envelope.event.render()),
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(_)) => {}
            }
        }
    });
    bus.publish(Event::AuthVerified { method });

    let options = RunOptions {
        project: args.project,
        item_type: args.item_type,
        prefix: args.prefix,
        start_index: args.start_index,
        strategy,
        staging_dir: args.staging_dir,
        delete_after_run: args.delete_after_run,
    };
    let migrator = Migrator::new(session, bus);
    let outcome = migrator.run(&options).await;
    // Dropping the migrator closes the bus so the printer drains and exits.
    drop(migrator);
    let _ = printer.await;

    let report = outcome.map_err(|err| CliError::failure(anyhow!(err.detail())))?;
    render_report(&report, output)
}

fn build_credentials(args: &AuthArgs) -> CliResult<Credentials> {
    let secret = resolve_secret(args)?;
    Ok(match args.auth {
        AuthMethod::Basic => Credentials::Basic {
            username: args.username.clone(),
            password: secret,
        },
        AuthMethod::Oauth => Credentials::ClientCredentials {
            client_id: args.username.clone(),
            client_secret: secret,
        },
    })
}

fn resolve_secret(args: &AuthArgs) -> CliResult<String> {
    if let Some(value) = &args.secret {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CliError::validation("secret cannot be empty"));
        }
        return Ok(trimmed.to_string());
    }

    if io::stdin().is_terminal() {
        let prompt = match args.auth {
            AuthMethod::Basic => "Password: ",
            AuthMethod::Oauth => "Client secret: ",
        };
        let secret = rpassword::prompt_password(prompt).map_err(|err| {
            CliError::failure(anyhow!("failed to read secret from stdin: {err}"))
        })?;
        let trimmed = secret.trim();
        if trimmed.is_empty() {
            return Err(CliError::validation("secret cannot be empty"));
        }
        Ok(trimmed.to_string())
    } else {
        Err(CliError::validation(
            "secret required; supply via --secret when running non-interactively",
        ))
    }
}

fn map_api_error(err: ApiError) -> CliError {
    if matches!(err, ApiError::Auth { .. }) {
        CliError::validation(err.detail())
    } else {
        CliError::failure(anyhow!(err.detail()))
    }
}

fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use cat_consult::config::{ClientConfig, ConfigError};
use cat_consult::consultation::{
    CatProfile, ConsultError, ConsultationClient, ConsultationMode, ConsultationReply, ConsultationType, HealthStatus,
};
use cat_consult::conversation::{Message, PendingSubmission, Role};
use cat_consult::error::ErrorCode;
use cat_consult::imaging::ImageError;
use cat_consult::session::ChatSession;
use clap::{Args, Parser, Subcommand};
use time::UtcOffset;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Consult(#[from] ConsultError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("invalid display offset {hours}h: {source}")]
    Offset { hours: i8, source: time::error::ComponentRange },
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("consultation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("nothing to send: pass question text or --image")]
    NothingToSend,
    #[error("consultation service reported an error status")]
    Unhealthy,
}

impl ErrorCode for CliError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Consult(e) => e.error_code(),
            Self::Image(e) => e.error_code(),
            Self::Offset { .. } => "E_CONFIG_OFFSET",
            Self::Io(_) => "E_IO",
            Self::Task(_) => "E_TASK",
            Self::NothingToSend => "E_EMPTY_INPUT",
            Self::Unhealthy => "E_UNHEALTHY",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "cat-consult", about = "Terminal client for the cat consultation API")]
struct Cli {
    /// Overrides `CONSULT_API_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the consultation service is up.
    Health,
    /// Ask a single question and print the reply.
    Ask {
        #[arg(default_value = "")]
        text: String,
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long, default_value_t = ConsultationType::General)]
        category: ConsultationType,
        #[arg(long, default_value_t = false)]
        workflow: bool,
        #[command(flatten)]
        cat: CatArgs,
    },
    /// Interactive chat.
    Chat {
        #[arg(long, default_value_t = ConsultationType::General)]
        category: ConsultationType,
        #[arg(long, default_value_t = false)]
        workflow: bool,
        #[command(flatten)]
        cat: CatArgs,
    },
}

/// Optional facts about the cat, sent with every consultation.
#[derive(Args, Debug, Clone, Default, PartialEq)]
struct CatArgs {
    #[arg(long)]
    cat_name: Option<String>,
    /// Age in years.
    #[arg(long)]
    age: Option<f64>,
    /// Age in weeks, for kittens.
    #[arg(long)]
    age_in_weeks: Option<u32>,
    /// Weight in kilograms.
    #[arg(long)]
    weight: Option<f64>,
    #[arg(long)]
    breed: Option<String>,
}

impl From<CatArgs> for CatProfile {
    fn from(args: CatArgs) -> Self {
        Self {
            cat_name: args.cat_name,
            age: args.age,
            age_in_weeks: args.age_in_weeks,
            weight: args.weight,
            breed: args.breed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    run(cli).await.inspect_err(|e| tracing::error!(error = %e, code = e.error_code(), "cli: command failed"))
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config.set_base_url(base_url);
    }
    let offset = UtcOffset::from_hms(config.display_utc_offset_hours, 0, 0)
        .map_err(|source| CliError::Offset { hours: config.display_utc_offset_hours, source })?;

    match cli.command {
        Command::Health => run_health(config).await,
        Command::Ask { text, image, category, workflow, cat } => {
            let mut session = build_session(config, category, workflow, cat)?;
            run_ask(&mut session, &text, image, &mut std::io::stdout(), offset).await
        }
        Command::Chat { category, workflow, cat } => {
            let mut session = build_session(config, category, workflow, cat)?;
            let stdin = BufReader::new(tokio::io::stdin());
            run_chat(&mut session, stdin, &mut std::io::stdout(), offset).await
        }
    }
}

fn build_session(
    mut config: ClientConfig,
    category: ConsultationType,
    workflow: bool,
    cat: CatArgs,
) -> Result<ChatSession, CliError> {
    if workflow {
        config.mode = ConsultationMode::Workflow;
    }
    let client = ConsultationClient::new(config.clone())?;
    tracing::info!(base_url = %config.base_url, mode = ?config.mode, "cli: client ready");
    let mut session = ChatSession::new(Arc::new(client), &config);
    session.set_category(category);
    session.set_cat_profile(cat.into());
    Ok(session)
}

async fn run_health(config: ClientConfig) -> Result<(), CliError> {
    let client = ConsultationClient::new(config)?;
    let health = client.check_health().await?;
    match health.status {
        HealthStatus::Ok => {
            println!("ok ({})", health.timestamp);
            Ok(())
        }
        HealthStatus::Error => Err(CliError::Unhealthy),
    }
}

async fn run_ask<W: Write>(
    session: &mut ChatSession,
    text: &str,
    image: Option<PathBuf>,
    out: &mut W,
    offset: UtcOffset,
) -> Result<(), CliError> {
    if let Some(path) = image {
        session.attach_image(path).await?;
    }
    let reply = session.send(text).await.ok_or(CliError::NothingToSend)?;
    print_message(out, &reply, offset)?;
    Ok(())
}

// =============================================================================
// REPL
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Send(&'a str),
    Image(&'a str),
    Category(&'a str),
    Clear,
    Quit,
    Help,
    Unknown(&'a str),
}

fn parse_line(line: &str) -> ReplCommand<'_> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Send(line);
    };
    let (cmd, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let arg = arg.trim();
    match cmd {
        "image" => ReplCommand::Image(arg),
        "category" => ReplCommand::Category(arg),
        "clear" => ReplCommand::Clear,
        "quit" | "exit" => ReplCommand::Quit,
        "help" => ReplCommand::Help,
        other => ReplCommand::Unknown(other),
    }
}

const HELP: &str = "commands: /image PATH, /category health|nutrition|behavior|general, /clear, /quit";

type Settled = (PendingSubmission, Result<ConsultationReply, ConsultError>);

enum ChatEvent {
    Line(Option<String>),
    Settled(Settled),
}

/// Line-oriented chat loop. A submitted question runs on its own task so
/// input keeps being read while it is in flight: `/clear`, `/image`, and
/// `/category` apply immediately, further questions are refused until the
/// reply settles. At end of input the in-flight reply is awaited; `/quit`
/// abandons it.
async fn run_chat<R, W>(session: &mut ChatSession, input: R, out: &mut W, offset: UtcOffset) -> Result<(), CliError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    writeln!(
        out,
        "cat-consult ({} mode, category {}). {HELP}",
        mode_label(session.mode()),
        session.conversation().category()
    )?;
    let mut lines = input.lines();
    let mut in_flight: Option<JoinHandle<Settled>> = None;

    loop {
        let event = match in_flight.as_mut() {
            Some(task) => tokio::select! {
                settled = task => ChatEvent::Settled(settled?),
                line = lines.next_line() => ChatEvent::Line(line?),
            },
            None => ChatEvent::Line(lines.next_line().await?),
        };

        let line = match event {
            ChatEvent::Settled((pending, outcome)) => {
                in_flight = None;
                settle(session, pending, outcome, out, offset)?;
                continue;
            }
            ChatEvent::Line(Some(line)) => line,
            ChatEvent::Line(None) => break,
        };

        match parse_line(&line) {
            ReplCommand::Send(text) => {
                if in_flight.is_some() {
                    if !text.is_empty() {
                        writeln!(out, "(still waiting for the previous reply)")?;
                    }
                    continue;
                }
                let dispatcher = session.dispatcher();
                let Some(pending) = session.conversation_mut().submit(text) else {
                    continue;
                };
                if let Some(msg) = session.conversation().messages().last() {
                    print_message(out, msg, offset)?;
                }
                in_flight = Some(tokio::spawn(async move {
                    let outcome = dispatcher.run(&pending).await;
                    (pending, outcome)
                }));
            }
            ReplCommand::Image(path) => match session.attach_image(path).await {
                Ok(()) => {
                    if let Some(file) = session.conversation().staged_image() {
                        writeln!(out, "(image staged: {}, {} bytes)", file.name, file.size)?;
                    }
                }
                Err(err) => {
                    let notice = session.conversation_mut().push_system(err.to_string());
                    print_message(out, notice, offset)?;
                }
            },
            ReplCommand::Category(raw) => match raw.parse::<ConsultationType>() {
                Ok(category) => {
                    session.set_category(category);
                    writeln!(out, "(category: {category})")?;
                }
                Err(reason) => writeln!(out, "({reason})")?,
            },
            ReplCommand::Clear => {
                session.clear();
                writeln!(out, "(conversation cleared)")?;
            }
            ReplCommand::Quit => {
                if let Some(task) = in_flight.take() {
                    task.abort();
                }
                return Ok(());
            }
            ReplCommand::Help => writeln!(out, "{HELP}")?,
            ReplCommand::Unknown(cmd) => writeln!(out, "(unknown command /{cmd}; {HELP})")?,
        }
    }

    if let Some(task) = in_flight {
        let (pending, outcome) = task.await?;
        settle(session, pending, outcome, out, offset)?;
    }
    Ok(())
}

fn settle<W: Write>(
    session: &mut ChatSession,
    pending: PendingSubmission,
    outcome: Result<ConsultationReply, ConsultError>,
    out: &mut W,
    offset: UtcOffset,
) -> Result<(), CliError> {
    if let Some(msg) = session.conversation_mut().resolve(pending, outcome) {
        print_message(out, msg, offset)?;
    }
    Ok(())
}

fn mode_label(mode: ConsultationMode) -> &'static str {
    match mode {
        ConsultationMode::Simple => "simple",
        ConsultationMode::Workflow => "workflow",
    }
}

fn print_message<W: Write>(out: &mut W, msg: &Message, offset: UtcOffset) -> std::io::Result<()> {
    let who = match msg.role {
        Role::User => "you",
        Role::Assistant => "vet",
        Role::System => "system",
    };
    match &msg.image_ref {
        Some(image) => writeln!(out, "[{}] {who} [{image}]: {}", msg.clock(offset), msg.content),
        None => writeln!(out, "[{}] {who}: {}", msg.clock(offset), msg.content),
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatfeed::api::{ApiClient, ChatRoomStatus};
use chatfeed::compose::{ComposeError, Draft};
use chatfeed::config::{self, FeedConfig};
use chatfeed::{ConnectionState, FeedError, FeedHandle, FeedService, FeedUpdate, Message};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; pass --session-token or set CHATFEED_SESSION_TOKEN")]
    MissingSessionToken,
    #[error("chat room is disabled on this server")]
    ChatDisabled,
    #[error("message was not sent; connection is not open")]
    NotSent,
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chatfeed", about = "Chat room feed client")]
struct Cli {
    /// Overrides `CHATFEED_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Overrides `CHATFEED_SESSION_TOKEN`.
    #[arg(long)]
    session_token: Option<String>,

    /// Overrides `CHATFEED_ROOM`.
    #[arg(long)]
    room: Option<String>,

    /// Window size; wins over the server's configured limit. `<= 0` is unbounded.
    #[arg(long, allow_negative_numbers = true)]
    message_limit: Option<i64>,

    /// Print messages as JSON lines.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the server's chat-room settings.
    Status,
    /// Print the number of stored messages in the room.
    Count,
    /// Stream the room until interrupted.
    Watch,
    /// Stream the room and send each stdin line as a message.
    Chat,
    /// Send one message and exit.
    Send {
        content: String,
        #[arg(long = "image")]
        images: Vec<PathBuf>,
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

struct Session {
    api: ApiClient,
    feed: FeedHandle,
    status: ChatRoomStatus,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let Cli { base_url, session_token, room, message_limit, json, command } = Cli::parse();
    let mut config = FeedConfig::from_env();
    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }
    if session_token.is_some() {
        config.session_token = session_token;
    }
    if let Some(room) = room {
        config.room = room;
    }

    match command {
        Command::Status => run_status(&config).await,
        Command::Count => run_count(&config).await,
        Command::Watch => {
            let session = start_session(config, message_limit).await?;
            run_watch(session, json).await
        }
        Command::Chat => {
            let session = start_session(config, message_limit).await?;
            run_chat(session, json).await
        }
        Command::Send { content, images, timeout_secs } => {
            let session = start_session(config, message_limit).await?;
            run_send(session, content, &images, Duration::from_secs(timeout_secs)).await
        }
    }
}

// =============================================================================
// ONE-SHOT COMMANDS
// =============================================================================

async fn run_status(config: &FeedConfig) -> Result<(), CliError> {
    let api = ApiClient::new(config.endpoint()?, config.session_token.as_deref())?;
    let status = api.status().await?;
    println!("enabled: {}", status.enabled);
    println!("message_limit: {}", status.message_limit);
    println!("max_message_length: {}", status.max_message_length);
    println!("logged_in: {}", config.logged_in());
    Ok(())
}

async fn run_count(config: &FeedConfig) -> Result<(), CliError> {
    if !config.logged_in() {
        return Err(CliError::MissingSessionToken);
    }
    let api = ApiClient::new(config.endpoint()?, config.session_token.as_deref())?;
    println!("{}", api.message_count(&config.room).await?);
    Ok(())
}

// =============================================================================
// LIVE FEED
// =============================================================================

async fn start_session(mut config: FeedConfig, message_limit: Option<i64>) -> Result<Session, CliError> {
    let api = ApiClient::new(config.endpoint()?, config.session_token.as_deref())?;
    let status = match api.status().await {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "status unavailable; assuming chat room enabled");
            ChatRoomStatus { message_limit: config.message_limit, ..ChatRoomStatus::default() }
        }
    };
    if !status.enabled {
        return Err(CliError::ChatDisabled);
    }
    if !config.logged_in() {
        return Err(CliError::MissingSessionToken);
    }
    config.message_limit = message_limit.unwrap_or(status.message_limit);

    let feed = FeedService::spawn(config.feed_options()?, config.session_token.clone());
    feed.set_enabled(config::feed_enabled(status.enabled, config.logged_in()));
    Ok(Session { api, feed, status })
}

async fn run_watch(session: Session, json: bool) -> Result<(), CliError> {
    let mut updates = session.feed.subscribe();
    print_view_messages(&session.feed, json)?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => match update {
                Ok(update) => print_update(&update, json)?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "watch: fell behind, reprinting window");
                    print_view_messages(&session.feed, json)?;
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    session.feed.shutdown().await;
    Ok(())
}

async fn run_chat(session: Session, json: bool) -> Result<(), CliError> {
    let Session { api, feed, status } = session;
    let mut updates = feed.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut draft = Draft::default();
    print_view_messages(&feed, json)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => match update {
                Ok(update) => print_update(&update, json)?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "chat: fell behind, reprinting window");
                    print_view_messages(&feed, json)?;
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "/quit" => break,
                    "/reconnect" => feed.reconnect(),
                    command if command.starts_with("/image ") => {
                        let path = Path::new(command.trim_start_matches("/image ").trim());
                        match api.upload_image_file(path).await {
                            Ok(url) => {
                                eprintln!("attached {url}");
                                draft.attach(url);
                            }
                            Err(e) => eprintln!("upload failed: {e}"),
                        }
                    }
                    _ => {
                        draft.content.clone_from(&line);
                        match draft.prepare(status.max_message_length, feed.current().state) {
                            Ok(out) => {
                                if feed.send_message(out.content, out.image_urls).await {
                                    draft.clear();
                                } else {
                                    eprintln!("{}", CliError::NotSent);
                                }
                            }
                            Err(e) => eprintln!("{e}"),
                        }
                    }
                }
            }
        }
    }
    feed.shutdown().await;
    Ok(())
}

async fn run_send(session: Session, content: String, images: &[PathBuf], deadline: Duration) -> Result<(), CliError> {
    let Session { api, feed, status } = session;
    let mut draft = Draft::new(content);
    for path in images {
        draft.attach(api.upload_image_file(path).await?);
    }

    let view = feed.wait_for_state(ConnectionState::Connected, deadline).await?;
    let out = draft.prepare(status.max_message_length, view.state)?;
    let sent = feed.send_message(out.content, out.image_urls).await;
    // Shutdown waits for the transport to flush the queued frame.
    feed.shutdown().await;
    if sent { Ok(()) } else { Err(CliError::NotSent) }
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_view_messages(feed: &FeedHandle, json: bool) -> Result<(), CliError> {
    for message in &feed.current().messages {
        print_message(message, json)?;
    }
    Ok(())
}

fn print_update(update: &FeedUpdate, json: bool) -> Result<(), CliError> {
    match update {
        FeedUpdate::State(state) => eprintln!("[{state}]"),
        FeedUpdate::Snapshot(messages) => {
            eprintln!("[snapshot: {} messages]", messages.len());
            for message in messages {
                print_message(message, json)?;
            }
        }
        FeedUpdate::Appended(message) => print_message(message, json)?,
        FeedUpdate::Error(Some(error)) => eprintln!("error: {error}"),
        FeedUpdate::Error(None) => {}
    }
    Ok(())
}

fn print_message(message: &Message, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string(message)?);
        return Ok(());
    }
    let secs = message.timestamp.rem_euclid(86_400);
    let mut line = format!(
        "{:02}:{:02}:{:02} {}: {}",
        secs / 3600,
        secs / 60 % 60,
        secs % 60,
        message.author(),
        message.content
    );
    for url in message.images() {
        let _ = write!(line, " [image {url}]");
    }
    println!("{line}");
    Ok(())
}

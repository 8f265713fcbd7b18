//! `journal-chat`: line-oriented console for the journal platform chat.
//!
//! Logs in with a bearer token, connects to the messaging server and
//! prints conversation updates. Configuration via CLI flags, environment
//! variables, or config file (`~/.config/journal-chat/config.toml`).
//!
//! ```bash
//! JOURNAL_CHAT_TOKEN=... cargo run --bin journal-chat -- \
//!     --api-base http://127.0.0.1:3000/api
//! ```
//!
//! Commands: `/users [query]`, `/open <id>`, `/read`, `/online`,
//! `/list`, `/reconnect`, `/quit`. Any other line is sent to the open
//! conversation.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;

use journal_chat::api::HttpApi;
use journal_chat::client::{ChatClient, ChatUpdate};
use journal_chat::config::{CliArgs, ClientConfig};
use journal_chat::error::ChatError;
use journal_chat_proto::actor::{Actor, ActorId};
use journal_chat_proto::message::Message;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());
    tracing::info!(api = %config.api_base, socket = %config.socket_url, "journal-chat starting");

    let Some(token) = config.token.clone() else {
        eprintln!("error: no token; pass --token or set JOURNAL_CHAT_TOKEN");
        return ExitCode::FAILURE;
    };
    let api = HttpApi::new(config.api_base.clone(), token);

    let client = match ChatClient::start(&config, api).await {
        Ok(client) => client,
        Err(ChatError::Unauthenticated) => {
            eprintln!("error: token rejected, please log in again");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let me = client.local();
    println!(
        "Logged in as {} ({}), {} contacts. Type /users to list them.",
        me.display_name(),
        me.role,
        client.session().directory().len()
    );

    let result = run(&client).await;
    client.logout();
    tracing::info!("journal-chat exiting");
    if let Err(e) = result {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Initialize file-based logging.
///
/// Logs go to a file so they never interleave with the console output.
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("journal-chat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Interleaves console input with client updates until `/quit`, end of
/// input, or the connector stopping.
async fn run(client: &ChatClient<HttpApi>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            update = client.next_update() => match update {
                Some(update) => print_update(client, &update),
                None => {
                    println!("Connection closed.");
                    return Ok(());
                }
            },
            line = lines.next_line() => {
                let Some(line) = line? else { return Ok(()) };
                if !handle_line(client, line.trim()).await {
                    return Ok(());
                }
            }
        }
    }
}

/// Runs one console command. Returns `false` to quit.
async fn handle_line(client: &ChatClient<HttpApi>, line: &str) -> bool {
    let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "" => {}
        "/quit" => return false,
        "/users" => print_directory(client, arg.trim()),
        "/list" => print_conversation_list(client),
        "/online" => {
            client.refresh_presence();
            let online = client.online();
            if online.is_empty() {
                println!("Nobody online (as of the last refresh).");
            } else {
                for id in online {
                    println!("  {} online", name_of(client, id));
                }
            }
        }
        "/reconnect" => {
            client.reconnect();
            println!("Reconnecting...");
        }
        "/open" => match arg.trim().parse::<u64>() {
            Ok(id) => open(client, ActorId::new(id)).await,
            Err(_) => println!("usage: /open <user id>"),
        },
        "/read" => match client.selected() {
            Some(counterpart) => match client.mark_conversation_read(counterpart) {
                Ok(n) => println!("{n} message(s) marked as read."),
                Err(e) => println!("! {e}"),
            },
            None => println!("No conversation open."),
        },
        _ if command.starts_with('/') => println!("unknown command {command}"),
        _ => send(client, line),
    }
    true
}

async fn open(client: &ChatClient<HttpApi>, counterpart: ActorId) {
    match client.open_conversation(counterpart).await {
        Ok(_) => {
            println!("--- {} ---", name_of(client, counterpart));
            for message in client.messages_with(counterpart) {
                print_message(client, &message);
            }
            if let Err(e) = client.mark_conversation_read(counterpart) {
                tracing::debug!(err = %e, "read receipts not sent");
            }
        }
        Err(e) => println!("! could not open conversation: {e}"),
    }
}

fn send(client: &ChatClient<HttpApi>, body: &str) {
    let Some(counterpart) = client.selected() else {
        println!("Open a conversation first (/open <id>).");
        return;
    };
    match client.send_message(counterpart, body) {
        Ok(_) => {}
        Err(ChatError::TransportUnavailable) => {
            println!("! not connected to the server, message not sent");
        }
        Err(e) => println!("! {e}"),
    }
}

fn print_update(client: &ChatClient<HttpApi>, update: &ChatUpdate) {
    match update {
        ChatUpdate::Connected => println!("* connected"),
        ChatUpdate::Disconnected => println!("* disconnected, sending disabled"),
        ChatUpdate::ConnectError(reason) => println!("* connect error: {reason}"),
        ChatUpdate::Reconnecting {
            attempt,
            max_attempts,
        } => println!("* reconnecting ({attempt}/{max_attempts})"),
        ChatUpdate::ReconnectFailed => {
            println!("* could not reconnect; type /reconnect to try again");
        }
        ChatUpdate::HistoryLoaded { added, .. } if *added > 0 => {
            if let Some(counterpart) = client.selected() {
                for message in client.messages_with(counterpart) {
                    print_message(client, &message);
                }
            }
        }
        ChatUpdate::MessageReceived(message) => {
            if client.selected() == Some(message.sender) {
                print_message(client, message);
            } else {
                let unread = client.view(|v| v.unread_count(message.sender));
                println!(
                    "* new message from {} ({unread} unread)",
                    name_of(client, message.sender)
                );
            }
        }
        ChatUpdate::MessageAcknowledged(message) => {
            if client.selected() == Some(message.recipient) {
                print_message(client, message);
            }
        }
        ChatUpdate::Malformed(reason) => tracing::debug!(reason = %reason, "malformed event"),
        _ => {}
    }
}

fn print_message(client: &ChatClient<HttpApi>, message: &Message) {
    let who = if message.sender == client.local().id {
        "you".to_string()
    } else {
        name_of(client, message.sender)
    };
    let mark = if message.read { "" } else { " *" };
    println!(
        "[{}] {who}: {}{mark}",
        message.created_at.format("%H:%M"),
        message.body
    );
}

fn print_directory(client: &ChatClient<HttpApi>, query: &str) {
    let directory = client.session().directory();
    let matches = directory.search(query);
    let (staff, users): (Vec<&Actor>, Vec<&Actor>) =
        matches.into_iter().partition(|a| a.role.is_staff());
    for (title, group) in [("Staff", staff), ("Users", users)] {
        if group.is_empty() {
            continue;
        }
        println!("{title}:");
        for actor in group {
            let online = if client.view(|v| v.is_online(actor.id)) {
                " (online)"
            } else {
                ""
            };
            println!("  {:>5}  {}{online}", actor.id, actor.display_name());
        }
    }
}

fn print_conversation_list(client: &ChatClient<HttpApi>) {
    client.view(|view| {
        for row in view.conversation_list() {
            let last = row
                .last_message
                .map_or_else(String::new, |m| format!(" - {}", m.body));
            let unread = if row.unread > 0 {
                format!(" [{}]", row.unread)
            } else {
                String::new()
            };
            let online = if row.online { "●" } else { "○" };
            println!(
                "{online} {:>5} {}{unread}{last}",
                row.actor.id,
                row.actor.display_name()
            );
        }
    });
}

fn name_of(client: &ChatClient<HttpApi>, id: ActorId) -> String {
    client
        .session()
        .directory()
        .get(id)
        .map_or_else(|| format!("user {id}"), Actor::display_name)
}

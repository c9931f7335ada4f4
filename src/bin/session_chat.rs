//! Line-oriented chat client for an agent session
//!
//! Usage: `session-chat [session-id]`
//!
//! Every stdin line is sent as a user message. Agent responses, typing and
//! status changes, notifications, tool activity and connection lifecycle
//! events are printed as they arrive. Notification tool requests are shown
//! locally; other tools are declined. Ctrl+C or end of input stops the client.

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use sessionsockets::messages::ToolRequest;
use sessionsockets::{ClientEvent, MessageKind, ServerMessage, SessionClient};
use std::time::Duration;
use strudel_client::bin_common::{
    answer_tool_request, init_tracing, parse_args, resolve_session_id, write_frame,
    ShutdownManager,
};
use strudel_client::playback::{PlaybackBridge, PlaybackEngine, PlaybackError, PlaybackFailure};
use strudel_client::session_config::SessionConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Stand-in engine that prints what a real player would do
struct ConsoleEngine;

impl PlaybackEngine for ConsoleEngine {
    fn play(&mut self, clip_ids: &[String]) -> Result<(), PlaybackError> {
        println!("[player] play {}", clip_ids.join(", "));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlaybackError> {
        println!("[player] stop");
        Ok(())
    }

    fn update(&mut self, clip_id: &str, code: &str) -> Result<(), PlaybackError> {
        println!("[player] clip {} updated:\n{}", clip_id, code);
        Ok(())
    }
}

fn print_frame(message: &ServerMessage) -> sessionsockets::Result<()> {
    if let Err(e) = write_frame(&mut std::io::stdout().lock(), message) {
        warn!("Failed to write to stdout: {}", e);
    }
    Ok(())
}

fn tool_request_forwarder(
    requests: Sender<ToolRequest>,
) -> impl FnMut(&ServerMessage) -> sessionsockets::Result<()> + Send + 'static {
    move |message: &ServerMessage| {
        if let ServerMessage::ToolRequest(request) = message {
            let _ = requests.send(request.clone());
        }
        Ok(())
    }
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::StateChanged(state) => info!("Connection state: {}", state),
        ClientEvent::Ready {
            connection_id,
            is_reconnect,
        } => {
            let verb = if *is_reconnect { "Reconnected" } else { "Connected" };
            println!("[{} as {}]", verb, connection_id);
        }
        ClientEvent::Reconnecting { attempt, delay } => {
            println!("[connection lost, retry {} in {:?}]", attempt, delay)
        }
        ClientEvent::ReconnectExhausted { attempts } => {
            println!("[gave up after {} attempts, restart to try again]", attempts)
        }
        ClientEvent::HandshakeRejected { code, message } => {
            println!("[session refused: {} ({})]", message, code)
        }
        ClientEvent::SendRejected { reason } => println!("[not sent: {}]", reason),
        ClientEvent::Error(message) => warn!("{}", message),
    }
}

fn drain(
    client: &SessionClient,
    tool_requests: &Receiver<ToolRequest>,
    playback_errors: &Receiver<PlaybackFailure>,
) -> Result<()> {
    while let Some(event) = client.try_recv_event() {
        print_event(&event);
    }

    for request in tool_requests.try_iter() {
        let result = answer_tool_request(&request);
        if let Err(reason) = &result {
            println!("[tool] declining: {}", reason);
        }
        client.send_tool_response(request.request_id, result)?;
    }

    for failure in playback_errors.try_iter() {
        println!("[player] {:?} failed: {}", failure.op, failure.error);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = SessionConfig::load()?;
    init_tracing(&config.log_level);
    config.log();

    let (session_id, generated) = resolve_session_id(&parse_args());
    if generated {
        info!("No session id given, generated {}", session_id);
    }

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let (tool_tx, tool_requests) = unbounded();
    let (playback, playback_errors) = PlaybackBridge::new(ConsoleEngine);

    let mut builder = SessionClient::builder()
        .url(config.server.url.clone())
        .config(config.manager_config());
    for kind in [
        MessageKind::AgentResponse,
        MessageKind::TypingIndicator,
        MessageKind::SessionStatus,
        MessageKind::Notification,
        MessageKind::ToolReport,
        MessageKind::ToolResult,
        MessageKind::Error,
    ] {
        builder = builder.observer(kind, print_frame);
    }
    for kind in PlaybackBridge::<ConsoleEngine>::KINDS {
        builder = builder.observer(kind, playback.clone());
    }
    let client = builder
        .observer(MessageKind::ToolRequest, tool_request_forwarder(tool_tx))
        .session(session_id.clone())
        .build()
        .await?;

    println!("Session {} (type a message, Ctrl+C to quit)", session_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(EVENT_POLL_INTERVAL);

    while shutdown.is_running() {
        tokio::select! {
            _ = shutdown.requested() => break,
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => client.send_user_message(line, None)?,
                None => shutdown.trigger(),
            },
            _ = ticker.tick() => drain(&client, &tool_requests, &playback_errors)?,
        }
    }

    let metrics = client.metrics();
    client.shutdown().await?;

    info!(
        "Session closed: {} frames sent, {} received, {} reconnects",
        metrics.frames_sent, metrics.frames_received, metrics.reconnect_count
    );
    Ok(())
}

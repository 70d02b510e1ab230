// Framework bootstrap: logging setup and a headless demo session over the in-memory store.

use crate::domain::InputFlags;
use crate::domain::errors::{LifecycleError, SessionError};
use crate::domain::lifecycle::SessionStatus;
use crate::domain::ports::{Clock, SharedStateStore, SystemClock};
use crate::frameworks::config::{self, ConfigError};
use crate::interface_adapters::runtime::{RuntimeSettings, SessionHandle, host_session, join_session};
use crate::interface_adapters::store::InMemoryStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const START_RETRY: Duration = Duration::from_millis(100);
const START_DEADLINE: Duration = Duration::from_secs(5);
const BOT_INPUT_INTERVAL: Duration = Duration::from_millis(250);

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Why the configured demo could not run.
#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    Session(SessionError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(err) => write!(f, "configuration error: {err}"),
            RunError::Session(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Config(err) => Some(err),
            RunError::Session(err) => Some(err),
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(err: ConfigError) -> Self {
        RunError::Config(err)
    }
}

impl From<SessionError> for RunError {
    fn from(err: SessionError) -> Self {
        RunError::Session(err)
    }
}

/// Summary of a finished demo run.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoSummary {
    pub session_id: String,
    pub final_status: SessionStatus,
    pub round: u64,
    pub team_score: i64,
    pub participants: usize,
}

/// Runs a host plus `participants - 1` bots for `duration`, then leaves in order.
pub async fn run(
    settings: RuntimeSettings,
    participants: usize,
    duration: Duration,
) -> Result<DemoSummary, SessionError> {
    let store: Arc<dyn SharedStateStore> = Arc::new(InMemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let host = host_session(Arc::clone(&store), Arc::clone(&clock), "host", settings.clone()).await?;
    let session_id = host.session_id().to_string();
    tracing::info!(%session_id, participants, "demo session created");

    let mut handles = vec![host];
    for n in 1..participants.max(1) {
        let bot = join_session(
            Arc::clone(&store),
            Arc::clone(&clock),
            &session_id,
            &format!("bot-{n}"),
            settings.clone(),
        )
        .await?;
        handles.push(bot);
    }

    for handle in &handles[1..] {
        if let Err(e) = handle.set_ready(true).await {
            tracing::warn!(participant_id = handle.participant_id(), error = %e, "ready failed");
        }
    }
    start_when_ready(&handles[0]).await;

    let mut input_tick = tokio::time::interval(BOT_INPUT_INTERVAL);
    let deadline = tokio::time::Instant::now() + duration;
    let mut step: u64 = 0;
    while tokio::time::Instant::now() < deadline {
        input_tick.tick().await;
        for (index, handle) in handles.iter().enumerate() {
            handle.set_input(bot_input(step, index));
        }
        step += 1;
    }

    let render = handles[0].render();
    let summary = DemoSummary {
        session_id,
        final_status: render.status,
        round: render.round,
        team_score: render.team_score,
        participants: render.players().count(),
    };
    tracing::info!(
        session_id = %summary.session_id,
        status = ?summary.final_status,
        round = summary.round,
        team_score = summary.team_score,
        participants = summary.participants,
        "demo finished"
    );

    // Bots leave first so the host's departure removes the session.
    while let Some(handle) = handles.pop() {
        handle.leave().await?;
    }
    Ok(summary)
}

async fn start_when_ready(host: &SessionHandle) {
    let deadline = tokio::time::Instant::now() + START_DEADLINE;
    loop {
        match host.start().await {
            Ok(()) => return,
            Err(LifecycleError::NotReady(waiting_on)) if tokio::time::Instant::now() < deadline => {
                tracing::debug!(?waiting_on, "waiting for participants to ready up");
                tokio::time::sleep(START_RETRY).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "demo could not start the round");
                return;
            }
        }
    }
}

// Sweeps left and right in alternating one-second legs, staggered per bot, firing throughout.
fn bot_input(step: u64, index: usize) -> InputFlags {
    let leg = (step / 4 + index as u64) % 2;
    InputFlags {
        left: leg == 0,
        right: leg == 1,
        up: false,
        down: false,
        fire: true,
    }
}

pub async fn run_with_config() -> Result<(), RunError> {
    init_runtime();

    let tuning = config::game_tuning()
        .inspect_err(|e| tracing::error!(error = %e, "bad configuration"))?;
    let settings = RuntimeSettings {
        frame_interval: config::frame_interval(),
        input_publish_interval: config::input_publish_interval(),
        world_publish_interval: config::world_publish_interval(),
        inbox_capacity: config::INBOX_CAPACITY,
        write_queue_capacity: config::WRITE_QUEUE_CAPACITY,
        command_capacity: config::COMMAND_CHANNEL_CAPACITY,
        tuning: Arc::new(tuning),
    };
    tracing::debug!(
        frame_interval_ms = settings.frame_interval.as_millis(),
        input_publish_ms = settings.input_publish_interval.as_millis(),
        world_publish_ms = settings.world_publish_interval.as_millis(),
        "runtime configured"
    );

    run(settings, config::demo_participants(), config::demo_duration())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "demo failed"))?;
    Ok(())
}

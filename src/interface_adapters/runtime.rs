// Session membership against the shared store and the handle returned to the hosting application.

use crate::domain::errors::{LifecycleError, SessionError, StoreError};
use crate::domain::lifecycle::SessionMeta;
use crate::domain::ports::{Clock, SharedStateStore};
use crate::domain::systems::movement::spawn_position;
use crate::domain::tuning::GameTuning;
use crate::domain::{CombatState, InputFlags, Participant, ParticipantId};
use crate::interface_adapters::protocol::{
    create_session_fields, decode_meta, join_counter_path, join_fields, live_participants,
    meta_path, participant_path, participants_path, session_path,
};
use crate::interface_adapters::session_loop::{LoopSettings, SessionIo, session_task};
use crate::interface_adapters::utils::rng::{new_seed, new_session_id, next_participant_id};
use crate::use_cases::SessionContext;
use crate::use_cases::membership::{LeavePlan, check_admitted, check_joinable, plan_leave};
use crate::use_cases::types::{Command, RenderState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Cadences and channel sizes for session tasks.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub frame_interval: Duration,
    pub input_publish_interval: Duration,
    pub world_publish_interval: Duration,
    pub inbox_capacity: usize,
    pub write_queue_capacity: usize,
    pub command_capacity: usize,
    pub tuning: Arc<GameTuning>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            input_publish_interval: Duration::from_millis(50),
            world_publish_interval: Duration::from_millis(50),
            inbox_capacity: 256,
            write_queue_capacity: 256,
            command_capacity: 32,
            tuning: Arc::new(GameTuning::default()),
        }
    }
}

impl RuntimeSettings {
    fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            frame_interval: self.frame_interval,
            input_publish_interval: self.input_publish_interval,
            inbox_capacity: self.inbox_capacity,
            write_queue_capacity: self.write_queue_capacity,
        }
    }
}

/// A running participation in one session.
///
/// Input goes in through [`SessionHandle::set_input`]; the latest render state comes out of
/// [`SessionHandle::render`]. Dropping the handle stops the task without cleaning up the store;
/// call [`SessionHandle::leave`] for an orderly exit.
pub struct SessionHandle {
    session_id: String,
    participant_id: ParticipantId,
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock>,
    tuning: Arc<GameTuning>,
    input_tx: watch::Sender<InputFlags>,
    render_rx: watch::Receiver<RenderState>,
    command_tx: mpsc::Sender<Command>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    /// Replaces the polled input flags used by the next frame.
    pub fn set_input(&self, input: InputFlags) {
        self.input_tx.send_replace(input);
    }

    pub fn render(&self) -> RenderState {
        self.render_rx.borrow().clone()
    }

    /// Receiver that wakes on every rendered frame.
    pub fn render_updates(&self) -> watch::Receiver<RenderState> {
        self.render_rx.clone()
    }

    pub async fn set_ready(&self, ready: bool) -> Result<(), LifecycleError> {
        self.send_command(|reply| Command::SetReady { ready, reply })
            .await
    }

    /// Host only: start the countdown once everyone is ready.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        self.send_command(|reply| Command::Start { reply }).await
    }

    pub async fn vote_restart(&self) -> Result<(), LifecycleError> {
        self.send_command(|reply| Command::VoteRestart { reply })
            .await
    }

    /// Ask the host to end the running round.
    pub async fn terminate(&self) -> Result<(), LifecycleError> {
        self.send_command(|reply| Command::Terminate { reply })
            .await
    }

    async fn send_command(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<(), LifecycleError>>) -> Command,
    ) -> Result<(), LifecycleError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| LifecycleError::SessionClosed)?;
        reply_rx.await.map_err(|_| LifecycleError::SessionClosed)?
    }

    /// Stops the session task, removes this participant and hands off or removes the session.
    pub async fn leave(mut self) -> Result<(), SessionError> {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            // The task flushes its publishers before exiting, so nothing rewrites our record.
            if let Err(err) = task.await {
                warn!(error = %err, "session task ended abnormally");
            }
        }

        let sid = self.session_id.as_str();
        self.store
            .remove(&participant_path(sid, self.participant_id))
            .await?;

        let remaining = live_participants(
            self.store.get(&participants_path(sid)).await?,
            self.clock.now_epoch_millis(),
            self.tuning.player.stale_after_ms,
        );
        let meta = match decode_meta(sid, self.store.get(&meta_path(sid)).await?) {
            Ok(Some(meta)) => meta,
            Ok(None) => return Ok(()),
            Err(err) => return Err(SessionError::Malformed(err.to_string())),
        };

        match plan_leave(&meta, self.participant_id, &remaining) {
            LeavePlan::RemoveSession => {
                info!(session_id = sid, "last participant left; removing session");
                self.store.remove(&session_path(sid)).await?;
            }
            LeavePlan::HandOff(successor) => {
                info!(session_id = sid, successor, "host left; handing off");
                self.store
                    .set(&format!("{}/host_id", meta_path(sid)), Value::from(successor))
                    .await?;
            }
            LeavePlan::Nothing => {}
        }
        Ok(())
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.shutdown.notify_one();
        }
    }
}

/// Creates a new session with the caller as host.
pub async fn host_session(
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock>,
    display_name: &str,
    settings: RuntimeSettings,
) -> Result<SessionHandle, SessionError> {
    let session_id = new_session_id();
    let participant_id = next_participant_id();
    let mut meta = SessionMeta::new(session_id.clone(), participant_id, new_seed());

    let joined_seq = claim_join_seq(store.as_ref(), &session_id).await?;
    meta.join_counter = joined_seq;
    let local = new_participant(participant_id, display_name, joined_seq, &settings.tuning);

    let mut fields = create_session_fields(&meta);
    fields.extend(encode_join(&local, clock.now_epoch_millis())?);
    store.update(&session_path(&session_id), fields).await?;

    info!(%session_id, participant_id, "hosted new session");
    Ok(spawn_session(store, clock, meta, local, settings))
}

/// Joins an existing session as a non-host participant.
pub async fn join_session(
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock>,
    session_id: &str,
    display_name: &str,
    settings: RuntimeSettings,
) -> Result<SessionHandle, SessionError> {
    let mut meta = match decode_meta(session_id, store.get(&meta_path(session_id)).await?) {
        Ok(Some(meta)) => meta,
        Ok(None) => return Err(SessionError::NotFound(session_id.to_string())),
        Err(err) => return Err(SessionError::Malformed(err.to_string())),
    };

    let stale_after_ms = settings.tuning.player.stale_after_ms;
    let current = live_participants(
        store.get(&participants_path(session_id)).await?,
        clock.now_epoch_millis(),
        stale_after_ms,
    );
    check_joinable(&meta, current.len(), &settings.tuning)?;

    let participant_id = next_participant_id();
    let joined_seq = claim_join_seq(store.as_ref(), session_id).await?;
    meta.join_counter = joined_seq;
    let local = new_participant(participant_id, display_name, joined_seq, &settings.tuning);

    store
        .update(
            &session_path(session_id),
            encode_join(&local, clock.now_epoch_millis())?,
        )
        .await?;

    // Other joins may have passed the first check at the same time.
    let live = live_participants(
        store.get(&participants_path(session_id)).await?,
        clock.now_epoch_millis(),
        stale_after_ms,
    );
    if let Err(err) = check_admitted(&live, participant_id, joined_seq, &settings.tuning) {
        info!(session_id, participant_id, joined_seq, "lost a join race; backing out");
        store
            .remove(&participant_path(session_id, participant_id))
            .await?;
        return Err(err);
    }

    info!(session_id, participant_id, joined_seq, "joined session");
    Ok(spawn_session(store, clock, meta, local, settings))
}

async fn claim_join_seq(store: &dyn SharedStateStore, session_id: &str) -> Result<u64, SessionError> {
    let seq = store.increment(&join_counter_path(session_id), 1).await?;
    u64::try_from(seq).map_err(|_| {
        SessionError::Store(StoreError::NotANumber(join_counter_path(session_id)))
    })
}

fn encode_join(
    local: &Participant,
    now_ms: u64,
) -> Result<serde_json::Map<String, Value>, SessionError> {
    join_fields(local, now_ms).map_err(|err| SessionError::Malformed(err.to_string()))
}

fn new_participant(
    id: ParticipantId,
    display_name: &str,
    joined_seq: u64,
    tuning: &GameTuning,
) -> Participant {
    let (x, y) = spawn_position(joined_seq, tuning);
    Participant {
        id,
        display_name: display_name.to_string(),
        joined_seq,
        ready: false,
        x,
        y,
        combat: CombatState::new(tuning.player.max_health),
        last_seen_ms: 0,
        fire_ts: 0,
    }
}

fn spawn_session(
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock>,
    meta: SessionMeta,
    local: Participant,
    settings: RuntimeSettings,
) -> SessionHandle {
    let session_id = meta.session_id.clone();
    let participant_id = local.id;

    let (input_tx, input_rx) = watch::channel(InputFlags::default());
    let (render_tx, render_rx) = watch::channel(RenderState::empty(participant_id));
    let (command_tx, command_rx) = mpsc::channel(settings.command_capacity);
    let shutdown = Arc::new(Notify::new());
    let tuning = Arc::clone(&settings.tuning);

    let ctx = SessionContext::new(
        meta,
        local,
        Arc::clone(&settings.tuning),
        settings.world_publish_interval,
    );
    let io = SessionIo {
        store: Arc::clone(&store),
        clock: Arc::clone(&clock),
        input_rx,
        render_tx,
        command_rx,
        shutdown: Arc::clone(&shutdown),
    };
    let task = tokio::spawn(session_task(ctx, io, settings.loop_settings()));

    SessionHandle {
        session_id,
        participant_id,
        store,
        clock,
        tuning,
        input_tx,
        render_rx,
        command_tx,
        shutdown,
        task: Some(task),
    }
}

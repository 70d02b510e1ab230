// Session task: drives a SessionContext from store feeds, local input and timers.

use crate::domain::InputFlags;
use crate::domain::ports::{Clock, SharedStateStore, Subscription};
use crate::interface_adapters::protocol::{
    self, Feed, input_path, lifecycle_fields, session_path, world_fields,
};
use crate::use_cases::types::{Command, Inbound, InputPayload, LifecycleWrite, RenderState, WorldPayload};
use crate::use_cases::SessionContext;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, info, info_span, warn};

const LOG_THROTTLE: Duration = Duration::from_secs(2);

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

fn log_clock() -> Instant {
    Instant::now()
        .checked_sub(LOG_THROTTLE)
        .unwrap_or_else(Instant::now)
}

/// Timing and capacity knobs for one session task.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub frame_interval: Duration,
    pub input_publish_interval: Duration,
    pub inbox_capacity: usize,
    pub write_queue_capacity: usize,
}

/// Channels connecting the session task to its handle.
pub struct SessionIo {
    pub store: Arc<dyn SharedStateStore>,
    pub clock: Arc<dyn Clock>,
    pub input_rx: watch::Receiver<InputFlags>,
    pub render_tx: watch::Sender<RenderState>,
    pub command_rx: mpsc::Receiver<Command>,
    pub shutdown: Arc<Notify>,
}

pub async fn session_task(ctx: SessionContext, io: SessionIo, settings: LoopSettings) {
    let span = info_span!(
        "session",
        session_id = %ctx.meta().session_id,
        participant_id = ctx.local_id()
    );
    run_session(ctx, io, settings).instrument(span).await;
}

async fn run_session(mut ctx: SessionContext, mut io: SessionIo, settings: LoopSettings) {
    let session_id: Arc<str> = Arc::from(ctx.meta().session_id.as_str());

    let (inbox_tx, mut inbox_rx) = mpsc::channel::<Inbound>(settings.inbox_capacity);
    let forwarders = spawn_forwarders(io.store.as_ref(), &session_id, inbox_tx);

    let (input_pub_tx, input_pub_rx) = watch::channel::<Option<InputPayload>>(None);
    let (world_pub_tx, world_pub_rx) = watch::channel::<Option<WorldPayload>>(None);
    let (write_tx, write_rx) = mpsc::channel::<LifecycleWrite>(settings.write_queue_capacity);
    let publishers = [
        tokio::spawn(input_publisher(
            Arc::clone(&io.store),
            Arc::clone(&session_id),
            input_pub_rx,
        )),
        tokio::spawn(world_publisher(
            Arc::clone(&io.store),
            Arc::clone(&session_id),
            world_pub_rx,
        )),
        tokio::spawn(lifecycle_writer(
            Arc::clone(&io.store),
            Arc::clone(&session_id),
            write_rx,
        )),
    ];

    let mut frame = tokio::time::interval(settings.frame_interval);
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut input_tick = tokio::time::interval(settings.input_publish_interval);
    input_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_frame = tokio::time::Instant::now();
    let mut last_queue_log = log_clock();

    info!("session task started");
    loop {
        tokio::select! {
            _ = io.shutdown.notified() => {
                break;
            }
            Some(command) = io.command_rx.recv() => {
                drain_inbox(&mut ctx, &mut inbox_rx);
                if let Some(write) = handle_command(&mut ctx, command) {
                    enqueue(&write_tx, write, &mut last_queue_log);
                }
            }
            _ = input_tick.tick() => {
                drain_inbox(&mut ctx, &mut inbox_rx);
                input_pub_tx.send_replace(Some(ctx.input_payload(io.clock.now_epoch_millis())));
            }
            _ = frame.tick() => {
                drain_inbox(&mut ctx, &mut inbox_rx);

                let now = tokio::time::Instant::now();
                let dt = now.duration_since(last_frame);
                last_frame = now;

                let input = *io.input_rx.borrow();
                let out = ctx.frame(input, dt, io.clock.now_epoch_millis());
                if let Some(world) = out.world {
                    world_pub_tx.send_replace(Some(world));
                }
                for write in out.lifecycle {
                    enqueue(&write_tx, write, &mut last_queue_log);
                }
                io.render_tx.send_replace(ctx.render_state());

                if ctx.session_gone() {
                    info!("session no longer exists; stopping");
                    break;
                }
            }
        }
    }

    for forwarder in &forwarders {
        forwarder.abort();
    }
    // Closing the publisher channels lets each publisher flush and exit.
    drop(input_pub_tx);
    drop(world_pub_tx);
    drop(write_tx);
    for publisher in publishers {
        let _ = publisher.await;
    }
    info!("session task stopped");
}

// Applies queued store changes so a frame never sees half an update.
fn drain_inbox(ctx: &mut SessionContext, inbox: &mut mpsc::Receiver<Inbound>) {
    while let Ok(inbound) = inbox.try_recv() {
        ctx.apply(inbound);
    }
}

fn handle_command(ctx: &mut SessionContext, command: Command) -> Option<LifecycleWrite> {
    let (result, reply) = match command {
        Command::SetReady { ready, reply } => (Ok(ctx.set_ready(ready)), reply),
        Command::Start { reply } => (ctx.start(), reply),
        Command::VoteRestart { reply } => (ctx.vote_restart(), reply),
        Command::Terminate { reply } => (ctx.request_terminate(), reply),
    };

    match result {
        Ok(write) => {
            let _ = reply.send(Ok(()));
            Some(write)
        }
        Err(err) => {
            debug!(error = %err, "command rejected");
            let _ = reply.send(Err(err));
            None
        }
    }
}

fn enqueue(write_tx: &mpsc::Sender<LifecycleWrite>, write: LifecycleWrite, last_log: &mut Instant) {
    match write_tx.try_send(write) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(write)) => {
            if should_log(last_log) {
                warn!(?write, "lifecycle write queue full; dropping write");
            }
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("lifecycle writer gone");
        }
    }
}

fn spawn_forwarders(
    store: &dyn SharedStateStore,
    session_id: &Arc<str>,
    inbox: mpsc::Sender<Inbound>,
) -> Vec<JoinHandle<()>> {
    Feed::ALL
        .into_iter()
        .filter_map(|feed| match store.subscribe(&feed.path(session_id)) {
            Ok(subscription) => Some(tokio::spawn(forward(
                subscription,
                feed,
                Arc::clone(session_id),
                inbox.clone(),
            ))),
            Err(err) => {
                warn!(?feed, error = %err, "failed to subscribe");
                None
            }
        })
        .collect()
}

async fn forward(
    mut subscription: Subscription,
    feed: Feed,
    session_id: Arc<str>,
    inbox: mpsc::Sender<Inbound>,
) {
    let mut last_decode_log = log_clock();
    loop {
        match feed.decode(&session_id, subscription.latest()) {
            Ok(inbound) => {
                if inbox.send(inbound).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                if should_log(&mut last_decode_log) {
                    warn!(?feed, error = %err, "dropping undecodable store value");
                }
            }
        }
        if subscription.changed().await.is_err() {
            break;
        }
    }
}

async fn input_publisher(
    store: Arc<dyn SharedStateStore>,
    session_id: Arc<str>,
    mut rx: watch::Receiver<Option<InputPayload>>,
) {
    let mut last_error_log = log_clock();
    while rx.changed().await.is_ok() {
        let Some(payload) = rx.borrow_and_update().clone() else {
            continue;
        };
        let result = match protocol::input_value(&payload) {
            Ok(value) => store
                .set(&input_path(&session_id, payload.participant_id), value)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(error) = result {
            if should_log(&mut last_error_log) {
                warn!(%error, "input publish failed; retrying next cadence");
            }
        }
    }
}

async fn world_publisher(
    store: Arc<dyn SharedStateStore>,
    session_id: Arc<str>,
    mut rx: watch::Receiver<Option<WorldPayload>>,
) {
    let mut last_error_log = log_clock();
    while rx.changed().await.is_ok() {
        let Some(payload) = rx.borrow_and_update().clone() else {
            continue;
        };
        let result = match world_fields(&payload) {
            Ok(fields) => store
                .update(&session_path(&session_id), fields)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(error) = result {
            if should_log(&mut last_error_log) {
                warn!(%error, tick = payload.snapshot.tick, "world publish failed; retrying next cadence");
            }
        }
    }
}

async fn lifecycle_writer(
    store: Arc<dyn SharedStateStore>,
    session_id: Arc<str>,
    mut rx: mpsc::Receiver<LifecycleWrite>,
) {
    let mut last_error_log = log_clock();
    while let Some(write) = rx.recv().await {
        let result = match lifecycle_fields(&write) {
            Ok(fields) => store
                .update(&session_path(&session_id), fields)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match result {
            Ok(()) => debug!(?write, "lifecycle write applied"),
            Err(error) => {
                if should_log(&mut last_error_log) {
                    warn!(%error, ?write, "lifecycle write failed");
                }
            }
        }
    }
}

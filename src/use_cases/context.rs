// Per-participant session state, owned by a single session task.

use crate::domain::authority::{elect_host, host_missing};
use crate::domain::errors::LifecycleError;
use crate::domain::lifecycle::{EndReason, SessionMeta, SessionStatus};
use crate::domain::systems::movement::spawn_position;
use crate::domain::tuning::GameTuning;
use crate::domain::{CombatState, Entity, InputFlags, Participant, ParticipantId, WorldSnapshot};
use crate::use_cases::lifecycle::{all_dead, not_ready, reset_combat, restart_agreed, votes_cast};
use crate::use_cases::reconcile::Mirror;
use crate::use_cases::simulation::{HostSimulation, step_local};
use crate::use_cases::sync::{Cadence, FireClock, may_publish_world};
use crate::use_cases::types::{
    FrameOutput, Inbound, InputPayload, InputRecord, LifecycleWrite, RenderState, WorldPayload,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

pub struct SessionContext {
    tuning: Arc<GameTuning>,
    meta: SessionMeta,
    local: Participant,
    mirror: Mirror,
    host: Option<HostSimulation>,
    fire: FireClock,
    world_cadence: Cadence,
    countdown_elapsed: Duration,
    terminate_requested: bool,
    // No election until the roster has been read at least once.
    roster_seen: bool,
    // Orphaned records this host already asked the store to delete.
    pruned: BTreeSet<ParticipantId>,
    session_gone: bool,
}

impl SessionContext {
    pub fn new(
        meta: SessionMeta,
        local: Participant,
        tuning: Arc<GameTuning>,
        world_publish_interval: Duration,
    ) -> Self {
        let mut fire = FireClock::new(Duration::from_millis(tuning.player.fire_cooldown_ms));
        fire.observe(local.fire_ts);
        Self {
            mirror: Mirror::new(local.id, meta.round),
            tuning,
            meta,
            local,
            host: None,
            fire,
            world_cadence: Cadence::new(world_publish_interval),
            countdown_elapsed: Duration::ZERO,
            terminate_requested: false,
            roster_seen: false,
            pruned: BTreeSet::new(),
            session_gone: false,
        }
    }

    pub fn local_id(&self) -> ParticipantId {
        self.local.id
    }

    pub fn local(&self) -> &Participant {
        &self.local
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    pub fn is_host(&self) -> bool {
        self.meta.host_id == self.local.id
    }

    /// The session record disappeared from the store.
    pub fn session_gone(&self) -> bool {
        self.session_gone
    }

    /// Local participant plus every live remote, local first.
    pub fn live_roster(&self) -> Vec<Participant> {
        std::iter::once(self.local.clone())
            .chain(self.mirror.live_remotes().cloned())
            .collect()
    }

    pub fn apply(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Meta(Some(incoming)) => self.apply_meta(incoming),
            Inbound::Meta(None) => {
                if !self.session_gone {
                    info!(session_id = %self.meta.session_id, "session removed");
                }
                self.session_gone = true;
            }
            Inbound::Participants(records) => {
                self.roster_seen = true;
                let local = self.mirror.apply_participants(records, &self.tuning);
                if self.is_host() {
                    return;
                }
                if let Some(mut combat) = local.and_then(|record| record.combat) {
                    combat.clamp();
                    self.local.combat = combat;
                }
            }
            Inbound::World(Some(snapshot)) => {
                if !self.is_host() {
                    self.mirror.apply_snapshot(snapshot);
                }
            }
            Inbound::World(None) => {
                if !self.is_host() {
                    self.mirror.reset_world(self.meta.round);
                }
            }
            Inbound::Votes(votes) => self.mirror.apply_votes(votes),
            Inbound::Terminate(requested) => self.terminate_requested = requested,
        }
    }

    fn apply_meta(&mut self, incoming: SessionMeta) {
        if incoming.round > self.meta.round {
            self.enter_round(incoming.round);
        }

        if !self.is_host() {
            self.meta = incoming;
            return;
        }

        // The host authors status; its own writes may still be in flight.
        self.meta.join_counter = incoming.join_counter;
        if incoming.host_id != self.local.id
            && self.mirror.live_remotes().any(|p| p.id == incoming.host_id)
        {
            info!(host_id = incoming.host_id, "host role moved to another participant");
            self.meta = incoming;
            self.host = None;
        }
    }

    fn enter_round(&mut self, round: u64) {
        let (x, y) = spawn_position(self.local.joined_seq, &self.tuning);
        self.local.x = x;
        self.local.y = y;
        self.local.combat = CombatState::new(self.tuning.player.max_health);
        self.mirror.reset_world(round);
        self.mirror.apply_votes(BTreeSet::new());
        self.terminate_requested = false;
        self.countdown_elapsed = Duration::ZERO;
        self.host = None;
    }

    fn status_write(&self) -> LifecycleWrite {
        LifecycleWrite::Status {
            status: self.meta.status,
            countdown: self.meta.countdown,
            round: self.meta.round,
            end_reason: self.meta.end_reason,
        }
    }

    pub fn set_ready(&mut self, ready: bool) -> LifecycleWrite {
        self.local.ready = ready;
        LifecycleWrite::Ready {
            participant_id: self.local.id,
            ready,
        }
    }

    /// Host only: begin the countdown once every live participant is ready.
    pub fn start(&mut self) -> Result<LifecycleWrite, LifecycleError> {
        if !self.is_host() {
            return Err(LifecycleError::NotHost);
        }
        let waiting_on = not_ready(&self.live_roster(), self.local.id);
        if !waiting_on.is_empty() {
            return Err(LifecycleError::NotReady(waiting_on));
        }

        self.meta.begin_countdown(self.tuning.session.countdown_seconds)?;
        self.countdown_elapsed = Duration::ZERO;
        if self.meta.status == SessionStatus::Running {
            self.begin_round_simulation();
        }
        info!(
            countdown = self.meta.countdown,
            round = self.meta.round,
            "countdown started"
        );
        Ok(self.status_write())
    }

    pub fn vote_restart(&mut self) -> Result<LifecycleWrite, LifecycleError> {
        if self.meta.status != SessionStatus::Ended {
            return Err(LifecycleError::InvalidTransition {
                from: self.meta.status,
                to: SessionStatus::Waiting,
            });
        }
        let mut votes = self.mirror.votes().clone();
        votes.insert(self.local.id);
        self.mirror.apply_votes(votes);
        Ok(LifecycleWrite::Vote {
            participant_id: self.local.id,
        })
    }

    pub fn request_terminate(&mut self) -> Result<LifecycleWrite, LifecycleError> {
        if self.meta.status != SessionStatus::Running {
            return Err(LifecycleError::InvalidTransition {
                from: self.meta.status,
                to: SessionStatus::Ended,
            });
        }
        self.terminate_requested = true;
        Ok(LifecycleWrite::Terminate)
    }

    pub fn input_payload(&self, now_ms: u64) -> InputPayload {
        InputPayload {
            participant_id: self.local.id,
            record: InputRecord {
                x: self.local.x,
                y: self.local.y,
                fire_ts: self.local.fire_ts,
                last_seen_ms: now_ms,
            },
        }
    }

    /// One render frame: local prediction, host election and, on the host, the world tick.
    pub fn frame(&mut self, input: InputFlags, dt: Duration, now_ms: u64) -> FrameOutput {
        let mut out = FrameOutput::default();
        let tuning = Arc::clone(&self.tuning);

        self.mirror.refresh_liveness(now_ms, &tuning);
        self.check_host(&mut out);

        self.fire.tick(dt);
        if input.fire && self.local.combat.alive && self.meta.status == SessionStatus::Running {
            if let Some(ts) = self.fire.try_fire(now_ms) {
                self.local.fire_ts = ts;
            }
        }
        let round_ms = self.round_ms();
        step_local(&mut self.local, input, dt, round_ms, &tuning);
        self.mirror.interpolate(tuning.session.remote_lerp);

        if self.is_host() {
            self.prune_orphans(&mut out);
            self.host_frame(dt, &mut out);
        } else {
            self.host = None;
        }
        out
    }

    // A publish racing a leave can recreate a combat-only record; delete it once per sighting.
    fn prune_orphans(&mut self, out: &mut FrameOutput) {
        let orphans = self.mirror.orphans();
        self.pruned.retain(|id| orphans.contains(id));
        for id in orphans {
            if self.pruned.insert(*id) {
                debug!(participant_id = id, "pruning orphaned participant record");
                out.lifecycle.push(LifecycleWrite::PruneParticipant {
                    participant_id: *id,
                });
            }
        }
    }

    // Latest known round time; boost timers are measured against it.
    fn round_ms(&self) -> u64 {
        match &self.host {
            Some(sim) => sim.snapshot().elapsed_ms,
            None => self.mirror.world().elapsed_ms,
        }
    }

    fn check_host(&mut self, out: &mut FrameOutput) {
        if !self.roster_seen || self.session_gone {
            return;
        }
        let roster = self.live_roster();
        if !host_missing(&self.meta, &roster) {
            return;
        }
        let Some(elected) = elect_host(&roster) else {
            return;
        };

        let previous = self.meta.host_id;
        self.meta.host_id = elected;
        if elected == self.local.id {
            info!(previous_host = previous, "host lost; taking over");
            out.lifecycle
                .push(LifecycleWrite::HostHandoff { host_id: elected });
        } else {
            info!(host_id = elected, previous_host = previous, "host lost; new host elected");
        }
    }

    fn begin_round_simulation(&mut self) {
        let roster = self.live_roster();
        self.host = Some(HostSimulation::start(
            self.meta.seed,
            WorldSnapshot::empty(self.meta.round),
            &roster,
        ));
        self.world_cadence.force();
    }

    fn host_frame(&mut self, dt: Duration, out: &mut FrameOutput) {
        match self.meta.status {
            SessionStatus::Waiting => {}
            SessionStatus::Countdown => self.host_countdown(dt, out),
            SessionStatus::Running => self.host_tick(dt, out),
            SessionStatus::Ended => self.host_restart_check(out),
        }
    }

    fn host_countdown(&mut self, dt: Duration, out: &mut FrameOutput) {
        self.countdown_elapsed += dt;
        while self.countdown_elapsed >= COUNTDOWN_STEP
            && self.meta.status == SessionStatus::Countdown
        {
            self.countdown_elapsed -= COUNTDOWN_STEP;
            match self.meta.tick_countdown() {
                Ok(running) => {
                    out.lifecycle.push(self.status_write());
                    if running {
                        info!(round = self.meta.round, "round running");
                        self.begin_round_simulation();
                    }
                }
                Err(err) => {
                    warn!(error = %err, "countdown tick rejected");
                    break;
                }
            }
        }
    }

    fn host_tick(&mut self, dt: Duration, out: &mut FrameOutput) {
        if self.host.is_none() {
            let roster = self.live_roster();
            let mirrored = self.mirror.world();
            let world = if mirrored.round == self.meta.round {
                (*mirrored).clone()
            } else {
                WorldSnapshot::empty(self.meta.round)
            };
            info!(
                tick = world.tick,
                hostiles = world.hostiles.len(),
                "resuming world simulation from last snapshot"
            );
            self.host = Some(HostSimulation::start(self.meta.seed, world, &roster));
            self.world_cadence.force();
        }

        let tuning = Arc::clone(&self.tuning);
        let mut roster = self.live_roster();
        let Some(sim) = self.host.as_mut() else {
            return;
        };
        sim.step(&mut roster, dt, &tuning);

        for p in &roster {
            if p.id == self.local.id {
                self.local.combat = p.combat.clone();
            } else {
                self.mirror.set_combat(p.id, p.combat.clone());
            }
        }

        let reason = if all_dead(&roster) {
            Some(EndReason::AllDead)
        } else if self.terminate_requested {
            Some(EndReason::Terminated)
        } else {
            None
        };
        if let Some(reason) = reason {
            match self.meta.end(reason) {
                Ok(()) => {
                    info!(?reason, round = self.meta.round, "round ended");
                    out.lifecycle.push(self.status_write());
                    self.world_cadence.force();
                }
                Err(err) => warn!(error = %err, "failed to end round"),
            }
        }

        if self.world_cadence.advance(dt) && may_publish_world(&self.meta, self.local.id) {
            if let Some(sim) = self.host.as_ref() {
                out.world = Some(WorldPayload {
                    snapshot: sim.snapshot().clone(),
                    combat: sim.combat_records(&roster),
                });
            }
        }
    }

    fn host_restart_check(&mut self, out: &mut FrameOutput) {
        let roster = self.live_roster();
        if !restart_agreed(&roster, self.mirror.votes()) {
            return;
        }

        let combat = reset_combat(&roster, &self.tuning);
        if let Err(err) = self.meta.restart() {
            warn!(error = %err, "restart rejected");
            return;
        }
        self.enter_round(self.meta.round);
        for (id, record) in &combat {
            self.mirror.set_combat(*id, record.clone());
        }
        // Everyone voted, so everyone is ready: go straight into the countdown.
        if let Err(err) = self.meta.begin_countdown(self.tuning.session.countdown_seconds) {
            warn!(error = %err, "countdown after restart rejected");
        }
        if self.meta.status == SessionStatus::Running {
            self.begin_round_simulation();
        }
        info!(round = self.meta.round, "restarting session");
        out.lifecycle.push(LifecycleWrite::ResetRound {
            status: self.meta.status,
            round: self.meta.round,
            countdown: self.meta.countdown,
            combat,
        });
    }

    pub fn render_state(&self) -> RenderState {
        let world = match &self.host {
            Some(sim) => sim.snapshot().clone(),
            None => (*self.mirror.world()).clone(),
        };
        let roster = self.live_roster();

        let mut entities = Vec::with_capacity(1 + roster.len() + world.hostiles.len());
        entities.push(Entity::Player(self.local.clone()));
        entities.extend(self.mirror.rendered_remotes().map(Entity::Player));
        entities.extend(world.entities());

        RenderState {
            local_id: self.local.id,
            is_host: self.is_host(),
            status: self.meta.status,
            round: self.meta.round,
            countdown: self.meta.countdown,
            end_reason: self.meta.end_reason,
            team_score: world.team_score,
            entities,
            votes: votes_cast(&roster, self.mirror.votes()),
            voters_needed: roster.len(),
            local_game_over: !self.local.combat.alive
                && matches!(self.meta.status, SessionStatus::Running | SessionStatus::Ended),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HostileEntity, HostileTier};
    use crate::use_cases::types::{ParticipantRecord, Profile};
    use std::collections::BTreeMap;

    const FRAME: Duration = Duration::from_millis(16);

    fn participant(id: ParticipantId, joined_seq: u64) -> Participant {
        let tuning = GameTuning::default();
        let (x, y) = spawn_position(joined_seq, &tuning);
        Participant {
            id,
            display_name: format!("p{id}"),
            joined_seq,
            ready: false,
            x,
            y,
            combat: CombatState::new(tuning.player.max_health),
            last_seen_ms: 0,
            fire_ts: 0,
        }
    }

    fn context(local: ParticipantId, joined_seq: u64, host: ParticipantId) -> SessionContext {
        SessionContext::new(
            SessionMeta::new("session", host, 7),
            participant(local, joined_seq),
            Arc::new(GameTuning::default()),
            Duration::from_millis(50),
        )
    }

    fn record(joined_seq: u64, ready: bool, last_seen_ms: u64) -> ParticipantRecord {
        ParticipantRecord {
            profile: Some(Profile {
                display_name: "remote".into(),
                joined_seq,
                ready,
            }),
            input: Some(InputRecord {
                x: 100.0,
                y: 100.0,
                fire_ts: 0,
                last_seen_ms,
            }),
            combat: Some(CombatState::new(100)),
        }
    }

    fn run_frames(ctx: &mut SessionContext, frames: usize, now_ms: u64) -> Vec<FrameOutput> {
        (0..frames)
            .map(|_| ctx.frame(InputFlags::default(), FRAME, now_ms))
            .collect()
    }

    #[test]
    fn when_host_starts_alone_then_countdown_leads_to_running_and_publishing() {
        let mut ctx = context(1, 1, 1);
        let write = ctx.start().unwrap();
        assert!(matches!(
            write,
            LifecycleWrite::Status {
                status: SessionStatus::Countdown,
                countdown: 5,
                ..
            }
        ));

        let outputs = run_frames(&mut ctx, 320, 0);
        assert_eq!(ctx.meta().status, SessionStatus::Running);
        let status_writes = outputs
            .iter()
            .flat_map(|o| o.lifecycle.iter())
            .filter(|w| matches!(w, LifecycleWrite::Status { .. }))
            .count();
        assert_eq!(status_writes, 5);
        assert!(outputs.iter().any(|o| o.world.is_some()));
    }

    #[test]
    fn when_remote_is_not_ready_then_start_is_refused() {
        let mut ctx = context(1, 1, 1);
        ctx.apply(Inbound::Participants(BTreeMap::from([(2, record(2, false, 0))])));
        assert_eq!(ctx.start(), Err(LifecycleError::NotReady(vec![2])));

        ctx.apply(Inbound::Participants(BTreeMap::from([(2, record(2, true, 0))])));
        assert!(ctx.start().is_ok());
    }

    #[test]
    fn when_not_host_then_start_and_world_publish_are_refused() {
        let mut ctx = context(2, 2, 1);
        ctx.apply(Inbound::Participants(BTreeMap::from([(1, record(1, true, 0))])));
        assert_eq!(ctx.start(), Err(LifecycleError::NotHost));
        let outputs = run_frames(&mut ctx, 10, 0);
        assert!(outputs.iter().all(|o| o.world.is_none() && o.lifecycle.is_empty()));
    }

    #[test]
    fn when_host_goes_quiet_then_earliest_remaining_participant_takes_over() {
        let mut ctx = context(2, 2, 1);
        let mut meta = ctx.meta().clone();
        meta.begin_countdown(0).unwrap();
        ctx.apply(Inbound::Meta(Some(meta)));
        ctx.apply(Inbound::Participants(BTreeMap::from([(1, record(1, true, 0))])));
        assert!(run_frames(&mut ctx, 1, 1_000)[0].lifecycle.is_empty());

        let outputs = run_frames(&mut ctx, 1, 20_000);
        assert_eq!(
            outputs[0].lifecycle,
            vec![LifecycleWrite::HostHandoff { host_id: 2 }]
        );
        assert!(ctx.is_host());
        assert!(outputs[0].world.is_some());
    }

    #[test]
    fn when_roster_was_never_read_then_no_election_happens() {
        let mut ctx = context(2, 2, 1);
        let outputs = run_frames(&mut ctx, 3, 0);
        assert!(outputs.iter().all(|o| o.lifecycle.is_empty()));
        assert!(!ctx.is_host());
    }

    #[test]
    fn when_everyone_voted_after_the_end_then_host_resets_the_round() {
        let mut ctx = context(1, 1, 1);
        ctx.start().unwrap();
        run_frames(&mut ctx, 320, 0);
        ctx.request_terminate().unwrap();
        let outputs = run_frames(&mut ctx, 1, 0);
        assert_eq!(ctx.meta().status, SessionStatus::Ended);
        assert_eq!(ctx.meta().end_reason, Some(EndReason::Terminated));
        assert!(outputs[0].world.is_some());

        ctx.vote_restart().unwrap();
        let outputs = run_frames(&mut ctx, 1, 0);
        let reset = outputs[0]
            .lifecycle
            .iter()
            .find(|w| matches!(w, LifecycleWrite::ResetRound { .. }))
            .cloned();
        assert!(matches!(
            reset,
            Some(LifecycleWrite::ResetRound {
                status: SessionStatus::Countdown,
                round: 1,
                ..
            })
        ));
        assert_eq!(ctx.render_state().round, 1);
        assert!(ctx.render_state().entities.iter().all(|e| matches!(e, Entity::Player(_))));
    }

    #[test]
    fn when_next_round_world_arrives_before_its_meta_then_the_world_survives() {
        let mut ctx = context(2, 2, 1);
        ctx.apply(Inbound::Participants(BTreeMap::from([(1, record(1, true, 0))])));

        let mut world = WorldSnapshot::empty(1);
        world.tick = 2;
        world.hostiles.push(HostileEntity {
            id: 1,
            tier: HostileTier::Small,
            x: 10.0,
            y: 20.0,
            vx: 0.0,
            vy: 70.0,
            hit_points: 10,
            spawned_at_ms: 0,
        });
        world.next_entity_id = 2;
        ctx.apply(Inbound::World(Some(world)));

        let mut meta = ctx.meta().clone();
        meta.round = 1;
        meta.status = SessionStatus::Running;
        ctx.apply(Inbound::Meta(Some(meta)));

        let state = ctx.render_state();
        assert_eq!(state.round, 1);
        assert_eq!(
            state
                .entities
                .iter()
                .filter(|e| matches!(e, Entity::Hostile(_)))
                .count(),
            1
        );
    }

    #[test]
    fn when_a_combat_only_record_reappears_then_the_host_prunes_it_once() {
        let mut ctx = context(1, 1, 1);
        let leftover = ParticipantRecord {
            combat: Some(CombatState::new(100)),
            ..ParticipantRecord::default()
        };
        ctx.apply(Inbound::Participants(BTreeMap::from([(5, leftover.clone())])));
        let prunes = |outputs: &[FrameOutput]| {
            outputs
                .iter()
                .flat_map(|o| o.lifecycle.iter())
                .filter(|w| matches!(w, LifecycleWrite::PruneParticipant { participant_id: 5 }))
                .count()
        };
        assert_eq!(prunes(&run_frames(&mut ctx, 3, 0)), 1);

        ctx.apply(Inbound::Participants(BTreeMap::new()));
        assert_eq!(prunes(&run_frames(&mut ctx, 1, 0)), 0);
        ctx.apply(Inbound::Participants(BTreeMap::from([(5, leftover)])));
        assert_eq!(prunes(&run_frames(&mut ctx, 1, 0)), 1);
    }

    #[test]
    fn when_a_guest_sees_an_orphan_then_it_leaves_it_to_the_host() {
        let mut ctx = context(2, 2, 1);
        let leftover = ParticipantRecord {
            combat: Some(CombatState::new(100)),
            ..ParticipantRecord::default()
        };
        ctx.apply(Inbound::Participants(BTreeMap::from([
            (1, record(1, true, 0)),
            (5, leftover),
        ])));
        assert!(run_frames(&mut ctx, 2, 0).iter().all(|o| o.lifecycle.is_empty()));
    }

    #[test]
    fn when_status_echo_is_stale_then_host_keeps_its_own_status() {
        let mut ctx = context(1, 1, 1);
        let stale = ctx.meta().clone();
        ctx.start().unwrap();
        ctx.apply(Inbound::Meta(Some(stale)));
        assert_eq!(ctx.meta().status, SessionStatus::Countdown);
    }

    #[test]
    fn when_host_record_carries_local_combat_then_it_overwrites_local_state() {
        let mut ctx = context(2, 2, 1);
        let mut own = record(2, true, 0);
        let mut hurt = CombatState::new(100);
        hurt.apply_damage(40, 0, 0);
        own.combat = Some(hurt);
        ctx.apply(Inbound::Participants(BTreeMap::from([
            (1, record(1, true, 0)),
            (2, own),
        ])));
        assert_eq!(ctx.local().combat.health, 60);
    }
}

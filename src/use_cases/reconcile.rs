// Local read-only mirror of state authored elsewhere.

use crate::domain::systems::movement::sanitize_position;
use crate::domain::tuning::GameTuning;
use crate::domain::{CombatState, Participant, ParticipantId, WorldSnapshot};
use crate::use_cases::types::ParticipantRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct RemoteView {
    // Latest published position is the interpolation target.
    participant: Participant,
    render_x: f32,
    render_y: f32,
}

#[derive(Debug)]
pub struct Mirror {
    local_id: ParticipantId,
    world: Arc<WorldSnapshot>,
    remotes: BTreeMap<ParticipantId, RemoteView>,
    stale: BTreeSet<ParticipantId>,
    // Records holding nothing but a combat entry, left behind after a leave.
    orphans: BTreeSet<ParticipantId>,
    votes: BTreeSet<ParticipantId>,
}

impl Mirror {
    pub fn new(local_id: ParticipantId, round: u64) -> Self {
        Self {
            local_id,
            world: Arc::new(WorldSnapshot::empty(round)),
            remotes: BTreeMap::new(),
            stale: BTreeSet::new(),
            orphans: BTreeSet::new(),
            votes: BTreeSet::new(),
        }
    }

    pub fn world(&self) -> Arc<WorldSnapshot> {
        Arc::clone(&self.world)
    }

    /// Replaces the whole mirrored world. Older rounds and repeats are ignored.
    pub fn apply_snapshot(&mut self, snapshot: WorldSnapshot) -> bool {
        if snapshot.round < self.world.round {
            debug!(
                round = snapshot.round,
                current_round = self.world.round,
                "ignoring snapshot from an older round"
            );
            return false;
        }
        if *self.world == snapshot {
            return false;
        }
        self.world = Arc::new(snapshot);
        true
    }

    /// Clears a world left over from an earlier round.
    ///
    /// A snapshot already at `round` or later stays; it may have arrived before the meta
    /// change that announced the round.
    pub fn reset_world(&mut self, round: u64) {
        if self.world.round >= round {
            return;
        }
        self.world = Arc::new(WorldSnapshot::empty(round));
    }

    /// Rebuilds the remote roster from store records and hands back the local record.
    ///
    /// Records without both a profile and an input record are ghosts and are dropped.
    pub fn apply_participants(
        &mut self,
        records: BTreeMap<ParticipantId, ParticipantRecord>,
        tuning: &GameTuning,
    ) -> Option<ParticipantRecord> {
        let mut local = None;
        let mut next = BTreeMap::new();
        self.orphans.clear();

        for (id, record) in records {
            if id == self.local_id {
                local = Some(record);
                continue;
            }
            if record.profile.is_none() && record.input.is_none() && record.combat.is_some() {
                self.orphans.insert(id);
                continue;
            }
            let (Some(profile), Some(input)) = (record.profile, record.input) else {
                debug!(participant_id = id, "ignoring incomplete participant record");
                continue;
            };

            let previous = self.remotes.remove(&id);
            let last = previous
                .as_ref()
                .map(|v| (v.participant.x, v.participant.y))
                .unwrap_or_default();
            let (x, y) = sanitize_position((input.x, input.y), last, tuning);
            let combat = match (record.combat, &previous) {
                (Some(mut combat), _) => {
                    combat.clamp();
                    combat
                }
                (None, Some(view)) => view.participant.combat.clone(),
                (None, None) => CombatState::new(tuning.player.max_health),
            };
            // First sighting snaps; afterwards the rendered position eases toward the target.
            let (render_x, render_y) = previous
                .as_ref()
                .map(|v| (v.render_x, v.render_y))
                .unwrap_or((x, y));

            next.insert(
                id,
                RemoteView {
                    participant: Participant {
                        id,
                        display_name: profile.display_name,
                        joined_seq: profile.joined_seq,
                        ready: profile.ready,
                        x,
                        y,
                        combat,
                        last_seen_ms: input.last_seen_ms,
                        fire_ts: input.fire_ts,
                    },
                    render_x,
                    render_y,
                },
            );
        }

        self.remotes = next;
        self.stale.retain(|id| self.remotes.contains_key(id));
        local
    }

    /// Moves rendered remote positions toward their targets by `factor`.
    pub fn interpolate(&mut self, factor: f32) {
        let factor = factor.clamp(0.0, 1.0);
        for view in self.remotes.values_mut() {
            view.render_x += (view.participant.x - view.render_x) * factor;
            view.render_y += (view.participant.y - view.render_y) * factor;
        }
    }

    /// Recomputes which remotes have gone quiet; logs transitions.
    pub fn refresh_liveness(&mut self, now_ms: u64, tuning: &GameTuning) {
        for (id, view) in &self.remotes {
            let quiet = now_ms.saturating_sub(view.participant.last_seen_ms) > tuning.player.stale_after_ms;
            if quiet && self.stale.insert(*id) {
                debug!(participant_id = id, last_seen_ms = view.participant.last_seen_ms, "participant went stale");
            } else if !quiet && self.stale.remove(id) {
                debug!(participant_id = id, "participant is live again");
            }
        }
    }

    /// Remote participants that are neither ghosts nor stale.
    pub fn live_remotes(&self) -> impl Iterator<Item = &Participant> {
        self.remotes
            .iter()
            .filter(|(id, _)| !self.stale.contains(*id))
            .map(|(_, view)| &view.participant)
    }

    /// Live remotes at their rendered (interpolated) position.
    pub fn rendered_remotes(&self) -> impl Iterator<Item = Participant> + '_ {
        self.remotes
            .iter()
            .filter(|(id, _)| !self.stale.contains(*id))
            .map(|(_, view)| Participant {
                x: view.render_x,
                y: view.render_y,
                ..view.participant.clone()
            })
    }

    pub fn orphans(&self) -> &BTreeSet<ParticipantId> {
        &self.orphans
    }

    pub fn set_combat(&mut self, id: ParticipantId, combat: CombatState) {
        if let Some(view) = self.remotes.get_mut(&id) {
            view.participant.combat = combat;
        }
    }

    pub fn apply_votes(&mut self, votes: BTreeSet<ParticipantId>) {
        self.votes = votes;
    }

    pub fn votes(&self) -> &BTreeSet<ParticipantId> {
        &self.votes
    }
}

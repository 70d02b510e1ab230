// Store key layout and wire DTOs for everything written to the shared store.
//
// Every path has exactly one writer: the participant for its profile, input and votes,
// the host for meta status, world and combat records.

use crate::domain::lifecycle::{EndReason, SessionMeta, SessionStatus};
use crate::domain::{
    CombatState, HostileEntity, HostileTier, KillCounters, Participant, ParticipantId, Pickup,
    PickupKind, Projectile, WorldSnapshot,
};
use crate::use_cases::types::{
    Inbound, InputPayload, InputRecord, LifecycleWrite, ParticipantRecord, Profile, WorldPayload,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

pub fn session_path(session_id: &str) -> String {
    format!("sessions/{session_id}")
}

pub fn meta_path(session_id: &str) -> String {
    format!("sessions/{session_id}/meta")
}

pub fn join_counter_path(session_id: &str) -> String {
    format!("sessions/{session_id}/meta/join_counter")
}

pub fn participants_path(session_id: &str) -> String {
    format!("sessions/{session_id}/participants")
}

pub fn participant_path(session_id: &str, participant_id: ParticipantId) -> String {
    format!("sessions/{session_id}/participants/{participant_id}")
}

pub fn input_path(session_id: &str, participant_id: ParticipantId) -> String {
    format!("sessions/{session_id}/participants/{participant_id}/input")
}

pub fn world_path(session_id: &str) -> String {
    format!("sessions/{session_id}/world")
}

pub fn votes_path(session_id: &str) -> String {
    format!("sessions/{session_id}/votes")
}

pub fn terminate_path(session_id: &str) -> String {
    format!("sessions/{session_id}/terminate")
}

/// Session meta as stored under `meta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaDto {
    pub host_id: ParticipantId,
    pub status: SessionStatus,
    pub seed: u64,
    #[serde(default)]
    pub round: u64,
    #[serde(default)]
    pub countdown: u32,
    #[serde(default)]
    pub join_counter: u64,
    #[serde(default)]
    pub end_reason: Option<EndReason>,
}

impl MetaDto {
    pub fn into_meta(self, session_id: &str) -> SessionMeta {
        SessionMeta {
            session_id: session_id.to_string(),
            host_id: self.host_id,
            status: self.status,
            seed: self.seed,
            round: self.round,
            countdown: self.countdown,
            join_counter: self.join_counter,
            end_reason: self.end_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDto {
    pub display_name: String,
    pub joined_seq: u64,
    #[serde(default)]
    pub ready: bool,
}

impl From<ProfileDto> for Profile {
    fn from(dto: ProfileDto) -> Self {
        Self {
            display_name: dto.display_name,
            joined_seq: dto.joined_seq,
            ready: dto.ready,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDto {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub fire_ts: u64,
    #[serde(default)]
    pub last_seen_ms: u64,
}

impl From<InputDto> for InputRecord {
    fn from(dto: InputDto) -> Self {
        Self {
            x: dto.x,
            y: dto.y,
            fire_ts: dto.fire_ts,
            last_seen_ms: dto.last_seen_ms,
        }
    }
}

impl From<&InputRecord> for InputDto {
    fn from(record: &InputRecord) -> Self {
        Self {
            x: record.x,
            y: record.y,
            fire_ts: record.fire_ts,
            last_seen_ms: record.last_seen_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatDto {
    pub health: i32,
    pub max_health: i32,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub kills: KillCounters,
    pub alive: bool,
    #[serde(default)]
    pub invulnerable_until_ms: u64,
    #[serde(default)]
    pub speed_until_ms: u64,
    #[serde(default)]
    pub triple_shot_until_ms: u64,
}

impl From<&CombatState> for CombatDto {
    fn from(combat: &CombatState) -> Self {
        Self {
            health: combat.health,
            max_health: combat.max_health,
            score: combat.score,
            kills: combat.kills,
            alive: combat.alive,
            invulnerable_until_ms: combat.invulnerable_until_ms,
            speed_until_ms: combat.speed_until_ms,
            triple_shot_until_ms: combat.triple_shot_until_ms,
        }
    }
}

impl From<CombatDto> for CombatState {
    fn from(dto: CombatDto) -> Self {
        let mut combat = Self {
            health: dto.health,
            max_health: dto.max_health,
            score: dto.score,
            kills: dto.kills,
            alive: dto.alive,
            invulnerable_until_ms: dto.invulnerable_until_ms,
            speed_until_ms: dto.speed_until_ms,
            triple_shot_until_ms: dto.triple_shot_until_ms,
        };
        combat.clamp();
        combat
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantDto {
    #[serde(default)]
    pub profile: Option<ProfileDto>,
    #[serde(default)]
    pub input: Option<InputDto>,
    #[serde(default)]
    pub combat: Option<CombatDto>,
}

impl From<ParticipantDto> for ParticipantRecord {
    fn from(dto: ParticipantDto) -> Self {
        Self {
            profile: dto.profile.map(Profile::from),
            input: dto.input.map(InputRecord::from),
            combat: dto.combat.map(CombatState::from),
        }
    }
}

/// Tagged non-player entity on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityDto {
    Hostile {
        id: u64,
        tier: HostileTier,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        hit_points: i32,
        #[serde(default)]
        spawned_at_ms: u64,
    },
    Projectile {
        id: u64,
        owner_id: ParticipantId,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        damage: i32,
        ttl: f32,
    },
    Pickup {
        id: u64,
        pickup: PickupKind,
        x: f32,
        y: f32,
        vy: f32,
    },
}

/// Complete world snapshot as published by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldDto {
    pub round: u64,
    pub tick: u64,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(default)]
    pub spawn_counter: u64,
    #[serde(default)]
    pub next_entity_id: u64,
    #[serde(default)]
    pub team_score: i64,
    #[serde(default)]
    pub freeze_until_ms: u64,
    #[serde(default)]
    pub entities: Vec<EntityDto>,
}

impl From<&WorldSnapshot> for WorldDto {
    fn from(world: &WorldSnapshot) -> Self {
        let hostiles = world.hostiles.iter().map(|h| EntityDto::Hostile {
            id: h.id,
            tier: h.tier,
            x: h.x,
            y: h.y,
            vx: h.vx,
            vy: h.vy,
            hit_points: h.hit_points,
            spawned_at_ms: h.spawned_at_ms,
        });
        let projectiles = world.projectiles.iter().map(|p| EntityDto::Projectile {
            id: p.id,
            owner_id: p.owner_id,
            x: p.x,
            y: p.y,
            vx: p.vx,
            vy: p.vy,
            damage: p.damage,
            ttl: p.ttl,
        });
        let pickups = world.pickups.iter().map(|p| EntityDto::Pickup {
            id: p.id,
            pickup: p.kind,
            x: p.x,
            y: p.y,
            vy: p.vy,
        });

        Self {
            round: world.round,
            tick: world.tick,
            elapsed_ms: world.elapsed_ms,
            spawn_counter: world.spawn_counter,
            next_entity_id: world.next_entity_id,
            team_score: world.team_score,
            freeze_until_ms: world.freeze_until_ms,
            entities: hostiles.chain(projectiles).chain(pickups).collect(),
        }
    }
}

impl From<WorldDto> for WorldSnapshot {
    fn from(dto: WorldDto) -> Self {
        let mut world = WorldSnapshot {
            round: dto.round,
            tick: dto.tick,
            elapsed_ms: dto.elapsed_ms,
            spawn_counter: dto.spawn_counter,
            next_entity_id: dto.next_entity_id,
            team_score: dto.team_score,
            freeze_until_ms: dto.freeze_until_ms,
            ..WorldSnapshot::default()
        };
        for entity in dto.entities {
            match entity {
                EntityDto::Hostile {
                    id,
                    tier,
                    x,
                    y,
                    vx,
                    vy,
                    hit_points,
                    spawned_at_ms,
                } => world.hostiles.push(HostileEntity {
                    id,
                    tier,
                    x,
                    y,
                    vx,
                    vy,
                    hit_points,
                    spawned_at_ms,
                }),
                EntityDto::Projectile {
                    id,
                    owner_id,
                    x,
                    y,
                    vx,
                    vy,
                    damage,
                    ttl,
                } => world.projectiles.push(Projectile {
                    id,
                    owner_id,
                    x,
                    y,
                    vx,
                    vy,
                    damage,
                    ttl,
                }),
                EntityDto::Pickup {
                    id,
                    pickup,
                    x,
                    y,
                    vy,
                } => world.pickups.push(Pickup {
                    id,
                    kind: pickup,
                    x,
                    y,
                    vy,
                }),
            }
        }
        // Ids handed out next must stay above everything already in the world.
        let highest = world.entities().map(|e| e.id()).max().unwrap_or(0);
        world.next_entity_id = world.next_entity_id.max(highest + 1);
        world
    }
}

/// Store subscriptions a session task follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Meta,
    Participants,
    World,
    Votes,
    Terminate,
}

impl Feed {
    pub const ALL: [Feed; 5] = [
        Feed::Meta,
        Feed::Participants,
        Feed::World,
        Feed::Votes,
        Feed::Terminate,
    ];

    pub fn path(self, session_id: &str) -> String {
        match self {
            Feed::Meta => meta_path(session_id),
            Feed::Participants => participants_path(session_id),
            Feed::World => world_path(session_id),
            Feed::Votes => votes_path(session_id),
            Feed::Terminate => terminate_path(session_id),
        }
    }

    pub fn decode(self, session_id: &str, value: Option<Value>) -> Result<Inbound, serde_json::Error> {
        match self {
            Feed::Meta => decode_meta(session_id, value).map(Inbound::Meta),
            Feed::Participants => Ok(Inbound::Participants(decode_participants(value))),
            Feed::World => value
                .map(serde_json::from_value::<WorldDto>)
                .transpose()
                .map(|dto| Inbound::World(dto.map(WorldSnapshot::from))),
            Feed::Votes => Ok(Inbound::Votes(decode_votes(value))),
            Feed::Terminate => Ok(Inbound::Terminate(
                value.as_ref().and_then(Value::as_bool).unwrap_or(false),
            )),
        }
    }
}

pub fn decode_meta(
    session_id: &str,
    value: Option<Value>,
) -> Result<Option<SessionMeta>, serde_json::Error> {
    value
        .map(serde_json::from_value::<MetaDto>)
        .transpose()
        .map(|dto| dto.map(|dto| dto.into_meta(session_id)))
}

/// Decodes each participant entry on its own; broken entries are skipped.
pub fn decode_participants(value: Option<Value>) -> BTreeMap<ParticipantId, ParticipantRecord> {
    let Some(Value::Object(entries)) = value else {
        return BTreeMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(key, entry)| {
            let id = key.parse::<ParticipantId>().ok()?;
            match serde_json::from_value::<ParticipantDto>(entry) {
                Ok(dto) => Some((id, ParticipantRecord::from(dto))),
                Err(err) => {
                    warn!(participant_id = id, error = %err, "skipping undecodable participant");
                    None
                }
            }
        })
        .collect()
}

pub fn decode_votes(value: Option<Value>) -> BTreeSet<ParticipantId> {
    let Some(Value::Object(entries)) = value else {
        return BTreeSet::new();
    };
    entries
        .into_iter()
        .filter(|(_, vote)| vote.as_bool().unwrap_or(false))
        .filter_map(|(key, _)| key.parse().ok())
        .collect()
}

/// Participants that completed a join (have a profile).
pub fn joined_participants(value: Option<Value>) -> Vec<Participant> {
    decode_participants(value)
        .into_iter()
        .filter_map(|(id, record)| {
            let profile = record.profile?;
            let input = record.input.unwrap_or(InputRecord {
                x: 0.0,
                y: 0.0,
                fire_ts: 0,
                last_seen_ms: 0,
            });
            Some(Participant {
                id,
                display_name: profile.display_name,
                joined_seq: profile.joined_seq,
                ready: profile.ready,
                x: input.x,
                y: input.y,
                combat: record.combat.unwrap_or_else(|| CombatState::new(1)),
                last_seen_ms: input.last_seen_ms,
                fire_ts: input.fire_ts,
            })
        })
        .collect()
}

/// Joined participants whose heartbeat is at most `stale_after_ms` old at `now_ms`.
///
/// Participants that crashed without leaving drop out once they go quiet.
pub fn live_participants(value: Option<Value>, now_ms: u64, stale_after_ms: u64) -> Vec<Participant> {
    joined_participants(value)
        .into_iter()
        .filter(|p| now_ms.saturating_sub(p.last_seen_ms) <= stale_after_ms)
        .collect()
}

fn to_value<T: Serialize>(dto: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(dto)
}

/// Fields written under the session root when a session is created.
///
/// `join_counter` is left alone; it is only ever incremented.
pub fn create_session_fields(meta: &SessionMeta) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("meta/host_id".into(), Value::from(meta.host_id));
    fields.insert("meta/seed".into(), Value::from(meta.seed));
    insert_status(&mut fields, meta.status, meta.countdown, meta.round, meta.end_reason);
    fields
}

/// A participant's own record, written once on join.
pub fn join_fields(
    participant: &Participant,
    now_ms: u64,
) -> Result<Map<String, Value>, serde_json::Error> {
    let prefix = format!("participants/{}", participant.id);
    let mut fields = Map::new();
    fields.insert(
        format!("{prefix}/profile"),
        to_value(&ProfileDto {
            display_name: participant.display_name.clone(),
            joined_seq: participant.joined_seq,
            ready: participant.ready,
        })?,
    );
    fields.insert(
        format!("{prefix}/input"),
        to_value(&InputDto {
            x: participant.x,
            y: participant.y,
            fire_ts: participant.fire_ts,
            last_seen_ms: now_ms,
        })?,
    );
    fields.insert(
        format!("{prefix}/combat"),
        to_value(&CombatDto::from(&participant.combat))?,
    );
    Ok(fields)
}

pub fn input_value(payload: &InputPayload) -> Result<Value, serde_json::Error> {
    to_value(&InputDto::from(&payload.record))
}

/// World snapshot plus every combat record, relative to the session root.
pub fn world_fields(payload: &WorldPayload) -> Result<Map<String, Value>, serde_json::Error> {
    let mut fields = Map::new();
    fields.insert("world".into(), to_value(&WorldDto::from(&payload.snapshot))?);
    for (id, combat) in &payload.combat {
        fields.insert(
            format!("participants/{id}/combat"),
            to_value(&CombatDto::from(combat))?,
        );
    }
    Ok(fields)
}

fn insert_status(
    fields: &mut Map<String, Value>,
    status: SessionStatus,
    countdown: u32,
    round: u64,
    end_reason: Option<EndReason>,
) {
    let status = serde_json::to_value(status).unwrap_or(Value::Null);
    let end_reason = end_reason
        .and_then(|reason| serde_json::to_value(reason).ok())
        .unwrap_or(Value::Null);
    fields.insert("meta/status".into(), status);
    fields.insert("meta/countdown".into(), Value::from(countdown));
    fields.insert("meta/round".into(), Value::from(round));
    fields.insert("meta/end_reason".into(), end_reason);
}

/// Lifecycle write as a multi-path update relative to the session root.
pub fn lifecycle_fields(write: &LifecycleWrite) -> Result<Map<String, Value>, serde_json::Error> {
    let mut fields = Map::new();
    match write {
        LifecycleWrite::Status {
            status,
            countdown,
            round,
            end_reason,
        } => insert_status(&mut fields, *status, *countdown, *round, *end_reason),
        LifecycleWrite::HostHandoff { host_id } => {
            fields.insert("meta/host_id".into(), Value::from(*host_id));
        }
        LifecycleWrite::Ready {
            participant_id,
            ready,
        } => {
            fields.insert(
                format!("participants/{participant_id}/profile/ready"),
                Value::Bool(*ready),
            );
        }
        LifecycleWrite::Vote { participant_id } => {
            fields.insert(format!("votes/{participant_id}"), Value::Bool(true));
        }
        LifecycleWrite::Terminate => {
            fields.insert("terminate".into(), Value::Bool(true));
        }
        LifecycleWrite::PruneParticipant { participant_id } => {
            fields.insert(format!("participants/{participant_id}"), Value::Null);
        }
        LifecycleWrite::ResetRound {
            status,
            round,
            countdown,
            combat,
        } => {
            insert_status(&mut fields, *status, *countdown, *round, None);
            fields.insert("world".into(), Value::Null);
            fields.insert("votes".into(), Value::Null);
            fields.insert("terminate".into(), Value::Null);
            for (id, record) in combat {
                fields.insert(
                    format!("participants/{id}/combat"),
                    to_value(&CombatDto::from(record))?,
                );
            }
        }
    }
    Ok(fields)
}

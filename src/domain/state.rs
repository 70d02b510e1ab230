// Domain-level simulation entities, combat state and snapshot types.

use serde::{Deserialize, Serialize};

pub type ParticipantId = u64;
pub type EntityId = u64;

/// Axis-aligned box in world pixels (top-left origin, +Y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Strict overlap; touching edges do not collide.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.y < other.y + other.h
            && self.y + self.h > other.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostileTier {
    Small,
    Medium,
    Large,
    Boss,
}

impl HostileTier {
    pub const ALL: [HostileTier; 4] = [
        HostileTier::Small,
        HostileTier::Medium,
        HostileTier::Large,
        HostileTier::Boss,
    ];
}

/// Per-tier kill counters credited by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillCounters {
    #[serde(default)]
    pub small: u32,
    #[serde(default)]
    pub medium: u32,
    #[serde(default)]
    pub large: u32,
    #[serde(default)]
    pub boss: u32,
}

impl KillCounters {
    pub fn record(&mut self, tier: HostileTier) {
        let slot = match tier {
            HostileTier::Small => &mut self.small,
            HostileTier::Medium => &mut self.medium,
            HostileTier::Large => &mut self.large,
            HostileTier::Boss => &mut self.boss,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn get(&self, tier: HostileTier) -> u32 {
        match tier {
            HostileTier::Small => self.small,
            HostileTier::Medium => self.medium,
            HostileTier::Large => self.large,
            HostileTier::Boss => self.boss,
        }
    }

    pub fn total(&self) -> u32 {
        self.small + self.medium + self.large + self.boss
    }
}

/// Polled input flags supplied by the hosting application every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFlags {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub fire: bool,
}

/// Host-owned outcome of world simulation for one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatState {
    pub health: i32,
    pub max_health: i32,
    pub score: i64,
    pub kills: KillCounters,
    pub alive: bool,
    // Timers below are simulation time (round elapsed ms).
    pub invulnerable_until_ms: u64,
    pub speed_until_ms: u64,
    pub triple_shot_until_ms: u64,
}

impl CombatState {
    pub fn new(max_health: i32) -> Self {
        let max_health = max_health.max(1);
        Self {
            health: max_health,
            max_health,
            score: 0,
            kills: KillCounters::default(),
            alive: true,
            invulnerable_until_ms: 0,
            speed_until_ms: 0,
            triple_shot_until_ms: 0,
        }
    }

    pub fn is_invulnerable(&self, now_ms: u64) -> bool {
        now_ms < self.invulnerable_until_ms
    }

    /// Applies contact damage and restarts the invulnerability window.
    ///
    /// Returns `false` when the participant is dead or still invulnerable, in which case
    /// nothing changes.
    pub fn apply_damage(&mut self, amount: i32, now_ms: u64, invulnerability_ms: u64) -> bool {
        if !self.alive || self.is_invulnerable(now_ms) {
            return false;
        }

        self.health = (self.health - amount.max(0)).clamp(0, self.max_health);
        self.invulnerable_until_ms = now_ms + invulnerability_ms;
        if self.health == 0 {
            self.alive = false;
        }
        true
    }

    /// Explicit heal event; the dead stay dead.
    pub fn heal(&mut self, amount: i32) {
        if !self.alive {
            return;
        }
        self.health = (self.health + amount.max(0)).min(self.max_health);
    }

    pub fn extend_invulnerability(&mut self, now_ms: u64, extra_ms: u64) {
        self.invulnerable_until_ms = self.invulnerable_until_ms.max(now_ms) + extra_ms;
    }

    pub fn has_speed(&self, now_ms: u64) -> bool {
        now_ms < self.speed_until_ms
    }

    pub fn has_triple_shot(&self, now_ms: u64) -> bool {
        now_ms < self.triple_shot_until_ms
    }

    /// Starts (or restarts) a timed boost. A new boost replaces the running one.
    pub fn grant_boost(&mut self, kind: PickupKind, now_ms: u64, duration_ms: u64) {
        let until = now_ms + duration_ms;
        match kind {
            PickupKind::Speed => {
                self.speed_until_ms = until;
                self.triple_shot_until_ms = 0;
            }
            PickupKind::TripleShot => {
                self.triple_shot_until_ms = until;
                self.speed_until_ms = 0;
            }
            PickupKind::Heal | PickupKind::Shield | PickupKind::Freeze => {}
        }
    }

    pub fn credit_kill(&mut self, tier: HostileTier, value: i64) {
        self.score += value;
        self.kills.record(tier);
    }

    /// Clamps values received from elsewhere back into the valid range.
    pub fn clamp(&mut self) {
        self.max_health = self.max_health.max(1);
        self.health = self.health.clamp(0, self.max_health);
        if self.health == 0 {
            self.alive = false;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub joined_seq: u64,
    pub ready: bool,
    pub x: f32,
    pub y: f32,
    pub combat: CombatState,
    // Wall-clock heartbeat from the participant's own input loop.
    pub last_seen_ms: u64,
    // Latest published fire-intent timestamp (0 = never fired).
    pub fire_ts: u64,
}

impl Participant {
    pub fn bounds(&self, width: f32, height: f32) -> Aabb {
        Aabb::new(self.x, self.y, width, height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostileEntity {
    pub id: EntityId,
    pub tier: HostileTier,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub hit_points: i32,
    pub spawned_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: EntityId,
    pub owner_id: ParticipantId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub damage: i32,
    // Remaining lifetime in seconds.
    pub ttl: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupKind {
    Heal,
    Shield,
    /// Faster movement for a while.
    Speed,
    /// Each fire intent becomes a three-way spread.
    TripleShot,
    /// Stops every hostile for a while.
    Freeze,
}

impl PickupKind {
    pub const ALL: [PickupKind; 5] = [
        PickupKind::Speed,
        PickupKind::TripleShot,
        PickupKind::Shield,
        PickupKind::Freeze,
        PickupKind::Heal,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pickup {
    pub id: EntityId,
    pub kind: PickupKind,
    pub x: f32,
    pub y: f32,
    pub vy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Hostile,
    Projectile,
    Pickup,
}

/// Tagged entity used by render state; each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Player(Participant),
    Hostile(HostileEntity),
    Projectile(Projectile),
    Pickup(Pickup),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Player(_) => EntityKind::Player,
            Entity::Hostile(_) => EntityKind::Hostile,
            Entity::Projectile(_) => EntityKind::Projectile,
            Entity::Pickup(_) => EntityKind::Pickup,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Entity::Player(p) => p.id,
            Entity::Hostile(h) => h.id,
            Entity::Projectile(p) => p.id,
            Entity::Pickup(p) => p.id,
        }
    }

    pub fn position(&self) -> (f32, f32) {
        match self {
            Entity::Player(p) => (p.x, p.y),
            Entity::Hostile(h) => (h.x, h.y),
            Entity::Projectile(p) => (p.x, p.y),
            Entity::Pickup(p) => (p.x, p.y),
        }
    }
}

/// Complete (never incremental) authoritative world roster for one host tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub round: u64,
    pub tick: u64,
    pub elapsed_ms: u64,
    pub spawn_counter: u64,
    pub next_entity_id: EntityId,
    pub team_score: i64,
    // Hostiles hold still until this round time.
    pub freeze_until_ms: u64,
    pub hostiles: Vec<HostileEntity>,
    pub projectiles: Vec<Projectile>,
    pub pickups: Vec<Pickup>,
}

impl WorldSnapshot {
    pub fn empty(round: u64) -> Self {
        Self {
            round,
            next_entity_id: 1,
            ..Self::default()
        }
    }

    pub fn hostiles_frozen(&self) -> bool {
        self.elapsed_ms < self.freeze_until_ms
    }

    /// Non-player entities in a stable order (hostiles, projectiles, pickups).
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.hostiles
            .iter()
            .cloned()
            .map(Entity::Hostile)
            .chain(self.projectiles.iter().cloned().map(Entity::Projectile))
            .chain(self.pickups.iter().cloned().map(Entity::Pickup))
    }
}

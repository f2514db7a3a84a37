//! Core entity data for the simulation.
//!
//! Agents are plain structs rather than a full ECS: the roster is
//! small (a player, three teammates, a few dozen enemies) and every
//! controller touches most fields anyway. Storage is an id-keyed map
//! iterated in sorted order for determinism.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::constants::{
    AGENT_SIZE, PLAYER_MOVEMENT_HISTORY_LEN, PLAYER_STATIONARY_THRESHOLD_TICKS,
};
use crate::math::{fixed_serde, Fixed, Rect, Vec2Fixed};
use crate::variants::EnemyVariant;

/// Unique identifier for agents, bullets, and intel items.
pub type EntityId = u64;

/// Hands out unique entity ids.
///
/// Owned by the simulation state and threaded into spawn paths, so
/// replays allocate identical ids in identical order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: EntityId,
}

impl IdAllocator {
    /// Start allocating from 1; 0 is reserved as "never a real id".
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id.
    pub fn alloc(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Which side of the fight an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Player and teammates.
    Friendly,
    /// Enemy soldiers and bosses.
    Hostile,
}

impl Side {
    /// The opposing side.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Friendly => Self::Hostile,
            Self::Hostile => Self::Friendly,
        }
    }
}

/// Controller category for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// The one input-driven agent.
    Player,
    /// Allied AI following the player.
    Teammate,
    /// Hostile AI, squad-bound or independent.
    Enemy,
}

impl AgentKind {
    /// Side this kind fights for.
    #[must_use]
    pub const fn side(self) -> Side {
        match self {
            Self::Player | Self::Teammate => Side::Friendly,
            Self::Enemy => Side::Hostile,
        }
    }
}

/// Hit points with a hard floor at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Dead when health reaches zero.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Apply damage; health never goes below zero or above its
    /// previous value. Returns the damage actually dealt.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }
}

/// Cached pathfinding result: smoothed tile-center waypoints plus a
/// cursor into them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathCache {
    /// Waypoints in travel order.
    pub nodes: Vec<Vec2Fixed>,
    /// Index of the waypoint currently being approached.
    pub cursor: usize,
}

impl PathCache {
    /// Whether the cursor still points at an unvisited node.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.cursor < self.nodes.len()
    }
}

/// Per-agent evasive-maneuver state.
///
/// Set when a bullet hit wins the dodge roll. While active the agent
/// sprints to `target`, ignoring formation and orders; the pre-evasion
/// order state is parked here so teammates can resume what they were
/// doing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvasionState {
    /// Currently mid-dodge.
    pub active: bool,
    /// Where the dodge is headed.
    pub target: Option<Vec2Fixed>,
    /// Tick of the last dodge trigger, for the cooldown.
    pub last_trigger_tick: u64,
    /// Saved movement target to restore afterwards.
    pub saved_target: Option<Vec2Fixed>,
    /// Saved waypoint queue (teammates only).
    pub saved_waypoints: Option<VecDeque<Vec2Fixed>>,
    /// Saved commanded-move timestamp (teammates only).
    pub saved_commanded_tick: Option<u64>,
}

/// Teammate order state: everything a squad order can set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeammateOrders {
    /// Queued waypoints from shift-clicked move orders.
    pub waypoint_queue: VecDeque<Vec2Fixed>,
    /// Holding position instead of following formation.
    pub holding_position: bool,
    /// The spot being held.
    pub hold_target: Option<Vec2Fixed>,
    /// Tick of the last explicit move order, `None` once satisfied.
    pub commanded_move_tick: Option<u64>,
    /// Smoothed formation target; lerps toward the ideal slot each
    /// tick to keep formation movement from jittering.
    pub formation_anchor: Option<Vec2Fixed>,
}

/// Player-only bookkeeping for formation orientation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Recent normalized movement directions, newest last.
    pub movement_history: VecDeque<Vec2Fixed>,
    /// Consecutive ticks without movement.
    pub stationary_ticks: u32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            movement_history: VecDeque::with_capacity(PLAYER_MOVEMENT_HISTORY_LEN),
            stationary_ticks: 0,
        }
    }
}

impl PlayerState {
    /// Whether the player has been still long enough to count as
    /// stationary for formation purposes.
    #[must_use]
    pub fn is_stationary(&self) -> bool {
        self.stationary_ticks >= PLAYER_STATIONARY_THRESHOLD_TICKS
    }

    /// Record a tick's normalized movement direction.
    pub fn push_direction(&mut self, dir: Vec2Fixed) {
        self.movement_history.push_back(dir);
        while self.movement_history.len() > PLAYER_MOVEMENT_HISTORY_LEN {
            self.movement_history.pop_front();
        }
    }

    /// Normalized average of the recent history, or `fallback` when the
    /// history is too short to smooth over.
    #[must_use]
    pub fn average_direction(&self, fallback: Vec2Fixed, min_len: usize) -> Vec2Fixed {
        if self.movement_history.len() < min_len {
            return fallback;
        }
        let mut sum = Vec2Fixed::ZERO;
        for v in &self.movement_history {
            sum = sum + *v;
        }
        let averaged = sum.normalize();
        if averaged == Vec2Fixed::ZERO {
            fallback
        } else {
            averaged
        }
    }
}

/// One combatant: the player, a teammate, or an enemy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique id.
    pub id: EntityId,
    /// Controller category.
    pub kind: AgentKind,
    /// Enemy variant; `None` for player and teammates.
    pub variant: Option<EnemyVariant>,
    /// Top-left corner in world pixels.
    pub position: Vec2Fixed,
    /// Bounding-box size.
    pub size: Vec2Fixed,
    /// Hit points.
    pub health: Health,
    /// Movement speed in pixels per tick.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Threat-detection radius.
    #[serde(with = "fixed_serde")]
    pub detection_range: Fixed,
    /// Effective fire range.
    #[serde(with = "fixed_serde")]
    pub shoot_range: Fixed,
    /// Tick of the last shot fired.
    pub last_shot_tick: u64,
    /// Tick of the last bullet hit taken.
    pub last_time_hit: u64,
    /// Normalized direction of the last actual displacement; zero when
    /// stationary. Drives shot prediction and formation orientation.
    pub last_movement_vector: Vec2Fixed,
    /// Squad membership for squad-bound enemies.
    pub squad_id: Option<EntityId>,
    /// Sector assignment for patrol selection.
    pub sector_id: Option<u32>,
    /// Marked as a high-value elimination target.
    pub is_hvt: bool,
    /// Entity currently engaged.
    pub target_entity_id: Option<EntityId>,
    /// Point currently being chased (last seen target position).
    pub target_position: Option<Vec2Fixed>,
    /// Current patrol destination.
    pub patrol_target: Option<Vec2Fixed>,
    /// Tick of the last patrol decision.
    pub last_patrol_activity_tick: u64,
    /// Tick of the last successful movement.
    pub last_moved_tick: u64,
    /// Consecutive ticks of failed intended movement.
    pub stuck_counter: u32,
    /// Cached path toward the current destination.
    pub path: Option<PathCache>,
    /// Evasive-maneuver state.
    pub evasion: EvasionState,
    /// Order state; present only on teammates.
    pub orders: Option<TeammateOrders>,
    /// Input bookkeeping; present only on the player.
    pub pilot: Option<PlayerState>,
}

impl Agent {
    /// Bounding rectangle.
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.position, self.size)
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        self.rect().center()
    }

    /// Living agents take part in AI and collision; dead ones are
    /// inert until their roster entry is cleaned up.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.health.is_dead()
    }

    /// Drop the cached path so the next move replans.
    pub fn clear_path(&mut self) {
        self.path = None;
    }

    /// Wipe movement and targeting state; applied on death so a corpse
    /// never keeps steering data.
    pub fn clear_movement_state(&mut self) {
        self.path = None;
        self.target_entity_id = None;
        self.target_position = None;
        self.patrol_target = None;
        if let Some(orders) = self.orders.as_mut() {
            orders.waypoint_queue.clear();
            orders.commanded_move_tick = None;
            orders.formation_anchor = None;
        }
    }

    /// Snapshot used by shooters aiming at this agent.
    #[must_use]
    pub fn target_view(&self) -> TargetView {
        TargetView {
            id: self.id,
            rect: self.rect(),
            health: self.health.current,
            speed: self.speed,
            last_movement_vector: self.last_movement_vector,
        }
    }

    /// Default agent bounding square (0.7 tiles); callers override the
    /// fields they care about.
    #[must_use]
    pub fn base(id: EntityId, kind: AgentKind, position: Vec2Fixed, max_health: u32) -> Self {
        let size = AGENT_SIZE;
        Self {
            id,
            kind,
            variant: None,
            position,
            size: Vec2Fixed::new(size, size),
            health: Health::new(max_health),
            speed: Fixed::ZERO,
            detection_range: Fixed::ZERO,
            shoot_range: Fixed::ZERO,
            last_shot_tick: 0,
            last_time_hit: 0,
            last_movement_vector: Vec2Fixed::ZERO,
            squad_id: None,
            sector_id: None,
            is_hvt: false,
            target_entity_id: None,
            target_position: None,
            patrol_target: None,
            last_patrol_activity_tick: 0,
            last_moved_tick: 0,
            stuck_counter: 0,
            path: None,
            evasion: EvasionState::default(),
            orders: None,
            pilot: None,
        }
    }
}

/// Read-only snapshot of a potential shooting target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetView {
    /// Target id.
    pub id: EntityId,
    /// Target bounding box.
    pub rect: Rect,
    /// Current health.
    pub health: u32,
    /// Movement speed.
    pub speed: Fixed,
    /// Last normalized movement direction.
    pub last_movement_vector: Vec2Fixed,
}

impl TargetView {
    /// Target center point.
    #[must_use]
    pub fn center(&self) -> Vec2Fixed {
        self.rect.center()
    }
}

/// A collectible intel item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelItem {
    /// Unique id.
    pub id: EntityId,
    /// Bounding box.
    pub rect: Rect,
    /// Set once the player has picked it up.
    pub is_collected: bool,
}

/// Storage for all agents, keyed by id.
///
/// Iteration must always go through [`sorted_ids`](Self::sorted_ids)
/// so that HashMap ordering never leaks into simulation results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStorage {
    agents: HashMap<EntityId, Agent>,
}

impl AgentStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Insert an agent under its own id, replacing any previous entry.
    pub fn insert(&mut self, agent: Agent) {
        self.agents.insert(agent.id, agent);
    }

    /// Remove an agent.
    pub fn remove(&mut self, id: EntityId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    /// Look up an agent.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    /// Look up an agent mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Agent> {
        self.agents.get_mut(&id)
    }

    /// Whether an agent exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.agents.contains_key(&id)
    }

    /// Number of stored agents, dead ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// All ids in ascending order, for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.agents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of living agents of one kind, ascending.
    #[must_use]
    pub fn living_ids_of_kind(&self, kind: AgentKind) -> Vec<EntityId> {
        let mut ids: Vec<_> = self
            .agents
            .values()
            .filter(|a| a.kind == kind && a.is_alive())
            .map(|a| a.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Unordered iteration; never use for simulation-visible effects.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }
}

//! The fixed-timestep tick driver.
//!
//! One tick is one full synchronous pass over every agent, squad, and
//! bullet, in a fixed phase order: player movement -> teammate AI ->
//! enemy AI (squads, then independents) -> projectile resolution ->
//! objective checks -> tick-gated population control. Later phases see
//! the already-updated positions of earlier ones; there is no snapshot
//! isolation and no concurrency, which is exactly what makes the
//! simulation deterministic and replayable.
//!
//! # Determinism
//!
//! - No floating point (fixed-point via [`Fixed`](crate::math::Fixed))
//! - No system randomness (one seeded [`GameRng`])
//! - Sorted-id iteration everywhere
//! - Same seed + same per-tick inputs = identical state hashes
//!
//! # Example
//!
//! ```
//! use firefight_core::config::SimConfig;
//! use firefight_core::simulation::{PlayerInput, Simulation};
//! use firefight_core::tilemap::{TileKind, TileMap};
//!
//! let mut map = TileMap::filled(60, 60, TileKind::Grass);
//! map.seal_border();
//!
//! let mut sim = Simulation::new(map, SimConfig::default(), 42);
//! let events = sim.tick(&PlayerInput::default());
//! assert_eq!(sim.current_tick(), 1);
//! # let _ = events;
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::collision::ObstacleSet;
use crate::components::{
    Agent, AgentKind, AgentStorage, EntityId, IdAllocator, IntelItem, TargetView,
};
use crate::config::SimConfig;
use crate::constants::PLAYER_MOVEMENT_HISTORY_MIN;
use crate::error::{GameError, Result};
use crate::events::TickEvents;
use crate::math::{Rect, Vec2Fixed};
use crate::objectives::{collect_intel, update_objectives, Objective};
use crate::player::{player_shoot, update_player_movement, MoveIntent};
use crate::projectile::{update_bullets, Bullet};
use crate::rng::GameRng;
use crate::sector::{sectors_for_map, Sector};
use crate::spawn::{dynamic_population_pass, initialize_world, respawn_pass};
use crate::squad::{update_squads, AlertState, EnemyPhase, FormationShape, Squad};
use crate::teammate::{
    apply_defend_order, apply_move_order, apply_recall, update_teammates, PlayerSnapshot,
};
use crate::tilemap::TileMap;

/// A discrete order issued to the teammate squad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SquadOrder {
    /// Send the selected teammates to a point, formation-relative.
    Move {
        /// Teammates the order applies to.
        selected: Vec<EntityId>,
        /// Clicked destination.
        target: Vec2Fixed,
        /// Queue as a waypoint instead of replacing current orders.
        queued: bool,
    },
    /// Distribute all teammates on a defensive ring.
    Defend {
        /// Ring center.
        point: Vec2Fixed,
        /// Ring radius in tiles.
        radius_tiles: u32,
    },
    /// Bring everyone back into formation around the player.
    Recall,
    /// Cycle the formation shape.
    CycleFormation,
}

/// The player's intent for one tick. The core never reads raw device
/// events; the shell translates input into this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerInput {
    /// Movement direction bits.
    pub movement: MoveIntent,
    /// Fire toward a world point this tick.
    pub shoot_at: Option<Vec2Fixed>,
    /// Squad order issued this tick.
    pub order: Option<SquadOrder>,
}

/// The whole simulation state.
///
/// Owns the canonical agent/squad/bullet collections, the map, the
/// seeded RNG, and the id allocator. [`tick`](Self::tick) is the only
/// way time advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    tick: u64,
    map: TileMap,
    config: SimConfig,
    agents: AgentStorage,
    squads: Vec<Squad>,
    bullets: Vec<Bullet>,
    intel: Vec<IntelItem>,
    objectives: Vec<Objective>,
    sectors: Vec<Sector>,
    player_id: EntityId,
    formation_shape: FormationShape,
    alert: AlertState,
    rng: GameRng,
    ids: IdAllocator,
    last_respawn_tick: u64,
    last_spawn_check_tick: u64,
    spawn_exclusion: Option<Rect>,
    game_over: bool,
    game_won: bool,
}

impl Simulation {
    /// Create a simulation with a fully initialized world: player,
    /// teammates, intel, the enemy roster, guardian squads, and
    /// objectives.
    #[must_use]
    pub fn new(map: TileMap, config: SimConfig, seed: u64) -> Self {
        let mut rng = GameRng::from_seed(seed);
        let mut ids = IdAllocator::new();
        let sectors = sectors_for_map(&map);
        let world = initialize_world(&map, &config, &sectors, &mut rng, &mut ids);

        Self {
            tick: 0,
            map,
            config,
            agents: world.agents,
            squads: world.squads,
            bullets: Vec::new(),
            intel: world.intel,
            objectives: world.objectives,
            sectors,
            player_id: world.player_id,
            formation_shape: FormationShape::Diamond,
            alert: AlertState::default(),
            rng,
            ids,
            last_respawn_tick: 0,
            last_spawn_check_tick: 0,
            spawn_exclusion: None,
            game_over: false,
            game_won: false,
        }
    }

    /// Create a simulation with only the player placed, for scenario
    /// tests that insert their own roster.
    #[must_use]
    pub fn bare(map: TileMap, config: SimConfig, seed: u64) -> Self {
        let mut rng = GameRng::from_seed(seed);
        let mut ids = IdAllocator::new();
        let sectors = sectors_for_map(&map);

        let player = crate::spawn::create_player_at_center(&map, &mut ids);
        let player_id = player.id;
        let mut agents = AgentStorage::new();
        agents.insert(player);

        Self {
            tick: 0,
            map,
            config,
            agents,
            squads: Vec::new(),
            bullets: Vec::new(),
            intel: Vec::new(),
            objectives: Vec::new(),
            sectors,
            player_id,
            formation_shape: FormationShape::Diamond,
            alert: AlertState::default(),
            rng,
            ids,
            last_respawn_tick: 0,
            last_spawn_check_tick: 0,
            spawn_exclusion: None,
            game_over: false,
            game_won: false,
        }
    }

    /// Current tick number.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// The map grid.
    #[must_use]
    pub const fn map(&self) -> &TileMap {
        &self.map
    }

    /// All agents.
    #[must_use]
    pub const fn agents(&self) -> &AgentStorage {
        &self.agents
    }

    /// All squads.
    #[must_use]
    pub fn squads(&self) -> &[Squad] {
        &self.squads
    }

    /// Bullets in flight.
    #[must_use]
    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    /// Intel items.
    #[must_use]
    pub fn intel(&self) -> &[IntelItem] {
        &self.intel
    }

    /// Mission objectives.
    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// The player's agent id.
    #[must_use]
    pub const fn player_id(&self) -> EntityId {
        self.player_id
    }

    /// Current teammate formation shape.
    #[must_use]
    pub const fn formation_shape(&self) -> FormationShape {
        self.formation_shape
    }

    /// The player has died.
    #[must_use]
    pub const fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// All objectives completed and extraction reached.
    #[must_use]
    pub const fn is_game_won(&self) -> bool {
        self.game_won
    }

    /// Allot a fresh entity id (for scenario setup).
    pub fn alloc_id(&mut self) -> EntityId {
        self.ids.alloc()
    }

    /// Insert an agent directly (for scenario setup).
    pub fn insert_agent(&mut self, agent: Agent) {
        self.agents.insert(agent);
    }

    /// Insert a squad directly (for scenario setup).
    pub fn insert_squad(&mut self, squad: Squad) {
        self.squads.push(squad);
    }

    /// Rectangle (e.g. the camera viewport) that spawn placement must
    /// avoid. `None` disables the exclusion.
    pub fn set_spawn_exclusion(&mut self, zone: Option<Rect>) {
        self.spawn_exclusion = zone;
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self, input: &PlayerInput) -> TickEvents {
        self.tick += 1;
        let tick = self.tick;
        let mut events = TickEvents::default();
        self.alert.fired_this_tick = false;

        self.apply_order(input, tick);

        // --- Player phase ---
        let mut obstacles = ObstacleSet::snapshot(&self.agents, &self.intel);
        let player_alive = self
            .agents
            .get(self.player_id)
            .is_some_and(Agent::is_alive);
        if player_alive {
            if let Some(player) = self.agents.get_mut(self.player_id) {
                update_player_movement(player, input.movement, &self.map, &obstacles);
                obstacles.update_position(player.id, player.position);

                if let Some(aim) = input.shoot_at {
                    if let Some(bullet) =
                        player_shoot(player, aim, tick, &mut self.rng, &mut events)
                    {
                        self.bullets.push(bullet);
                    }
                }
            }
        }

        // --- Teammate phase ---
        let enemy_views = self.target_views_of_kind(AgentKind::Enemy);
        let player_snapshot = self.player_snapshot();
        update_teammates(
            &mut self.agents,
            &mut obstacles,
            &enemy_views,
            &player_snapshot,
            &self.map,
            self.formation_shape,
            tick,
            &mut self.rng,
            &mut self.bullets,
            &mut events,
        );

        // --- Enemy phase ---
        let player_position = self
            .agents
            .get(self.player_id)
            .map_or(Vec2Fixed::ZERO, |p| p.position);
        respawn_pass(
            &mut self.agents,
            &mut self.squads,
            &self.map,
            &self.config,
            player_position,
            self.spawn_exclusion,
            tick,
            &mut self.last_respawn_tick,
            &mut self.rng,
            &mut self.ids,
        );

        let mut obstacles = ObstacleSet::snapshot(&self.agents, &self.intel);
        let friendly_views = self.friendly_target_views();
        let phase = EnemyPhase {
            map: &self.map,
            config: &self.config,
            sectors: &self.sectors,
            tick,
        };
        update_squads(
            &mut self.squads,
            &mut self.agents,
            &mut obstacles,
            &friendly_views,
            &phase,
            &mut self.alert,
            &mut self.rng,
            &mut self.bullets,
            &mut events,
        );
        crate::independent::update_independents(
            &mut self.agents,
            &mut obstacles,
            &friendly_views,
            &phase,
            &mut self.alert,
            &mut self.rng,
            &mut self.bullets,
            &mut events,
        );

        // --- Projectile phase ---
        update_bullets(
            &mut self.bullets,
            &mut self.agents,
            &mut self.map,
            self.player_id,
            tick,
            &mut self.rng,
            &mut events,
        );

        // --- Objective phase ---
        if let Some(player) = self.agents.get(self.player_id) {
            if player.is_alive() {
                let player = player.clone();
                collect_intel(&player, &mut self.intel, &mut self.objectives, &mut events);
                let won = update_objectives(
                    &mut self.objectives,
                    &player,
                    &self.agents,
                    &self.map,
                    &mut events,
                );
                if won && !self.game_won {
                    self.game_won = true;
                    events.game_won = true;
                }
            } else if !self.game_over {
                self.game_over = true;
                events.game_over = true;
            }
        }

        // --- Population control (coarse, tick-gated) ---
        if tick.saturating_sub(self.last_spawn_check_tick) > self.config.spawn_check_interval_ticks
        {
            self.last_spawn_check_tick = tick;
            let player_position = self
                .agents
                .get(self.player_id)
                .map_or(Vec2Fixed::ZERO, |p| p.position);
            dynamic_population_pass(
                &mut self.agents,
                &mut self.squads,
                &self.map,
                &self.config,
                &self.sectors,
                player_position,
                self.spawn_exclusion,
                &mut self.rng,
                &mut self.ids,
            );
        }

        events
    }

    /// Apply this tick's squad order, if any.
    fn apply_order(&mut self, input: &PlayerInput, tick: u64) {
        let Some(order) = &input.order else { return };
        let snapshot = self.player_snapshot();
        match order {
            SquadOrder::Move {
                selected,
                target,
                queued,
            } => apply_move_order(
                &mut self.agents,
                selected,
                *target,
                *queued,
                &snapshot,
                self.formation_shape,
                tick,
            ),
            SquadOrder::Defend {
                point,
                radius_tiles,
            } => apply_defend_order(&mut self.agents, &self.map, *point, *radius_tiles, tick),
            SquadOrder::Recall => {
                apply_recall(&mut self.agents, &snapshot, self.formation_shape, tick);
            }
            SquadOrder::CycleFormation => {
                self.formation_shape = self.formation_shape.next();
            }
        }
    }

    /// Player center and smoothed facing for formation math.
    fn player_snapshot(&self) -> PlayerSnapshot {
        match self.agents.get(self.player_id) {
            Some(player) => {
                let avg = player.pilot.as_ref().map_or(player.last_movement_vector, |p| {
                    p.average_direction(player.last_movement_vector, PLAYER_MOVEMENT_HISTORY_MIN)
                });
                PlayerSnapshot {
                    center: player.center(),
                    avg_direction: if avg == Vec2Fixed::ZERO {
                        Vec2Fixed::SOUTH
                    } else {
                        avg
                    },
                }
            }
            None => PlayerSnapshot {
                center: Vec2Fixed::ZERO,
                avg_direction: Vec2Fixed::SOUTH,
            },
        }
    }

    /// Living targets of one kind, ascending id order.
    fn target_views_of_kind(&self, kind: AgentKind) -> Vec<TargetView> {
        let mut views: Vec<TargetView> = self
            .agents
            .iter()
            .filter(|a| a.kind == kind && a.is_alive())
            .map(Agent::target_view)
            .collect();
        views.sort_unstable_by_key(|v| v.id);
        views
    }

    /// The player plus living teammates: what enemies can target.
    fn friendly_target_views(&self) -> Vec<TargetView> {
        let mut views = Vec::new();
        if let Some(player) = self.agents.get(self.player_id) {
            if player.is_alive() {
                views.push(player.target_view());
            }
        }
        views.extend(self.target_views_of_kind(AgentKind::Teammate));
        views
    }

    /// Hash of the full simulation state, for determinism checks and
    /// desync detection.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.formation_shape.hash(&mut hasher);
        self.game_over.hash(&mut hasher);
        self.game_won.hash(&mut hasher);

        let ids = self.agents.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            let Some(agent) = self.agents.get(id) else { continue };
            id.hash(&mut hasher);
            agent.position.hash(&mut hasher);
            agent.health.hash(&mut hasher);
            agent.stuck_counter.hash(&mut hasher);
            agent.target_entity_id.hash(&mut hasher);
            agent.last_movement_vector.hash(&mut hasher);
        }

        self.squads.len().hash(&mut hasher);
        for squad in &self.squads {
            squad.id.hash(&mut hasher);
            squad.member_ids.hash(&mut hasher);
            squad.is_regrouping.hash(&mut hasher);
            squad.target_entity_id.hash(&mut hasher);
            squad.patrol_target.hash(&mut hasher);
            squad.orientation.hash(&mut hasher);
        }

        self.bullets.len().hash(&mut hasher);
        for bullet in &self.bullets {
            bullet.position.hash(&mut hasher);
            bullet.velocity.hash(&mut hasher);
            bullet.damage.hash(&mut hasher);
            bullet.owner.hash(&mut hasher);
        }

        for item in &self.intel {
            item.id.hash(&mut hasher);
            item.is_collected.hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Serialize the full state for replay or sync.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("failed to serialize simulation: {e}")))
    }

    /// Restore a simulation from serialized bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::InvalidState(format!("failed to deserialize simulation: {e}")))
    }
}

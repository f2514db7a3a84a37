//! Walkability testing against terrain and other agents.
//!
//! Controllers never borrow other agents while moving one; instead each
//! phase builds an [`ObstacleSet`] of lightweight copies and keeps it in
//! sync as agents move. Later movers therefore collide against the
//! already-updated positions of earlier movers, matching the sequential
//! in-tick ordering the simulation promises.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::components::{AgentKind, AgentStorage, EntityId, IntelItem, Side};
use crate::math::{Fixed, Rect, Vec2Fixed};
use crate::tilemap::TileMap;

/// Buffer added around obstacle rectangles so agents keep a sliver of
/// daylight between each other instead of touching exactly.
pub const COLLISION_BUFFER: Fixed = Fixed::const_from_int(2);

/// What kind of thing an obstacle is; intel items block only hostiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleClass {
    /// A living agent; blocks everyone.
    Agent,
    /// An uncollected intel item; friendlies walk through it.
    Intel,
}

/// A positional copy of something that blocks movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Id of the source entity.
    pub id: EntityId,
    /// Bounding box.
    pub rect: Rect,
    /// Blocking behavior.
    pub class: ObstacleClass,
    /// Squad of the source agent, for crowding heuristics.
    pub squad_id: Option<EntityId>,
    /// Kind of the source agent; `None` for intel items.
    pub kind: Option<AgentKind>,
}

/// The obstacles relevant to one movement phase.
#[derive(Debug, Clone, Default)]
pub struct ObstacleSet {
    items: Vec<Obstacle>,
    index: HashMap<EntityId, usize>,
}

impl ObstacleSet {
    /// Snapshot all living agents and uncollected intel items.
    ///
    /// Iterates in sorted-id order so the contained ordering (and thus
    /// which blocker gets reported on a multi-overlap) is deterministic.
    #[must_use]
    pub fn snapshot(agents: &AgentStorage, intel: &[IntelItem]) -> Self {
        let mut set = Self::default();
        for id in agents.sorted_ids() {
            let Some(agent) = agents.get(id) else { continue };
            if !agent.is_alive() {
                continue;
            }
            set.push(Obstacle {
                id: agent.id,
                rect: agent.rect(),
                class: ObstacleClass::Agent,
                squad_id: agent.squad_id,
                kind: Some(agent.kind),
            });
        }
        for item in intel {
            if !item.is_collected {
                set.push(Obstacle {
                    id: item.id,
                    rect: item.rect,
                    class: ObstacleClass::Intel,
                    squad_id: None,
                    kind: None,
                });
            }
        }
        set
    }

    /// Squad of an obstacle's source agent, if any.
    #[must_use]
    pub fn squad_of(&self, id: EntityId) -> Option<EntityId> {
        self.index
            .get(&id)
            .and_then(|&i| self.items[i].squad_id)
    }

    /// Agent kind of an obstacle's source, if it is an agent.
    #[must_use]
    pub fn kind_of(&self, id: EntityId) -> Option<AgentKind> {
        self.index.get(&id).and_then(|&i| self.items[i].kind)
    }

    fn push(&mut self, obstacle: Obstacle) {
        self.index.insert(obstacle.id, self.items.len());
        self.items.push(obstacle);
    }

    /// Register a newly spawned agent as an obstacle mid-phase.
    pub fn insert_agent(&mut self, agent: &crate::components::Agent) {
        self.push(Obstacle {
            id: agent.id,
            rect: agent.rect(),
            class: ObstacleClass::Agent,
            squad_id: agent.squad_id,
            kind: Some(agent.kind),
        });
    }

    /// Move an obstacle after its agent moved this phase.
    pub fn update_position(&mut self, id: EntityId, position: Vec2Fixed) {
        if let Some(&i) = self.index.get(&id) {
            self.items[i].rect.pos = position;
        }
    }

    /// Remove an obstacle (agent died or despawned mid-phase).
    pub fn remove(&mut self, id: EntityId) {
        if let Some(i) = self.index.remove(&id) {
            self.items.swap_remove(i);
            if let Some(moved) = self.items.get(i) {
                self.index.insert(moved.id, i);
            }
        }
    }

    /// All obstacles in insertion order.
    #[must_use]
    pub fn items(&self) -> &[Obstacle] {
        &self.items
    }

    /// Grid tiles whose top-left-pixel tile is covered by an obstacle,
    /// minus the ignored entity. Fed to the pathfinder as coarse
    /// agent-avoidance.
    #[must_use]
    pub fn occupied_tiles(&self, map: &TileMap, ignore: Option<EntityId>) -> HashSet<(i32, i32)> {
        let mut occupied = HashSet::new();
        for obstacle in &self.items {
            if Some(obstacle.id) == ignore {
                continue;
            }
            occupied.insert(map.tile_coords_of(obstacle.rect.pos));
        }
        occupied
    }
}

/// Result of a walkability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Walkability {
    /// The position is fully usable.
    pub walkable: bool,
    /// Id of the entity in the way, if an entity is what blocked.
    pub blocked_by: Option<EntityId>,
    /// A tile (or the map edge) is what blocked.
    pub blocked_by_tile: bool,
}

impl Walkability {
    const OK: Self = Self {
        walkable: true,
        blocked_by: None,
        blocked_by_tile: false,
    };

    const TILE_BLOCKED: Self = Self {
        walkable: false,
        blocked_by: None,
        blocked_by_tile: true,
    };
}

/// Sample points of an agent bounding box: corners, center, edge
/// midpoints, and interior quarter points. Twelve tile probes plus the
/// center catch any blocking tile the box overlaps at agent scale.
fn sample_points(pos: Vec2Fixed, size: Vec2Fixed) -> [Vec2Fixed; 13] {
    let one = Fixed::ONE;
    let half = Fixed::ONE / Fixed::from_num(2);
    let quarter = Fixed::ONE / Fixed::from_num(4);
    let three_q = quarter * Fixed::from_num(3);
    let w = size.x;
    let h = size.y;
    let at = |fx: Fixed, fy: Fixed| Vec2Fixed::new(pos.x + w * fx, pos.y + h * fy);
    // "- 1" on the far edges keeps the probes inside the box, so a box
    // flush against a wall tile does not read as overlapping it.
    let far_x = (w - one) / w;
    let far_y = (h - one) / h;
    [
        at(Fixed::ZERO, Fixed::ZERO),
        at(far_x, Fixed::ZERO),
        at(Fixed::ZERO, far_y),
        at(far_x, far_y),
        at(half, half),
        at(half, Fixed::ZERO),
        at(half, far_y),
        at(Fixed::ZERO, half),
        at(far_x, half),
        at(quarter, quarter),
        at(three_q, quarter),
        at(quarter, three_q),
        at(three_q, three_q),
    ]
}

/// Test whether an agent-sized box can occupy `pos`.
///
/// Tile pass first: any sampled point outside the map or on a blocking
/// tile fails with `blocked_by_tile`. Then every live obstacle except
/// `ignore` is AABB-tested with [`COLLISION_BUFFER`]; the first overlap
/// fails with that entity's id. Intel items only block [`Side::Hostile`]
/// movers.
#[must_use]
pub fn is_position_walkable(
    pos: Vec2Fixed,
    size: Vec2Fixed,
    map: &TileMap,
    ignore: Option<EntityId>,
    mover_side: Side,
    obstacles: &ObstacleSet,
) -> Walkability {
    // Whole-box bounds check before sampling.
    if pos.x < Fixed::ZERO
        || pos.y < Fixed::ZERO
        || pos.x + size.x > map.pixel_width()
        || pos.y + size.y > map.pixel_height()
    {
        return Walkability::TILE_BLOCKED;
    }

    for point in sample_points(pos, size) {
        match map.tile_at_point(point) {
            Some(tile) if !tile.kind.blocks_movement() => {}
            _ => return Walkability::TILE_BLOCKED,
        }
    }

    let mover = Rect::new(pos, size);
    for obstacle in obstacles.items() {
        if Some(obstacle.id) == ignore {
            continue;
        }
        if obstacle.class == ObstacleClass::Intel && mover_side == Side::Friendly {
            continue;
        }
        if mover.intersects(obstacle.rect.inflated(COLLISION_BUFFER)) {
            return Walkability {
                walkable: false,
                blocked_by: Some(obstacle.id),
                blocked_by_tile: false,
            };
        }
    }

    Walkability::OK
}

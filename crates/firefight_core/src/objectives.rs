//! Objectives and intel tracking.
//!
//! A thin consumer of agent health and position: eliminate the marked
//! targets, collect the intel, reach the extraction point that appears
//! once everything else is done. A dangling target reference counts as
//! completed rather than wedging the mission.

use serde::{Deserialize, Serialize};

use crate::components::{Agent, AgentStorage, EntityId, IntelItem};
use crate::constants::{EXTRACTION_TRIGGER_RADIUS, UI_SOUND_VOLUME, VOICE_SOUND_VOLUME};
use crate::events::{AudioCue, TickEvents};
use crate::math::{Fixed, Vec2Fixed};
use crate::tilemap::TileMap;

/// What a single objective asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveKind {
    /// Kill a marked high-value target.
    EliminateTarget {
        /// The marked agent.
        target: EntityId,
    },
    /// Kill the enemy commander.
    EliminateCommander {
        /// The commander agent.
        target: EntityId,
    },
    /// Pick up the required number of intel items.
    CollectIntel {
        /// Items needed.
        required: u32,
        /// Items collected so far.
        collected: u32,
    },
    /// Reach the extraction point.
    ReachExtraction {
        /// Extraction location.
        point: Vec2Fixed,
    },
}

/// One mission objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    /// Stable id, referenced by the shell's HUD.
    pub id: String,
    /// Completion condition.
    pub kind: ObjectiveKind,
    /// Display text.
    pub description: String,
    /// Completed flag; never unset.
    pub is_completed: bool,
}

impl Objective {
    /// Extraction objectives are secondary; everything else is primary.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        !matches!(self.kind, ObjectiveKind::ReachExtraction { .. })
    }
}

/// Collect intel items the player is standing on.
///
/// Returns the number collected this call; emits a pickup cue and
/// advances the collect objective.
pub fn collect_intel(
    player: &Agent,
    intel: &mut [IntelItem],
    objectives: &mut [Objective],
    events: &mut TickEvents,
) -> u32 {
    let player_rect = player.rect();
    let mut collected_now = 0u32;

    for item in intel.iter_mut() {
        if !item.is_collected && player_rect.intersects(item.rect) {
            item.is_collected = true;
            collected_now += 1;
        }
    }

    if collected_now > 0 {
        events.audio.push(AudioCue::IntelCollected {
            volume: VOICE_SOUND_VOLUME,
        });
        events.intel_collected += collected_now;

        let total = intel.iter().filter(|i| i.is_collected).count() as u32;
        for objective in objectives.iter_mut() {
            if let ObjectiveKind::CollectIntel { collected, .. } = &mut objective.kind {
                *collected = total;
            }
        }
    }

    collected_now
}

/// Evaluate objective completion and spawn the extraction objective
/// once all primaries are done. Returns `true` when the mission is won.
pub fn update_objectives(
    objectives: &mut Vec<Objective>,
    player: &Agent,
    agents: &AgentStorage,
    map: &TileMap,
    events: &mut TickEvents,
) -> bool {
    let mut all_primaries_complete = true;
    let mut extraction_exists = false;
    let mut extraction_complete = false;
    let mut game_won = false;

    for objective in objectives.iter_mut() {
        if objective.is_completed {
            if let ObjectiveKind::ReachExtraction { .. } = objective.kind {
                extraction_complete = true;
                extraction_exists = true;
            }
            continue;
        }

        let now_complete = match &objective.kind {
            ObjectiveKind::EliminateTarget { target }
            | ObjectiveKind::EliminateCommander { target } => {
                // Removed from storage also counts: the target is gone
                // either way.
                agents.get(*target).map_or(true, |a| !a.is_alive())
            }
            ObjectiveKind::CollectIntel {
                required,
                collected,
            } => collected >= required,
            ObjectiveKind::ReachExtraction { point } => {
                extraction_exists = true;
                let reached = player.center().distance(*point) < EXTRACTION_TRIGGER_RADIUS;
                if reached {
                    game_won = true;
                }
                reached
            }
        };

        if now_complete {
            objective.is_completed = true;
            if let ObjectiveKind::ReachExtraction { .. } = objective.kind {
                extraction_complete = true;
            }
            events.objectives_completed.push(objective.id.clone());
            events.audio.push(AudioCue::ObjectiveComplete {
                volume: UI_SOUND_VOLUME,
            });
        } else if objective.is_primary() {
            all_primaries_complete = false;
        }
    }

    if all_primaries_complete && !extraction_exists {
        objectives.push(Objective {
            id: "obj-extract".to_owned(),
            kind: ObjectiveKind::ReachExtraction {
                point: extraction_point(player, map),
            },
            description: "Reach the extraction point".to_owned(),
            is_completed: false,
        });
    }

    if all_primaries_complete && extraction_complete {
        game_won = true;
    }
    game_won
}

/// Extraction goes at the map's north-center, nudged to the nearest
/// walkable spot in a small neighborhood.
fn extraction_point(player: &Agent, map: &TileMap) -> Vec2Fixed {
    let ts = map.tile_size();
    let half = ts / Fixed::from_num(2);
    let default = Vec2Fixed::new(
        Fixed::from_num(map.width_tiles() as i32 / 2) * ts + half,
        Fixed::from_num(map.height_tiles() as i32 / 4) * ts + half,
    );

    let two = Fixed::from_num(2);
    for row in -2..=2 {
        for col in -2..=2 {
            let candidate = default
                + Vec2Fixed::new(Fixed::from_num(col) * ts, Fixed::from_num(row) * ts);
            let top_left = Vec2Fixed::new(
                candidate.x - player.size.x / two,
                candidate.y - player.size.y / two,
            );
            let walk = crate::collision::is_position_walkable(
                top_left,
                player.size,
                map,
                None,
                crate::components::Side::Friendly,
                &crate::collision::ObstacleSet::default(),
            );
            if walk.walkable {
                return candidate;
            }
        }
    }
    default
}

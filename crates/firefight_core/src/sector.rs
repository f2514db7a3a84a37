//! Map sectors: a coarse 3x3 partition of the tile grid.
//!
//! Sectors scope patrol areas, intel placement, and the dynamic
//! spawning annulus. They are pure geometry derived from the map
//! dimensions.

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2Fixed};
use crate::rng::GameRng;
use crate::tilemap::TileMap;

/// Sectors per axis.
pub const SECTOR_GRID_SIZE: u32 = 3;

/// One rectangular sector, in tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    /// Row-major sector id.
    pub id: u32,
    /// Left edge in tiles.
    pub x: i32,
    /// Top edge in tiles.
    pub y: i32,
    /// Width in tiles.
    pub width: i32,
    /// Height in tiles.
    pub height: i32,
}

impl Sector {
    /// Whether a tile coordinate falls inside this sector.
    #[must_use]
    pub fn contains_tile(&self, tile_x: i32, tile_y: i32) -> bool {
        tile_x >= self.x
            && tile_x < self.x + self.width
            && tile_y >= self.y
            && tile_y < self.y + self.height
    }

    /// World-pixel center of the sector.
    #[must_use]
    pub fn center_px(&self, map: &TileMap) -> Vec2Fixed {
        let ts = map.tile_size();
        let two = Fixed::from_num(2);
        Vec2Fixed::new(
            (Fixed::from_num(self.x) + Fixed::from_num(self.width) / two) * ts,
            (Fixed::from_num(self.y) + Fixed::from_num(self.height) / two) * ts,
        )
    }

    /// Uniformly random tile coordinate inside the sector.
    pub fn random_tile(&self, rng: &mut GameRng) -> (i32, i32) {
        (
            self.x + rng.index(self.width.max(1) as usize) as i32,
            self.y + rng.index(self.height.max(1) as usize) as i32,
        )
    }
}

/// Partition a map into the 3x3 sector grid.
#[must_use]
pub fn sectors_for_map(map: &TileMap) -> Vec<Sector> {
    let sector_width = (map.width_tiles() / SECTOR_GRID_SIZE) as i32;
    let sector_height = (map.height_tiles() / SECTOR_GRID_SIZE) as i32;

    let mut sectors = Vec::with_capacity((SECTOR_GRID_SIZE * SECTOR_GRID_SIZE) as usize);
    for row in 0..SECTOR_GRID_SIZE as i32 {
        for col in 0..SECTOR_GRID_SIZE as i32 {
            sectors.push(Sector {
                id: (row * SECTOR_GRID_SIZE as i32 + col) as u32,
                x: col * sector_width,
                y: row * sector_height,
                width: sector_width,
                height: sector_height,
            });
        }
    }
    sectors
}

/// Sector containing a world point, if any.
#[must_use]
pub fn sector_for_position<'a>(
    position: Vec2Fixed,
    map: &TileMap,
    sectors: &'a [Sector],
) -> Option<&'a Sector> {
    let (tile_x, tile_y) = map.tile_coords_of(position);
    sectors.iter().find(|s| s.contains_tile(tile_x, tile_y))
}

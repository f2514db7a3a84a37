//! Tile grid consumed from the map-generation collaborator.
//!
//! The simulation never synthesizes terrain; it receives a grid of
//! typed cells and queries it for traversability. The only mutation it
//! performs is bullet damage to destructible tiles.

use serde::{Deserialize, Serialize};

use crate::constants::{FENCE_HEALTH, TILE_SIZE, WALL_HEALTH};
use crate::math::{Fixed, Vec2Fixed};

/// Terrain classification for one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileKind {
    /// Bare ground.
    #[default]
    Empty,
    /// Solid wall; blocks movement, sight, and bullets. Destructible.
    Wall,
    /// Open grass.
    Grass,
    /// Water; blocks movement and sight but is never destructible.
    Water,
    /// Paved road.
    Road,
    /// Interior flooring.
    BuildingFloor,
    /// Fence; blocks movement and sight, easily shot through.
    Fence,
    /// Tilled farmland.
    FarmField,
    /// Worn dirt path.
    DirtPath,
}

impl TileKind {
    /// Tiles that agents can never occupy.
    #[must_use]
    pub const fn blocks_movement(self) -> bool {
        matches!(self, Self::Wall | Self::Water | Self::Fence)
    }

    /// Tiles that stop bullets and sight lines.
    #[must_use]
    pub const fn blocks_sight(self) -> bool {
        matches!(self, Self::Wall | Self::Water | Self::Fence)
    }

    /// Tiles that bullets chip away at.
    #[must_use]
    pub const fn is_destructible(self) -> bool {
        matches!(self, Self::Wall | Self::Fence)
    }

    /// Default durability for a freshly placed tile of this kind.
    #[must_use]
    pub const fn default_durability(self) -> Option<u32> {
        match self {
            Self::Wall => Some(WALL_HEALTH),
            Self::Fence => Some(FENCE_HEALTH),
            _ => None,
        }
    }
}

/// One cell of the map grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Terrain type.
    pub kind: TileKind,
    /// Remaining durability for destructible tiles. `None` on a
    /// destructible kind means indestructible (map border walls).
    pub durability: Option<u32>,
    /// Cosmetic fog-of-war flag; the simulation never reads it.
    pub is_explored: bool,
}

impl Tile {
    /// A tile of the given kind with its default durability.
    #[must_use]
    pub const fn of(kind: TileKind) -> Self {
        Self {
            kind,
            durability: kind.default_durability(),
            is_explored: false,
        }
    }

    /// An indestructible tile of the given kind.
    #[must_use]
    pub const fn indestructible(kind: TileKind) -> Self {
        Self {
            kind,
            durability: None,
            is_explored: false,
        }
    }
}

/// The map grid: row-major tiles plus pixel geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    width_tiles: u32,
    height_tiles: u32,
    #[serde(with = "crate::math::fixed_serde")]
    tile_size: Fixed,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// Create a map with every cell set to `fill`.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    #[must_use]
    pub fn filled(width_tiles: u32, height_tiles: u32, fill: TileKind) -> Self {
        assert!(width_tiles > 0, "TileMap width must be positive");
        assert!(height_tiles > 0, "TileMap height must be positive");

        let count = (width_tiles as usize) * (height_tiles as usize);
        Self {
            width_tiles,
            height_tiles,
            tile_size: TILE_SIZE,
            tiles: vec![Tile::of(fill); count],
        }
    }

    /// Build a map from a row-major cell vector, the handoff format of
    /// the map-generation collaborator.
    ///
    /// # Panics
    ///
    /// Panics if the tile count does not match the dimensions.
    #[must_use]
    pub fn from_tiles(width_tiles: u32, height_tiles: u32, tiles: Vec<Tile>) -> Self {
        assert_eq!(
            tiles.len(),
            (width_tiles as usize) * (height_tiles as usize),
            "tile vector does not match map dimensions"
        );
        Self {
            width_tiles,
            height_tiles,
            tile_size: TILE_SIZE,
            tiles,
        }
    }

    /// Replace the outermost ring of tiles with indestructible walls,
    /// the shape every generated map arrives with.
    pub fn seal_border(&mut self) {
        for x in 0..self.width_tiles as i32 {
            self.set_tile(x, 0, Tile::indestructible(TileKind::Wall));
            self.set_tile(x, self.height_tiles as i32 - 1, Tile::indestructible(TileKind::Wall));
        }
        for y in 0..self.height_tiles as i32 {
            self.set_tile(0, y, Tile::indestructible(TileKind::Wall));
            self.set_tile(self.width_tiles as i32 - 1, y, Tile::indestructible(TileKind::Wall));
        }
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width_tiles(&self) -> u32 {
        self.width_tiles
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height_tiles(&self) -> u32 {
        self.height_tiles
    }

    /// Edge length of one tile in world pixels.
    #[must_use]
    pub const fn tile_size(&self) -> Fixed {
        self.tile_size
    }

    /// Map width in world pixels.
    #[must_use]
    pub fn pixel_width(&self) -> Fixed {
        Fixed::from_num(self.width_tiles) * self.tile_size
    }

    /// Map height in world pixels.
    #[must_use]
    pub fn pixel_height(&self) -> Fixed {
        Fixed::from_num(self.height_tiles) * self.tile_size
    }

    /// Check grid-coordinate bounds.
    #[must_use]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width_tiles && (y as u32) < self.height_tiles
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (y as usize) * (self.width_tiles as usize) + (x as usize)
    }

    /// Tile at grid coordinates, `None` out of bounds.
    #[must_use]
    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        if self.in_bounds(x, y) {
            Some(&self.tiles[self.index(x, y)])
        } else {
            None
        }
    }

    /// Overwrite the tile at grid coordinates. Out-of-bounds writes are
    /// ignored and report `false`.
    pub fn set_tile(&mut self, x: i32, y: i32, tile: Tile) -> bool {
        if self.in_bounds(x, y) {
            let idx = self.index(x, y);
            self.tiles[idx] = tile;
            true
        } else {
            false
        }
    }

    /// Shorthand for placing a kind with default durability.
    pub fn set_kind(&mut self, x: i32, y: i32, kind: TileKind) -> bool {
        self.set_tile(x, y, Tile::of(kind))
    }

    /// Grid coordinates containing a world point.
    #[must_use]
    pub fn tile_coords_of(&self, point: Vec2Fixed) -> (i32, i32) {
        (
            (point.x / self.tile_size).to_num::<i32>(),
            (point.y / self.tile_size).to_num::<i32>(),
        )
    }

    /// Tile under a world point, `None` outside the map.
    #[must_use]
    pub fn tile_at_point(&self, point: Vec2Fixed) -> Option<&Tile> {
        if point.x < Fixed::ZERO || point.y < Fixed::ZERO {
            return None;
        }
        let (x, y) = self.tile_coords_of(point);
        self.tile(x, y)
    }

    /// World-pixel center of a grid cell.
    #[must_use]
    pub fn tile_center(&self, x: i32, y: i32) -> Vec2Fixed {
        let half = self.tile_size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(x) * self.tile_size + half,
            Fixed::from_num(y) * self.tile_size + half,
        )
    }

    /// Whether agents may occupy this cell (in bounds and not a
    /// blocking tile kind).
    #[must_use]
    pub fn is_traversable(&self, x: i32, y: i32) -> bool {
        self.tile(x, y)
            .is_some_and(|t| !t.kind.blocks_movement())
    }

    /// Apply bullet damage to the tile at grid coordinates.
    ///
    /// Only destructible kinds with finite durability take damage; a
    /// tile reduced to zero collapses into [`TileKind::Empty`]. Returns
    /// `true` if the tile was destroyed by this hit.
    pub fn damage_tile(&mut self, x: i32, y: i32, amount: u32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        let tile = &mut self.tiles[idx];
        if !tile.kind.is_destructible() {
            return false;
        }
        let Some(durability) = tile.durability else {
            // Indestructible border tile absorbs the hit.
            return false;
        };
        let remaining = durability.saturating_sub(amount);
        if remaining == 0 {
            *tile = Tile {
                kind: TileKind::Empty,
                durability: None,
                is_explored: tile.is_explored,
            };
            true
        } else {
            tile.durability = Some(remaining);
            false
        }
    }

    /// Iterate all tiles with their grid coordinates.
    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), &Tile)> {
        let width = self.width_tiles as usize;
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, t)| (((i % width) as i32, (i / width) as i32), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fixed_ratio;

    #[test]
    fn test_blocking_kinds() {
        assert!(TileKind::Wall.blocks_movement());
        assert!(TileKind::Water.blocks_movement());
        assert!(TileKind::Fence.blocks_movement());
        assert!(!TileKind::Grass.blocks_movement());
        assert!(!TileKind::Road.blocks_movement());
        assert!(!TileKind::BuildingFloor.blocks_movement());
    }

    #[test]
    fn test_default_durability() {
        assert_eq!(Tile::of(TileKind::Wall).durability, Some(WALL_HEALTH));
        assert_eq!(Tile::of(TileKind::Fence).durability, Some(FENCE_HEALTH));
        assert_eq!(Tile::of(TileKind::Grass).durability, None);
    }

    #[test]
    fn test_point_to_tile_mapping() {
        let map = TileMap::filled(10, 10, TileKind::Grass);
        let p = Vec2Fixed::new(fixed_ratio(15, 1), fixed_ratio(29, 1));
        assert_eq!(map.tile_coords_of(p), (1, 2));
        assert!(map.tile_at_point(p).is_some());
        assert!(map
            .tile_at_point(Vec2Fixed::new(Fixed::from_num(-1), Fixed::ZERO))
            .is_none());
    }

    #[test]
    fn test_tile_center() {
        let map = TileMap::filled(4, 4, TileKind::Empty);
        let center = map.tile_center(1, 1);
        assert_eq!(center, Vec2Fixed::new(Fixed::from_num(21), Fixed::from_num(21)));
    }

    #[test]
    fn test_wall_collapses_to_empty() {
        let mut map = TileMap::filled(3, 3, TileKind::Grass);
        map.set_kind(1, 1, TileKind::Wall);

        assert!(!map.damage_tile(1, 1, 60));
        assert_eq!(map.tile(1, 1).unwrap().durability, Some(40));

        assert!(map.damage_tile(1, 1, 60));
        assert_eq!(map.tile(1, 1).unwrap().kind, TileKind::Empty);
        assert!(map.is_traversable(1, 1));
    }

    #[test]
    fn test_indestructible_border_absorbs_damage() {
        let mut map = TileMap::filled(5, 5, TileKind::Grass);
        map.seal_border();

        assert!(!map.damage_tile(0, 0, 10_000));
        assert_eq!(map.tile(0, 0).unwrap().kind, TileKind::Wall);
        assert_eq!(map.tile(0, 0).unwrap().durability, None);
    }

    #[test]
    fn test_non_destructible_kind_ignores_damage() {
        let mut map = TileMap::filled(3, 3, TileKind::Water);
        assert!(!map.damage_tile(1, 1, 999));
        assert_eq!(map.tile(1, 1).unwrap().kind, TileKind::Water);
    }

    #[test]
    fn test_from_tiles_roundtrip() {
        let cells = vec![
            Tile::of(TileKind::Grass),
            Tile::of(TileKind::Wall),
            Tile::of(TileKind::Water),
            Tile::of(TileKind::Road),
        ];
        let map = TileMap::from_tiles(2, 2, cells);
        assert_eq!(map.tile(1, 0).unwrap().kind, TileKind::Wall);
        assert_eq!(map.tile(0, 1).unwrap().kind, TileKind::Water);
        assert_eq!(map.tile(1, 1).unwrap().kind, TileKind::Road);
    }

    #[test]
    fn test_out_of_bounds_queries() {
        let map = TileMap::filled(3, 3, TileKind::Grass);
        assert!(map.tile(-1, 0).is_none());
        assert!(map.tile(3, 0).is_none());
        assert!(!map.is_traversable(0, 99));
    }
}

//! Snapping forest blocks onto a cell lattice.

use std::collections::hash_map::Entry;

use ahash::AHashMap;
use bitflags::bitflags;
use tracing::debug;

use super::classify::ForestBlock;

pub const CELL_SIZE: f64 = 50.0;
/// Rounding step for the phase when no triangle pins it.
const PHASE_FALLBACK_STEP: f64 = 5.0;
/// Blocks at or beyond this distance from the origin on either axis are
/// dropped. Cell keys then stay within 2^24, so lattice arithmetic on them
/// cannot overflow `i64`.
pub const MAX_COORDINATE: f64 = CELL_SIZE * (1u64 << 24) as f64;

bitflags! {
    /// Cell sides an occupant covers. North is +z, east is +x.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Sides: u8 {
        const NORTH = 0x1;
        const EAST = 0x2;
        const SOUTH = 0x4;
        const WEST = 0x8;
    }
}

/// One side of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    South,
    East,
    North,
    West,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::South, Side::East, Side::North, Side::West];

    pub fn flag(self) -> Sides {
        match self {
            Side::South => Sides::SOUTH,
            Side::East => Sides::EAST,
            Side::North => Sides::NORTH,
            Side::West => Sides::WEST,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::South => Side::North,
            Side::East => Side::West,
            Side::North => Side::South,
            Side::West => Side::East,
        }
    }

    /// Cell offset across this side.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Side::South => (0, -1),
            Side::East => (1, 0),
            Side::North => (0, 1),
            Side::West => (-1, 0),
        }
    }
}

impl Sides {
    /// Half-cell covered by a triangle at a quantized yaw.
    pub fn for_triangle(yaw: u16) -> Sides {
        match yaw {
            0 => Sides::SOUTH | Sides::WEST,
            90 => Sides::WEST | Sides::NORTH,
            180 => Sides::NORTH | Sides::EAST,
            _ => Sides::EAST | Sides::SOUTH,
        }
    }
}

pub type CellKey = (i64, i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub sides: Sides,
    pub is_square: bool,
}

impl Cell {
    fn from_block(block: &ForestBlock) -> Self {
        if block.is_square {
            Self { sides: Sides::all(), is_square: true }
        } else {
            Self { sides: Sides::for_triangle(block.yaw), is_square: false }
        }
    }
}

/// Occupied cells of one forest type.
#[derive(Debug, Clone)]
pub struct CellGrid {
    pub cells: AHashMap<CellKey, Cell>,
    /// World position of the center of cell `(0, 0)`.
    pub phase: [f64; 2],
}

/// Sub-cell alignment of the block lattice. Triangles sit exactly on it;
/// squares are only trusted to the nearest fallback step.
fn detect_phase<'a>(
    mut blocks: impl Iterator<Item = &'a ForestBlock> + Clone,
) -> Option<[f64; 2]> {
    if let Some(t) = blocks.clone().find(|b| !b.is_square) {
        return Some([t.x.rem_euclid(CELL_SIZE), t.z.rem_euclid(CELL_SIZE)]);
    }
    let first = blocks.next()?;
    let snap = |v: f64| (v / PHASE_FALLBACK_STEP).round() * PHASE_FALLBACK_STEP;
    Some([snap(first.x).rem_euclid(CELL_SIZE), snap(first.z).rem_euclid(CELL_SIZE)])
}

/// NaN fails the comparison and is dropped too.
fn in_range(block: &ForestBlock) -> bool {
    block.x.abs() < MAX_COORDINATE && block.z.abs() < MAX_COORDINATE
}

impl CellGrid {
    /// Snap blocks onto the lattice. Returns `None` when no block lies within
    /// [`MAX_COORDINATE`].
    pub fn build(blocks: &[ForestBlock]) -> Option<Self> {
        let kept: Vec<&ForestBlock> = blocks.iter().filter(|b| in_range(b)).collect();
        if kept.len() < blocks.len() {
            debug!(dropped = blocks.len() - kept.len(), "forest blocks outside the lattice range");
        }
        let phase = detect_phase(kept.iter().copied())?;
        let mut cells = AHashMap::new();
        for block in kept {
            let key = (
                ((block.x - phase[0]) / CELL_SIZE).round() as i64,
                ((block.z - phase[1]) / CELL_SIZE).round() as i64,
            );
            let cell = Cell::from_block(block);
            match cells.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(cell);
                }
                Entry::Occupied(mut slot) => {
                    if cell.is_square && !slot.get().is_square {
                        slot.insert(cell);
                    }
                }
            }
        }
        Some(Self { cells, phase })
    }

    pub fn get(&self, key: CellKey) -> Option<&Cell> {
        self.cells.get(&key)
    }

    /// Whether the occupant of `key` covers `side`.
    pub fn covers(&self, key: CellKey, side: Side) -> bool {
        self.get(key).is_some_and(|cell| cell.sides.contains(side.flag()))
    }

    /// Cells reachable from `key` through shared covered sides.
    pub fn neighbors(&self, key: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        let sides = self.get(key).map(|c| c.sides).unwrap_or(Sides::empty());
        Side::ALL.into_iter().filter_map(move |side| {
            if !sides.contains(side.flag()) {
                return None;
            }
            let (dx, dy) = side.offset();
            let other = (key.0 + dx, key.1 + dy);
            self.covers(other, side.opposite()).then_some(other)
        })
    }

    /// World `(x, z)` of lattice vertex `v`; vertex `(c, r)` is the
    /// south-west corner of cell `(c, r)`.
    pub fn vertex_position(&self, v: CellKey) -> [f64; 2] {
        [
            self.phase[0] + (v.0 as f64 - 0.5) * CELL_SIZE,
            self.phase[1] + (v.1 as f64 - 0.5) * CELL_SIZE,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::classify::ForestType;

    fn block(x: f64, z: f64, is_square: bool, yaw: u16) -> ForestBlock {
        ForestBlock { x, z, is_square, yaw, forest_type: ForestType::Mixed }
    }

    #[test]
    fn test_phase_from_first_triangle() {
        let blocks = [block(3.0, 4.0, true, 0), block(130.0, -20.0, false, 90)];
        assert_eq!(detect_phase(blocks.iter()), Some([30.0, 30.0]));
    }

    #[test]
    fn test_phase_fallback_rounds_to_step() {
        let blocks = [block(126.9, 74.2, true, 0)];
        assert_eq!(detect_phase(blocks.iter()), Some([25.0, 25.0]));
        assert_eq!(detect_phase(std::iter::empty()), None);
    }

    #[test]
    fn test_square_takes_precedence() {
        let blocks = [
            block(25.0, 25.0, false, 0),
            block(25.0, 25.0, true, 0),
            block(26.0, 24.0, false, 180),
        ];
        let grid = CellGrid::build(&blocks).unwrap();
        assert_eq!(grid.cells.len(), 1);
        assert!(grid.get((0, 0)).unwrap().is_square);
    }

    #[test]
    fn test_triangle_connectivity() {
        // Square at (-1, 0); triangle at (0, 0) covering south and west.
        let blocks = [block(25.0, 25.0, false, 0), block(-25.0, 25.0, true, 0)];
        let grid = CellGrid::build(&blocks).unwrap();
        assert_eq!(grid.neighbors((0, 0)).collect::<Vec<_>>(), vec![(-1, 0)]);
        assert_eq!(grid.neighbors((-1, 0)).collect::<Vec<_>>(), vec![(0, 0)]);

        // Facing north-east, the triangle no longer touches the square.
        let blocks = [block(25.0, 25.0, false, 180), block(-25.0, 25.0, true, 0)];
        let grid = CellGrid::build(&blocks).unwrap();
        assert_eq!(grid.neighbors((0, 0)).count(), 0);
        assert_eq!(grid.neighbors((-1, 0)).count(), 0);
    }

    #[test]
    fn test_far_blocks_are_dropped() {
        assert!(CellGrid::build(&[block(1e12, 1e12, true, 0)]).is_none());
        assert!(CellGrid::build(&[block(1e30, 0.0, false, 90)]).is_none());
        assert!(CellGrid::build(&[block(f64::NAN, 0.0, true, 0)]).is_none());

        // A far triangle must not set the phase for the near squares.
        let blocks = [block(1e30, 3.0, false, 0), block(25.0, 25.0, true, 0)];
        let grid = CellGrid::build(&blocks).unwrap();
        assert_eq!(grid.phase, [25.0, 25.0]);
        assert_eq!(grid.cells.len(), 1);
        assert!(grid.get((0, 0)).is_some());
    }

    #[test]
    fn test_vertex_position() {
        let grid = CellGrid::build(&[block(25.0, 25.0, true, 0)]).unwrap();
        assert_eq!(grid.vertex_position((0, 0)), [0.0, 0.0]);
        assert_eq!(grid.vertex_position((1, 1)), [50.0, 50.0]);
    }
}

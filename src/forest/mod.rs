//! Forest polygons rebuilt from block placements.
//!
//! Forest areas are placed as square and half-square blocks on a 50 unit
//! lattice. Blocks are snapped back onto that lattice, flood-filled into
//! connected stands per forest type and traced into polygons.

pub mod classify;
pub mod grid;
pub mod trace;

use serde::Serialize;
use tracing::debug;

use crate::world::{ObjectRecord, WorldData};

pub use classify::{ForestBlock, ForestType, classify};
pub use grid::{CELL_SIZE, CellGrid};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polygon {
    /// 1-based, in order of decreasing area.
    pub id: u32,
    pub forest_type: ForestType,
    pub cell_count: usize,
    pub area: f64,
    /// Closed ring on the world `(x, z)` plane.
    pub exterior: Vec<[f64; 2]>,
    pub holes: Vec<Vec<[f64; 2]>>,
}

/// Reconstruct forest polygons from placed objects. Objects that are not
/// forest blocks are ignored; an empty result is not an error.
pub fn extract_from_objects(objects: &[ObjectRecord]) -> Vec<Polygon> {
    let blocks: Vec<ForestBlock> = objects.iter().filter_map(classify).collect();

    let mut polygons = Vec::new();
    for forest_type in [ForestType::Conifer, ForestType::Mixed] {
        let group: Vec<ForestBlock> = blocks
            .iter()
            .filter(|b| b.forest_type == forest_type)
            .copied()
            .collect();
        let Some(grid) = CellGrid::build(&group) else { continue };

        let components = trace::components(&grid);
        debug!(
            ?forest_type,
            blocks = group.len(),
            cells = grid.cells.len(),
            components = components.len(),
            "forest grid built"
        );
        for component in &components {
            let outline = trace::outline(&grid, component);
            polygons.push(Polygon {
                id: 0,
                forest_type,
                cell_count: component.len(),
                area: outline.area,
                exterior: outline.exterior,
                holes: outline.holes,
            });
        }
    }

    polygons.sort_by(|a, b| b.area.total_cmp(&a.area));
    for (i, polygon) in polygons.iter_mut().enumerate() {
        polygon.id = i as u32 + 1;
    }
    polygons
}

pub fn extract_from_world(world: &WorldData) -> Vec<Polygon> {
    extract_from_objects(&world.objects)
}

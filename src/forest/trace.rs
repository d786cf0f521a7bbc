//! Connected components and their outlines.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};

use super::grid::{CELL_SIZE, CellGrid, CellKey, Side, Sides};

/// Lattice vertex; see [`CellGrid::vertex_position`].
type Vertex = (i64, i64);
type Edge = (Vertex, Vertex);

/// Flood fill over covered-side adjacency, largest component first.
/// Cells within a component are in visit order.
pub fn components(grid: &CellGrid) -> Vec<Vec<CellKey>> {
    let mut keys: Vec<CellKey> = grid.cells.keys().copied().collect();
    keys.sort_unstable();

    let mut seen: AHashSet<CellKey> = AHashSet::new();
    let mut out = Vec::new();
    for start in keys {
        if !seen.insert(start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(key) = queue.pop_front() {
            component.push(key);
            for next in grid.neighbors(key) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        out.push(component);
    }
    out.sort_by(|a, b| b.len().cmp(&a.len()));
    out
}

/// Counter-clockwise edge along one side of cell `(c, r)`.
fn side_edge((c, r): CellKey, side: Side) -> Edge {
    let (sw, se, ne, nw) = ((c, r), (c + 1, r), (c + 1, r + 1), (c, r + 1));
    match side {
        Side::South => (sw, se),
        Side::East => (se, ne),
        Side::North => (ne, nw),
        Side::West => (nw, sw),
    }
}

/// Diagonal closing a triangle, oriented to keep the covered half on the left.
fn hypotenuse((c, r): CellKey, sides: Sides) -> Edge {
    let (sw, se, ne, nw) = ((c, r), (c + 1, r), (c + 1, r + 1), (c, r + 1));
    if sides == Sides::SOUTH | Sides::WEST {
        (se, nw)
    } else if sides == Sides::WEST | Sides::NORTH {
        (sw, ne)
    } else if sides == Sides::NORTH | Sides::EAST {
        (nw, se)
    } else {
        (ne, sw)
    }
}

/// Directed boundary edges of a component. Covered sides facing a neighbor
/// that covers them back are interior and dropped.
fn boundary_edges(grid: &CellGrid, component: &[CellKey]) -> Vec<Edge> {
    let mut edges = Vec::new();
    for &key in component {
        let Some(cell) = grid.get(key) else { continue };
        for side in Side::ALL {
            if !cell.sides.contains(side.flag()) {
                continue;
            }
            let (dx, dy) = side.offset();
            if !grid.covers((key.0 + dx, key.1 + dy), side.opposite()) {
                edges.push(side_edge(key, side));
            }
        }
        if !cell.is_square {
            edges.push(hypotenuse(key, cell.sides));
        }
    }
    edges
}

/// Chain directed edges into closed vertex loops. A loop that fails to
/// close within `max_edges` is kept as walked.
fn chain_rings(edges: &[Edge], max_edges: usize) -> Vec<Vec<Vertex>> {
    let mut outgoing: AHashMap<Vertex, Vec<usize>> = AHashMap::new();
    for (i, &(from, _)) in edges.iter().enumerate() {
        outgoing.entry(from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        used[first] = true;
        let origin = edges[first].0;
        let mut ring = vec![origin];
        let mut at = edges[first].1;
        let mut walked = 1;
        while at != origin && walked < max_edges {
            let next = outgoing
                .get(&at)
                .and_then(|candidates| candidates.iter().copied().find(|&i| !used[i]));
            let Some(next) = next else { break };
            used[next] = true;
            ring.push(at);
            at = edges[next].1;
            walked += 1;
        }
        if at != origin {
            ring.push(at);
        }
        rings.push(ring);
    }
    rings
}

fn cross(a: Vertex, b: Vertex, c: Vertex) -> i64 {
    (b.0 - a.0) * (c.1 - b.1) - (b.1 - a.1) * (c.0 - b.0)
}

/// Drop vertices lying on the straight line through their neighbors.
fn remove_collinear(mut ring: Vec<Vertex>) -> Vec<Vertex> {
    loop {
        let n = ring.len();
        if n <= 3 {
            return ring;
        }
        let found = (0..n).find(|&i| cross(ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]) == 0);
        match found {
            Some(i) => {
                ring.remove(i);
            }
            None => return ring,
        }
    }
}

/// Twice the signed area.
fn shoelace(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.0 * b.1 - b.0 * a.1
        })
        .sum()
}

/// Outline of one component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outline {
    pub exterior: Vec<[f64; 2]>,
    pub holes: Vec<Vec<[f64; 2]>>,
    pub area: f64,
}

/// Trace a component into an exterior ring and holes. Rings are closed
/// (first point repeated last). Area counts squares whole and triangles as
/// halves.
pub fn outline(grid: &CellGrid, component: &[CellKey]) -> Outline {
    let edges = boundary_edges(grid, component);
    let max_edges = 4 * component.len() + 4;
    let mut rings: Vec<Vec<Vertex>> = chain_rings(&edges, max_edges)
        .into_iter()
        .map(remove_collinear)
        .collect();

    let exterior_index = rings
        .iter()
        .enumerate()
        .max_by_key(|(_, ring)| shoelace(ring).abs())
        .map(|(i, _)| i);
    let exterior = match exterior_index {
        Some(i) => rings.swap_remove(i),
        None => Vec::new(),
    };

    let to_world = |ring: &[Vertex]| -> Vec<[f64; 2]> {
        let mut points: Vec<[f64; 2]> = ring.iter().map(|&v| grid.vertex_position(v)).collect();
        if let Some(&first) = points.first() {
            points.push(first);
        }
        points
    };

    let half_cells: usize = component
        .iter()
        .filter_map(|&key| grid.get(key))
        .map(|cell| if cell.is_square { 2 } else { 1 })
        .sum();

    Outline {
        exterior: to_world(&exterior),
        holes: rings.iter().map(|ring| to_world(ring)).collect(),
        area: half_cells as f64 * CELL_SIZE * CELL_SIZE / 2.0,
    }
}

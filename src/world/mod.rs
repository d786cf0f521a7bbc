//! Decoded terrain files.
//!
//! [`read`] looks at the signature and version and hands the stream to one
//! of four parsers. Every parser produces the same [`WorldData`] shape; fields
//! a format does not carry are left empty.

mod grid;
mod legacy;
mod modern;
mod roads;

use std::io::{Read, Seek};

use bitflags::bitflags;
use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::{Pose, Rotation, WorldReader, decompose_transform};
use crate::error::{Error, Result};

pub use grid::GridVariant;

/// Largest grid area accepted before allocating per-cell tables.
pub const MAX_GRID_CELLS: u64 = 1 << 28;
/// Largest OPRW land grid accepted. A single quadtree leaf can fill the whole
/// land grid, so its tables are bounded here rather than by the input size.
pub const MAX_LAND_CELLS: u64 = 1 << 26;

/// Parser options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Walk object records without materializing them.
    pub skip_objects: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    pub signature: String,
    pub version: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GridInfo {
    pub land_size_x: u32,
    pub land_size_y: u32,
    pub cell_size: f32,
    pub terrain_size_x: u32,
    pub terrain_size_y: u32,
}

impl GridInfo {
    pub fn land_cells(&self) -> usize {
        self.land_size_x as usize * self.land_size_y as usize
    }

    pub fn terrain_cells(&self) -> usize {
        self.terrain_size_x as usize * self.terrain_size_y as usize
    }
}

bitflags! {
    /// Per-cell attribute bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellFlags: u32 {
        /// Low bit of the 2-bit surface type
        const SURFACE_LOW = 0x01;
        /// High bit of the 2-bit surface type
        const SURFACE_HIGH = 0x02;
        const FOREST = 0x20;
        const ROADWAY = 0x40;
        const _ = !0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceType {
    Ground,
    Tidal,
    Coastline,
    Sea,
}

impl CellFlags {
    pub fn surface(self) -> SurfaceType {
        match self.bits() & 0x3 {
            0 => SurfaceType::Ground,
            1 => SurfaceType::Tidal,
            2 => SurfaceType::Coastline,
            _ => SurfaceType::Sea,
        }
    }
}

/// One texture slot. Legacy files store a single name and a map color;
/// OPRW 12+ stores one or more candidate names per slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Texture {
    pub filenames: Vec<String>,
    pub color_index: Option<u8>,
}

impl Texture {
    pub fn filename(&self) -> &str {
        self.filenames.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRecord {
    pub id: u32,
    /// Index into [`WorldData::models`]; may be out of range, in which case
    /// `model_name` is empty and a warning was recorded.
    pub model_index: u32,
    pub model_name: String,
    pub transform: [f32; 12],
    pub position: [f64; 3],
    pub rotation: Rotation,
    pub scale: f64,
}

impl ObjectRecord {
    /// Build a record, resolving `model_index` against `models`.
    fn resolve(
        id: u32,
        model_index: u32,
        transform: [f32; 12],
        models: &[String],
        warnings: &mut Vec<Warning>,
    ) -> Self {
        let model_name = match models.get(model_index as usize) {
            Some(name) => name.clone(),
            None => {
                push_warning(
                    warnings,
                    WarningKind::InvalidModelIndex,
                    format!(
                        "object {id} references model {model_index} but only {} models exist",
                        models.len()
                    ),
                );
                String::new()
            }
        };
        Self::with_name(id, model_index, model_name, transform)
    }

    fn with_name(id: u32, model_index: u32, model_name: String, transform: [f32; 12]) -> Self {
        let Pose { position, rotation, scale } = decompose_transform(&transform);
        Self { id, model_index, model_name, transform, position, rotation, scale }
    }
}

/// Road network from the oldest grid format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadNet {
    pub name: String,
    #[serde(rename = "type")]
    pub road_type: u32,
    pub origin: [f32; 3],
    pub scale: f32,
    pub subnets: Vec<SubNet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubNet {
    pub x: f32,
    pub y: f32,
    pub triplet: u32,
    pub stepping: f32,
}

/// Road segment attached to one land cell (OPRW 12+).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadLink {
    pub cell_x: u32,
    pub cell_y: u32,
    pub positions: Vec<[f32; 3]>,
    pub connection_types: Option<Vec<u8>>,
    pub object_id: u32,
    pub model: Option<RoadLinkModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoadLinkModel {
    pub p3d_path: String,
    pub transform: [f32; 12],
    pub pose: Pose,
}

/// Named entity placement (OPRW 15+).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInfo {
    pub class_name: String,
    pub shape_name: String,
    pub position: [f32; 3],
    pub object_id: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bounds {
    pub min_elevation: f32,
    pub max_elevation: f32,
    pub world_size_x: f64,
    pub world_size_y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CellFlagSummary {
    pub ground: usize,
    pub tidal: usize,
    pub coastline: usize,
    pub sea: usize,
    pub forest: usize,
    pub roadway: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorldStats {
    pub object_count: usize,
    pub model_count: usize,
    pub texture_count: usize,
    pub peak_count: usize,
    pub road_net_count: usize,
    pub road_link_count: usize,
    pub cell_flags: CellFlagSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    InvalidModelIndex,
    RoadDataUnavailable,
    NetSectionAnomaly,
    TrailingObjectBytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

fn push_warning(warnings: &mut Vec<Warning>, kind: WarningKind, message: String) {
    warn!(?kind, "{}", message);
    warnings.push(Warning { kind, message });
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldData {
    pub format: FormatInfo,
    pub grid: GridInfo,
    pub app_id: Option<u32>,
    pub elevations: Vec<f32>,
    pub cell_bit_flags: Vec<u32>,
    pub cell_ext_flags: Vec<u32>,
    pub cell_texture_indexes: Vec<u16>,
    pub cell_env_sounds: Vec<u8>,
    pub textures: Vec<Texture>,
    pub models: Vec<String>,
    pub objects: Vec<ObjectRecord>,
    pub roads: Vec<RoadNet>,
    pub road_links: Vec<RoadLink>,
    pub entities: Vec<EntityInfo>,
    pub peaks: Vec<[f32; 3]>,
    pub max_object_id: Option<u32>,
    /// Raw trailing map info blob (OPRW 12+), left uninterpreted.
    #[serde(skip)]
    pub map_info: Vec<u8>,
    pub bounds: Bounds,
    pub stats: WorldStats,
    pub warnings: Vec<Warning>,
}

impl WorldData {
    fn new(signature: &str, version: u32, grid: GridInfo) -> Self {
        Self {
            format: FormatInfo { signature: signature.to_string(), version },
            grid,
            app_id: None,
            elevations: Vec::new(),
            cell_bit_flags: Vec::new(),
            cell_ext_flags: Vec::new(),
            cell_texture_indexes: Vec::new(),
            cell_env_sounds: Vec::new(),
            textures: Vec::new(),
            models: Vec::new(),
            objects: Vec::new(),
            roads: Vec::new(),
            road_links: Vec::new(),
            entities: Vec::new(),
            peaks: Vec::new(),
            max_object_id: None,
            map_info: Vec::new(),
            bounds: Bounds::default(),
            stats: WorldStats::default(),
            warnings: Vec::new(),
        }
    }

    /// Fill the derived `bounds` and `stats` fields.
    fn finish(mut self) -> Self {
        self.bounds = self.compute_bounds();
        self.stats = self.compute_stats();
        debug!(
            signature = %self.format.signature,
            version = self.format.version,
            objects = self.stats.object_count,
            models = self.stats.model_count,
            warnings = self.warnings.len(),
            "world decoded"
        );
        self
    }

    pub fn compute_bounds(&self) -> Bounds {
        let (min, max) = self
            .elevations
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f32, f32)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .unwrap_or((0.0, 0.0));
        Bounds {
            min_elevation: min,
            max_elevation: max,
            world_size_x: self.grid.land_size_x as f64 * self.grid.cell_size as f64,
            world_size_y: self.grid.land_size_y as f64 * self.grid.cell_size as f64,
        }
    }

    pub fn compute_stats(&self) -> WorldStats {
        let mut cell_flags = CellFlagSummary::default();
        for &bits in &self.cell_bit_flags {
            let flags = CellFlags::from_bits_retain(bits);
            match flags.surface() {
                SurfaceType::Ground => cell_flags.ground += 1,
                SurfaceType::Tidal => cell_flags.tidal += 1,
                SurfaceType::Coastline => cell_flags.coastline += 1,
                SurfaceType::Sea => cell_flags.sea += 1,
            }
            if flags.contains(CellFlags::FOREST) {
                cell_flags.forest += 1;
            }
            if flags.contains(CellFlags::ROADWAY) {
                cell_flags.roadway += 1;
            }
        }
        WorldStats {
            object_count: self.objects.len(),
            model_count: self.models.len(),
            texture_count: self.textures.len(),
            peak_count: self.peaks.len(),
            road_net_count: self.roads.len(),
            road_link_count: self.road_links.len(),
            cell_flags,
        }
    }

    /// Model name for `object`, if its index is valid.
    pub fn object_model(&self, object: &ObjectRecord) -> Option<&str> {
        self.models.get(object.model_index as usize).map(String::as_str)
    }

    /// Elevation at terrain cell `(x, y)`.
    pub fn elevation_at(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.grid.terrain_size_x || y >= self.grid.terrain_size_y {
            return None;
        }
        self.elevations
            .get(y as usize * self.grid.terrain_size_x as usize + x as usize)
            .copied()
    }

    /// Flags of land cell `(x, y)`.
    pub fn cell_flags_at(&self, x: u32, y: u32) -> Option<CellFlags> {
        if x >= self.grid.land_size_x || y >= self.grid.land_size_y {
            return None;
        }
        self.cell_bit_flags
            .get(y as usize * self.grid.land_size_x as usize + x as usize)
            .map(|&bits| CellFlags::from_bits_retain(bits))
    }
}

fn checked_area(x: u32, y: u32, limit: u64) -> Result<usize> {
    let area = x as u64 * y as u64;
    if area > limit {
        return Err(Error::GridTooLarge { x, y });
    }
    Ok(area as usize)
}

/// Area of an `x` by `y` grid, rejecting sizes no real map reaches.
fn grid_area(x: u32, y: u32) -> Result<usize> {
    checked_area(x, y, MAX_GRID_CELLS)
}

/// Area of a quadtree-coded land grid.
fn land_grid_area(x: u32, y: u32) -> Result<usize> {
    checked_area(x, y, MAX_LAND_CELLS)
}

/// `u32` count followed by that many points.
fn read_peaks<R: Read + Seek>(reader: &mut WorldReader<R>) -> Result<Vec<[f32; 3]>> {
    let count = reader.read_u32_le()?;
    let mut peaks = Vec::new();
    for _ in 0..count {
        peaks.push(reader.read_vec3()?);
    }
    Ok(peaks)
}

/// `u32` count followed by that many null-terminated model paths.
fn read_model_table<R: Read + Seek>(reader: &mut WorldReader<R>) -> Result<Vec<String>> {
    let count = reader.read_u32_le()?;
    let mut models = Vec::new();
    for _ in 0..count {
        models.push(reader.read_asciiz()?);
    }
    Ok(models)
}

/// Model table built from object names in first-seen order; returns the
/// index of each name.
fn synthesize_models(names: &[String]) -> (Vec<String>, Vec<u32>) {
    let mut set: IndexSet<&str> = IndexSet::new();
    let indexes = names
        .iter()
        .map(|name| set.insert_full(name.as_str()).0 as u32)
        .collect();
    (set.into_iter().map(str::to_string).collect(), indexes)
}

/// Decode a terrain file from `stream`.
pub fn read<R: Read + Seek>(stream: R, options: &ReadOptions) -> Result<WorldData> {
    let mut reader = WorldReader::new(stream)?;
    let signature = reader.read_signature()?;
    debug!(signature = %String::from_utf8_lossy(&signature), len = reader.len(), "reading world");

    let world = match &signature {
        b"OPRW" => {
            let version = reader.read_u32_le()?;
            match version {
                2 | 3 => legacy::parse(&mut reader, version, options)?,
                12..=25 => modern::parse(&mut reader, version, options)?,
                _ => return Err(Error::UnsupportedVersion { signature: "OPRW", version }),
            }
        }
        b"4WVR" => grid::parse(&mut reader, GridVariant::Wvr4, options)?,
        b"1WVR" => grid::parse(&mut reader, GridVariant::Wvr1, options)?,
        _ => return Err(Error::UnknownSignature(signature)),
    };
    Ok(world.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_unknown_signature() {
        let data = b"ABCD\0\0\0\0";
        let err = read(Cursor::new(&data[..]), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownSignature(sig) if &sig == b"ABCD"));
    }

    #[test]
    fn test_unsupported_oprw_version() {
        for version in [1u32, 4, 11, 26] {
            let mut data = b"OPRW".to_vec();
            data.extend_from_slice(&version.to_le_bytes());
            let err = read(Cursor::new(data), &ReadOptions::default()).unwrap_err();
            assert!(matches!(err, Error::UnsupportedVersion { version: v, .. } if v == version));
        }
    }

    #[test]
    fn test_truncated_signature() {
        let err = read(Cursor::new(&b"OP"[..]), &ReadOptions::default()).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_cell_flags_surface() {
        let flags = CellFlags::from_bits_retain(0x63);
        assert_eq!(flags.surface(), SurfaceType::Sea);
        assert!(flags.contains(CellFlags::FOREST));
        assert!(flags.contains(CellFlags::ROADWAY));
        assert_eq!(CellFlags::from_bits_retain(0x02).surface(), SurfaceType::Coastline);
    }

    #[test]
    fn test_synthesize_models_first_seen_order() {
        let names: Vec<String> = ["b.p3d", "a.p3d", "b.p3d", "c.p3d", "a.p3d"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (models, indexes) = synthesize_models(&names);
        assert_eq!(models, vec!["b.p3d", "a.p3d", "c.p3d"]);
        assert_eq!(indexes, vec![0, 1, 0, 2, 1]);
    }

    #[test]
    fn test_resolve_invalid_model_index() {
        let models = vec!["a.p3d".to_string()];
        let mut warnings = Vec::new();
        let transform = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let ok = ObjectRecord::resolve(1, 0, transform, &models, &mut warnings);
        assert_eq!(ok.model_name, "a.p3d");
        assert!(warnings.is_empty());

        let bad = ObjectRecord::resolve(7, 3, transform, &models, &mut warnings);
        assert_eq!(bad.model_name, "");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::InvalidModelIndex);
        assert!(warnings[0].message.contains("object 7"));
    }

    #[test]
    fn test_grid_area_limit() {
        assert_eq!(grid_area(4, 5).unwrap(), 20);
        assert!(matches!(grid_area(1 << 20, 1 << 20), Err(Error::GridTooLarge { .. })));
        assert_eq!(land_grid_area(1 << 13, 1 << 13).unwrap(), 1 << 26);
        assert!(matches!(land_grid_area(1 << 14, 1 << 14), Err(Error::GridTooLarge { .. })));
    }
}

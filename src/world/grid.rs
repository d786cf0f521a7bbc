//! The grid-only `4WVR` and `1WVR` layouts.
//!
//! Both carry a fixed texture-name table and no model table; models are
//! rebuilt from the object names.

use std::io::{Read, Seek};

use tracing::debug;

use super::roads::read_road_nets;
use super::{
    GridInfo, ObjectRecord, ReadOptions, Texture, WarningKind, WorldData, grid_area, push_warning,
    synthesize_models,
};
use crate::codec::{WorldReader, heading_transform};
use crate::error::Result;

pub const CELL_SIZE: f32 = 50.0;
/// Metres per stored elevation unit.
pub const ELEVATION_SCALE: f32 = 0.05;
pub const TEXTURE_NAME_SIZE: usize = 32;
const MODEL_EXTENSION: &str = ".p3d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridVariant {
    /// 128-byte object records read until end of stream.
    Wvr4,
    /// 64-byte heading records followed by road nets.
    Wvr1,
}

impl GridVariant {
    pub fn signature(self) -> &'static str {
        match self {
            GridVariant::Wvr4 => "4WVR",
            GridVariant::Wvr1 => "1WVR",
        }
    }

    /// Version tag implied by the signature.
    pub fn version(self) -> u32 {
        match self {
            GridVariant::Wvr4 => 4,
            GridVariant::Wvr1 => 1,
        }
    }

    pub fn texture_slots(self) -> usize {
        match self {
            GridVariant::Wvr4 => 512,
            GridVariant::Wvr1 => 256,
        }
    }

    pub fn record_size(self) -> u64 {
        match self {
            GridVariant::Wvr4 => 128,
            GridVariant::Wvr1 => 64,
        }
    }

    fn name_size(self) -> usize {
        match self {
            GridVariant::Wvr4 => 76,
            GridVariant::Wvr1 => 48,
        }
    }
}

/// Object as stored, before its model index is known.
struct RawObject {
    id: u32,
    name: String,
    transform: [f32; 12],
}

fn has_model_extension(name: &str) -> bool {
    name.to_ascii_lowercase().contains(MODEL_EXTENSION)
}

fn read_wvr4_objects<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    options: &ReadOptions,
) -> Result<Vec<RawObject>> {
    let variant = GridVariant::Wvr4;
    let mut objects = Vec::new();
    while !reader.is_empty() {
        if options.skip_objects {
            reader.skip(variant.record_size())?;
            continue;
        }
        let transform = reader.read_transform()?;
        let id = reader.read_u32_le()?;
        let name = reader.read_fixed_string(variant.name_size())?;
        objects.push(RawObject { id, name, transform });
    }
    Ok(objects)
}

/// Read heading records until one lacks a model name. The stream is left at
/// the start of that record.
fn read_wvr1_objects<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    options: &ReadOptions,
) -> Result<Vec<RawObject>> {
    let variant = GridVariant::Wvr1;
    let mut objects = Vec::new();
    let mut id = 0u32;
    while reader.remaining() >= variant.record_size() {
        let position = reader.read_vec3()?;
        let heading = reader.read_f32_le()?;
        let name = reader.read_fixed_string(variant.name_size())?;
        if !has_model_extension(&name) {
            reader.rewind(variant.record_size())?;
            break;
        }
        if !options.skip_objects {
            objects.push(RawObject { id, name, transform: heading_transform(position, heading) });
        }
        id += 1;
    }
    Ok(objects)
}

pub(super) fn parse<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    variant: GridVariant,
    options: &ReadOptions,
) -> Result<WorldData> {
    let size_x = reader.read_u32_le()?;
    let size_y = reader.read_u32_le()?;
    let cells = grid_area(size_x, size_y)?;
    debug!(signature = variant.signature(), size_x, size_y, "grid-only header");

    let grid = GridInfo {
        land_size_x: size_x,
        land_size_y: size_y,
        cell_size: CELL_SIZE,
        terrain_size_x: size_x,
        terrain_size_y: size_y,
    };
    let mut world = WorldData::new(variant.signature(), variant.version(), grid);

    world.elevations = reader
        .read_i16_vec(cells)?
        .into_iter()
        .map(|v| v as f32 * ELEVATION_SCALE)
        .collect();
    world.cell_texture_indexes = reader.read_u16_vec(cells)?;

    for _ in 0..variant.texture_slots() {
        let name = reader.read_fixed_string(TEXTURE_NAME_SIZE)?;
        let filenames = if name.is_empty() { Vec::new() } else { vec![name] };
        world.textures.push(Texture { filenames, color_index: None });
    }
    debug!(pos = reader.position(), "grid-only tables decoded");

    let raw = match variant {
        GridVariant::Wvr4 => {
            let raw = read_wvr4_objects(reader, options)?;
            push_warning(
                &mut world.warnings,
                WarningKind::RoadDataUnavailable,
                format!("{} files do not store road networks", variant.signature()),
            );
            raw
        }
        GridVariant::Wvr1 => {
            let raw = read_wvr1_objects(reader, options)?;
            world.roads = read_road_nets(reader, &mut world.warnings)?;
            raw
        }
    };

    let names: Vec<String> = raw.iter().map(|o| o.name.clone()).collect();
    let (models, indexes) = synthesize_models(&names);
    world.objects = raw
        .into_iter()
        .zip(indexes)
        .map(|(o, index)| ObjectRecord::with_name(o.id, index, o.name, o.transform))
        .collect();
    world.models = models;
    Ok(world)
}

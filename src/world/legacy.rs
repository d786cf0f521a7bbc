//! OPRW versions 2 and 3.

use std::io::{Read, Seek};

use tracing::debug;

use super::{
    GridInfo, ObjectRecord, ReadOptions, Texture, WarningKind, WorldData, grid_area, push_warning,
    read_model_table, read_peaks,
};
use crate::codec::compression::{
    Compression, read_compressed_f32, read_compressed_u16, read_compressed_u32, read_compressed_u8,
};
use crate::codec::{TRANSFORM_SIZE, WorldReader};
use crate::error::Result;

/// Version 2 files do not store their size.
pub const V2_GRID_SIZE: u32 = 256;
pub const CELL_SIZE: f32 = 50.0;
/// Object id that terminates the object stream.
pub const OBJECT_SENTINEL: u32 = 0xFFFF_FFFF;
/// Bytes left in an object record once its id has been read.
const OBJECT_TAIL_SIZE: u64 = 4 + TRANSFORM_SIZE as u64;

pub(super) fn parse<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    version: u32,
    options: &ReadOptions,
) -> Result<WorldData> {
    let compression = Compression::Lzss;

    let (land_x, land_y) = if version >= 3 {
        (reader.read_u32_le()?, reader.read_u32_le()?)
    } else {
        (V2_GRID_SIZE, V2_GRID_SIZE)
    };
    let cells = grid_area(land_x, land_y)?;
    debug!(version, land_x, land_y, "legacy OPRW header");

    let grid = GridInfo {
        land_size_x: land_x,
        land_size_y: land_y,
        cell_size: CELL_SIZE,
        terrain_size_x: land_x,
        terrain_size_y: land_y,
    };
    let mut world = WorldData::new("OPRW", version, grid);

    world.cell_bit_flags = read_compressed_u32(reader, cells, compression)?;
    world.cell_env_sounds = read_compressed_u8(reader, cells, compression)?;
    world.peaks = read_peaks(reader)?;
    world.cell_texture_indexes = read_compressed_u16(reader, cells, compression)?;
    world.cell_ext_flags = read_compressed_u32(reader, cells, compression)?;
    // Elevation shares the land grid at these versions.
    world.elevations = read_compressed_f32(reader, cells, compression)?;
    debug!(peaks = world.peaks.len(), pos = reader.position(), "legacy grids decoded");

    let texture_count = reader.read_u32_le()?;
    for _ in 0..texture_count {
        let name = reader.read_asciiz()?;
        let color = reader.read_u8()?;
        world.textures.push(Texture { filenames: vec![name], color_index: Some(color) });
    }
    world.models = read_model_table(reader)?;
    debug!(textures = world.textures.len(), models = world.models.len(), "legacy tables decoded");

    loop {
        let id = reader.read_u32_le()?;
        if id == OBJECT_SENTINEL {
            break;
        }
        if options.skip_objects {
            reader.skip(OBJECT_TAIL_SIZE)?;
            continue;
        }
        let model_index = reader.read_u32_le()?;
        let transform = reader.read_transform()?;
        let record = ObjectRecord::resolve(id, model_index, transform, &world.models, &mut world.warnings);
        world.objects.push(record);
    }

    push_warning(
        &mut world.warnings,
        WarningKind::RoadDataUnavailable,
        format!("OPRW version {version} does not store road networks"),
    );
    Ok(world)
}

//! OPRW versions 12 through 25.
//!
//! Sections appear in a fixed order; several only exist from (or until) a
//! given version. Land-grid layers are quadtrees, terrain-grid layers are
//! compressed flat arrays.

use std::io::{Read, Seek};

use tracing::debug;

use super::{
    EntityInfo, GridInfo, ObjectRecord, ReadOptions, RoadLink, RoadLinkModel, Texture, WarningKind,
    WorldData, grid_area, land_grid_area, push_warning, read_model_table, read_peaks,
};
use crate::codec::compression::{
    Compression, read_compressed_f32, read_compressed_u16, read_compressed_u32, read_compressed_u8,
};
use crate::codec::quadtree::{decode_quadtree_u16, decode_quadtree_u8, skip_quadtree};
use crate::codec::{TRANSFORM_SIZE, WorldReader, decompose_transform};
use crate::error::Result;

/// id + model index + transform + shape parameter.
pub const OBJECT_RECORD_SIZE: u64 = 4 + 4 + TRANSFORM_SIZE as u64 + 4;

const APP_ID_VERSION: u32 = 25;
const RANDOM_UNTIL_VERSION: u32 = 21;
const GRASS_VERSION: u32 = 18;
const PRIMARY_TEXTURE_VERSION: u32 = 22;
const ENTITY_INFO_VERSION: u32 = 15;
const CONNECTION_TYPES_VERSION: u32 = 24;
const ROAD_MODEL_VERSION: u32 = 16;

pub(super) fn parse<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    version: u32,
    options: &ReadOptions,
) -> Result<WorldData> {
    let compression = Compression::for_oprw_version(version);

    let app_id = if version >= APP_ID_VERSION { Some(reader.read_u32_le()?) } else { None };
    let land_x = reader.read_u32_le()?;
    let land_y = reader.read_u32_le()?;
    let terrain_x = reader.read_u32_le()?;
    let terrain_y = reader.read_u32_le()?;
    let cell_size = reader.read_f32_le()?;
    let land_cells = land_grid_area(land_x, land_y)?;
    let terrain_cells = grid_area(terrain_x, terrain_y)?;
    debug!(version, land_x, land_y, terrain_x, terrain_y, cell_size, codec = compression.name(), "OPRW header");

    let grid = GridInfo {
        land_size_x: land_x,
        land_size_y: land_y,
        cell_size,
        terrain_size_x: terrain_x,
        terrain_size_y: terrain_y,
    };
    let mut world = WorldData::new("OPRW", version, grid);
    world.app_id = app_id;

    world.cell_bit_flags = decode_quadtree_u16(reader, land_x, land_y)?
        .into_iter()
        .map(u32::from)
        .collect();
    world.cell_env_sounds = decode_quadtree_u8(reader, land_x, land_y)?;
    world.peaks = read_peaks(reader)?;
    world.cell_texture_indexes = decode_quadtree_u16(reader, land_x, land_y)?;
    debug!(peaks = world.peaks.len(), pos = reader.position(), "quadtree layers decoded");

    if version < RANDOM_UNTIL_VERSION {
        read_compressed_u16(reader, land_cells, compression)?;
    }
    if version >= GRASS_VERSION {
        read_compressed_u8(reader, land_cells, compression)?;
    }
    if version >= PRIMARY_TEXTURE_VERSION {
        read_compressed_u8(reader, land_cells, compression)?;
    }

    world.elevations = read_compressed_f32(reader, terrain_cells, compression)?;

    let texture_count = reader.read_u32_le()?;
    for _ in 0..texture_count {
        let name_count = reader.read_u32_le()?;
        let mut filenames = Vec::new();
        for _ in 0..name_count {
            filenames.push(reader.read_asciiz()?);
        }
        world.textures.push(Texture { filenames, color_index: None });
    }
    world.models = read_model_table(reader)?;

    if version >= ENTITY_INFO_VERSION {
        let count = reader.read_u32_le()?;
        for _ in 0..count {
            world.entities.push(EntityInfo {
                class_name: reader.read_asciiz()?,
                shape_name: reader.read_asciiz()?,
                position: reader.read_vec3()?,
                object_id: reader.read_u32_le()?,
            });
        }
    }
    debug!(
        textures = world.textures.len(),
        models = world.models.len(),
        entities = world.entities.len(),
        "OPRW tables decoded"
    );

    // Spatial indexes into the object list; redundant with the flat list below.
    skip_quadtree(reader, land_x, land_y, 4)?;
    let objects_size = reader.read_u32_le()?;
    skip_quadtree(reader, land_x, land_y, 4)?;
    let map_info_size = reader.read_u32_le()?;

    // Persistent flags and subdivision hints.
    read_compressed_u8(reader, land_cells, compression)?;
    read_compressed_u32(reader, terrain_cells, compression)?;

    world.max_object_id = Some(reader.read_u32_le()?);
    let road_net_size = reader.read_u32_le()?;
    debug!(objects_size, map_info_size, road_net_size, pos = reader.position(), "OPRW index sections");

    world.road_links = read_road_links(reader, version, land_x, land_y)?;

    read_objects(reader, objects_size, options, &mut world)?;

    world.map_info = reader.read_bytes(map_info_size as usize)?;
    Ok(world)
}

fn read_road_links<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    version: u32,
    land_x: u32,
    land_y: u32,
) -> Result<Vec<RoadLink>> {
    let mut links = Vec::new();
    for cell_y in 0..land_y {
        for cell_x in 0..land_x {
            let count = reader.read_u32_le()?;
            for _ in 0..count {
                let position_count = reader.read_u16_le()? as usize;
                let mut positions = Vec::with_capacity(position_count);
                for _ in 0..position_count {
                    positions.push(reader.read_vec3()?);
                }
                let connection_types = if version >= CONNECTION_TYPES_VERSION {
                    Some(reader.read_bytes(position_count)?)
                } else {
                    None
                };
                let object_id = reader.read_u32_le()?;
                let model = if version >= ROAD_MODEL_VERSION {
                    let p3d_path = reader.read_asciiz()?;
                    let transform = reader.read_transform()?;
                    Some(RoadLinkModel { p3d_path, transform, pose: decompose_transform(&transform) })
                } else {
                    None
                };
                links.push(RoadLink { cell_x, cell_y, positions, connection_types, object_id, model });
            }
        }
    }
    debug!(links = links.len(), "road links decoded");
    Ok(links)
}

fn read_objects<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    objects_size: u32,
    options: &ReadOptions,
    world: &mut WorldData,
) -> Result<()> {
    let size = objects_size as u64;
    let count = size / OBJECT_RECORD_SIZE;
    let trailing = size % OBJECT_RECORD_SIZE;

    if options.skip_objects {
        reader.skip(count * OBJECT_RECORD_SIZE)?;
    } else {
        for _ in 0..count {
            let id = reader.read_u32_le()?;
            let model_index = reader.read_u32_le()?;
            let transform = reader.read_transform()?;
            let _shape_param = reader.read_u32_le()?;
            let record = ObjectRecord::resolve(id, model_index, transform, &world.models, &mut world.warnings);
            world.objects.push(record);
        }
    }

    if trailing != 0 {
        reader.skip(trailing)?;
        push_warning(
            &mut world.warnings,
            WarningKind::TrailingObjectBytes,
            format!("object section is {size} bytes, {trailing} bytes past the last whole record"),
        );
    }
    debug!(count, skipped = options.skip_objects, "objects decoded");
    Ok(())
}

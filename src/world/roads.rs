//! Road networks trailing 1WVR object lists.
//!
//! The section has no length prefix: it is a run of named nets closed by an
//! `EndOfNets` record. Problems here are reported as warnings, since the
//! section start is itself found heuristically.

use std::io::{Read, Seek};

use tracing::debug;

use super::{RoadNet, SubNet, Warning, WarningKind, push_warning};
use crate::codec::WorldReader;
use crate::error::Result;

pub const NET_NAME_SIZE: usize = 24;
pub const END_OF_NETS: &str = "EndOfNets";
/// Bytes following the `EndOfNets` name.
pub const END_OF_NETS_TAIL: u64 = 40;

fn is_printable_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_graphic() || c == ' ')
}

fn read_net_body<R: Read + Seek>(reader: &mut WorldReader<R>, name: String) -> Result<RoadNet> {
    let road_type = reader.read_u32_le()?;
    let origin = reader.read_vec3()?;
    let scale = reader.read_f32_le()?;

    let mut subnets = Vec::new();
    loop {
        let x = reader.read_f32_le()?;
        let y = reader.read_f32_le()?;
        if x == 0.0 && y == 0.0 {
            break;
        }
        let triplet = reader.read_u32_le()?;
        let stepping = reader.read_f32_le()?;
        subnets.push(SubNet { x, y, triplet, stepping });
    }
    Ok(RoadNet { name, road_type, origin, scale, subnets })
}

pub(super) fn read_road_nets<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    warnings: &mut Vec<Warning>,
) -> Result<Vec<RoadNet>> {
    let mut nets = Vec::new();
    loop {
        if reader.remaining() < NET_NAME_SIZE as u64 {
            push_warning(
                warnings,
                WarningKind::NetSectionAnomaly,
                format!("road nets end without {END_OF_NETS} after {} nets", nets.len()),
            );
            break;
        }
        let start = reader.position();
        let name = reader.read_fixed_string(NET_NAME_SIZE)?;

        if name == END_OF_NETS {
            if reader.remaining() < END_OF_NETS_TAIL {
                push_warning(
                    warnings,
                    WarningKind::NetSectionAnomaly,
                    format!("{END_OF_NETS} record at {start} is cut short"),
                );
            } else {
                reader.skip(END_OF_NETS_TAIL)?;
            }
            break;
        }
        if !is_printable_name(&name) {
            push_warning(
                warnings,
                WarningKind::NetSectionAnomaly,
                format!("unreadable net name at offset {start}"),
            );
            break;
        }

        match read_net_body(reader, name) {
            Ok(net) => nets.push(net),
            Err(e) if e.is_truncation() => {
                push_warning(
                    warnings,
                    WarningKind::NetSectionAnomaly,
                    format!("net at offset {start} is truncated"),
                );
                break;
            }
            Err(e) => return Err(e),
        }
    }
    debug!(nets = nets.len(), "road nets decoded");
    Ok(nets)
}

//! WRP terrain decoding
//!
//! Reads the binary world files of several map-editor generations into one
//! [`WorldData`] shape, and rebuilds forest outlines from the placed
//! forest-block objects.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = BufReader::new(File::open("island.wrp")?);
//! let world = wrp_decode::read(file, &wrp_decode::ReadOptions::default())?;
//! let forests = wrp_decode::forest::extract_from_world(&world);
//! println!("{} objects, {} forest polygons", world.objects.len(), forests.len());
//! # Ok::<(), wrp_decode::Error>(())
//! ```

pub mod codec;
pub mod error;
pub mod forest;
pub mod world;

pub use error::{Error, Result};
pub use codec::{Pose, Rotation, compose_transform, decompose_transform};
pub use world::{
    CellFlags, GridInfo, ObjectRecord, ReadOptions, RoadLink, RoadNet, Warning, WarningKind,
    WorldData, WorldStats, read,
};
pub use forest::{ForestType, Polygon};

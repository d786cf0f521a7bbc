pub mod reader;
pub mod compression;
pub mod quadtree;
pub mod transform;
#[cfg(test)]
pub(crate) mod writer;

pub use reader::{WorldReader, fixed_string, TRANSFORM_SIZE};
pub use compression::{Compression, decompress_or_raw, lzss_decompress, lzo_decompress};
pub use quadtree::{decode_quadtree, decode_quadtree_u8, decode_quadtree_u16, skip_quadtree};
pub use transform::{Pose, Rotation, compose_transform, decompose_transform, heading_transform};

//! Bit-packed quadtree grids.
//!
//! Each tree covers a virtual grid of `leaf_w * 4^L` by `leaf_h * 4^L`
//! cells. The stream starts with a root byte: zero means one 4-byte leaf
//! covers everything, anything else starts an internal node. A node is a
//! 16-bit mask over a 4x4 tiling of its area (row-major, bit `i` for child
//! `i`); a set bit recurses, a clear bit is a 4-byte leaf repeated across
//! the child's area.
//!
//! A leaf holds 4 bytes: four 1-byte cells (2x2), two 2-byte cells (2x1)
//! or one 4-byte cell. Writes outside the requested grid are dropped, which
//! is the same as decoding the virtual grid and cropping it.

use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};

use super::reader::WorldReader;
use crate::error::{Error, Result};

/// Deepest tree a 32-bit grid dimension can need.
const MAX_LEVEL: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LeafShape {
    width: u64,
    height: u64,
    element_size: usize,
}

impl LeafShape {
    fn for_element_size(element_size: usize) -> Result<Self> {
        let (width, height) = match element_size {
            1 => (2, 2),
            2 => (2, 1),
            4 => (1, 1),
            other => return Err(Error::InvalidElementSize(other)),
        };
        Ok(Self { width, height, element_size })
    }

    /// Smallest level whose virtual grid covers `width` x `height`.
    fn level_for(&self, width: u32, height: u32) -> u32 {
        let mut level = 0;
        let (mut w, mut h) = (self.width, self.height);
        while (w < width as u64 || h < height as u64) && level < MAX_LEVEL {
            w *= 4;
            h *= 4;
            level += 1;
        }
        level
    }

    fn region(&self, level: u32) -> (u64, u64) {
        let scale = 4u64.pow(level);
        (self.width * scale, self.height * scale)
    }
}

/// Destination for decoded leaves, clipped to the requested size.
struct Grid<'a> {
    buf: &'a mut [u8],
    width: u64,
    height: u64,
    shape: LeafShape,
}

impl Grid<'_> {
    fn fill(&mut self, x0: u64, y0: u64, w: u64, h: u64, leaf: &[u8; 4]) {
        if x0 >= self.width || y0 >= self.height {
            return;
        }
        let es = self.shape.element_size;
        let x_end = (x0 + w).min(self.width);
        let y_end = (y0 + h).min(self.height);
        for y in y0..y_end {
            let ly = (y - y0) % self.shape.height;
            let row = (y * self.width) as usize;
            for x in x0..x_end {
                let lx = (x - x0) % self.shape.width;
                let k = (ly * self.shape.width + lx) as usize;
                let dst = (row + x as usize) * es;
                self.buf[dst..dst + es].copy_from_slice(&leaf[k * es..(k + 1) * es]);
            }
        }
    }
}

fn walk_node<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    shape: LeafShape,
    x0: u64,
    y0: u64,
    level: u32,
    mut grid: Option<&mut Grid<'_>>,
) -> Result<()> {
    let mask = reader.read_u16_le()?;
    let child_level = level - 1;
    let (cw, ch) = shape.region(child_level);

    for i in 0..16u64 {
        let cx = x0 + (i % 4) * cw;
        let cy = y0 + (i / 4) * ch;
        if mask & (1 << i) != 0 {
            if child_level == 0 {
                return Err(Error::InvalidQuadTree(format!(
                    "node at ({cx}, {cy}) below leaf size"
                )));
            }
            walk_node(reader, shape, cx, cy, child_level, grid.as_deref_mut())?;
        } else {
            let leaf = reader.read_array::<4>()?;
            if let Some(g) = grid.as_deref_mut() {
                g.fill(cx, cy, cw, ch, &leaf);
            }
        }
    }
    Ok(())
}

fn walk<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    shape: LeafShape,
    width: u32,
    height: u32,
    mut grid: Option<&mut Grid<'_>>,
) -> Result<()> {
    let level = shape.level_for(width, height);
    let root = reader.read_u8()?;
    if root == 0 {
        let leaf = reader.read_array::<4>()?;
        if let Some(g) = grid.as_deref_mut() {
            let (w, h) = shape.region(level);
            g.fill(0, 0, w, h, &leaf);
        }
        return Ok(());
    }
    if level == 0 {
        return Err(Error::InvalidQuadTree(format!(
            "internal root for a {width}x{height} grid that fits one leaf"
        )));
    }
    walk_node(reader, shape, 0, 0, level, grid)
}

/// Decode a quadtree into a dense row-major byte buffer of
/// `width * height * element_size` bytes.
pub fn decode_quadtree<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    width: u32,
    height: u32,
    element_size: usize,
) -> Result<Vec<u8>> {
    let shape = LeafShape::for_element_size(element_size)?;
    let mut buf = vec![0u8; width as usize * height as usize * element_size];
    let mut grid = Grid { buf: &mut buf, width: width as u64, height: height as u64, shape };
    walk(reader, shape, width, height, Some(&mut grid))?;
    Ok(buf)
}

/// Walk a quadtree without materializing it; consumes exactly the bytes
/// [`decode_quadtree`] would.
pub fn skip_quadtree<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    width: u32,
    height: u32,
    element_size: usize,
) -> Result<()> {
    let shape = LeafShape::for_element_size(element_size)?;
    walk(reader, shape, width, height, None)
}

pub fn decode_quadtree_u8<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    decode_quadtree(reader, width, height, 1)
}

pub fn decode_quadtree_u16<R: Read + Seek>(
    reader: &mut WorldReader<R>,
    width: u32,
    height: u32,
) -> Result<Vec<u16>> {
    let bytes = decode_quadtree(reader, width, height, 2)?;
    let mut out = vec![0u16; width as usize * height as usize];
    LittleEndian::read_u16_into(&bytes, &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::writer::BinaryWriter;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn reader(data: &[u8]) -> WorldReader<Cursor<&[u8]>> {
        WorldReader::new(Cursor::new(data)).unwrap()
    }

    /// Encode every node down to leaf level, padding outside the grid with zeros.
    fn encode_full(grid: &[u8], width: u32, height: u32, element_size: usize) -> Vec<u8> {
        let shape = LeafShape::for_element_size(element_size).unwrap();
        let level = shape.level_for(width, height);
        let mut w = BinaryWriter::new();
        w.write_u8(1);
        encode_node(&mut w, grid, width as u64, height as u64, shape, 0, 0, level);
        w.into_vec()
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_node(
        w: &mut BinaryWriter,
        grid: &[u8],
        width: u64,
        height: u64,
        shape: LeafShape,
        x0: u64,
        y0: u64,
        level: u32,
    ) {
        let child_level = level - 1;
        let (cw, ch) = shape.region(child_level);
        let mask: u16 = if child_level == 0 { 0 } else { 0xFFFF };
        w.write_u16_le(mask);
        for i in 0..16u64 {
            let cx = x0 + (i % 4) * cw;
            let cy = y0 + (i / 4) * ch;
            if child_level > 0 {
                encode_node(w, grid, width, height, shape, cx, cy, child_level);
                continue;
            }
            let es = shape.element_size;
            let mut leaf = [0u8; 4];
            for ly in 0..shape.height {
                for lx in 0..shape.width {
                    let (x, y) = (cx + lx, cy + ly);
                    if x < width && y < height {
                        let k = (ly * shape.width + lx) as usize;
                        let src = ((y * width + x) as usize) * es;
                        leaf[k * es..(k + 1) * es].copy_from_slice(&grid[src..src + es]);
                    }
                }
            }
            w.write_bytes(&leaf);
        }
    }

    #[test]
    fn test_single_leaf_fills_grid() {
        let data = [0u8, 1, 2, 3, 4];
        let mut r = reader(&data);
        let out = decode_quadtree(&mut r, 3, 3, 1).unwrap();
        assert_eq!(out, vec![1, 2, 1, 3, 4, 3, 1, 2, 1]);
        assert!(r.is_empty());

        let mut r = reader(&data);
        let out = decode_quadtree_u16(&mut r, 3, 2).unwrap();
        assert_eq!(out, vec![0x0201, 0x0403, 0x0201, 0x0201, 0x0403, 0x0201]);
    }

    #[test]
    fn test_full_tree_round_trip() {
        for &(w, h, es) in &[(7u32, 5u32, 1usize), (9, 9, 2), (5, 3, 4), (33, 17, 2)] {
            let grid: Vec<u8> = (0..(w * h) as usize * es).map(|i| (i * 31 % 256) as u8).collect();
            let encoded = encode_full(&grid, w, h, es);
            let mut r = reader(&encoded);
            let decoded = decode_quadtree(&mut r, w, h, es).unwrap();
            assert_eq!(decoded, grid, "{w}x{h}x{es}");
            assert!(r.is_empty());
        }
    }

    #[test]
    fn test_mixed_node_and_leaf_children() {
        // 16x16 bytes: level 2, children are 8x8. Child 0 is subdivided into
        // sixteen 2x2 leaves, the other fifteen children are single leaves.
        let mut w = BinaryWriter::new();
        w.write_u8(1);
        w.write_u16_le(0x0001);
        w.write_u16_le(0);
        for i in 0..16u8 {
            w.write_bytes(&[i; 4]);
        }
        for i in 1..16u8 {
            w.write_bytes(&[100 + i; 4]);
        }
        let data = w.into_vec();
        let mut r = reader(&data);
        let out = decode_quadtree(&mut r, 16, 16, 1).unwrap();
        assert!(r.is_empty());
        assert_eq!(out[2], 1);
        assert_eq!(out[3 * 16 + 3], 5);
        assert_eq!(out[8], 101);
        assert_eq!(out[15 * 16 + 15], 105);
    }

    #[test]
    fn test_node_below_leaf_size_is_rejected() {
        // 2x2 bytes fits one leaf: level 0, so any internal root is invalid.
        let data = [1u8, 0x00, 0x00];
        let mut r = reader(&data);
        assert!(matches!(decode_quadtree(&mut r, 2, 2, 1), Err(Error::InvalidQuadTree(_))));
    }

    #[test]
    fn test_invalid_element_size() {
        let data = [0u8; 8];
        let mut r = reader(&data);
        assert!(matches!(decode_quadtree(&mut r, 4, 4, 3), Err(Error::InvalidElementSize(3))));
        assert!(matches!(skip_quadtree(&mut r, 4, 4, 8), Err(Error::InvalidElementSize(8))));
    }

    #[test]
    fn test_truncated_tree() {
        let data = [1u8, 0xFF];
        let mut r = reader(&data);
        assert!(decode_quadtree(&mut r, 16, 16, 4).unwrap_err().is_truncation());
    }

    /// Build a random tree from a stream of masks; leaves are filled with `fill`.
    fn encode_random(w: &mut BinaryWriter, level: u32, masks: &mut impl Iterator<Item = u16>, fill: u8) {
        let mask = if level <= 1 { 0 } else { masks.next().unwrap_or(0) };
        w.write_u16_le(mask);
        for i in 0..16 {
            if mask & (1 << i) != 0 {
                encode_random(w, level - 1, masks, fill);
            } else {
                w.write_bytes(&[fill; 4]);
            }
        }
    }

    proptest! {
        #[test]
        fn skip_consumes_same_bytes_as_decode(
            masks in prop::collection::vec(any::<u16>(), 1..6),
            width in 1u32..70,
            height in 1u32..70,
            es in prop::sample::select(vec![1usize, 2, 4]),
        ) {
            let shape = LeafShape::for_element_size(es).unwrap();
            let level = shape.level_for(width, height);
            let mut w = BinaryWriter::new();
            if level == 0 {
                w.write_u8(0);
                w.write_bytes(&[7; 4]);
            } else {
                w.write_u8(1);
                encode_random(&mut w, level, &mut masks.into_iter(), 7);
            }
            // Trailing byte so "at end" cannot hide an over-read.
            w.write_u8(0xEE);
            let data = w.into_vec();

            let mut r = reader(&data);
            let decoded = decode_quadtree(&mut r, width, height, es).unwrap();
            let decoded_pos = r.position();

            let mut r = reader(&data);
            skip_quadtree(&mut r, width, height, es).unwrap();
            prop_assert_eq!(r.position(), decoded_pos);
            prop_assert_eq!(decoded_pos, data.len() as u64 - 1);
            prop_assert!(decoded.iter().all(|&b| b == 7));
        }
    }
}

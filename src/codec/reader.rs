use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Size of a serialized 4x3 transform matrix.
pub const TRANSFORM_SIZE: usize = 48;

fn map_eof(context: &'static str) -> impl Fn(io::Error) -> Error {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof { context }
        } else {
            Error::Io(e)
        }
    }
}

/// Little-endian primitive reader over a seekable stream.
///
/// Keeps its own cursor so `remaining()` is cheap; every read that comes up
/// short fails with [`Error::UnexpectedEof`].
pub struct WorldReader<R> {
    inner: R,
    pos: u64,
    len: u64,
}

impl<R: Read + Seek> WorldReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self { inner, pos, len })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(Error::UnexpectedEof { context: "seek" });
        }
        self.inner.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Move the cursor back by `n` bytes.
    pub fn rewind(&mut self, n: u64) -> Result<()> {
        let pos = self.pos.checked_sub(n).ok_or_else(|| {
            Error::Io(io::Error::new(io::ErrorKind::InvalidInput, "rewind before start of stream"))
        })?;
        self.seek_to(pos)
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::UnexpectedEof { context: "skip" });
        }
        self.inner.seek(SeekFrom::Current(n as i64))?;
        self.pos += n;
        Ok(())
    }

    /// Run `f` on the underlying stream, then resync the cursor to wherever
    /// `f` left it.
    pub fn with_inner<T>(&mut self, f: impl FnOnce(&mut R) -> T) -> Result<T> {
        let out = f(&mut self.inner);
        self.pos = self.inner.stream_position()?;
        Ok(out)
    }

    fn ensure(&self, n: u64, context: &'static str) -> Result<()> {
        if self.remaining() < n {
            return Err(Error::UnexpectedEof { context });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.inner.read_u8().map_err(map_eof("u8"))?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        let v = self.inner.read_u16::<LittleEndian>().map_err(map_eof("u16"))?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_i16_le(&mut self) -> Result<i16> {
        let v = self.inner.read_i16::<LittleEndian>().map_err(map_eof("i16"))?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let v = self.inner.read_u32::<LittleEndian>().map_err(map_eof("u32"))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        let v = self.inner.read_i32::<LittleEndian>().map_err(map_eof("i32"))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_f32_le(&mut self) -> Result<f32> {
        let v = self.inner.read_f32::<LittleEndian>().map_err(map_eof("f32"))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.ensure(n as u64, "bytes")?;
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf).map_err(map_eof("bytes"))?;
        self.pos += n as u64;
        Ok(buf)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf).map_err(map_eof("bytes"))?;
        self.pos += N as u64;
        Ok(buf)
    }

    pub fn read_signature(&mut self) -> Result<[u8; 4]> {
        self.read_array::<4>()
            .map_err(|_| Error::UnexpectedEof { context: "signature" })
    }

    /// Read a null-terminated string.
    pub fn read_asciiz(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            let b = self.read_u8().map_err(|_| Error::UnexpectedEof { context: "asciiz string" })?;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read an `n`-byte field and cut it at the first null.
    pub fn read_fixed_string(&mut self, n: usize) -> Result<String> {
        let bytes = self.read_bytes(n)?;
        Ok(fixed_string(&bytes))
    }

    pub fn read_vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32_le()?, self.read_f32_le()?, self.read_f32_le()?])
    }

    pub fn read_transform(&mut self) -> Result<[f32; 12]> {
        let mut m = [0f32; 12];
        self.ensure(TRANSFORM_SIZE as u64, "transform")?;
        self.inner
            .read_f32_into::<LittleEndian>(&mut m)
            .map_err(map_eof("transform"))?;
        self.pos += TRANSFORM_SIZE as u64;
        Ok(m)
    }

    pub fn read_f32_vec(&mut self, count: usize) -> Result<Vec<f32>> {
        self.ensure(count as u64 * 4, "f32 array")?;
        let mut out = vec![0f32; count];
        self.inner
            .read_f32_into::<LittleEndian>(&mut out)
            .map_err(map_eof("f32 array"))?;
        self.pos += count as u64 * 4;
        Ok(out)
    }

    pub fn read_u16_vec(&mut self, count: usize) -> Result<Vec<u16>> {
        self.ensure(count as u64 * 2, "u16 array")?;
        let mut out = vec![0u16; count];
        self.inner
            .read_u16_into::<LittleEndian>(&mut out)
            .map_err(map_eof("u16 array"))?;
        self.pos += count as u64 * 2;
        Ok(out)
    }

    pub fn read_i16_vec(&mut self, count: usize) -> Result<Vec<i16>> {
        self.ensure(count as u64 * 2, "i16 array")?;
        let mut out = vec![0i16; count];
        self.inner
            .read_i16_into::<LittleEndian>(&mut out)
            .map_err(map_eof("i16 array"))?;
        self.pos += count as u64 * 2;
        Ok(out)
    }

    pub fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>> {
        self.ensure(count as u64 * 4, "u32 array")?;
        let mut out = vec![0u32; count];
        self.inner
            .read_u32_into::<LittleEndian>(&mut out)
            .map_err(map_eof("u32 array"))?;
        self.pos += count as u64 * 4;
        Ok(out)
    }
}

/// Decode a fixed-width, null-padded name buffer.
pub fn fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

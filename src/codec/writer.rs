/// Little-endian writer used to assemble fixture streams in tests.
pub struct BinaryWriter {
    data: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_u16_le(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i16_le(&mut self, v: i16) {
        self.write_u16_le(v as u16);
    }

    pub fn write_u32_le(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32_le(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_asciiz(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.write_u8(0);
    }

    /// Write `s` into an `n`-byte null-padded field.
    pub fn write_fixed_string(&mut self, s: &str, n: usize) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(n);
        self.write_bytes(&bytes[..len]);
        self.data.resize(self.data.len() + (n - len), 0);
    }

    pub fn write_vec3(&mut self, v: [f32; 3]) {
        for c in v {
            self.write_f32_le(c);
        }
    }

    pub fn write_transform(&mut self, m: &[f32; 12]) {
        for &c in m {
            self.write_f32_le(c);
        }
    }

    /// Write `payload` as an LZSS stream made only of literals, followed by
    /// its checksum.
    pub fn write_lzss_literals(&mut self, payload: &[u8]) {
        for chunk in payload.chunks(8) {
            self.write_u8(0xFF);
            self.write_bytes(chunk);
        }
        let checksum = payload.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32));
        self.write_u32_le(checksum);
    }

    /// Write `payload` as an LZO1X stream made of one literal run.
    pub fn write_lzo_literals(&mut self, payload: &[u8]) {
        let n = payload.len();
        assert!(n > 3);
        if n <= 238 {
            self.write_u8((n + 17) as u8);
        } else {
            // Long literal run: t = 0, then 255-steps of the remainder over 18.
            self.write_u8(0);
            let mut rest = n - 3 - 15;
            while rest > 255 {
                self.write_u8(0);
                rest -= 255;
            }
            self.write_u8(rest as u8);
        }
        self.write_bytes(payload);
        // End-of-stream marker.
        self.write_bytes(&[0x11, 0x00, 0x00]);
    }
}

impl Default for BinaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_string_padding() {
        let mut w = BinaryWriter::new();
        w.write_fixed_string("abc", 6);
        assert_eq!(w.into_vec(), b"abc\0\0\0");
    }
}

use byteorder::{ByteOrder, LittleEndian};

use crate::{DeavmError, StringFormat};

// Positions are absolute: a sub-reader keeps counting from where its parent
// stood.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u32,
    bit_buf: u8,
    bits_pending: u8,
    strings: StringFormat,
    lossy: bool,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8], strings: StringFormat) -> Self {
        Self {
            buf,
            pos: 0,
            base: 0,
            bit_buf: 0,
            bits_pending: 0,
            strings,
            lossy: false,
        }
    }

    pub fn position(&self) -> u32 {
        self.base + self.pos as u32
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// True once a string read by this reader was not valid UTF-8 and had
    /// bytes replaced.
    pub fn saw_invalid_utf8(&self) -> bool {
        self.lossy
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DeavmError> {
        self.bits_pending = 0;
        if self.remaining() < n {
            return Err(DeavmError::Eof { pos: self.position() });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn get_u8(&mut self) -> Result<u8, DeavmError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16, DeavmError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn get_i16(&mut self) -> Result<i16, DeavmError> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn get_u32(&mut self) -> Result<u32, DeavmError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn get_i32(&mut self) -> Result<i32, DeavmError> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn get_f32(&mut self) -> Result<f32, DeavmError> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// SWF doubles are stored as two little-endian words, high word first.
    pub fn get_swf_f64(&mut self) -> Result<f64, DeavmError> {
        let b = self.take(8)?;
        let mut le = [0u8; 8];
        le[..4].copy_from_slice(&b[4..]);
        le[4..].copy_from_slice(&b[..4]);
        Ok(LittleEndian::read_f64(&le))
    }

    pub fn get_rest(&mut self) -> &'a [u8] {
        self.bits_pending = 0;
        let buf = self.buf;
        let s = &buf[self.pos.min(buf.len())..];
        self.pos = buf.len();
        s
    }

    pub fn get_string(&mut self) -> Result<String, DeavmError> {
        let bytes = match self.strings {
            StringFormat::NulTerminated => {
                let rest = &self.buf[self.pos.min(self.buf.len())..];
                let n = rest.iter().position(|&b| b == 0).ok_or(DeavmError::Eof {
                    pos: self.base + self.buf.len() as u32,
                })?;
                let s = self.take(n)?;
                self.take(1)?;
                s
            }
            StringFormat::LengthPrefixed => {
                let n = self.get_u16()? as usize;
                self.take(n)?
            }
        };
        Ok(match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                self.lossy = true;
                String::from_utf8_lossy(bytes).into_owned()
            }
        })
    }

    // MSB first. A byte read in between drops the partially consumed byte.
    pub fn get_ub(&mut self, bits: u32) -> Result<u32, DeavmError> {
        let mut v: u32 = 0;
        for _ in 0..bits {
            if self.bits_pending == 0 {
                if self.remaining() < 1 {
                    return Err(DeavmError::Eof { pos: self.position() });
                }
                self.bit_buf = self.buf[self.pos];
                self.pos += 1;
                self.bits_pending = 8;
            }
            self.bits_pending -= 1;
            v = (v << 1) | ((self.bit_buf >> self.bits_pending) & 1) as u32;
        }
        Ok(v)
    }

    pub fn get_flag(&mut self) -> Result<bool, DeavmError> {
        Ok(self.get_ub(1)? == 1)
    }

    pub fn sub_reader(&mut self, n: usize) -> Result<Reader<'a>, DeavmError> {
        let base = self.position();
        let buf = self.take(n)?;
        Ok(Reader {
            buf,
            pos: 0,
            base,
            bit_buf: 0,
            bits_pending: 0,
            strings: self.strings,
            lossy: false,
        })
    }
}

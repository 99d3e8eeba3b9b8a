//! Big-endian cursor over class-file bytes.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Cursor};

pub struct ClassStream<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ClassStream<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.cursor.read_u8()
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.cursor.read_u16::<BigEndian>()
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.cursor.read_u32::<BigEndian>()
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        self.cursor.read_i32::<BigEndian>()
    }

    pub fn read_i64(&mut self) -> io::Result<i64> {
        self.cursor.read_i64::<BigEndian>()
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        self.cursor.read_f32::<BigEndian>()
    }

    pub fn read_f64(&mut self) -> io::Result<f64> {
        self.cursor.read_f64::<BigEndian>()
    }

    /// Borrows the next `len` bytes without copying.
    pub fn read_slice(&mut self, len: usize) -> io::Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(eof(len, self.remaining()));
        }
        let start = self.position();
        let bytes: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + len) as u64);
        Ok(&bytes[start..start + len])
    }

    /// Copies out `len` bytes. The length is checked against what is left
    /// before anything is allocated.
    pub fn read_full(&mut self, len: usize) -> io::Result<Vec<u8>> {
        Ok(self.read_slice(len)?.to_vec())
    }

    /// Advances past `len` bytes; running off the end is an error.
    pub fn discard(&mut self, len: usize) -> io::Result<()> {
        if len > self.remaining() {
            return Err(eof(len, self.remaining()));
        }
        self.cursor.set_position((self.position() + len) as u64);
        Ok(())
    }
}

fn eof(wanted: usize, remaining: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("class stream truncated: wanted {wanted} bytes, {remaining} remaining"),
    )
}

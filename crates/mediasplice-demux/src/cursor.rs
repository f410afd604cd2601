//! Sequential byte and bit cursors.
//!
//! [`ByteCursor`] wraps any seekable source and keeps track of the current
//! position itself so that end-of-stream checks don't need a seek. Positions
//! can be pushed with [`ByteCursor::save_pos`] and popped again with
//! [`ByteCursor::restore_pos`].
//!
//! [`BitCursor`] reads big-endian bit fields from an in-memory slice.

use std::io::{self, Read, Seek, SeekFrom};

use bitstream_io::{BigEndian, BitRead, BitReader};

/// Big-endian/little-endian reader over a seekable byte source.
pub struct ByteCursor<R> {
    inner: R,
    size: u64,
    pos: u64,
    saved: Vec<u64>,
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wrap a source. The total size is determined once, up front.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            size,
            pos: 0,
            saved: Vec::new(),
        })
    }

    /// Total size of the source in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current absolute position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Whether the cursor is at or past the end of the source.
    pub fn eof(&self) -> bool {
        self.pos >= self.size
    }

    /// Seek to an absolute position.
    pub fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.pos = self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Seek relative to the current position.
    pub fn skip(&mut self, delta: i64) -> io::Result<()> {
        let target = self.pos.checked_add_signed(delta).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        self.seek_to(target)
    }

    /// Push the current position onto the save stack.
    pub fn save_pos(&mut self) {
        self.saved.push(self.pos);
    }

    /// Pop the most recently saved position and seek back to it.
    pub fn restore_pos(&mut self) -> io::Result<()> {
        match self.saved.pop() {
            Some(pos) => self.seek_to(pos),
            None => Err(io::Error::new(
                io::ErrorKind::Other,
                "restore_pos without matching save_pos",
            )),
        }
    }

    /// Fill `buf` completely or fail.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self.inner.read_exact(buf) {
            Ok(()) => {
                self.pos += buf.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.pos = self.inner.stream_position()?;
                Err(e)
            }
        }
    }

    /// Read exactly `len` bytes into a new vector.
    pub fn read_vec(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read up to `len` bytes, stopping early at the end of the source.
    pub fn read_up_to(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len);
        let read = (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        self.pos += read as u64;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    pub fn read_u16_be(&mut self) -> io::Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    pub fn read_u32_be(&mut self) -> io::Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_le_bytes(b))
    }
}

/// Big-endian bit reader over a byte slice.
pub struct BitCursor<'a> {
    reader: BitReader<&'a [u8], BigEndian>,
    len_bits: u64,
    consumed: u64,
}

impl<'a> BitCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BitReader::endian(data, BigEndian),
            len_bits: data.len() as u64 * 8,
            consumed: 0,
        }
    }

    /// Read up to 32 bits as an unsigned value.
    pub fn get_bits(&mut self, bits: u32) -> io::Result<u32> {
        if bits == 0 {
            return Ok(0);
        }
        let value = self.reader.read::<u32>(bits)?;
        self.consumed += u64::from(bits);
        Ok(value)
    }

    pub fn get_bit(&mut self) -> io::Result<bool> {
        let bit = self.reader.read_bit()?;
        self.consumed += 1;
        Ok(bit)
    }

    pub fn skip_bits(&mut self, bits: u32) -> io::Result<()> {
        self.reader.skip(bits)?;
        self.consumed += u64::from(bits);
        Ok(())
    }

    /// Exp-Golomb coded unsigned value, `ue(v)`.
    pub fn get_unsigned_golomb(&mut self) -> io::Result<u32> {
        let mut leading_zeros = 0u32;
        while !self.get_bit()? {
            leading_zeros += 1;
            if leading_zeros > 31 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Exp-Golomb code too long",
                ));
            }
        }
        let suffix = self.get_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32)
    }

    /// Exp-Golomb coded signed value, `se(v)`.
    pub fn get_signed_golomb(&mut self) -> io::Result<i32> {
        let code = i64::from(self.get_unsigned_golomb()?);
        let value = if code & 1 == 1 {
            (code + 1) / 2
        } else {
            -(code / 2)
        };
        Ok(value as i32)
    }

    /// Number of bits not yet consumed.
    pub fn bits_left(&self) -> u64 {
        self.len_bits.saturating_sub(self.consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_byte_cursor_reads_and_positions() {
        let data = vec![0x00, 0x00, 0x01, 0xba, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut io = ByteCursor::new(Cursor::new(data)).unwrap();

        assert_eq!(io.size(), 10);
        assert_eq!(io.read_u32_be().unwrap(), 0x0000_01ba);
        assert_eq!(io.position(), 4);
        assert_eq!(io.read_u16_le().unwrap(), 0x1234);
        assert_eq!(io.read_u32_le().unwrap(), 0x1234_5678);
        assert!(io.eof());
        assert!(io.read_u8().is_err());
    }

    #[test]
    fn test_save_and_restore_nest() {
        let mut io = ByteCursor::new(Cursor::new(vec![1u8, 2, 3, 4, 5])).unwrap();
        io.save_pos();
        io.skip(2).unwrap();
        io.save_pos();
        assert_eq!(io.read_u8().unwrap(), 3);
        io.restore_pos().unwrap();
        assert_eq!(io.position(), 2);
        io.restore_pos().unwrap();
        assert_eq!(io.read_u8().unwrap(), 1);
        assert!(io.restore_pos().is_err());
    }

    #[test]
    fn test_skip_before_start_fails() {
        let mut io = ByteCursor::new(Cursor::new(vec![0u8; 4])).unwrap();
        assert!(io.skip(-1).is_err());
    }

    #[test]
    fn test_read_up_to_stops_at_end() {
        let mut io = ByteCursor::new(Cursor::new(vec![9u8; 6])).unwrap();
        io.skip(4).unwrap();
        assert_eq!(io.read_up_to(10).unwrap(), vec![9, 9]);
        assert_eq!(io.position(), 6);
    }

    #[test]
    fn test_bit_cursor_golomb() {
        // 1 | 010 | 011 | 00100 -> ue 0, 1, 2, 3
        let data = [0b1010_0110, 0b0100_0000];
        let mut bc = BitCursor::new(&data);
        assert_eq!(bc.get_unsigned_golomb().unwrap(), 0);
        assert_eq!(bc.get_unsigned_golomb().unwrap(), 1);
        assert_eq!(bc.get_unsigned_golomb().unwrap(), 2);
        assert_eq!(bc.get_unsigned_golomb().unwrap(), 3);
        assert_eq!(bc.bits_left(), 4);
    }

    #[test]
    fn test_bit_cursor_signed_golomb() {
        // 010 -> +1, 011 -> -1
        let data = [0b0100_1100];
        let mut bc = BitCursor::new(&data);
        assert_eq!(bc.get_signed_golomb().unwrap(), 1);
        assert_eq!(bc.get_signed_golomb().unwrap(), -1);
    }
}

//! ID3 tag size detection for formats that may be wrapped in tags.

use std::io::{self, Read, Seek};

use crate::cursor::ByteCursor;

const ID3V1_SIZE: u64 = 128;
const ID3V2_HEADER_SIZE: u64 = 10;
const ID3V2_FOOTER_FLAG: u8 = 0x10;

fn syncsafe(bytes: &[u8]) -> Option<u64> {
    bytes.iter().try_fold(0u64, |acc, &b| {
        if b & 0x80 != 0 {
            None
        } else {
            Some((acc << 7) | u64::from(b))
        }
    })
}

/// Parse a 10 byte ID3v2 header or footer, returning the full tag size.
fn v2_tag_size(header: &[u8; 10], magic: &[u8; 3]) -> Option<u64> {
    if &header[..3] != magic || header[3] == 0xff || header[4] == 0xff {
        return None;
    }
    let mut size = syncsafe(&header[6..10])? + ID3V2_HEADER_SIZE;
    if header[5] & ID3V2_FOOTER_FLAG != 0 {
        size += ID3V2_HEADER_SIZE;
    }
    Some(size)
}

/// Skip a leading ID3v2 tag at the start of the source.
///
/// Leaves the cursor directly after the tag and returns its size, or
/// rewinds to the start and returns 0 if there is no tag.
pub fn skip_id3v2_tag<R: Read + Seek>(io: &mut ByteCursor<R>) -> io::Result<u64> {
    io.seek_to(0)?;
    let mut header = [0u8; 10];
    if io.read_exact(&mut header).is_err() {
        io.seek_to(0)?;
        return Ok(0);
    }
    match v2_tag_size(&header, b"ID3") {
        Some(size) => {
            io.seek_to(size)?;
            Ok(size)
        }
        None => {
            io.seek_to(0)?;
            Ok(0)
        }
    }
}

/// Combined size of the tags at the end of the source: an ID3v1 tag
/// and/or an ID3v2 tag with footer. The position is left untouched.
pub fn trailing_tag_size<R: Read + Seek>(io: &mut ByteCursor<R>) -> io::Result<u64> {
    io.save_pos();
    let result = scan_trailing_tags(io);
    io.restore_pos()?;
    result
}

fn scan_trailing_tags<R: Read + Seek>(io: &mut ByteCursor<R>) -> io::Result<u64> {
    let size = io.size();
    let mut total = 0;

    if size >= ID3V1_SIZE {
        io.seek_to(size - ID3V1_SIZE)?;
        let mut magic = [0u8; 3];
        io.read_exact(&mut magic)?;
        if &magic == b"TAG" {
            total += ID3V1_SIZE;
        }
    }

    if size >= total + ID3V2_HEADER_SIZE {
        io.seek_to(size - total - ID3V2_HEADER_SIZE)?;
        let mut footer = [0u8; 10];
        io.read_exact(&mut footer)?;
        if let Some(tag_size) = v2_tag_size(&footer, b"3DI") {
            if tag_size <= size - total {
                total += tag_size;
            }
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn id3v2(magic: &[u8; 3], body: usize, footer: bool) -> Vec<u8> {
        let mut tag = magic.to_vec();
        tag.extend_from_slice(&[4, 0, if footer { ID3V2_FOOTER_FLAG } else { 0 }]);
        tag.extend_from_slice(&[0, 0, (body >> 7) as u8 & 0x7f, body as u8 & 0x7f]);
        tag
    }

    #[test]
    fn test_skip_leading_tag() {
        let mut data = id3v2(b"ID3", 200, false);
        data.extend_from_slice(&[0u8; 200]);
        data.extend_from_slice(b"TTA1");

        let mut io = ByteCursor::new(Cursor::new(data)).unwrap();
        assert_eq!(skip_id3v2_tag(&mut io).unwrap(), 210);
        assert_eq!(io.read_vec(4).unwrap(), b"TTA1");
    }

    #[test]
    fn test_no_leading_tag_rewinds() {
        let mut io = ByteCursor::new(Cursor::new(b"TTA1 and some more bytes".to_vec())).unwrap();
        assert_eq!(skip_id3v2_tag(&mut io).unwrap(), 0);
        assert_eq!(io.position(), 0);
    }

    #[test]
    fn test_trailing_v1_and_v2_footer() {
        let mut data = vec![0u8; 64];
        // v2 tag with footer: header, 20 byte body, footer
        data.extend_from_slice(&id3v2(b"ID3", 20, true));
        data.extend_from_slice(&[0u8; 20]);
        data.extend_from_slice(&id3v2(b"3DI", 20, true));
        let mut v1 = b"TAG".to_vec();
        v1.resize(128, 0);
        data.extend_from_slice(&v1);

        let mut io = ByteCursor::new(Cursor::new(data)).unwrap();
        io.seek_to(5).unwrap();
        assert_eq!(trailing_tag_size(&mut io).unwrap(), 128 + 40);
        assert_eq!(io.position(), 5);
    }

    #[test]
    fn test_rejects_non_syncsafe_size() {
        assert_eq!(syncsafe(&[0, 0, 0x80, 0]), None);
        assert_eq!(syncsafe(&[0, 0, 1, 0x7f]), Some(255));
    }
}

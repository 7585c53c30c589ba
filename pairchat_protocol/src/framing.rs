// Length-delimited message framing over TCP.
//
// Wire format: a 4-byte big-endian length prefix followed by that many bytes
// of JSON. `write_message` / `read_message` move raw frames and know nothing
// about JSON; `write_json` / `read_json` layer serde on top for callers that
// don't need to tell a bad frame from a bad document.
//
// `MAX_MESSAGE_SIZE` (1 MiB) bounds the allocation a hostile length prefix can
// trigger. Session descriptions with many codecs are the largest legitimate
// payloads and stay well under 64 KiB.

use std::io::{self, Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Maximum allowed frame size (1 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

/// Write a length-delimited message: 4-byte big-endian length, then payload.
pub fn write_message<W: Write>(writer: &mut W, msg: &[u8]) -> io::Result<()> {
    let len = u32::try_from(msg.len())
        .ok()
        .filter(|&len| len <= MAX_MESSAGE_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "message too large: {} bytes (max {MAX_MESSAGE_SIZE})",
                    msg.len()
                ),
            )
        })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(msg)?;
    writer.flush()?;
    Ok(())
}

/// Read a length-delimited message: 4-byte big-endian length, then payload.
///
/// Returns `UnexpectedEof` if the stream closes before or during a frame, and
/// `InvalidData` if the length exceeds `MAX_MESSAGE_SIZE`.
pub fn read_message<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {len} bytes (max {MAX_MESSAGE_SIZE})"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Serialize `msg` to JSON and write it as one frame.
pub fn write_json<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    let json = serde_json::to_vec(msg)?;
    write_message(writer, &json)
}

/// Read one frame and deserialize it. A frame that isn't a valid `T` comes
/// back as `InvalidData`.
pub fn read_json<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<T> {
    let bytes = read_message(reader)?;
    serde_json::from_slice(&bytes).map_err(io::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_frame_survives() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"").unwrap();
        assert_eq!(buf, vec![0, 0, 0, 0]);

        let mut cursor = Cursor::new(&buf);
        assert!(read_message(&mut cursor).unwrap().is_empty());
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"abc").unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 3]);
        assert_eq!(&buf[4..], b"abc");
    }

    #[test]
    fn rejects_oversized_write() {
        let big = vec![0u8; MAX_MESSAGE_SIZE as usize + 1];
        let mut buf = Vec::new();
        let err = write_message(&mut buf, &big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_oversized_read() {
        let fake_len = (MAX_MESSAGE_SIZE + 1).to_be_bytes();
        let mut cursor = Cursor::new(fake_len.to_vec());
        let err = read_message(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_unexpected_eof() {
        // Only 2 bytes when 4 are needed for the length prefix.
        let mut cursor = Cursor::new(vec![0u8, 1]);
        let err = read_message(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn truncated_body_is_eof() {
        let mut cursor = Cursor::new(vec![0u8, 0, 0, 10, b'x', b'y']);
        let err = read_message(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn read_json_reports_bad_document_as_invalid_data() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"{not json").unwrap();
        let mut cursor = Cursor::new(&buf);
        let err = read_json::<_, serde_json::Value>(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn frames_read_back_in_order() {
        let mut buf = Vec::new();
        for n in 0..3u32 {
            write_json(&mut buf, &n).unwrap();
        }
        let mut cursor = Cursor::new(&buf);
        for n in 0..3u32 {
            assert_eq!(read_json::<_, u32>(&mut cursor).unwrap(), n);
        }
    }
}

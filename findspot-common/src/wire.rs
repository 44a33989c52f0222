//! Length-prefixed frame codec.
//!
//! Encoding is strict (uppercase, zero-padded, eight digits); decoding accepts
//! either hex case so a hand-written controller is not rejected over casing.

use log::{debug, warn};
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::{HEADER_LEN, MAX_BODY_LEN};

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Frame body of {0} bytes does not fit an 8-digit length header")]
    FrameTooLarge(usize),

    #[error("Invalid frame header: {0:?}")]
    InvalidHeader(String),

    #[error("Short frame header: received {received} of 8 bytes")]
    ShortHeader { received: usize },

    #[error("Truncated frame body: expected {expected} bytes, received {received}")]
    TruncatedBody { expected: usize, received: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Build a complete frame (header + body) for `body`.
///
/// # Errors
/// Returns [`WireError::FrameTooLarge`] if the body exceeds [`MAX_BODY_LEN`].
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, WireError> {
    let len = u64::try_from(body.len()).map_err(|_| WireError::FrameTooLarge(body.len()))?;
    if len > MAX_BODY_LEN {
        return Err(WireError::FrameTooLarge(body.len()));
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(format!("{len:08X}").as_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Parse an 8-byte length header into a body length.
///
/// # Errors
/// Returns [`WireError::InvalidHeader`] unless `header` is exactly eight hex digits.
pub fn decode_header(header: &[u8]) -> Result<usize, WireError> {
    let invalid = || WireError::InvalidHeader(String::from_utf8_lossy(header).into_owned());

    if header.len() != HEADER_LEN || !header.iter().all(u8::is_ascii_hexdigit) {
        return Err(invalid());
    }

    // All bytes are ASCII hex digits at this point
    let text = std::str::from_utf8(header).map_err(|_| invalid())?;
    let len = u32::from_str_radix(text, 16).map_err(|_| invalid())?;
    usize::try_from(len).map_err(|_| invalid())
}

/// Read one complete frame body from `reader`.
///
/// Partial reads are retried until the frame is complete or the transport
/// reports end-of-stream.
///
/// # Errors
/// Returns an error on a short header, a malformed header, a short body, or
/// an underlying I/O failure.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, WireError> {
    let mut header = [0u8; HEADER_LEN];
    let received = read_full(reader, &mut header)?;
    if received != HEADER_LEN {
        return Err(WireError::ShortHeader { received });
    }

    let expected = decode_header(&header)?;

    // Grow with the data actually received instead of trusting the header
    // for a potentially huge up-front allocation
    let mut body = Vec::new();
    let received = (&mut *reader).take(expected as u64).read_to_end(&mut body)?;
    if received != expected {
        return Err(WireError::TruncatedBody { expected, received });
    }

    Ok(body)
}

/// Write one complete frame and flush the writer.
///
/// Returns the number of bytes put on the wire (header included).
///
/// # Errors
/// Returns an error if the body is too large or the write fails.
pub fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<usize, WireError> {
    let frame = encode_frame(body)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(frame.len())
}

/// Fill `buf` as far as the stream allows, returning how many bytes arrived.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Blocking frame transport over a single duplex stream.
///
/// Used by both ends of the connection: the agent's control channel and the
/// operator console.
#[derive(Debug)]
pub struct FrameStream<S> {
    inner: S,
}

impl<S: Read + Write> FrameStream<S> {
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Send `body` as one frame.
    ///
    /// # Errors
    /// Returns an error if the frame cannot be encoded or written.
    pub fn send(&mut self, body: &str) -> Result<usize, WireError> {
        debug!("sending frame: {} bytes", body.len());
        write_frame(&mut self.inner, body.as_bytes())
    }

    /// Receive the next frame body as text (invalid UTF-8 is replaced).
    ///
    /// # Errors
    /// Returns an error if the channel is dead or desynchronized.
    pub fn recv(&mut self) -> Result<String, WireError> {
        let body = read_frame(&mut self.inner)?;
        let text = String::from_utf8_lossy(&body).into_owned();
        debug!("frame received: {text:?}");
        Ok(text)
    }

    /// Receive the next frame, collapsing any failure into an empty string.
    ///
    /// Callers treat an empty string as "nothing usable arrived" and apply
    /// their own retry policy.
    pub fn recv_or_empty(&mut self) -> String {
        self.recv().unwrap_or_else(|e| {
            warn!("frame receive failed: {e}");
            String::new()
        })
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_is_uppercase_zero_padded() {
        let frame = encode_frame(b"mode collect").unwrap();
        assert_eq!(&frame[..HEADER_LEN], b"0000000C");
        assert_eq!(&frame[HEADER_LEN..], b"mode collect");

        let long = vec![b'x'; 0xABC];
        let frame = encode_frame(&long).unwrap();
        assert_eq!(&frame[..HEADER_LEN], b"00000ABC");
    }

    #[test]
    fn test_empty_body_round_trip() {
        let frame = encode_frame(b"").unwrap();
        assert_eq!(frame, b"00000000");

        let body = read_frame(&mut Cursor::new(frame)).unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn test_round_trip_across_lengths() {
        for len in 0..=10_000usize {
            let body: Vec<u8> = (0..len).map(|i| b'a' + (i % 26) as u8).collect();
            let frame = encode_frame(&body).unwrap();
            let decoded = read_frame(&mut Cursor::new(frame)).unwrap();
            assert_eq!(decoded, body, "round trip failed for length {len}");
        }
    }

    #[test]
    fn test_decode_header_accepts_lowercase() {
        assert_eq!(decode_header(b"000000ff").unwrap(), 255);
        assert_eq!(decode_header(b"000000FF").unwrap(), 255);
    }

    #[test]
    fn test_decode_header_rejects_garbage() {
        assert!(matches!(decode_header(b"0000zz00"), Err(WireError::InvalidHeader(_))));
        assert!(matches!(decode_header(b"0000"), Err(WireError::InvalidHeader(_))));
        assert!(matches!(decode_header(b" 0000001"), Err(WireError::InvalidHeader(_))));
    }

    #[test]
    fn test_short_header_is_an_error() {
        let err = read_frame(&mut Cursor::new(b"0000".to_vec())).unwrap_err();
        assert!(matches!(err, WireError::ShortHeader { received: 4 }));
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let err = read_frame(&mut Cursor::new(b"00000010short".to_vec())).unwrap_err();
        assert!(matches!(err, WireError::TruncatedBody { expected: 16, received: 5 }));
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut wire = encode_frame(b"show").unwrap();
        wire.extend(encode_frame(b"").unwrap());
        wire.extend(encode_frame(b"mode").unwrap());

        let mut cursor = Cursor::new(wire);
        assert_eq!(read_frame(&mut cursor).unwrap(), b"show");
        assert_eq!(read_frame(&mut cursor).unwrap(), b"");
        assert_eq!(read_frame(&mut cursor).unwrap(), b"mode");
        assert!(read_frame(&mut cursor).is_err());
    }

    #[test]
    fn test_frame_stream_send_then_recv() {
        let mut stream = FrameStream::new(Cursor::new(Vec::new()));
        let sent = stream.send("help").unwrap();
        assert_eq!(sent, HEADER_LEN + 4);

        stream.get_mut().set_position(0);
        assert_eq!(stream.recv().unwrap(), "help");
    }

    #[test]
    fn test_recv_or_empty_on_dead_stream() {
        let mut stream = FrameStream::new(Cursor::new(Vec::new()));
        assert_eq!(stream.recv_or_empty(), "");
    }
}

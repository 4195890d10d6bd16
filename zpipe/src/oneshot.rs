//! One-pass helpers for callers that have the whole payload in memory and
//! do not need the streaming machinery.

use crate::codec::{self, Direction, Format, DEFAULT_COMPRESS_BUFFER, DEFAULT_DECOMPRESS_BUFFER};
use crate::error::Result;

pub fn compress(data: &[u8], format: Format, level: u32) -> Result<Vec<u8>> {
    let mut codec = codec::new_codec(Direction::Compress, format, level, DEFAULT_COMPRESS_BUFFER)?;
    codec.write(data);
    let mut out = Vec::new();
    while codec.step()? {
        out.extend(codec.read());
    }
    while codec.flush_step()? {
        out.extend(codec.read());
    }
    Ok(out)
}

pub fn decompress(data: &[u8], format: Format) -> Result<Vec<u8>> {
    let mut codec = codec::new_codec(
        Direction::Decompress,
        format,
        codec::DEFAULT_LEVEL,
        DEFAULT_DECOMPRESS_BUFFER,
    )?;
    codec.write(data);
    let mut out = Vec::new();
    while codec.step()? {
        out.extend(codec.read());
    }
    // Anything decoded but still sitting in the window, for inputs cut
    // short of their end marker.
    out.extend(codec.read());
    Ok(out)
}

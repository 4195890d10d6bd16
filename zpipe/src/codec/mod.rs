use crate::error::CodecError;

pub mod flate;
pub use self::flate::FlateCodec;

pub mod gzip;
pub use self::gzip::GzipCodec;

/// Default output window for compression, matching zlib's common 128K chunk.
pub const DEFAULT_COMPRESS_BUFFER: usize = 128 * 1024;

/// Default output window for decompression.
pub const DEFAULT_DECOMPRESS_BUFFER: usize = 64 * 1024;

pub const DEFAULT_LEVEL: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Compress,
    Decompress,
}

/// Wire framing around the DEFLATE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Bare DEFLATE, no header or trailer.
    Raw,
    /// RFC 1950 zlib wrapper.
    Zlib,
    /// RFC 1952 gzip member.
    Gzip,
}

impl Format {
    pub fn from_name(name: &str) -> Result<Format, CodecError> {
        match name {
            "gzip" => Ok(Format::Gzip),
            "zlib" => Ok(Format::Zlib),
            "deflate" | "raw" => Ok(Format::Raw),
            _ => Err(CodecError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// A stepwise block transform.
///
/// Input is pushed in with `write` and accumulates inside the codec. Each
/// `step` advances the transform by one unit of work against a fixed-size
/// output window; a `true` return means the window holds a segment the
/// caller should take with `read` before stepping again. Compressors keep
/// a partially filled window buffered until a later step or a flush;
/// `flush_step` forces the remaining state out and keeps returning `true`
/// until the stream is fully terminated.
pub trait Codec {
    fn write(&mut self, input: &[u8]);

    fn step(&mut self) -> Result<bool, CodecError>;

    /// Compression direction only. Decompressors have no flush concept and
    /// always report `false`.
    fn flush_step(&mut self) -> Result<bool, CodecError>;

    /// Takes the ready output segment and resets the window. Empty unless
    /// a preceding `step`/`flush_step` returned `true` (or, for
    /// decompression, a partial window is being drained at end of input).
    fn read(&mut self) -> Vec<u8>;
}

/// Allocates a codec bound to (direction, format, level, buffer_size).
///
/// `level` must be 0 to 9 and `buffer_size` nonzero; decompression
/// accepts `level` but ignores it.
pub fn new_codec(
    direction: Direction,
    format: Format,
    level: u32,
    buffer_size: usize,
) -> Result<Box<dyn Codec>, CodecError> {
    if level > 9 {
        return Err(CodecError::InvalidParameter(format!(
            "level must be between 0 and 9, got {}",
            level
        )));
    }
    if buffer_size == 0 {
        return Err(CodecError::InvalidParameter(
            "buffer size must be greater than zero".to_string(),
        ));
    }

    match format {
        Format::Gzip => Ok(Box::new(GzipCodec::new(direction, level, buffer_size))),
        Format::Zlib => Ok(Box::new(FlateCodec::new(direction, true, level, buffer_size))),
        Format::Raw => Ok(Box::new(FlateCodec::new(direction, false, level, buffer_size))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(Format::from_name("gzip").unwrap(), Format::Gzip);
        assert_eq!(Format::from_name("zlib").unwrap(), Format::Zlib);
        assert_eq!(Format::from_name("deflate").unwrap(), Format::Raw);
        assert_eq!(Format::from_name("raw").unwrap(), Format::Raw);
        assert!(Format::from_name("brotli").is_err());
    }

    #[test]
    fn test_rejects_bad_tuning() {
        assert!(new_codec(Direction::Compress, Format::Gzip, 10, 1024).is_err());
        assert!(new_codec(Direction::Compress, Format::Gzip, 6, 0).is_err());
        // Level bounds apply to both directions even though decompression
        // ignores the value.
        assert!(new_codec(Direction::Decompress, Format::Zlib, 99, 1024).is_err());
        assert!(new_codec(Direction::Decompress, Format::Zlib, 9, 1024).is_ok());
    }
}

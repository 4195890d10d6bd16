//! Push-driven streaming adapters around DEFLATE-family codecs.
//!
//! [`CompressorStream`] and [`DecompressorStream`] accept arbitrary chunks
//! through [`ByteStream::write`] and hand transformed segments to
//! subscribed [`Sink`]s in input order. Ending a compressor flushes
//! everything still buffered in the codec before the final `end`
//! notification; `destroy` tears a stage down from any state.

pub mod codec;
pub mod compress;
pub mod decompress;
pub mod error;
pub mod oneshot;
pub mod stream;

pub use codec::Format;
pub use compress::CompressorStream;
pub use decompress::DecompressorStream;
pub use error::{CodecError, Result, StreamError};
pub use stream::{
    shared, ByteStream, MemorySink, PassThrough, Shared, Sink, StreamState, WriteSink,
};

#![no_main]

use libfuzzer_sys::fuzz_target;
use zpipe::codec::DEFAULT_LEVEL;
use zpipe::{shared, ByteStream, DecompressorStream, Format, MemorySink};

fuzz_target!(|data: &[u8]| {
    let mut d = match DecompressorStream::new(Format::Gzip, DEFAULT_LEVEL, 4096) {
        Ok(d) => d,
        Err(_) => return,
    };
    d.subscribe(shared(MemorySink::new()));

    // Irregular chunk sizes shake out boundary handling in the header and
    // trailer state machines. Errors are expected, panics are not.
    let mut chunk_len = 1;
    let mut rest = data;
    while !rest.is_empty() {
        let n = chunk_len.min(rest.len());
        if d.write(&rest[..n]).is_err() {
            return;
        }
        rest = &rest[n..];
        chunk_len = (chunk_len * 2) + 1;
    }

    let _ = d.end();
});

use std::env;
use std::fs::File;
use std::io::{self, Read, Write};
use std::process;

use anyhow::{bail, Result};
use zpipe::codec::{DEFAULT_COMPRESS_BUFFER, DEFAULT_DECOMPRESS_BUFFER, DEFAULT_LEVEL};
use zpipe::{shared, ByteStream, CompressorStream, DecompressorStream, Format, WriteSink};

fn short_opt(opt: char, arg: &str, argv: &mut env::Args) -> Option<String> {
    let mut chars = arg.chars();
    if chars.next() != Some('-') || chars.next() != Some(opt) {
        return None;
    }

    let rest: String = chars.collect();
    if rest.is_empty() {
        return argv.next();
    }
    Some(rest)
}

fn pump<S: ByteStream>(stream: &mut S, mut input: Box<dyn Read>) -> Result<()> {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        stream.write(&buf[..n])?;
    }
    stream.end()?;
    Ok(())
}

fn usage(argv0: &str) {
    println!("Usage:");
    println!("  {} [options] compress", argv0);
    println!("  {} [options] decompress", argv0);
    println!("Options:");
    println!("  -i<path>: Input file (default: stdin)");
    println!("  -o<path>: Output file (default: stdout)");
    println!("  -f<format>: Stream format: gzip, zlib or deflate (default: gzip)");
    println!("  -l<level>: Compression level, 0 to 9 (default: {})", DEFAULT_LEVEL);
    println!("  -b<size>: Codec buffer size in bytes");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut input: Box<dyn Read> = Box::new(io::stdin());
    let mut output: Box<dyn Write> = Box::new(io::stdout());
    let mut format = Format::Gzip;
    let mut level = DEFAULT_LEVEL;
    let mut buffer_size: Option<usize> = None;
    let mut args = Vec::<String>::new();

    let mut argv = env::args();
    let argv0 = argv.next().unwrap_or_else(|| "zpipe".to_string());
    while let Some(arg) = argv.next() {
        if !arg.starts_with('-') || arg == "-" {
            args.push(arg);
            continue;
        }

        if let Some(val) = short_opt('i', &arg, &mut argv) {
            input = if val == "-" {
                Box::new(io::stdin())
            } else {
                Box::new(File::open(val)?)
            };
        } else if let Some(val) = short_opt('o', &arg, &mut argv) {
            output = Box::new(File::create(val)?);
        } else if let Some(val) = short_opt('f', &arg, &mut argv) {
            format = Format::from_name(&val)?;
        } else if let Some(val) = short_opt('l', &arg, &mut argv) {
            level = val.parse()?;
        } else if let Some(val) = short_opt('b', &arg, &mut argv) {
            buffer_size = Some(val.parse()?);
        } else {
            bail!("Invalid option: {}", arg);
        }
    }

    if args.len() != 1 {
        usage(&argv0);
        process::exit(1);
    }

    match args[0].as_str() {
        "compress" => {
            let mut stream = CompressorStream::new(
                format,
                level,
                buffer_size.unwrap_or(DEFAULT_COMPRESS_BUFFER),
            )?;
            stream.subscribe(shared(WriteSink::new(output)));
            pump(&mut stream, input)
        }
        "decompress" => {
            let mut stream = DecompressorStream::new(
                format,
                level,
                buffer_size.unwrap_or(DEFAULT_DECOMPRESS_BUFFER),
            )?;
            stream.subscribe(shared(WriteSink::new(output)));
            pump(&mut stream, input)
        }
        cmd => bail!("Unknown subcommand: {}", cmd),
    }
}

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

///
/// Open a file for reading, and return a buffered reader
/// * `input_file` - file name--either gzipped or not
///
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let ext = Path::new(input_file).extension().and_then(|x| x.to_str());
    match ext {
        Some("gz") => {
            let input_file = File::open(input_file)?;
            let decoder = GzDecoder::new(input_file);
            Ok(Box::new(BufReader::new(decoder)))
        }
        _ => {
            let input_file = File::open(input_file)?;
            Ok(Box::new(BufReader::new(input_file)))
        }
    }
}

///
/// Open a file for writing, and return a buffered writer
/// * `output_file` - file name--either gzipped or not, or `stdout`
///
pub fn open_buf_writer(output_file: &str) -> anyhow::Result<Box<dyn Write>> {
    if output_file.eq_ignore_ascii_case("stdout") || output_file == "-" {
        return Ok(Box::new(BufWriter::new(std::io::stdout())));
    }

    let ext = Path::new(output_file).extension().and_then(|x| x.to_str());
    match ext {
        Some("gz") => {
            let output_file = File::create(output_file)?;
            let encoder =
                flate2::write::GzEncoder::new(output_file, flate2::Compression::default());
            Ok(Box::new(BufWriter::new(encoder)))
        }
        _ => {
            let output_file = File::create(output_file)?;
            Ok(Box::new(BufWriter::new(output_file)))
        }
    }
}

///
/// Read one token per line, skipping blank lines and `#` comments.
/// Only the first whitespace-separated word of each line is kept.
///
/// * `input_file` - file name--either gzipped or not
///
pub fn read_words(input_file: &str) -> anyhow::Result<Vec<Box<str>>> {
    let buf = open_buf_reader(input_file)?;
    let mut ret = vec![];
    for line in buf.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(word) = line.split_whitespace().next() {
            ret.push(word.into());
        }
    }
    Ok(ret)
}

/// Deserialize a JSON document from a (possibly gzipped) file
pub fn read_json<T: DeserializeOwned>(input_file: &str) -> anyhow::Result<T> {
    let buf = open_buf_reader(input_file)?;
    let ret = serde_json::from_reader(buf)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", input_file, e))?;
    Ok(ret)
}

/// Serialize `value` as JSON into a file (or `stdout`)
pub fn write_json<T: Serialize>(value: &T, output_file: &str, pretty: bool) -> anyhow::Result<()> {
    let mut buf = open_buf_writer(output_file)?;
    if pretty {
        serde_json::to_writer_pretty(&mut buf, value)?;
    } else {
        serde_json::to_writer(&mut buf, value)?;
    }
    writeln!(buf)?;
    buf.flush()?;
    Ok(())
}

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{Result, SpeciesIdError};
use crate::types::DNASequence;

/// Open a FASTQ file, transparently decompressing `.gz` input.
pub fn open_fastq<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| SpeciesIdError::io(path, e))?;

    let is_gz = path.extension().map(|ext| ext == "gz").unwrap_or(false);

    Ok(if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    })
}

fn malformed(path: &Path, what: &str) -> SpeciesIdError {
    SpeciesIdError::io(
        path,
        std::io::Error::new(std::io::ErrorKind::InvalidData, what.to_string()),
    )
}

/// Read the next 4-line record; `Ok(None)` at a clean EOF.
fn next_record(
    reader: &mut dyn BufRead,
    line: &mut String,
    path: &Path,
) -> Result<Option<DNASequence>> {
    // 1) header, skipping blank lines between records
    let header_line = loop {
        line.clear();
        if reader.read_line(line).map_err(|e| SpeciesIdError::io(path, e))? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end();
        if !trimmed.is_empty() {
            break trimmed.to_string();
        }
    };
    let header_line = header_line
        .strip_prefix('@')
        .ok_or_else(|| malformed(path, "FASTQ record does not start with '@'"))?
        .to_string();

    // 2) sequence, 3) plus line, 4) quality (read and dropped)
    let mut rest = [String::new(), String::new()];
    for slot in rest.iter_mut() {
        line.clear();
        if reader.read_line(line).map_err(|e| SpeciesIdError::io(path, e))? == 0 {
            return Err(malformed(path, "truncated FASTQ record"));
        }
        *slot = line.trim_end().to_string();
    }
    let [seq, plus] = rest;
    if !plus.starts_with('+') {
        return Err(malformed(path, "FASTQ separator line does not start with '+'"));
    }
    line.clear();
    if reader.read_line(line).map_err(|e| SpeciesIdError::io(path, e))? == 0 {
        return Err(malformed(path, "truncated FASTQ record"));
    }

    Ok(Some(DNASequence { header_line, seq }))
}

/// Stream a FASTQ file into a two-line-per-record FASTA file.
/// The full header line is kept. Returns the number of records written.
pub fn fastq_to_fasta<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<usize> {
    let input = input.as_ref();
    let output = output.as_ref();

    let mut reader = open_fastq(input)?;
    let out_file = File::create(output).map_err(|e| SpeciesIdError::io(output, e))?;
    let mut writer = BufWriter::new(out_file);

    let mut line = String::new();
    let mut count = 0usize;
    while let Some(dna) = next_record(reader.as_mut(), &mut line, input)? {
        writeln!(writer, ">{}\n{}", dna.header_line, dna.seq)
            .map_err(|e| SpeciesIdError::io(output, e))?;
        count += 1;
    }
    writer.flush().map_err(|e| SpeciesIdError::io(output, e))?;

    log::info!("Converted {} reads from {} to FASTA", count, input.display());
    Ok(count)
}

//! Parser for the tab-delimited hits stream produced by the similarity search.
//!
//! ```text
//! query_id    target_id              identity
//! read_0001   9606:NR_003286.4       99.2
//! ```
//! Extra columns after the third are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Result, SpeciesIdError};
use crate::types::Hit;

/// Scale of the identity column in a hits stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityScale {
    /// Already a fraction in `[0, 1]`.
    Fraction,
    /// Percent in `[0, 100]` (vsearch `id` userfield).
    Percent,
}

/// Parses one hits line. `line_no` is 1-based and only used in errors.
pub fn parse_hit_line(line: &str, line_no: usize, scale: IdentityScale) -> Result<Hit> {
    let err = |reason: String| SpeciesIdError::HitParse {
        line: line_no,
        reason,
    };

    let mut fields = line.split('\t');
    let query_id = fields
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err("missing query id".to_string()))?;
    let target_id = fields
        .next()
        .ok_or_else(|| err("missing target id".to_string()))?;
    let identity_str = fields
        .next()
        .ok_or_else(|| err("missing identity".to_string()))?
        .trim();

    let raw: f64 = identity_str
        .parse()
        .map_err(|_| err(format!("identity '{}' is not a number", identity_str)))?;
    let identity = match scale {
        IdentityScale::Fraction => raw,
        IdentityScale::Percent => percent_to_fraction(raw, identity_str),
    };
    if !(0.0..=1.0).contains(&identity) {
        return Err(err(format!("identity {} out of range", identity_str)));
    }

    Ok(Hit {
        query_id: query_id.to_string(),
        target_id: target_id.to_string(),
        identity,
    })
}

/// Scales a percentage down to a fraction, rounded to the decimals the input
/// carried plus two so `90.1` becomes `0.901` rather than `0.9009999999999999`.
fn percent_to_fraction(raw: f64, text: &str) -> f64 {
    if text.contains(['e', 'E']) {
        return raw / 100.0;
    }
    let decimals = text.split_once('.').map_or(0, |(_, frac)| frac.len());
    let scale = 10f64.powi((decimals + 2).min(15) as i32);
    (raw / 100.0 * scale).round() / scale
}

/// Reads every hit from a stream; blank lines are skipped, any other bad line is fatal.
pub fn read_hits<R: BufRead>(reader: R, scale: IdentityScale) -> Result<Vec<Hit>> {
    let mut hits = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SpeciesIdError::HitParse {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        hits.push(parse_hit_line(&line, idx + 1, scale)?);
    }
    Ok(hits)
}

pub fn read_hits_file<P: AsRef<Path>>(path: P, scale: IdentityScale) -> Result<Vec<Hit>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| SpeciesIdError::io(path, e))?;
    read_hits(BufReader::new(file), scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_fraction_and_percent() {
        let hit = parse_hit_line("r1\t9606:NR_1\t0.95", 1, IdentityScale::Fraction).unwrap();
        assert_eq!(hit.query_id, "r1");
        assert_eq!(hit.target_id, "9606:NR_1");
        assert!((hit.identity - 0.95).abs() < 1e-12);

        let hit = parse_hit_line("r1\t9606:NR_1\t97.5", 1, IdentityScale::Percent).unwrap();
        assert!((hit.identity - 0.975).abs() < 1e-12);
    }

    #[test]
    fn test_percent_identity_keeps_input_precision() {
        let text = "r1\tA:x\t90.1\nr2\tB:x\t92.8\nr3\tC:x\t93.9\nr4\tD:x\t100\nr5\tE:x\t97.25\n";
        let hits = read_hits(Cursor::new(text), IdentityScale::Percent).unwrap();
        let rendered: Vec<String> = hits.iter().map(|h| h.identity.to_string()).collect();
        assert_eq!(rendered, vec!["0.901", "0.928", "0.939", "1", "0.9725"]);
    }

    #[test]
    fn test_bad_lines_are_fatal() {
        let err = parse_hit_line("r1\t9606", 4, IdentityScale::Fraction).unwrap_err();
        assert!(matches!(err, SpeciesIdError::HitParse { line: 4, .. }));

        let err = parse_hit_line("r1\tt\tabc", 1, IdentityScale::Fraction).unwrap_err();
        assert!(matches!(err, SpeciesIdError::HitParse { .. }));

        let err = parse_hit_line("r1\tt\t1.5", 1, IdentityScale::Fraction).unwrap_err();
        assert!(matches!(err, SpeciesIdError::HitParse { .. }));
    }

    #[test]
    fn test_read_hits_skips_blank_lines() {
        let text = "r1\tA:x\t99.0\n\nr2\tB:y\t91.0\textra\n";
        let hits = read_hits(Cursor::new(text), IdentityScale::Percent).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].target_id, "B:y");

        let err = read_hits(Cursor::new("r1\tA:x\t99\nbroken\n"), IdentityScale::Percent)
            .unwrap_err();
        assert!(matches!(err, SpeciesIdError::HitParse { line: 2, .. }));
    }
}

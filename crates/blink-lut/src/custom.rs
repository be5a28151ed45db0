//! Custom color tables loaded from text.
//!
//! # Format
//!
//! ```text
//! # Comment
//! NAME ocean
//! 0   0   0   0
//! 128 0   64  200
//! 255 255 255 255
//! ```
//!
//! Data lines are either `r g b` or `index r g b`. Components are bytes
//! (0..=255), or fractions when every component in the file is `<= 1.0`.
//! Exactly 256 three-column lines are taken verbatim; otherwise the lines are
//! control points (evenly spaced for three columns, at `index` for four).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::table::{ColorTable, TABLE_SIZE};
use crate::{LutError, LutResult};

/// Reads a custom table from a file. The file stem names the table unless a
/// `NAME` line overrides it.
pub fn read<P: AsRef<Path>>(path: P) -> LutResult<ColorTable> {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "custom".into());
    let reader = BufReader::new(File::open(path)?);
    parse(reader, &stem)
}

/// Parses a custom table from a reader.
pub fn parse<R: BufRead>(reader: R, default_name: &str) -> LutResult<ColorTable> {
    let mut name = default_name.to_string();
    let mut rows: Vec<(Option<f64>, [f64; 3])> = Vec::new();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        let lineno = n + 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("NAME") {
            name = rest.trim().to_string();
            continue;
        }

        let values = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>()
                    .map_err(|_| LutError::parse(lineno, format!("invalid number '{tok}'")))
            })
            .collect::<LutResult<Vec<_>>>()?;

        let row = match values.as_slice() {
            [r, g, b] => (None, [*r, *g, *b]),
            [i, r, g, b] => (Some(*i), [*r, *g, *b]),
            other => {
                return Err(LutError::parse(
                    lineno,
                    format!("expected 3 or 4 values, found {}", other.len()),
                ));
            }
        };
        if row.1.iter().any(|c| *c < 0.0 || *c > 255.0) {
            return Err(LutError::parse(lineno, "component outside 0..=255"));
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(LutError::InvalidSize("table has no entries".into()));
    }

    let fractional = rows.iter().all(|(_, c)| c.iter().all(|v| *v <= 1.0));
    let to_byte = |v: f64| {
        if fractional {
            (v * 255.0).round() as u8
        } else {
            v.round() as u8
        }
    };
    let rgb = |c: [f64; 3]| [to_byte(c[0]), to_byte(c[1]), to_byte(c[2])];

    let indexed = rows.iter().any(|(i, _)| i.is_some());
    if !indexed && rows.len() == TABLE_SIZE {
        return ColorTable::from_entries(name, rows.into_iter().map(|(_, c)| rgb(c)).collect());
    }

    let last = (rows.len() - 1).max(1) as f64;
    let mut points = Vec::with_capacity(rows.len());
    for (k, (index, c)) in rows.iter().enumerate() {
        let pos = match index {
            Some(i) => i / (TABLE_SIZE - 1) as f64,
            None => k as f64 / last,
        };
        points.push((pos, rgb(*c)));
    }
    ColorTable::from_control_points(name, &points)
}

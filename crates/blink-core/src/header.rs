//! FITS-style keyword header.
//!
//! Only the keywords needed for geometry and astrometric calibration are
//! interpreted; everything else is carried through untouched, in order.

use serde::{Deserialize, Serialize};

/// Keywords whose trailing digit names an axis (`CRPIX1`, `CTYPE3`, ...).
pub const AXIS_KEYWORDS: &[&str] = &[
    "NAXIS", "CRPIX", "CRVAL", "CDELT", "CTYPE", "CUNIT", "CROTA",
];

/// Keywords carrying a matrix element with two axis indices (`CD1_2`, `PC2_3`).
pub const MATRIX_KEYWORDS: &[&str] = &["CD", "PC"];

/// Ordered keyword/value list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    cards: Vec<(String, String)>,
}

impl Header {
    /// Creates an empty header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a header from `(key, value)` pairs.
    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let mut header = Self::new();
        for (k, v) in pairs {
            header.set(k, v);
        }
        header
    }

    /// Raw value of a keyword.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.cards
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Value parsed as a float.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Value with surrounding quotes and padding removed.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).map(|v| v.trim().trim_matches('\'').trim())
    }

    /// Inserts or replaces a keyword, keeping its position when it exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into().to_ascii_uppercase();
        let value = value.into();
        match self.cards.iter_mut().find(|(k, _)| *k == key) {
            Some(card) => card.1 = value,
            None => self.cards.push((key, value)),
        }
    }

    /// Removes a keyword, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.cards.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.cards.remove(pos).1)
    }

    /// Whether the keyword exists.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of cards.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the header has no cards.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Iterates cards in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Removes every calibration keyword (axis-indexed and matrix keywords
    /// except `NAXISn`).
    pub fn clear_calibration(&mut self) {
        self.cards.retain(|(k, _)| {
            let calibration = split_axis_keyword(k).is_some_and(|(base, _)| base != "NAXIS")
                || split_matrix_keyword(k).is_some();
            !calibration
        });
    }

    /// Swaps the axis numbers `a` and `b` in every axis-indexed keyword.
    ///
    /// `CRPIX2` becomes `CRPIX3` and vice versa; `CD2_3` becomes `CD3_2`.
    /// Applying the same swap twice restores the original header.
    pub fn swap_axes(&mut self, a: u8, b: u8) {
        let swap = |n: u8| if n == a { b } else if n == b { a } else { n };
        for (key, _) in &mut self.cards {
            if let Some((base, n)) = split_axis_keyword(key) {
                let m = swap(n);
                if m != n {
                    *key = format!("{base}{m}");
                }
            } else if let Some((base, i, j)) = split_matrix_keyword(key) {
                let (si, sj) = (swap(i), swap(j));
                if (si, sj) != (i, j) {
                    *key = format!("{base}{si}_{sj}");
                }
            }
        }
    }
}

/// Splits `CRPIX3` into `("CRPIX", 3)`.
fn split_axis_keyword(key: &str) -> Option<(&'static str, u8)> {
    AXIS_KEYWORDS.iter().find_map(|base| {
        let rest = key.strip_prefix(base)?;
        if rest.len() != 1 {
            return None;
        }
        Some((*base, rest.parse().ok()?))
    })
}

/// Splits `CD2_3` into `("CD", 2, 3)`.
fn split_matrix_keyword(key: &str) -> Option<(&'static str, u8, u8)> {
    MATRIX_KEYWORDS.iter().find_map(|base| {
        let rest = key.strip_prefix(base)?;
        let (i, j) = rest.split_once('_')?;
        if i.len() != 1 || j.len() != 1 {
            return None;
        }
        Some((*base, i.parse().ok()?, j.parse().ok()?))
    })
}

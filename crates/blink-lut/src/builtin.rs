//! Predefined color tables.

use serde::{Deserialize, Serialize};

use crate::table::ColorTable;

/// Identifier of a color table: a predefined ramp or a named custom table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTableId {
    /// Linear gray.
    #[default]
    Gray,
    /// Black body ("heat").
    Bb,
    /// Blue/red/yellow ramp.
    A,
    /// Stern special.
    Stern,
    /// Rainbow.
    Rainbow,
    /// Cubehelix.
    Cubehelix,
    /// User table registered by name.
    Custom(String),
}

impl ColorTableId {
    /// Predefined tables, in menu order.
    pub const BUILTIN: [ColorTableId; 6] = [
        Self::Gray,
        Self::Bb,
        Self::A,
        Self::Stern,
        Self::Rainbow,
        Self::Cubehelix,
    ];

    /// Table name as shown to users.
    pub fn name(&self) -> &str {
        match self {
            Self::Gray => "gray",
            Self::Bb => "bb",
            Self::A => "a",
            Self::Stern => "stern",
            Self::Rainbow => "rainbow",
            Self::Cubehelix => "cubehelix",
            Self::Custom(name) => name,
        }
    }

    /// Resolves a name: predefined names first, anything else is custom.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "gray" | "grey" => Self::Gray,
            "bb" | "heat" => Self::Bb,
            "a" => Self::A,
            "stern" => Self::Stern,
            "rainbow" => Self::Rainbow,
            "cubehelix" => Self::Cubehelix,
            _ => Self::Custom(name.trim().to_string()),
        }
    }

    /// Builds a predefined table, `None` for custom ids.
    pub fn builtin(&self) -> Option<ColorTable> {
        let table = match self {
            Self::Gray => ColorTable::gray(),
            Self::Cubehelix => ColorTable::cubehelix(),
            Self::Bb => points(
                "bb",
                &[
                    (0.0, [0, 0, 0]),
                    (0.5, [255, 0, 0]),
                    (0.75, [255, 200, 0]),
                    (1.0, [255, 255, 255]),
                ],
            ),
            Self::A => points(
                "a",
                &[
                    (0.0, [0, 0, 0]),
                    (0.25, [0, 0, 255]),
                    (0.5, [255, 0, 0]),
                    (0.75, [255, 255, 0]),
                    (1.0, [255, 255, 255]),
                ],
            ),
            Self::Stern => points(
                "stern",
                &[
                    (0.0, [0, 0, 0]),
                    (0.05, [255, 0, 64]),
                    (0.25, [64, 64, 128]),
                    (0.5, [128, 128, 0]),
                    (0.75, [192, 192, 64]),
                    (1.0, [255, 255, 255]),
                ],
            ),
            Self::Rainbow => points(
                "rainbow",
                &[
                    (0.0, [0, 0, 0]),
                    (0.15, [128, 0, 255]),
                    (0.3, [0, 0, 255]),
                    (0.45, [0, 255, 255]),
                    (0.6, [0, 255, 0]),
                    (0.75, [255, 255, 0]),
                    (0.9, [255, 0, 0]),
                    (1.0, [255, 255, 255]),
                ],
            ),
            Self::Custom(_) => return None,
        };
        Some(table)
    }
}

impl std::fmt::Display for ColorTableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Control points above are sorted and non-empty, so construction cannot fail;
// fall back to gray rather than panic if that ever changes.
fn points(name: &str, pts: &[(f64, [u8; 3])]) -> ColorTable {
    ColorTable::from_control_points(name, pts).unwrap_or_else(|_| ColorTable::gray())
}

//! # blink-lut
//!
//! Color lookup tables turning 8-bit display pixels into RGB.
//!
//! - [`ColorTable`] - a 256-entry RGB ramp, with reverse video
//! - [`ColorTableId`] - predefined ramps plus named custom tables
//! - [`ColorTableSet`] - owner of custom tables, resolves ids
//! - [`custom`] - text format for user tables
//!
//! # Usage
//!
//! ```rust
//! use blink_lut::{ColorTableId, ColorTableSet};
//!
//! let tables = ColorTableSet::new();
//! let heat = tables.resolve(&ColorTableId::Bb, true).unwrap();
//! let rgba = heat.to_rgba(&[0, 255]);
//! assert_eq!(&rgba[0..3], &[255, 255, 255]);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod builtin;
pub mod custom;
mod error;
mod table;

pub use builtin::ColorTableId;
pub use error::{LutError, LutResult};
pub use table::{ColorTable, TABLE_SIZE};

/// Custom tables registered for one application instance.
#[derive(Debug, Clone, Default)]
pub struct ColorTableSet {
    custom: Vec<ColorTable>,
}

impl ColorTableSet {
    /// Creates a set with no custom tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom table, replacing one with the same name.
    pub fn register(&mut self, table: ColorTable) -> ColorTableId {
        let id = ColorTableId::Custom(table.name().to_string());
        match self.custom.iter_mut().find(|t| t.name() == table.name()) {
            Some(slot) => *slot = table,
            None => self.custom.push(table),
        }
        id
    }

    /// Resolves an id to a table, flipped when `reverse` is set.
    pub fn resolve(&self, id: &ColorTableId, reverse: bool) -> LutResult<ColorTable> {
        let table = match id.builtin() {
            Some(t) => t,
            None => self
                .custom
                .iter()
                .find(|t| t.name() == id.name())
                .cloned()
                .ok_or_else(|| LutError::UnknownTable(id.name().to_string()))?,
        };
        Ok(if reverse { table.reversed() } else { table })
    }

    /// Names of every table, predefined first.
    pub fn names(&self) -> Vec<String> {
        ColorTableId::BUILTIN
            .iter()
            .map(|id| id.name().to_string())
            .chain(self.custom.iter().map(|t| t.name().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_registration() {
        let mut set = ColorTableSet::new();
        let table = ColorTable::from_control_points("ice", &[(0.0, [0, 0, 64]), (1.0, [200, 255, 255])]).unwrap();
        let id = set.register(table.clone());
        assert_eq!(set.resolve(&id, false).unwrap(), table);
        assert!(set.names().contains(&"ice".to_string()));
        assert!(matches!(
            set.resolve(&ColorTableId::Custom("nope".into()), false),
            Err(LutError::UnknownTable(_))
        ));
    }
}

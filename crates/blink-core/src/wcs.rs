//! Celestial world coordinate system (gnomonic projection).
//!
//! Converts between FITS pixel coordinates (1-based, origin at the centre of
//! the bottom-left pixel) and sky coordinates in degrees.
//!
//! ```text
//! pixel --(CRPIX, CD)--> intermediate (xi, eta) --(TAN)--> (ra, dec)
//! ```

use serde::{Deserialize, Serialize};

use crate::header::Header;
use crate::{Error, Result};

/// Celestial coordinate prefixes accepted on axes 1 and 2.
const CELESTIAL_PREFIXES: &[&str] = &["RA", "DEC", "GLON", "GLAT", "ELON", "ELAT"];

/// Gnomonic WCS solution for a 2D image plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wcs {
    /// Reference pixel (CRPIX1, CRPIX2), 1-based.
    pub crpix: (f64, f64),
    /// Reference sky position in degrees (CRVAL1, CRVAL2).
    pub crval: (f64, f64),
    /// Pixel-to-intermediate matrix in degrees per pixel.
    pub cd: [[f64; 2]; 2],
}

impl Wcs {
    /// Creates a WCS from its parameters.
    pub fn new(crpix: (f64, f64), crval: (f64, f64), cd: [[f64; 2]; 2]) -> Self {
        Self { crpix, crval, cd }
    }

    /// Builds the WCS of axes 1 and 2 from header keywords.
    ///
    /// Accepts either a `CDi_j` matrix or `CDELTi` with an optional `CROTA2`.
    /// Fails with [`Error::BadCalibration`] when a keyword is missing, an axis
    /// type is not celestial, or the matrix is singular.
    pub fn from_header(header: &Header) -> Result<Self> {
        for axis in 1..=2 {
            if let Some(ctype) = header.get_str(&format!("CTYPE{axis}")) {
                let celestial = CELESTIAL_PREFIXES
                    .iter()
                    .any(|p| ctype.to_ascii_uppercase().starts_with(p));
                if !celestial {
                    return Err(Error::BadCalibration(format!(
                        "axis {axis} is not celestial ({ctype})"
                    )));
                }
            }
        }

        let num = |key: &str| {
            header
                .get_f64(key)
                .ok_or_else(|| Error::BadCalibration(format!("missing {key}")))
        };

        let crpix = (num("CRPIX1")?, num("CRPIX2")?);
        let crval = (num("CRVAL1")?, num("CRVAL2")?);

        let cd = if header.contains("CD1_1") || header.contains("CD2_2") {
            let get = |k: &str| header.get_f64(k).unwrap_or(0.0);
            [[get("CD1_1"), get("CD1_2")], [get("CD2_1"), get("CD2_2")]]
        } else {
            let cdelt1 = num("CDELT1")?;
            let cdelt2 = num("CDELT2")?;
            let rot = header.get_f64("CROTA2").unwrap_or(0.0).to_radians();
            let (sin_r, cos_r) = rot.sin_cos();
            [
                [cdelt1 * cos_r, -cdelt2 * sin_r],
                [cdelt1 * sin_r, cdelt2 * cos_r],
            ]
        };

        let wcs = Self::new(crpix, crval, cd);
        if wcs.determinant().abs() < 1e-300 {
            return Err(Error::BadCalibration("singular CD matrix".into()));
        }
        Ok(wcs)
    }

    /// Determinant of the CD matrix.
    #[inline]
    pub fn determinant(&self) -> f64 {
        self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0]
    }

    /// Pixel to sky (RA, Dec in degrees).
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.crpix.0;
        let dy = y - self.crpix.1;

        let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
        let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();

        let ra0 = self.crval.0.to_radians();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let denom = cos_dec0 - eta * sin_dec0;

        let ra = ra0 + xi.atan2(denom);
        let dec = (sin_dec0 + eta * cos_dec0).atan2((xi * xi + denom * denom).sqrt());

        (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }

    /// Sky to pixel. Returns `None` for points on the far hemisphere.
    pub fn sky_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (ra - self.crval.0).to_radians().sin_cos();

        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        if d <= 0.0 {
            return None;
        }

        let xi = (cos_dec * sin_dra / d).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d).to_degrees();

        let det = self.determinant();
        let dx = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let dy = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;

        Some((self.crpix.0 + dx, self.crpix.1 + dy))
    }

    /// Pixel scale in arcseconds, averaged over both axes.
    pub fn pixel_scale_arcsec(&self) -> f64 {
        let sx = (self.cd[0][0].powi(2) + self.cd[1][0].powi(2)).sqrt();
        let sy = (self.cd[0][1].powi(2) + self.cd[1][1].powi(2)).sqrt();
        (sx + sy) / 2.0 * 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample() -> Wcs {
        Wcs::new((50.5, 50.5), (10.684, 41.269), [[-1.0 / 3600.0, 0.0], [0.0, 1.0 / 3600.0]])
    }

    #[test]
    fn reference_pixel_maps_to_crval() {
        let wcs = sample();
        let (ra, dec) = wcs.pixel_to_sky(50.5, 50.5);
        assert_abs_diff_eq!(ra, 10.684, epsilon = 1e-9);
        assert_abs_diff_eq!(dec, 41.269, epsilon = 1e-9);
    }

    #[test]
    fn pixel_sky_round_trip() {
        let wcs = sample();
        for &(x, y) in &[(1.0, 1.0), (100.0, 3.0), (37.2, 88.9)] {
            let (ra, dec) = wcs.pixel_to_sky(x, y);
            let (px, py) = wcs.sky_to_pixel(ra, dec).unwrap();
            assert_abs_diff_eq!(px, x, epsilon = 1e-6);
            assert_abs_diff_eq!(py, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn from_header_cdelt() {
        let header = Header::from_pairs([
            ("CTYPE1", "'RA---TAN'"),
            ("CTYPE2", "'DEC--TAN'"),
            ("CRPIX1", "10"),
            ("CRPIX2", "10"),
            ("CRVAL1", "180.0"),
            ("CRVAL2", "0.0"),
            ("CDELT1", "-0.001"),
            ("CDELT2", "0.001"),
        ]);
        let wcs = Wcs::from_header(&header).unwrap();
        assert_abs_diff_eq!(wcs.cd[0][0], -0.001);
        assert_abs_diff_eq!(wcs.pixel_scale_arcsec(), 3.6, epsilon = 1e-9);
    }

    #[test]
    fn spectral_axis_rejected() {
        let header = Header::from_pairs([
            ("CTYPE1", "'RA---TAN'"),
            ("CTYPE2", "'VELO-LSR'"),
            ("CRPIX1", "1"),
            ("CRPIX2", "1"),
            ("CRVAL1", "0"),
            ("CRVAL2", "0"),
            ("CDELT1", "1"),
            ("CDELT2", "1"),
        ]);
        assert!(matches!(Wcs::from_header(&header), Err(Error::BadCalibration(_))));
    }

    #[test]
    fn missing_keyword_rejected() {
        let header = Header::from_pairs([("CRPIX1", "1")]);
        assert!(Wcs::from_header(&header).is_err());
    }
}

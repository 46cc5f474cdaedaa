//! Frame manifests for the ingest command.
//!
//! A manifest is an INI file with one `[frame.<name>]` section per frame,
//! ingested in file order:
//!
//! ```ini
//! [frame.pass1]
//! image = pass1.png
//! ul = 47.61,-122.35
//! ur = 47.61,-122.30
//! lr = 47.58,-122.30
//! ll = 47.58,-122.35
//! ; optional, estimated from the corners when absent
//! gsd = 0.5
//! ```
//!
//! Corners are `lat,lon` in degrees. Image paths are relative to the
//! manifest's directory.

use std::path::{Path, PathBuf};

use ini::Ini;

use mosaiclayer::{Frame, GeoPoint, Projection};

use crate::error::CliError;

const FRAME_PREFIX: &str = "frame.";
const CORNER_KEYS: [&str; 4] = ["ul", "ur", "lr", "ll"];

/// One frame described by a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub name: String,
    pub image: PathBuf,
    /// Upper-left, upper-right, lower-right, lower-left
    pub corners: [GeoPoint; 4],
    pub gsd: Option<f64>,
}

impl ManifestEntry {
    /// Reads the image and builds the frame.
    pub fn load_frame(&self, projection: Projection) -> Result<Frame, CliError> {
        let pixels = image::open(&self.image)
            .map_err(|error| CliError::ImageRead {
                path: self.image.clone(),
                error,
            })?
            .into_rgba8();
        match self.gsd {
            Some(gsd) => Ok(Frame::new(self.corners, gsd, pixels)),
            None => Frame::with_estimated_gsd(self.corners, pixels, projection)
                .map_err(|e| CliError::Mosaic(e.into())),
        }
    }
}

/// Parses a manifest file.
pub fn parse_manifest(path: &Path) -> Result<Vec<ManifestEntry>, CliError> {
    let invalid = |reason: String| CliError::Manifest {
        path: path.to_path_buf(),
        reason,
    };
    let ini = Ini::load_from_file(path).map_err(|e| invalid(e.to_string()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut entries = Vec::new();
    for (section, properties) in ini.iter() {
        let Some(name) = section.and_then(|s| s.strip_prefix(FRAME_PREFIX)) else {
            continue;
        };

        let image = properties
            .get("image")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| invalid(format!("[frame.{name}] is missing 'image'")))?;

        let mut corners = [GeoPoint::new(0.0, 0.0); 4];
        for (slot, key) in corners.iter_mut().zip(CORNER_KEYS) {
            let value = properties
                .get(key)
                .ok_or_else(|| invalid(format!("[frame.{name}] is missing '{key}'")))?;
            *slot = parse_corner(value).ok_or_else(|| {
                invalid(format!("[frame.{name}] {key} = '{value}' is not 'lat,lon'"))
            })?;
        }

        let gsd = match properties.get("gsd").map(str::trim) {
            None | Some("") => None,
            Some(v) => match v.parse::<f64>() {
                Ok(gsd) if gsd.is_finite() && gsd > 0.0 => Some(gsd),
                _ => return Err(invalid(format!("[frame.{name}] gsd = '{v}' must be positive"))),
            },
        };

        entries.push(ManifestEntry {
            name: name.to_string(),
            image: base.join(image),
            corners,
            gsd,
        });
    }

    if entries.is_empty() {
        return Err(invalid("no [frame.*] sections".to_string()));
    }
    Ok(entries)
}

fn parse_corner(value: &str) -> Option<GeoPoint> {
    let (lat, lon) = value.split_once(',')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lon = lon.trim().parse::<f64>().ok()?;
    Some(GeoPoint::new(lat, lon))
}

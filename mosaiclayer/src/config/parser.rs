//! INI parsing: the single place where INI keys map to settings fields.

use std::path::PathBuf;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::{BackgroundKind, ConfigFile, StoreBackend};
use crate::coord::{Envelope, Projection};
use crate::service::IngestMode;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [pyramid] section
    if let Some(section) = ini.section(Some("pyramid")) {
        if let Some(v) = section.get("projection") {
            config.pyramid.projection = parse_projection(v).ok_or_else(|| {
                ConfigFileError::invalid(
                    "pyramid",
                    "projection",
                    v,
                    "must be 'equirectangular' or 'web_mercator'",
                )
            })?;
        }
        if let Some(v) = section.get("min_level") {
            config.pyramid.min_level = v.trim().parse().map_err(|_| {
                ConfigFileError::invalid("pyramid", "min_level", v, "must be an integer 0-24")
            })?;
        }
        if let Some(v) = section.get("max_level") {
            config.pyramid.max_level = v.trim().parse().map_err(|_| {
                ConfigFileError::invalid("pyramid", "max_level", v, "must be an integer 0-24")
            })?;
        }
        if let Some(v) = section.get("tile_size") {
            config.pyramid.tile_size = match v.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigFileError::invalid(
                        "pyramid",
                        "tile_size",
                        v,
                        "must be a positive integer (pixels)",
                    ))
                }
            };
        }
        if let Some(v) = section.get("extent") {
            let v = v.trim();
            config.pyramid.extent = if v.is_empty() {
                None
            } else {
                Some(parse_extent(v).ok_or_else(|| {
                    ConfigFileError::invalid(
                        "pyramid",
                        "extent",
                        v,
                        "expected 'min_x,min_y,max_x,max_y' with a non-zero area",
                    )
                })?)
            };
        }
        if config.pyramid.min_level > config.pyramid.max_level || config.pyramid.max_level > 24 {
            return Err(ConfigFileError::invalid(
                "pyramid",
                "max_level",
                &config.pyramid.max_level.to_string(),
                "must be at least min_level and at most 24",
            ));
        }
    }

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("backend") {
            let v = v.trim().to_lowercase();
            config.store.backend = match v.as_str() {
                "memory" => StoreBackend::Memory,
                "disk" => StoreBackend::Disk,
                _ => {
                    return Err(ConfigFileError::invalid(
                        "store",
                        "backend",
                        &v,
                        "must be 'memory' or 'disk'",
                    ))
                }
            };
        }
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.store.directory = expand_tilde(v);
            }
        }
    }

    // [background] section
    if let Some(section) = ini.section(Some("background")) {
        if let Some(v) = section.get("kind") {
            let v = v.trim().to_lowercase();
            config.background.kind = match v.as_str() {
                "empty" | "none" => BackgroundKind::Empty,
                "ancestors" => BackgroundKind::Ancestors,
                "placeholder" => BackgroundKind::Placeholder,
                _ => {
                    return Err(ConfigFileError::invalid(
                        "background",
                        "kind",
                        &v,
                        "must be one of: empty, ancestors, placeholder",
                    ))
                }
            };
        }
        if let Some(v) = section.get("placeholder_color") {
            config.background.placeholder_color = parse_color(v).ok_or_else(|| {
                ConfigFileError::invalid(
                    "background",
                    "placeholder_color",
                    v,
                    "expected 'r,g,b' or 'r,g,b,a' with components 0-255",
                )
            })?;
        }
    }

    // [ingest] section
    if let Some(section) = ini.section(Some("ingest")) {
        if let Some(v) = section.get("mode") {
            let v = v.trim().to_lowercase();
            config.ingest.mode = match v.as_str() {
                "queued" => IngestMode::Queued,
                "latest" | "latest_only" => IngestMode::LatestOnly,
                _ => {
                    return Err(ConfigFileError::invalid(
                        "ingest",
                        "mode",
                        &v,
                        "must be 'queued' or 'latest'",
                    ))
                }
            };
        }
        if let Some(v) = section.get("queue_capacity") {
            config.ingest.queue_capacity = match v.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => {
                    return Err(ConfigFileError::invalid(
                        "ingest",
                        "queue_capacity",
                        v,
                        "must be a positive integer",
                    ))
                }
            };
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn parse_projection(value: &str) -> Option<Projection> {
    match value.trim().to_lowercase().as_str() {
        "equirectangular" | "epsg:4326" | "4326" => Some(Projection::Equirectangular),
        "web_mercator" | "webmercator" | "epsg:3857" | "3857" => Some(Projection::WebMercator),
        _ => None,
    }
}

fn parse_extent(value: &str) -> Option<Envelope> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    let [x1, y1, x2, y2] = parts.as_slice() else {
        return None;
    };
    if !parts.iter().all(|p| p.is_finite()) {
        return None;
    }
    let extent = Envelope::new(*x1, *y1, *x2, *y2);
    (extent.width() > 0.0 && extent.height() > 0.0).then_some(extent)
}

fn parse_color(value: &str) -> Option<[u8; 4]> {
    let parts: Vec<u8> = value
        .split(',')
        .map(|p| p.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [r, g, b] => Some([*r, *g, *b, 255]),
        [r, g, b, a] => Some([*r, *g, *b, *a]),
        _ => None,
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

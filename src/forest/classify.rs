//! Recognizing forest blocks among placed objects.

use serde::Serialize;

use crate::world::ObjectRecord;

/// Model stem prefix shared by all forest blocks.
pub const FOREST_PREFIX: &str = "les";
/// Stems containing these are single trees or bushes, not blocks.
const EXCLUDED_MARKERS: [&str; 2] = ["singlestrom", "krovi"];
const TRIANGLE_MARKER: &str = "trojuhelnik";
const CONIFER_MARKER: &str = "jehl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForestType {
    Conifer,
    Mixed,
}

/// Forest block placed on the `(x, z)` plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestBlock {
    pub x: f64,
    pub z: f64,
    pub is_square: bool,
    /// Heading snapped to 0, 90, 180 or 270.
    pub yaw: u16,
    pub forest_type: ForestType,
}

/// Lower-cased file name of `path` without directory or extension.
pub fn model_stem(path: &str) -> String {
    let file = path.rsplit(|c: char| c == '\\' || c == '/').next().unwrap_or(path);
    let stem = match file.rfind('.') {
        Some(dot) => &file[..dot],
        None => file,
    };
    stem.to_ascii_lowercase()
}

/// Snap an angle in degrees to the nearest quarter turn in `[0, 360)`.
pub fn quantize_yaw(degrees: f64) -> u16 {
    if !degrees.is_finite() {
        return 0;
    }
    let quarters = (degrees.rem_euclid(360.0) / 90.0).round() as u16;
    (quarters % 4) * 90
}

/// Heading about the vertical axis. Euler yaw folds headings past 90
/// degrees into pitch, so this reads the matrix directly.
fn heading(transform: &[f32; 12]) -> f64 {
    (transform[6] as f64).atan2(transform[0] as f64).to_degrees()
}

pub fn classify(object: &ObjectRecord) -> Option<ForestBlock> {
    let stem = model_stem(&object.model_name);
    if !stem.starts_with(FOREST_PREFIX) || EXCLUDED_MARKERS.iter().any(|m| stem.contains(m)) {
        return None;
    }
    let forest_type = if stem.contains(CONIFER_MARKER) {
        ForestType::Conifer
    } else {
        ForestType::Mixed
    };
    Some(ForestBlock {
        x: object.position[0],
        z: object.position[2],
        is_square: !stem.contains(TRIANGLE_MARKER),
        yaw: quantize_yaw(heading(&object.transform)),
        forest_type,
    })
}

//! Map tile URL templates

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::WaypostError;

/// Base map style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapStyle {
    #[default]
    Main,
    Basic,
    Satellite,
}

impl MapStyle {
    /// Tile path segment for this style.
    pub fn tile_path(&self) -> &'static str {
        match self {
            Self::Main => "basic/main",
            Self::Basic => "basic/basic",
            Self::Satellite => "satellite",
        }
    }
}

impl fmt::Display for MapStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Main => "main",
            Self::Basic => "basic",
            Self::Satellite => "satellite",
        };
        f.write_str(s)
    }
}

impl FromStr for MapStyle {
    type Err = WaypostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "" => Ok(Self::Main),
            "basic" => Ok(Self::Basic),
            "satellite" | "sat" => Ok(Self::Satellite),
            other => Err(WaypostError::InvalidInput(format!(
                "unknown map style: {other}"
            ))),
        }
    }
}

/// Replace the `{z}`, `{x}` and `{y}` placeholders of a tile template.
pub fn render_tile_url(template: &str, z: u32, x: u32, y: u32) -> String {
    template
        .replace("{z}", &z.to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}

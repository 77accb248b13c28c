//! Aperio SVS metadata.
//!
//! SVS files are pyramidal TIFFs whose first ImageDescription looks like:
//!
//! ```text
//! Aperio Image Library v12.0.5
//! 46000x32914 [0,100 46000x32814] (256x256) JPEG/RGB Q=70|AppMag = 20|MPP = 0.4990
//! ```
//!
//! The pixel data itself needs no SVS-specific handling beyond JPEGTables
//! merging, which the generic level reader does for any JPEG TIFF.

use std::collections::HashMap;

/// Marker that identifies Aperio descriptions.
pub const APERIO_MARKER: &str = "Aperio";

/// Metadata parsed from an SVS ImageDescription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvsMetadata {
    /// Microns per pixel
    pub mpp: Option<f64>,

    /// Objective magnification (e.g. 20, 40)
    pub magnification: Option<f64>,

    /// First line of the description, e.g. "Aperio Image Library v12.0.5"
    pub software: Option<String>,

    /// All `key = value` pairs
    pub properties: HashMap<String, String>,
}

impl SvsMetadata {
    /// Parse an ImageDescription string.
    ///
    /// Segments are separated by `|`; those containing `=` become properties.
    /// Unparseable numbers leave the typed field empty.
    pub fn parse(description: &str) -> Self {
        let software = description
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| line.contains(APERIO_MARKER))
            .map(str::to_string);

        let properties: HashMap<String, String> = description
            .split('|')
            .filter_map(|segment| segment.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        let number = |key: &str| properties.get(key).and_then(|v| v.parse::<f64>().ok());

        SvsMetadata {
            mpp: number("MPP"),
            magnification: number("AppMag"),
            software,
            properties,
        }
    }
}

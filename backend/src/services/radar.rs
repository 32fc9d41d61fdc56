use std::collections::HashMap;

use crate::models::style::RadarResponse;

pub const RADAR_AXES: [&str; 5] = ["Brushwork", "Color", "Texture", "Contrast", "Composition"];

const FEATURE_TABLE: &[(&str, [f64; 5])] = &[
    ("vangogh", [0.9, 0.8, 0.7, 0.8, 0.6]),
    ("picasso", [0.6, 0.7, 0.8, 0.9, 0.7]),
    ("ink", [0.8, 0.3, 0.9, 0.9, 0.8]),
    ("impression", [0.7, 0.9, 0.6, 0.6, 0.8]),
    ("pop", [0.5, 0.9, 0.5, 0.9, 0.6]),
    ("horror", [0.6, 0.7, 0.9, 0.9, 0.7]),
    ("candy", [0.5, 0.9, 0.5, 0.8, 0.6]),
    ("mosaic", [0.3, 0.8, 0.9, 0.7, 0.6]),
    ("rain-princess", [0.7, 0.7, 0.8, 0.7, 0.8]),
    ("udnie", [0.7, 0.6, 0.8, 0.8, 0.7]),
];

/// Closed polygon over [`RADAR_AXES`]: the first pair is repeated at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarVector {
    pub pairs: Vec<(&'static str, f64)>,
}

impl RadarVector {
    fn closed(values: [f64; 5]) -> Self {
        let mut pairs: Vec<(&'static str, f64)> =
            RADAR_AXES.iter().copied().zip(values).collect();
        pairs.push(pairs[0]);
        Self { pairs }
    }

    pub fn labels(&self) -> Vec<String> {
        self.pairs.iter().map(|(l, _)| l.to_string()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.pairs.iter().map(|&(_, v)| v).collect()
    }
}

pub struct RadarProfileProvider {
    features: HashMap<&'static str, [f64; 5]>,
}

impl RadarProfileProvider {
    pub fn new() -> Self {
        Self {
            features: FEATURE_TABLE.iter().copied().collect(),
        }
    }

    /// Unknown styles yield all-zero values under the standard labels.
    pub fn radar_vector(&self, style_id: &str) -> RadarVector {
        match self.features.get(style_id) {
            Some(values) => RadarVector::closed(*values),
            None => {
                tracing::info!(style_id, "no radar features for style");
                RadarVector::closed([0.0; 5])
            }
        }
    }

    pub fn contains(&self, style_id: &str) -> bool {
        self.features.contains_key(style_id)
    }

    pub fn respond(&self, style_id: &str) -> RadarResponse {
        let vector = self.radar_vector(style_id);
        RadarResponse {
            success: true,
            style: style_id.to_string(),
            labels: vector.labels(),
            values: vector.values(),
        }
    }
}

impl Default for RadarProfileProvider {
    fn default() -> Self {
        Self::new()
    }
}

use serde::{Deserialize, Serialize};

/// Perceptual parameters for one recognised style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleProfile {
    pub realism: f64,
    pub detail: f64,
    pub color_fidelity: f64,
    pub stylization: f64,
    pub optimal_style_weight: f64,
    pub optimal_content_weight: f64,
    /// Multiplier on the whole landscape, roughly 0.8..=1.2.
    pub balance_factor: f64,
    /// Selects the pattern term and oscillation frequency.
    pub variant_id: u32,
}

/// `styles` accepts either a JSON array or a bare string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StyleSelection {
    One(String),
    Many(Vec<String>),
}

impl StyleSelection {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StyleSelection::One(s) => vec![s],
            StyleSelection::Many(v) => v,
        }
    }
}

/// Request body for POST /api/v1/styles/landscape
#[derive(Debug, Clone, Deserialize)]
pub struct LandscapeRequest {
    #[serde(default)]
    pub styles: Option<StyleSelection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimumPoint {
    pub style_weight: f64,
    pub content_weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LandscapeResponse {
    pub success: bool,
    /// Row index follows the style axis, column index the content axis.
    pub grid: Vec<Vec<f64>>,
    pub style_axis: Vec<f64>,
    pub content_axis: Vec<f64>,
    pub optimum: OptimumPoint,
    pub title: String,
}

/// Request body for POST /api/v1/styles/radar
#[derive(Debug, Clone, Deserialize)]
pub struct RadarRequest {
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RadarResponse {
    pub success: bool,
    pub style: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDescriptor {
    pub id: String,
    pub profile: StyleProfile,
    pub has_radar: bool,
}

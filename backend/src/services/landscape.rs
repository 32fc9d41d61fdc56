use std::sync::Arc;

use ndarray::Array2;

use crate::models::error::AppError;
use crate::models::style::{LandscapeResponse, OptimumPoint, StyleProfile};
use crate::services::normalize::normalize;
use crate::services::profiles::StyleProfileRegistry;

// ---------------------------------------------------------------------------
// Axis sampling
// ---------------------------------------------------------------------------

pub const AXIS_POINTS: usize = 10;
pub const AXIS_MIN: f64 = 0.1;
pub const AXIS_MAX: f64 = 1.0;

/// Evenly spaced samples over `[lo, hi]`, last sample pinned to `hi`.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSample {
    values: Vec<f64>,
}

impl AxisSample {
    pub fn new(n: usize, lo: f64, hi: f64) -> Self {
        let values = match n {
            0 => Vec::new(),
            1 => vec![lo],
            _ => {
                let step = (hi - lo) / (n - 1) as f64;
                let mut v: Vec<f64> = (0..n).map(|i| lo + i as f64 * step).collect();
                v[n - 1] = hi;
                v
            }
        };
        Self { values }
    }

    pub fn reference() -> Self {
        Self::new(AXIS_POINTS, AXIS_MIN, AXIS_MAX)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Score contributed by one style at `(sw, cw)`, before averaging.
fn style_contribution(p: &StyleProfile, sw: f64, cw: f64) -> f64 {
    let mut base = (sw * p.stylization
        + cw * p.realism
        + (sw * 0.7 + cw * 0.3) * p.detail
        + (sw * 0.4 + cw * 0.6) * p.color_fidelity)
        / 4.0;
    base *= p.balance_factor;

    let distance = (((sw - p.optimal_style_weight) * 1.5).powi(2)
        + ((cw - p.optimal_content_weight) * 1.5).powi(2))
    .sqrt();
    let boost = (-distance * 2.5).exp();
    base * (1.0 + boost * 0.3)
}

/// Pattern, contrast and oscillation terms keyed by the main style's variant.
fn apply_variant_terms(score: f64, variant_id: u32, sw: f64, cw: f64) -> f64 {
    let mut score = score;

    if variant_id % 2 == 0 {
        if (sw - cw).abs() < 0.2 {
            score *= 1.1;
        }
    } else if (sw - 0.5).abs() < 0.2 || (cw - 0.5).abs() < 0.2 {
        score *= 1.1;
    }

    if sw < 0.3 && cw > 0.8 {
        score *= 0.7;
    } else if sw > 0.8 && cw < 0.2 {
        score *= 0.9;
    }

    let v = variant_id as f64;
    score + 0.05 * (sw * v * 10.0).sin() * (cw * v * 10.0).cos()
}

/// Raw landscape for `style_ids`, rows indexed by style weight.
///
/// Every id, including duplicates and unknowns, contributes equally. The
/// main style is `style_ids[0]`.
pub fn synthesize(
    registry: &StyleProfileRegistry,
    style_ids: &[String],
    style_axis: &AxisSample,
    content_axis: &AxisSample,
) -> Result<Array2<f64>, AppError> {
    let profiles: Vec<StyleProfile> = style_ids.iter().map(|id| registry.lookup(id)).collect();
    let Some(main) = profiles.first() else {
        return Err(AppError::ValidationError(
            "at least one style is required".to_string(),
        ));
    };
    let variant_id = main.variant_id;
    let count = profiles.len() as f64;

    let grid = Array2::from_shape_fn((style_axis.len(), content_axis.len()), |(i, j)| {
        let sw = style_axis.values()[i];
        let cw = content_axis.values()[j];
        let mut score = 0.0;
        for p in &profiles {
            score += style_contribution(p, sw, cw) / count;
        }
        apply_variant_terms(score, variant_id, sw, cw)
    });

    Ok(grid)
}

// ---------------------------------------------------------------------------
// Optimum
// ---------------------------------------------------------------------------

/// Axis coordinates of the first maximal cell in row-major order.
pub fn locate(
    grid: &Array2<f64>,
    style_axis: &AxisSample,
    content_axis: &AxisSample,
) -> Result<OptimumPoint, AppError> {
    let mut best: Option<((usize, usize), f64)> = None;
    for ((i, j), &v) in grid.indexed_iter() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some(((i, j), v)),
        }
    }

    let ((i, j), _) = best.ok_or_else(|| AppError::Computation("empty landscape grid".to_string()))?;
    match (style_axis.values().get(i), content_axis.values().get(j)) {
        (Some(&style_weight), Some(&content_weight)) => Ok(OptimumPoint {
            style_weight,
            content_weight,
        }),
        _ => Err(AppError::Computation(format!(
            "grid index ({}, {}) outside axis samples",
            i, j
        ))),
    }
}

// ---------------------------------------------------------------------------
// Title
// ---------------------------------------------------------------------------

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn landscape_title(style_ids: &[String]) -> String {
    match style_ids.len() {
        1 => format!("{} style effect prediction", capitalize(&style_ids[0])),
        2 | 3 => format!(
            "{} blended style effect prediction",
            style_ids.iter().map(|s| capitalize(s)).collect::<Vec<_>>().join(" + ")
        ),
        n => format!("{}-style blend effect prediction", n),
    }
}

// ---------------------------------------------------------------------------
// LandscapeService
// ---------------------------------------------------------------------------

pub struct LandscapeService {
    registry: Arc<StyleProfileRegistry>,
    style_axis: AxisSample,
    content_axis: AxisSample,
}

impl LandscapeService {
    pub fn new(registry: Arc<StyleProfileRegistry>) -> Self {
        Self {
            registry,
            style_axis: AxisSample::reference(),
            content_axis: AxisSample::reference(),
        }
    }

    /// Synthesize, normalize and locate the optimum for one request.
    pub fn predict(&self, style_ids: &[String]) -> Result<LandscapeResponse, AppError> {
        let raw = synthesize(&self.registry, style_ids, &self.style_axis, &self.content_axis)?;

        let (seed_key, _) = self.registry.resolve(&style_ids[0]);
        let grid = normalize(&raw, seed_key)?;
        let optimum = locate(&grid, &self.style_axis, &self.content_axis)?;

        tracing::debug!(
            styles = style_ids.len(),
            main_style = seed_key,
            style_weight = optimum.style_weight,
            content_weight = optimum.content_weight,
            "landscape computed",
        );

        Ok(LandscapeResponse {
            success: true,
            grid: grid.outer_iter().map(|row| row.to_vec()).collect(),
            style_axis: self.style_axis.values().to_vec(),
            content_axis: self.content_axis.values().to_vec(),
            optimum,
            title: landscape_title(style_ids),
        })
    }
}

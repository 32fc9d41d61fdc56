use std::collections::HashMap;

use crate::models::style::StyleProfile;

/// Style used whenever a requested id is not recognised.
pub const DEFAULT_STYLE_ID: &str = "vangogh";

// (id, realism, detail, color_fidelity, stylization,
//  optimal_style_weight, optimal_content_weight, balance_factor, variant_id)
const PROFILE_TABLE: &[(&str, f64, f64, f64, f64, f64, f64, f64, u32)] = &[
    ("vangogh", 0.4, 0.7, 0.5, 0.9, 0.75, 0.45, 1.1, 1),
    ("picasso", 0.3, 0.5, 0.6, 0.8, 0.8, 0.3, 0.9, 2),
    ("ink", 0.2, 0.8, 0.3, 0.9, 0.9, 0.2, 1.2, 3),
    ("impression", 0.5, 0.6, 0.8, 0.7, 0.7, 0.5, 1.0, 4),
    ("pop", 0.3, 0.5, 0.9, 0.8, 0.65, 0.55, 0.85, 5),
    ("horror", 0.4, 0.8, 0.4, 0.9, 0.85, 0.3, 1.15, 6),
    ("candy", 0.2, 0.4, 0.9, 0.9, 0.7, 0.4, 0.8, 7),
    ("mosaic", 0.3, 0.7, 0.6, 0.8, 0.75, 0.35, 1.05, 8),
    ("rain-princess", 0.5, 0.7, 0.7, 0.8, 0.6, 0.6, 0.95, 9),
    ("udnie", 0.4, 0.6, 0.5, 0.8, 0.7, 0.5, 1.0, 10),
];

/// Read-only table of style profiles, built once at startup.
#[derive(Debug, Clone)]
pub struct StyleProfileRegistry {
    profiles: HashMap<&'static str, StyleProfile>,
    default_profile: StyleProfile,
}

impl StyleProfileRegistry {
    pub fn new() -> Self {
        let profiles: HashMap<&'static str, StyleProfile> = PROFILE_TABLE
            .iter()
            .map(|&(id, realism, detail, color_fidelity, stylization, osw, ocw, balance, variant)| {
                (
                    id,
                    StyleProfile {
                        realism,
                        detail,
                        color_fidelity,
                        stylization,
                        optimal_style_weight: osw,
                        optimal_content_weight: ocw,
                        balance_factor: balance,
                        variant_id: variant,
                    },
                )
            })
            .collect();

        let default_profile = profiles[DEFAULT_STYLE_ID];
        tracing::debug!("StyleProfileRegistry loaded {} profiles", profiles.len());

        Self {
            profiles,
            default_profile,
        }
    }

    /// Profile for `style_id`, or the default profile when the id is unknown.
    /// Logs the substitution.
    pub fn lookup(&self, style_id: &str) -> StyleProfile {
        match self.profiles.get(style_id) {
            Some(profile) => *profile,
            None => {
                tracing::info!(style_id, fallback = DEFAULT_STYLE_ID, "unknown style, using default profile");
                self.default_profile
            }
        }
    }

    /// Canonical id together with its profile. Unknown ids resolve to
    /// [`DEFAULT_STYLE_ID`] without logging; callers that already went
    /// through [`lookup`](Self::lookup) use this to recover the id.
    pub fn resolve(&self, style_id: &str) -> (&'static str, StyleProfile) {
        match self.profiles.get_key_value(style_id) {
            Some((id, profile)) => (*id, *profile),
            None => (DEFAULT_STYLE_ID, self.default_profile),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Known style ids in table order.
    pub fn style_ids(&self) -> impl Iterator<Item = &'static str> {
        PROFILE_TABLE.iter().map(|row| row.0)
    }
}

impl Default for StyleProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

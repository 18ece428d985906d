//! Weight calculations and permissive weight input

use colis_core::{Dimensions, StationConfig, VOLUMETRIC_DIVISOR};

/// Volumetric weight in kg for dimensions in cm, with the standard divisor
pub fn volumetric_weight(length_cm: f64, width_cm: f64, height_cm: f64) -> f64 {
    volumetric_weight_with(length_cm, width_cm, height_cm, VOLUMETRIC_DIVISOR)
}

pub fn volumetric_weight_with(length_cm: f64, width_cm: f64, height_cm: f64, divisor: f64) -> f64 {
    (length_cm * width_cm * height_cm) / divisor
}

/// Pricing parameters applied to every session
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tariff {
    pub rate_per_kg: f64,
    pub volumetric_divisor: f64,
}

impl Tariff {
    pub fn new(rate_per_kg: f64) -> Self {
        Tariff {
            rate_per_kg,
            volumetric_divisor: VOLUMETRIC_DIVISOR,
        }
    }

    pub fn from_config(config: &StationConfig) -> Self {
        Tariff {
            rate_per_kg: config.rate_per_kg,
            volumetric_divisor: config.volumetric_divisor,
        }
    }

    /// Volumetric weight, or `None` if any dimension is missing
    pub fn volumetric_weight(&self, dimensions: &Dimensions) -> Option<f64> {
        let (l, w, h) = dimensions.resolved()?;
        Some(volumetric_weight_with(l, w, h, self.volumetric_divisor))
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Tariff::new(5.0)
    }
}

/// Coerce a user-entered weight: negative, NaN and infinite become 0.
///
/// This is permissive parsing, not validation: nothing is ever rejected.
pub fn coerce_weight(kg: f64) -> f64 {
    if kg.is_finite() && kg > 0.0 {
        kg
    } else {
        0.0
    }
}

/// Parse a free-text weight the way a lenient form field would: leading
/// whitespace is skipped, the longest numeric prefix is used
/// (`"12.5kg"` → 12.5), and anything unparseable reads as 0.
pub fn parse_actual_weight(input: &str) -> f64 {
    let prefix = numeric_prefix(input.trim_start());
    coerce_weight(prefix.parse::<f64>().unwrap_or(0.0))
}

fn numeric_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return "";
    }

    // Exponent only counts when followed by at least one digit
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    &s[..end]
}

//! Tolerance based comparison of live fixture state against a scene target.
//!
//! Every attribute a target leaves out is unconstrained, and so is every
//! attribute the fixture does not report.

use crate::resource::{Fixture, Hsbk, Target};
use serde::Serialize;

pub const BRIGHTNESS_TOLERANCE: f64 = 0.05;
pub const SATURATION_TOLERANCE: f64 = 0.10;
pub const KELVIN_TOLERANCE: f64 = 200.0;
pub const HUE_TOLERANCE_DEGREES: f64 = 10.0;
/// Differences at or above this are treated as close across 0°/360°.
pub const HUE_WRAPAROUND_THRESHOLD: f64 = 350.0;

// Absorbs representation error so that e.g. 0.50 vs 0.55 sits inside the band.
const EPSILON: f64 = 1e-9;

fn within(expected: f64, actual: f64, tolerance: f64) -> bool {
    (actual - expected).abs() <= tolerance + EPSILON
}

pub fn hue_matches(expected: f64, actual: f64) -> bool {
    let diff = (actual - expected).abs();
    diff <= HUE_TOLERANCE_DEGREES + EPSILON || diff >= HUE_WRAPAROUND_THRESHOLD - EPSILON
}

pub fn brightness_matches(expected: f64, actual: f64) -> bool {
    within(expected, actual, BRIGHTNESS_TOLERANCE)
}

pub fn saturation_matches(expected: f64, actual: f64) -> bool {
    within(expected, actual, SATURATION_TOLERANCE)
}

pub fn kelvin_matches(expected: f64, actual: f64) -> bool {
    within(expected, actual, KELVIN_TOLERANCE)
}

/// Compares one optional attribute; missing on either side passes.
fn constrained(expected: Option<f64>, actual: Option<f64>, check: fn(f64, f64) -> bool) -> bool {
    match (expected, actual) {
        (Some(expected), Some(actual)) => check(expected, actual),
        _ => true,
    }
}

pub fn color_matches(expected: &Hsbk, actual: &Hsbk) -> bool {
    constrained(expected.hue, actual.hue, hue_matches)
        && constrained(expected.saturation, actual.saturation, saturation_matches)
        && constrained(expected.kelvin, actual.kelvin, kelvin_matches)
}

/// Per-attribute outcome of comparing one fixture with one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub power: bool,
    pub brightness: bool,
    pub color: bool,
}

impl Verdict {
    pub fn matched(&self) -> bool {
        self.power && self.brightness && self.color
    }
}

pub fn matches_target(fixture: &Fixture, target: &Target) -> Verdict {
    let power = match (target.power, fixture.power) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => true,
    };
    let brightness = constrained(target.brightness, fixture.brightness, brightness_matches);
    let color = match (&target.color, &fixture.color) {
        (Some(expected), Some(actual)) => color_matches(expected, actual),
        _ => true,
    };
    Verdict {
        power,
        brightness,
        color,
    }
}

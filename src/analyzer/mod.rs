//! Analyzer - Deterministic Micro-Climate Image Analysis
//!
//! ## Responsibilities
//!
//! - Decode raw webcam bytes into pixel grids
//! - Sun/shadow binarization (Otsu threshold with fixed fallback)
//! - Connected-region counting on the bright/dark masks
//! - Brightness, texture and wetness statistics
//! - Rule-table weather classification, confidence, comfort score
//!
//! The analyzer is a pure function of the input bytes and its parameters: no
//! I/O, no shared state, identical bytes yield an identical result. Panics in
//! the processing path are caught and surfaced as `analysis_error` results so
//! a malformed frame can never take down a source's loop.

mod classify;
mod image_ops;
mod regions;

pub use classify::{
    classify_weather, comfort_score, confidence, default_weather_rules, wetness_score,
    BrightnessBuckets, BrightnessLevel, ComfortLevel, ComfortWeights, ContrastCuts, ContrastLevel,
    WeatherCondition, WeatherMetrics, WeatherRule,
};
pub use regions::RegionSummary;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Outcome status carried on every result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Success,
    FetchError,
    DecodeError,
    AnalysisError,
}

/// Structured micro-climate metrics for one frame
///
/// Created once per analysis attempt and never mutated afterwards; newer
/// results replace older ones in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub webcam_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: AnalysisStatus,
    pub sun_exposure_percent: f64,
    pub shadow_coverage_percent: f64,
    pub sun_regions_count: usize,
    pub shadow_regions_count: usize,
    pub largest_sun_region_area: usize,
    pub largest_shadow_region_area: usize,
    pub mean_brightness: f64,
    pub brightness_std: f64,
    pub dynamic_range: u8,
    pub brightness_level: BrightnessLevel,
    pub contrast_level: ContrastLevel,
    pub weather_condition: WeatherCondition,
    pub blue_dominance: f64,
    pub color_uniformity: f64,
    pub texture_variance: f64,
    pub wetness_score: f64,
    pub confidence: f64,
    pub comfort_score: f64,
    pub comfort_level: ComfortLevel,
}

impl AnalysisResult {
    /// Build a failure result with the given status
    ///
    /// Numeric fields carry the previous cached values when available so
    /// downstream consumers always receive a well-formed record; otherwise
    /// they are zeroed.
    pub fn failed(
        webcam_id: &str,
        timestamp: DateTime<Utc>,
        status: AnalysisStatus,
        previous: Option<&AnalysisResult>,
    ) -> Self {
        match previous {
            Some(prev) => Self {
                webcam_id: webcam_id.to_string(),
                timestamp,
                status,
                ..prev.clone()
            },
            None => Self {
                webcam_id: webcam_id.to_string(),
                timestamp,
                status,
                sun_exposure_percent: 0.0,
                shadow_coverage_percent: 0.0,
                sun_regions_count: 0,
                shadow_regions_count: 0,
                largest_sun_region_area: 0,
                largest_shadow_region_area: 0,
                mean_brightness: 0.0,
                brightness_std: 0.0,
                dynamic_range: 0,
                brightness_level: BrightnessLevel::Dark,
                contrast_level: ContrastLevel::Low,
                weather_condition: WeatherCondition::Variable,
                blue_dominance: 0.0,
                color_uniformity: 0.0,
                texture_variance: 0.0,
                wetness_score: 0.0,
                confidence: 0.0,
                comfort_score: 0.0,
                comfort_level: ComfortLevel::VeryPoor,
            },
        }
    }
}

/// Tunable analysis parameters
///
/// Thresholds are data, not control flow; the defaults are the calibration
/// the system ships with, not verified ground truth.
#[derive(Debug, Clone)]
pub struct AnalyzerParams {
    /// Fixed binarization threshold when Otsu is degenerate (uniform image)
    pub fallback_threshold: u8,
    /// Width of the neutral intensity band straddling the threshold; pixels
    /// inside it count as neither sun nor shadow
    pub neutral_band: u8,
    /// Minimum region area in pixels for the sun/shadow region counts
    pub min_region_area: usize,
    /// Laplacian-variance calibration for the wetness score
    pub wetness_calibration: f64,
    pub brightness_buckets: BrightnessBuckets,
    pub contrast_cuts: ContrastCuts,
    pub weather_rules: Vec<WeatherRule>,
    pub comfort_weights: ComfortWeights,
}

impl Default for AnalyzerParams {
    fn default() -> Self {
        Self {
            fallback_threshold: 128,
            neutral_band: 30,
            min_region_area: 100,
            wetness_calibration: 500.0,
            brightness_buckets: BrightnessBuckets::default(),
            contrast_cuts: ContrastCuts::default(),
            weather_rules: default_weather_rules(),
            comfort_weights: ComfortWeights::default(),
        }
    }
}

/// Analyze one frame
///
/// Never returns an error: decode failures become `decode_error` results and
/// any panic in the processing path becomes `analysis_error`.
pub fn analyze(
    webcam_id: &str,
    timestamp: DateTime<Utc>,
    bytes: &[u8],
    params: &AnalyzerParams,
) -> AnalysisResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        analyze_inner(webcam_id, timestamp, bytes, params)
    }));

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            tracing::warn!(webcam_id = %webcam_id, error = %e, "Image decode failed");
            AnalysisResult::failed(webcam_id, timestamp, AnalysisStatus::DecodeError, None)
        }
        Err(_) => {
            tracing::error!(webcam_id = %webcam_id, "Analysis panicked");
            AnalysisResult::failed(webcam_id, timestamp, AnalysisStatus::AnalysisError, None)
        }
    }
}

fn analyze_inner(
    webcam_id: &str,
    timestamp: DateTime<Utc>,
    bytes: &[u8],
    params: &AnalyzerParams,
) -> Result<AnalysisResult> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::Decode(format!("{}: {}", webcam_id, e)))?;
    let gray = decoded.to_luma8();
    let rgb = decoded.to_rgb8();

    // Smoothed copy for binarization; raw intensities for statistics
    let blurred = image_ops::gaussian_blur_3x3(&gray);

    let hist = image_ops::histogram(&blurred);
    let threshold = image_ops::otsu_threshold(&hist).unwrap_or(params.fallback_threshold);

    // Pixels inside the neutral band around the threshold belong to neither
    // mask, so sun + shadow stays <= 100 with a neutral residual.
    let half_band = (params.neutral_band / 2).max(1);
    let bright_cut = threshold.saturating_add(half_band);
    let dark_cut = threshold.saturating_sub(half_band);

    let (sun_mask, shadow_mask) = split_masks(&blurred, bright_cut, dark_cut);
    let total_pixels = (blurred.width() * blurred.height()) as f64;
    let sun_pixels = sun_mask.iter().filter(|&&b| b).count() as f64;
    let shadow_pixels = shadow_mask.iter().filter(|&&b| b).count() as f64;
    let sun_exposure_percent = round2(sun_pixels / total_pixels * 100.0);
    let shadow_coverage_percent = round2(shadow_pixels / total_pixels * 100.0);

    let width = blurred.width() as usize;
    let height = blurred.height() as usize;
    let sun_regions = regions::label_regions(&sun_mask, width, height, params.min_region_area);
    let shadow_regions =
        regions::label_regions(&shadow_mask, width, height, params.min_region_area);

    let (mean_brightness, brightness_std, min_intensity, max_intensity) =
        image_ops::brightness_stats(&gray);
    let dynamic_range = max_intensity - min_intensity;
    let brightness_level = params.brightness_buckets.classify(mean_brightness);
    let contrast_level = params.contrast_cuts.classify(brightness_std);

    let laplacian_variance = image_ops::laplacian_variance(&gray);
    let wetness = wetness_score(laplacian_variance, params.wetness_calibration);

    let texture_variance = image_ops::sobel_texture_variance(&gray);
    let (mean_r, mean_g, mean_b) = image_ops::channel_means(&rgb);
    let blue_dominance = mean_b / (mean_g + mean_r + 1.0);
    let channel_mean = (mean_r + mean_g + mean_b) / 3.0;
    let channel_spread = ((mean_r - channel_mean).powi(2)
        + (mean_g - channel_mean).powi(2)
        + (mean_b - channel_mean).powi(2))
    .sqrt()
        / 3.0f64.sqrt();
    let color_uniformity = 1.0 - channel_spread / 255.0;

    let weather_condition = classify_weather(
        &params.weather_rules,
        &WeatherMetrics {
            blue_dominance,
            color_uniformity,
            texture_variance,
            mean_brightness,
        },
    );

    let confidence = round2(confidence(mean_brightness, brightness_std));
    let comfort = comfort_score(
        &params.comfort_weights,
        sun_exposure_percent,
        shadow_coverage_percent,
        brightness_level,
        weather_condition,
    );

    Ok(AnalysisResult {
        webcam_id: webcam_id.to_string(),
        timestamp,
        status: AnalysisStatus::Success,
        sun_exposure_percent,
        shadow_coverage_percent,
        sun_regions_count: sun_regions.count,
        shadow_regions_count: shadow_regions.count,
        largest_sun_region_area: sun_regions.largest_area,
        largest_shadow_region_area: shadow_regions.largest_area,
        mean_brightness: round2(mean_brightness),
        brightness_std: round2(brightness_std),
        dynamic_range,
        brightness_level,
        contrast_level,
        weather_condition,
        blue_dominance: round2(blue_dominance),
        color_uniformity: round2(color_uniformity),
        texture_variance: round2(texture_variance),
        wetness_score: round2(wetness),
        confidence,
        comfort_score: round2(comfort),
        comfort_level: ComfortLevel::from_score(comfort),
    })
}

/// Bright/dark boolean masks from the smoothed intensity grid
fn split_masks(blurred: &GrayImage, bright_cut: u8, dark_cut: u8) -> (Vec<bool>, Vec<bool>) {
    let pixels = blurred.as_raw();
    let sun = pixels.iter().map(|&p| p >= bright_cut).collect();
    let shadow = pixels.iter().map(|&p| p <= dark_cut).collect();
    (sun, shadow)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

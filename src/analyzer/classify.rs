//! Classification rule tables
//!
//! Weather/brightness/contrast labels and the comfort score are driven by
//! ordered threshold tables so thresholds are data, not control flow. The
//! comfort band boundaries are fixed contracts; everything else is tunable
//! via [`AnalyzerParams`](super::AnalyzerParams).

use serde::{Deserialize, Serialize};

/// Brightness bucket for the mean intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrightnessLevel {
    Dark,
    Dim,
    Moderate,
    Bright,
}

/// Contrast bucket for the intensity standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContrastLevel {
    Low,
    Medium,
    High,
}

/// Deterministic weather classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Overcast,
    Variable,
}

/// Comfort band label (fixed 80/65/45/25 boundaries)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComfortLevel {
    Excellent,
    Good,
    Moderate,
    Poor,
    VeryPoor,
}

impl ComfortLevel {
    /// Map a 0-100 comfort score onto its band
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            ComfortLevel::Excellent
        } else if score >= 65.0 {
            ComfortLevel::Good
        } else if score >= 45.0 {
            ComfortLevel::Moderate
        } else if score >= 25.0 {
            ComfortLevel::Poor
        } else {
            ComfortLevel::VeryPoor
        }
    }
}

/// Ordered bucket table: first entry whose upper bound exceeds the value wins
#[derive(Debug, Clone)]
pub struct BrightnessBuckets {
    /// (exclusive upper bound, label), ascending; values beyond the last bound
    /// get `final_level`
    pub bounds: Vec<(f64, BrightnessLevel)>,
    pub final_level: BrightnessLevel,
}

impl Default for BrightnessBuckets {
    fn default() -> Self {
        Self {
            bounds: vec![
                (64.0, BrightnessLevel::Dark),
                (128.0, BrightnessLevel::Dim),
                (192.0, BrightnessLevel::Moderate),
            ],
            final_level: BrightnessLevel::Bright,
        }
    }
}

impl BrightnessBuckets {
    pub fn classify(&self, mean_brightness: f64) -> BrightnessLevel {
        for &(bound, level) in &self.bounds {
            if mean_brightness < bound {
                return level;
            }
        }
        self.final_level
    }
}

/// Contrast cut points (low below the first, high above the second)
#[derive(Debug, Clone)]
pub struct ContrastCuts {
    pub low_max: f64,
    pub medium_max: f64,
}

impl Default for ContrastCuts {
    fn default() -> Self {
        Self {
            low_max: 40.0,
            medium_max: 60.0,
        }
    }
}

impl ContrastCuts {
    pub fn classify(&self, brightness_std: f64) -> ContrastLevel {
        if brightness_std < self.low_max {
            ContrastLevel::Low
        } else if brightness_std < self.medium_max {
            ContrastLevel::Medium
        } else {
            ContrastLevel::High
        }
    }
}

/// Color/texture metrics feeding the weather rule table
#[derive(Debug, Clone, Copy)]
pub struct WeatherMetrics {
    pub blue_dominance: f64,
    pub color_uniformity: f64,
    pub texture_variance: f64,
    pub mean_brightness: f64,
}

/// One row of the weather rule table: every `Some` constraint must hold
#[derive(Debug, Clone)]
pub struct WeatherRule {
    pub condition: WeatherCondition,
    pub min_blue_dominance: Option<f64>,
    pub min_mean_brightness: Option<f64>,
    pub min_color_uniformity: Option<f64>,
    pub min_texture_variance: Option<f64>,
    pub max_texture_variance: Option<f64>,
}

impl WeatherRule {
    fn matches(&self, m: &WeatherMetrics) -> bool {
        if let Some(v) = self.min_blue_dominance {
            if m.blue_dominance < v {
                return false;
            }
        }
        if let Some(v) = self.min_mean_brightness {
            if m.mean_brightness < v {
                return false;
            }
        }
        if let Some(v) = self.min_color_uniformity {
            if m.color_uniformity < v {
                return false;
            }
        }
        if let Some(v) = self.min_texture_variance {
            if m.texture_variance < v {
                return false;
            }
        }
        if let Some(v) = self.max_texture_variance {
            if m.texture_variance > v {
                return false;
            }
        }
        true
    }
}

/// Ordered rule table; first matching row wins, fallback is Variable
pub fn default_weather_rules() -> Vec<WeatherRule> {
    vec![
        // Blue-dominant low-texture sky
        WeatherRule {
            condition: WeatherCondition::Clear,
            min_blue_dominance: Some(0.6),
            min_mean_brightness: None,
            min_color_uniformity: None,
            min_texture_variance: None,
            max_texture_variance: Some(1000.0),
        },
        // Blown-out bright frame with no texture reads as clear sun
        WeatherRule {
            condition: WeatherCondition::Clear,
            min_blue_dominance: None,
            min_mean_brightness: Some(200.0),
            min_color_uniformity: None,
            min_texture_variance: None,
            max_texture_variance: Some(1000.0),
        },
        // Uniform gray channels
        WeatherRule {
            condition: WeatherCondition::Overcast,
            min_blue_dominance: None,
            min_mean_brightness: None,
            min_color_uniformity: Some(0.8),
            min_texture_variance: None,
            max_texture_variance: Some(1000.0),
        },
        // High-frequency cloud texture
        WeatherRule {
            condition: WeatherCondition::PartlyCloudy,
            min_blue_dominance: None,
            min_mean_brightness: None,
            min_color_uniformity: None,
            min_texture_variance: Some(1500.0),
            max_texture_variance: None,
        },
    ]
}

pub fn classify_weather(rules: &[WeatherRule], metrics: &WeatherMetrics) -> WeatherCondition {
    rules
        .iter()
        .find(|r| r.matches(metrics))
        .map(|r| r.condition)
        .unwrap_or(WeatherCondition::Variable)
}

/// Tunable comfort score weights
#[derive(Debug, Clone)]
pub struct ComfortWeights {
    pub base: f64,
    /// Inclusive sun-exposure range treated as optimal
    pub optimal_sun_range: (f64, f64),
    pub optimal_sun_bonus: f64,
    pub excess_sun_threshold: f64,
    pub excess_sun_penalty: f64,
    pub low_sun_threshold: f64,
    pub low_sun_penalty: f64,
    /// Inclusive shadow-coverage range with good shade availability
    pub shadow_range: (f64, f64),
    pub shadow_bonus: f64,
    pub brightness_bonus: f64,
    pub dark_penalty: f64,
    pub clear_bonus: f64,
    pub partly_cloudy_bonus: f64,
    pub overcast_penalty: f64,
}

impl Default for ComfortWeights {
    fn default() -> Self {
        Self {
            base: 50.0,
            optimal_sun_range: (30.0, 70.0),
            optimal_sun_bonus: 20.0,
            excess_sun_threshold: 80.0,
            excess_sun_penalty: 15.0,
            low_sun_threshold: 15.0,
            low_sun_penalty: 10.0,
            shadow_range: (20.0, 50.0),
            shadow_bonus: 15.0,
            brightness_bonus: 10.0,
            dark_penalty: 10.0,
            clear_bonus: 15.0,
            partly_cloudy_bonus: 5.0,
            overcast_penalty: 5.0,
        }
    }
}

/// Weighted comfort score, clamped to [0, 100]
pub fn comfort_score(
    weights: &ComfortWeights,
    sun_exposure_percent: f64,
    shadow_coverage_percent: f64,
    brightness_level: BrightnessLevel,
    weather: WeatherCondition,
) -> f64 {
    let mut score = weights.base;

    if (weights.optimal_sun_range.0..=weights.optimal_sun_range.1).contains(&sun_exposure_percent) {
        score += weights.optimal_sun_bonus;
    } else if sun_exposure_percent > weights.excess_sun_threshold {
        score -= weights.excess_sun_penalty;
    } else if sun_exposure_percent < weights.low_sun_threshold {
        score -= weights.low_sun_penalty;
    }

    if (weights.shadow_range.0..=weights.shadow_range.1).contains(&shadow_coverage_percent) {
        score += weights.shadow_bonus;
    }

    match brightness_level {
        BrightnessLevel::Bright | BrightnessLevel::Moderate => score += weights.brightness_bonus,
        BrightnessLevel::Dark => score -= weights.dark_penalty,
        BrightnessLevel::Dim => {}
    }

    match weather {
        WeatherCondition::Clear => score += weights.clear_bonus,
        WeatherCondition::PartlyCloudy => score += weights.partly_cloudy_bonus,
        WeatherCondition::Overcast => score -= weights.overcast_penalty,
        WeatherCondition::Variable => {}
    }

    score.clamp(0.0, 100.0)
}

/// Confidence in [0, 1]: average of a brightness sub-score and a contrast
/// sub-score, each penalizing extremes (too dark/bright, too flat/noisy)
pub fn confidence(mean_brightness: f64, brightness_std: f64) -> f64 {
    const IDEAL_MEAN: f64 = 127.5;
    const IDEAL_STD: f64 = 45.0;

    let brightness_sub = (1.0 - (mean_brightness - IDEAL_MEAN).abs() / IDEAL_MEAN).clamp(0.0, 1.0);
    let contrast_sub = (1.0 - (brightness_std - IDEAL_STD).abs() / IDEAL_STD).clamp(0.0, 1.0);

    (brightness_sub + contrast_sub) / 2.0
}

/// Inverse-scaled Laplacian variance, clamped to [0, 1]. A smooth (low
/// second-derivative energy) frame reads as a wetter reflective surface.
pub fn wetness_score(laplacian_variance: f64, calibration: f64) -> f64 {
    (1.0 - laplacian_variance / calibration).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comfort_band_boundaries() {
        assert_eq!(ComfortLevel::from_score(100.0), ComfortLevel::Excellent);
        assert_eq!(ComfortLevel::from_score(80.0), ComfortLevel::Excellent);
        assert_eq!(ComfortLevel::from_score(79.9), ComfortLevel::Good);
        assert_eq!(ComfortLevel::from_score(65.0), ComfortLevel::Good);
        assert_eq!(ComfortLevel::from_score(64.9), ComfortLevel::Moderate);
        assert_eq!(ComfortLevel::from_score(45.0), ComfortLevel::Moderate);
        assert_eq!(ComfortLevel::from_score(44.9), ComfortLevel::Poor);
        assert_eq!(ComfortLevel::from_score(25.0), ComfortLevel::Poor);
        assert_eq!(ComfortLevel::from_score(24.9), ComfortLevel::VeryPoor);
        assert_eq!(ComfortLevel::from_score(0.0), ComfortLevel::VeryPoor);
    }

    #[test]
    fn test_brightness_buckets() {
        let buckets = BrightnessBuckets::default();
        assert_eq!(buckets.classify(0.0), BrightnessLevel::Dark);
        assert_eq!(buckets.classify(63.9), BrightnessLevel::Dark);
        assert_eq!(buckets.classify(64.0), BrightnessLevel::Dim);
        assert_eq!(buckets.classify(127.9), BrightnessLevel::Dim);
        assert_eq!(buckets.classify(128.0), BrightnessLevel::Moderate);
        assert_eq!(buckets.classify(191.9), BrightnessLevel::Moderate);
        assert_eq!(buckets.classify(192.0), BrightnessLevel::Bright);
        assert_eq!(buckets.classify(255.0), BrightnessLevel::Bright);
    }

    #[test]
    fn test_contrast_cuts() {
        let cuts = ContrastCuts::default();
        assert_eq!(cuts.classify(10.0), ContrastLevel::Low);
        assert_eq!(cuts.classify(45.0), ContrastLevel::Medium);
        assert_eq!(cuts.classify(75.0), ContrastLevel::High);
    }

    #[test]
    fn test_weather_rules_blue_sky() {
        let rules = default_weather_rules();
        let clear_sky = WeatherMetrics {
            blue_dominance: 0.7,
            color_uniformity: 0.6,
            texture_variance: 300.0,
            mean_brightness: 160.0,
        };
        assert_eq!(classify_weather(&rules, &clear_sky), WeatherCondition::Clear);
    }

    #[test]
    fn test_weather_rules_bright_flat_frame_is_clear() {
        // A blown-out white frame is perfectly uniform; the bright clear rule
        // must win before the overcast uniformity rule.
        let rules = default_weather_rules();
        let white = WeatherMetrics {
            blue_dominance: 0.499,
            color_uniformity: 1.0,
            texture_variance: 0.0,
            mean_brightness: 255.0,
        };
        assert_eq!(classify_weather(&rules, &white), WeatherCondition::Clear);
    }

    #[test]
    fn test_weather_rules_uniform_gray_is_overcast() {
        let rules = default_weather_rules();
        let gray = WeatherMetrics {
            blue_dominance: 0.498,
            color_uniformity: 1.0,
            texture_variance: 0.0,
            mean_brightness: 128.0,
        };
        assert_eq!(classify_weather(&rules, &gray), WeatherCondition::Overcast);
    }

    #[test]
    fn test_weather_rules_textured_is_partly_cloudy() {
        let rules = default_weather_rules();
        let textured = WeatherMetrics {
            blue_dominance: 0.5,
            color_uniformity: 0.5,
            texture_variance: 2200.0,
            mean_brightness: 150.0,
        };
        assert_eq!(
            classify_weather(&rules, &textured),
            WeatherCondition::PartlyCloudy
        );
    }

    #[test]
    fn test_weather_rules_fallback_variable() {
        let rules = default_weather_rules();
        let odd = WeatherMetrics {
            blue_dominance: 0.4,
            color_uniformity: 0.5,
            texture_variance: 1200.0,
            mean_brightness: 120.0,
        };
        assert_eq!(classify_weather(&rules, &odd), WeatherCondition::Variable);
    }

    #[test]
    fn test_confidence_bounds() {
        for (mean, std) in [(0.0, 0.0), (127.5, 45.0), (255.0, 120.0), (200.0, 10.0)] {
            let c = confidence(mean, std);
            assert!((0.0..=1.0).contains(&c), "confidence {} out of range", c);
        }
        assert_eq!(confidence(127.5, 45.0), 1.0);
        assert_eq!(confidence(255.0, 0.0), 0.0);
    }

    #[test]
    fn test_wetness_scaling() {
        assert_eq!(wetness_score(0.0, 500.0), 1.0);
        assert_eq!(wetness_score(250.0, 500.0), 0.5);
        assert_eq!(wetness_score(5000.0, 500.0), 0.0);
    }

    #[test]
    fn test_comfort_score_clamped() {
        let weights = ComfortWeights::default();
        let s = comfort_score(
            &weights,
            50.0,
            30.0,
            BrightnessLevel::Bright,
            WeatherCondition::Clear,
        );
        // 50 + 20 + 15 + 10 + 15
        assert_eq!(s, 100.0);
        let s = comfort_score(
            &weights,
            90.0,
            0.0,
            BrightnessLevel::Dark,
            WeatherCondition::Overcast,
        );
        assert_eq!(s, 20.0);
        assert!((0.0..=100.0).contains(&s));
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, OverlaySignature, RetryPolicy, palette::CanonicalPalette};

/// Calibration artifact for the whole vision pipeline.
///
/// Every field has a default, so a partial JSON file only overrides what
/// it names:
///
/// ```
/// use tilescan_vision::VisionConfig;
///
/// let config: VisionConfig =
///     serde_json::from_str(r#"{"classifier": {"match_threshold": 30.0}}"#).unwrap();
/// assert_eq!(config.classifier.match_threshold, 30.0);
/// assert_eq!(config.assembler.max_recaptures, 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub palette: CanonicalPalette,
    pub locator: LocatorConfig,
    pub classifier: ClassifierConfig,
    pub assembler: AssemblerConfig,
    pub status: StatusConfig,
}

impl VisionConfig {
    /// Checks that every threshold lies in its meaningful range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.locator;
        check("locator.background_tolerance", l.background_tolerance, 0.0, 442.0)?;
        check("locator.aspect_tolerance", l.aspect_tolerance, 0.0, 1.0)?;
        check("locator.cell_inset", l.cell_inset, 0.0, 0.45)?;
        check(
            "locator.spot_check_min_fraction",
            l.spot_check_min_fraction,
            0.0,
            1.0,
        )?;
        if l.min_board_side < 4 {
            return Err(ConfigError {
                field: "locator.min_board_side",
                value: f64::from(l.min_board_side),
                min: 4.0,
                max: f64::from(u32::MAX),
            });
        }

        let c = &self.classifier;
        check("classifier.patch_fraction", c.patch_fraction, 0.01, 1.0)?;
        check("classifier.match_threshold", c.match_threshold, 0.01, 442.0)?;

        check(
            "assembler.confidence_floor",
            self.assembler.confidence_floor,
            0.0,
            1.0,
        )?;

        let s = &self.status;
        check("status.probe_tolerance", s.probe_tolerance, 0.0, 442.0)?;
        check("status.overlay_min_fraction", s.overlay_min_fraction, 0.0, 1.0)?;
        check(
            "status.overlay_weak_fraction",
            s.overlay_weak_fraction,
            0.0,
            s.overlay_min_fraction,
        )?;
        for overlay in &s.overlays {
            check("status.overlays[].alpha", overlay.alpha, 0.01, 1.0)?;
        }
        Ok(())
    }
}

fn check(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError {
            field,
            value: f64::from(value),
            min: f64::from(min),
            max: f64::from(max),
        })
    }
}

/// Board detection and cache spot-check settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Maximum color distance for a pixel to count as board background.
    pub background_tolerance: f32,
    /// Smallest accepted board side, in pixels.
    pub min_board_side: u32,
    /// Maximum accepted `|width / height - 1|`.
    pub aspect_tolerance: f32,
    /// Fraction of a cell trimmed from each side before sampling.
    pub cell_inset: f32,
    /// Minimum background fraction for a cached rectangle to be reused.
    pub spot_check_min_fraction: f32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            background_tolerance: 12.0,
            min_board_side: 100,
            aspect_tolerance: 0.2,
            cell_inset: 0.15,
            spot_check_min_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Central fraction of the sample rectangle used as the patch.
    pub patch_fraction: f32,
    /// Color distance above which a cell is ambiguous.
    pub match_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            patch_fraction: 0.6,
            match_threshold: 25.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Snapshots below this overall confidence trigger a recapture.
    pub confidence_floor: f32,
    pub max_recaptures: usize,
    pub recapture_delay_ms: u64,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
            max_recaptures: 3,
            recapture_delay_ms: 120,
        }
    }
}

impl AssemblerConfig {
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_recaptures: self.max_recaptures,
            delay: Duration::from_millis(self.recapture_delay_ms),
        }
    }
}

/// Overlay detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub overlays: Vec<OverlaySignature>,
    /// Maximum distance between a probe and the tinted frame color.
    pub probe_tolerance: f32,
    /// Probe fraction that alone establishes an overlay.
    pub overlay_min_fraction: f32,
    /// Probe fraction that establishes game over on a locked board.
    pub overlay_weak_fraction: f32,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            overlays: OverlaySignature::canonical().to_vec(),
            probe_tolerance: 14.0,
            overlay_min_fraction: 0.6,
            overlay_weak_fraction: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(VisionConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = VisionConfig::default();
        config.assembler.confidence_floor = 1.5;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "assembler.confidence_floor");

        let mut config = VisionConfig::default();
        config.status.overlay_weak_fraction = 0.9;
        assert!(
            config.validate().is_err(),
            "weak fraction must not exceed the overlay fraction"
        );
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"assembler": {"max_recaptures": 5}, "locator": {"cell_inset": 0.1}}"#;
        let config: VisionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.assembler.max_recaptures, 5);
        assert_eq!(config.assembler.recapture_delay_ms, 120);
        assert!((config.locator.cell_inset - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.palette, CanonicalPalette::canonical());
        assert_eq!(config.status.overlays.len(), 2);
    }

    #[test]
    fn test_invalid_palette_is_rejected_on_load() {
        let json = r##"{"palette": {"frame": "#bbada0", "tiles": [
            {"value": 0, "color": "#cdc1b4"},
            {"value": 2, "color": "#eee4da"},
            {"value": 2, "color": "#ede0c8"}
        ]}}"##;
        assert!(serde_json::from_str::<VisionConfig>(json).is_err());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = AssemblerConfig::default().retry_policy();
        assert_eq!(policy.max_recaptures, 3);
        assert_eq!(policy.delay, Duration::from_millis(120));
    }
}

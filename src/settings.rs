//! # Processor Settings Module
//!
//! La "superficie" delle impostazioni desiderate dall'utente:
//! numero di passate target e qualità di encoding target.
//!
//! ## Responsabilità:
//! - `Quality`: newtype validato in `(0, 1]`, confrontato per valore
//! - `ProcessorSettings`: coppia `(iterations, quality)` process-wide
//! - Validazione dei range accettati dai controlli
//!
//! Le impostazioni vengono lette dallo scheduler solo ai checkpoint
//! cooperativi, quindi non serve alcun lock dedicato.

use crate::error::DecayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound accepted by the iterations input.
pub const MAX_ITERATIONS: u32 = 1000;

/// Quick iteration presets offered next to the iterations slider.
pub const ITERATION_PRESETS: [u32; 4] = [10, 50, 100, 200];

/// Encode quality in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Quality(f32);

impl Quality {
    pub fn new(value: f32) -> Result<Self, DecayError> {
        if value.is_finite() && value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(DecayError::InvalidSettings(format!(
                "quality must be in (0, 1], got {}",
                value
            )))
        }
    }

    /// Build from a 1-100 percentage, as typed into the numeric input.
    pub fn from_percent(percent: u8) -> Result<Self, DecayError> {
        Self::new(f32::from(percent) / 100.0)
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality on the 1-100 scale used by JPEG encoders.
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

impl TryFrom<f32> for Quality {
    type Error = DecayError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for f32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// Desired end state applied to every selected item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSettings {
    /// Target pass count (>= 1)
    pub iterations: u32,
    /// Target encode quality
    pub quality: Quality,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            iterations: 20,
            quality: Quality(0.5),
        }
    }
}

impl ProcessorSettings {
    pub fn new(iterations: u32, quality: f32) -> Result<Self, DecayError> {
        let settings = Self {
            iterations,
            quality: Quality::new(quality)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), DecayError> {
        if self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(DecayError::InvalidSettings(format!(
                "iterations must be between 1 and {}, got {}",
                MAX_ITERATIONS, self.iterations
            )));
        }
        Ok(())
    }

    pub fn with_iterations(self, iterations: u32) -> Self {
        Self { iterations, ..self }
    }

    pub fn with_quality(self, quality: Quality) -> Self {
        Self { quality, ..self }
    }
}

impl fmt::Display for ProcessorSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x @ {}", self.iterations, self.quality)
    }
}

/// Parses `N@Q`: pass count, then quality as a 1-100 percentage.
impl FromStr for ProcessorSettings {
    type Err = DecayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DecayError::InvalidSettings(format!("expected <passes>@<quality%>, got '{}'", s));
        let (iterations, percent) = s.trim().split_once('@').ok_or_else(invalid)?;
        let iterations: u32 = iterations.trim().parse().map_err(|_| invalid())?;
        let percent: u8 = percent.trim().trim_end_matches('%').parse().map_err(|_| invalid())?;

        let settings = Self {
            iterations,
            quality: Quality::from_percent(percent)?,
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stage() {
        let settings: ProcessorSettings = "50@30".parse().unwrap();
        assert_eq!(settings.iterations, 50);
        assert_eq!(settings.quality.percent(), 30);

        let settings: ProcessorSettings = " 200@5% ".parse().unwrap();
        assert_eq!(settings.iterations, 200);

        assert!("50".parse::<ProcessorSettings>().is_err());
        assert!("0@30".parse::<ProcessorSettings>().is_err());
        assert!("10@0".parse::<ProcessorSettings>().is_err());
        assert!("10@abc".parse::<ProcessorSettings>().is_err());
    }

    #[test]
    fn test_quality_bounds() {
        assert!(Quality::new(0.0).is_err());
        assert!(Quality::new(1.01).is_err());
        assert!(Quality::new(f32::NAN).is_err());
        assert!(Quality::new(1.0).is_ok());
        assert!(Quality::new(0.01).is_ok());
    }

    #[test]
    fn test_quality_percent() {
        assert_eq!(Quality::new(0.5).unwrap().percent(), 50);
        assert_eq!(Quality::new(0.004).unwrap().percent(), 1);
        assert_eq!(Quality::from_percent(73).unwrap().percent(), 73);
        assert!(Quality::from_percent(0).is_err());
    }

    #[test]
    fn test_settings_validation() {
        assert!(ProcessorSettings::new(0, 0.5).is_err());
        assert!(ProcessorSettings::new(MAX_ITERATIONS + 1, 0.5).is_err());
        assert!(ProcessorSettings::new(1, 0.5).is_ok());

        let settings = ProcessorSettings::default();
        assert_eq!(settings.iterations, 20);
        assert_eq!(settings.quality.percent(), 50);
    }

    #[test]
    fn test_settings_deserialize_rejects_bad_quality() {
        let ok: ProcessorSettings =
            serde_json::from_str(r#"{"iterations": 50, "quality": 0.25}"#).unwrap();
        assert_eq!(ok.iterations, 50);
        assert_eq!(ok.quality.percent(), 25);

        let bad = serde_json::from_str::<ProcessorSettings>(r#"{"iterations": 5, "quality": 2.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_presets_apply() {
        let base = ProcessorSettings::default();
        for preset in ITERATION_PRESETS {
            let s = base.with_iterations(preset);
            assert!(s.validate().is_ok());
            assert_eq!(s.quality, base.quality);
        }
    }
}

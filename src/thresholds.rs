//! Numeric cutoffs used by the usage-based suggestion rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarelyPlayed {
    pub max_plays: f64,
    pub max_minutes: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tourists {
    pub max_plays: f64,
    pub max_minutes: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreFavorites {
    pub min_plays: f64,
    pub min_minutes: f64,
}

/// A complete set of thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub barely_played: BarelyPlayed,
    pub tourists: Tourists,
    pub core_favorites: CoreFavorites,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Preset::Balanced.config()
    }
}

/// Named presets. `Custom` marks a configuration edited away from any preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    #[default]
    Balanced,
    Conservative,
    Aggressive,
    Custom,
}

impl Preset {
    pub const NAMED: [Preset; 3] = [Preset::Balanced, Preset::Conservative, Preset::Aggressive];

    /// Fresh copy of a preset's values. `Custom` has no template and yields the default.
    pub fn config(self) -> ThresholdConfig {
        match self {
            Preset::Balanced | Preset::Custom => ThresholdConfig {
                barely_played: BarelyPlayed { max_plays: 3.0, max_minutes: 10.0 },
                tourists: Tourists { max_plays: 2.0, max_minutes: 5.0 },
                core_favorites: CoreFavorites { min_plays: 20.0, min_minutes: 60.0 },
            },
            Preset::Conservative => ThresholdConfig {
                barely_played: BarelyPlayed { max_plays: 1.0, max_minutes: 3.0 },
                tourists: Tourists { max_plays: 1.0, max_minutes: 2.0 },
                core_favorites: CoreFavorites { min_plays: 40.0, min_minutes: 120.0 },
            },
            Preset::Aggressive => ThresholdConfig {
                barely_played: BarelyPlayed { max_plays: 5.0, max_minutes: 20.0 },
                tourists: Tourists { max_plays: 3.0, max_minutes: 10.0 },
                core_favorites: CoreFavorites { min_plays: 10.0, min_minutes: 30.0 },
            },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Balanced => "balanced",
            Preset::Conservative => "conservative",
            Preset::Aggressive => "aggressive",
            Preset::Custom => "custom",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "balanced" => Ok(Preset::Balanced),
            "conservative" => Ok(Preset::Conservative),
            "aggressive" => Ok(Preset::Aggressive),
            "custom" => Ok(Preset::Custom),
            other => Err(format!(
                "unknown preset '{other}' (expected balanced, conservative, aggressive)"
            )),
        }
    }
}

/// Every editable field, addressed as `category.field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdField {
    BarelyPlayedMaxPlays,
    BarelyPlayedMaxMinutes,
    TouristsMaxPlays,
    TouristsMaxMinutes,
    CoreFavoritesMinPlays,
    CoreFavoritesMinMinutes,
}

impl ThresholdField {
    pub const ALL: [ThresholdField; 6] = [
        ThresholdField::BarelyPlayedMaxPlays,
        ThresholdField::BarelyPlayedMaxMinutes,
        ThresholdField::TouristsMaxPlays,
        ThresholdField::TouristsMaxMinutes,
        ThresholdField::CoreFavoritesMinPlays,
        ThresholdField::CoreFavoritesMinMinutes,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::BarelyPlayedMaxPlays => "barelyPlayed.maxPlays",
            Self::BarelyPlayedMaxMinutes => "barelyPlayed.maxMinutes",
            Self::TouristsMaxPlays => "tourists.maxPlays",
            Self::TouristsMaxMinutes => "tourists.maxMinutes",
            Self::CoreFavoritesMinPlays => "coreFavorites.minPlays",
            Self::CoreFavoritesMinMinutes => "coreFavorites.minMinutes",
        }
    }

    fn slot(self, config: &mut ThresholdConfig) -> &mut f64 {
        match self {
            Self::BarelyPlayedMaxPlays => &mut config.barely_played.max_plays,
            Self::BarelyPlayedMaxMinutes => &mut config.barely_played.max_minutes,
            Self::TouristsMaxPlays => &mut config.tourists.max_plays,
            Self::TouristsMaxMinutes => &mut config.tourists.max_minutes,
            Self::CoreFavoritesMinPlays => &mut config.core_favorites.min_plays,
            Self::CoreFavoritesMinMinutes => &mut config.core_favorites.min_minutes,
        }
    }

    pub fn get(self, config: &ThresholdConfig) -> f64 {
        match self {
            Self::BarelyPlayedMaxPlays => config.barely_played.max_plays,
            Self::BarelyPlayedMaxMinutes => config.barely_played.max_minutes,
            Self::TouristsMaxPlays => config.tourists.max_plays,
            Self::TouristsMaxMinutes => config.tourists.max_minutes,
            Self::CoreFavoritesMinPlays => config.core_favorites.min_plays,
            Self::CoreFavoritesMinMinutes => config.core_favorites.min_minutes,
        }
    }
}

impl FromStr for ThresholdField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['_', '-'], "");
        Self::ALL
            .into_iter()
            .find(|f| f.key().to_lowercase() == wanted)
            .ok_or_else(|| {
                let keys: Vec<&str> = Self::ALL.iter().map(|f| f.key()).collect();
                format!("unknown threshold '{s}' (expected one of {})", keys.join(", "))
            })
    }
}

/// Result of a single field edit. Invalid input is dropped, not reported as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    Rejected,
}

/// The active preset label plus the values currently in force.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdState {
    pub preset: Preset,
    pub config: ThresholdConfig,
}

impl ThresholdState {
    pub fn from_preset(preset: Preset) -> Self {
        Self {
            preset,
            config: preset.config(),
        }
    }

    /// Replace everything with the preset's values.
    pub fn select_preset(&mut self, preset: Preset) {
        *self = Self::from_preset(preset);
    }

    /// Set one field. Anything that is not a finite, non-negative number is
    /// ignored and the prior value kept. Accepted edits flip the label to custom.
    pub fn edit(&mut self, field: ThresholdField, value: f64) -> EditOutcome {
        if !value.is_finite() || value < 0.0 {
            log::debug!("Ignoring invalid value {value} for {}", field.key());
            return EditOutcome::Rejected;
        }
        *field.slot(&mut self.config) = value;
        self.preset = Preset::Custom;
        EditOutcome::Applied
    }

    /// Like [`edit`](Self::edit) for raw user text.
    pub fn edit_str(&mut self, field: ThresholdField, raw: &str) -> EditOutcome {
        match raw.trim().parse::<f64>() {
            Ok(value) => self.edit(field, value),
            Err(_) => {
                log::debug!("Ignoring non-numeric value '{raw}' for {}", field.key());
                EditOutcome::Rejected
            }
        }
    }
}

/// Partially specified thresholds, as found in hand-edited or older saved state.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdOverrides {
    pub barely_played: PartialLimits,
    pub tourists: PartialLimits,
    pub core_favorites: PartialLimits,
}

/// One category with any field possibly missing. Max and min categories share
/// this shape; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialLimits {
    pub max_plays: Option<f64>,
    pub max_minutes: Option<f64>,
    pub min_plays: Option<f64>,
    pub min_minutes: Option<f64>,
}

impl ThresholdOverrides {
    /// Merge over `base` category by category, field by field. Omitted or
    /// invalid fields keep the base value.
    pub fn merge_over(&self, base: &ThresholdConfig) -> ThresholdConfig {
        ThresholdConfig {
            barely_played: BarelyPlayed {
                max_plays: pick(self.barely_played.max_plays, base.barely_played.max_plays),
                max_minutes: pick(self.barely_played.max_minutes, base.barely_played.max_minutes),
            },
            tourists: Tourists {
                max_plays: pick(self.tourists.max_plays, base.tourists.max_plays),
                max_minutes: pick(self.tourists.max_minutes, base.tourists.max_minutes),
            },
            core_favorites: CoreFavorites {
                min_plays: pick(self.core_favorites.min_plays, base.core_favorites.min_plays),
                min_minutes: pick(self.core_favorites.min_minutes, base.core_favorites.min_minutes),
            },
        }
    }
}

fn pick(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => fallback,
    }
}

/// Stored form of [`ThresholdState`]: tolerant of missing fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoredThresholds {
    pub preset: Option<Preset>,
    pub config: ThresholdOverrides,
}

impl StoredThresholds {
    pub fn resolve(&self) -> ThresholdState {
        let preset = self.preset.unwrap_or_default();
        ThresholdState {
            preset,
            config: self.config.merge_over(&preset.config()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_balanced() {
        let state = ThresholdState::default();
        assert_eq!(state.preset, Preset::Balanced);
        assert_eq!(state.config.barely_played.max_plays, 3.0);
        assert_eq!(state.config.tourists.max_plays, 2.0);
    }

    #[test]
    fn test_edit_isolation_flips_to_custom() {
        let mut state = ThresholdState::from_preset(Preset::Aggressive);
        let before = state.config;

        assert_eq!(state.edit(ThresholdField::CoreFavoritesMinPlays, 12.0), EditOutcome::Applied);
        assert_eq!(state.preset, Preset::Custom);
        assert_eq!(state.config.core_favorites.min_plays, 12.0);
        assert_eq!(state.config.core_favorites.min_minutes, before.core_favorites.min_minutes);
        assert_eq!(state.config.tourists, before.tourists);
        assert_eq!(state.config.barely_played, before.barely_played);
    }

    #[test]
    fn test_rejected_edits_keep_prior_value() {
        let mut state = ThresholdState::default();
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(state.edit(ThresholdField::TouristsMaxPlays, bad), EditOutcome::Rejected);
        }
        assert_eq!(state.edit_str(ThresholdField::TouristsMaxPlays, "lots"), EditOutcome::Rejected);
        assert_eq!(state.edit_str(ThresholdField::TouristsMaxPlays, ""), EditOutcome::Rejected);
        assert_eq!(state.config.tourists.max_plays, 2.0);
        assert_eq!(state.preset, Preset::Balanced);

        assert_eq!(state.edit_str(ThresholdField::TouristsMaxPlays, " 0 "), EditOutcome::Applied);
        assert_eq!(state.config.tourists.max_plays, 0.0);
    }

    #[test]
    fn test_select_preset_is_a_copy() {
        let mut state = ThresholdState::default();
        state.select_preset(Preset::Conservative);
        state.edit(ThresholdField::BarelyPlayedMaxMinutes, 99.0);
        assert_eq!(Preset::Conservative.config().barely_played.max_minutes, 3.0);

        state.select_preset(Preset::Conservative);
        assert_eq!(state.preset, Preset::Conservative);
        assert_eq!(state.config, Preset::Conservative.config());
    }

    #[test]
    fn test_partial_override_merge() {
        let overrides: ThresholdOverrides = serde_json::from_str(
            r#"{"tourists": {"maxMinutes": 7}, "coreFavorites": {"minPlays": -3}}"#,
        )
        .unwrap();
        let merged = overrides.merge_over(&ThresholdConfig::default());
        let base = ThresholdConfig::default();
        assert_eq!(merged.tourists.max_minutes, 7.0);
        assert_eq!(merged.tourists.max_plays, base.tourists.max_plays);
        assert_eq!(merged.core_favorites.min_plays, base.core_favorites.min_plays);
        assert_eq!(merged.barely_played, base.barely_played);
    }

    #[test]
    fn test_stored_round_trip() {
        let mut state = ThresholdState::from_preset(Preset::Aggressive);
        state.edit(ThresholdField::BarelyPlayedMaxPlays, 4.5);
        let json = serde_json::to_string(&state).unwrap();
        let stored: StoredThresholds = serde_json::from_str(&json).unwrap();
        assert_eq!(stored.resolve(), state);
    }

    #[test]
    fn test_field_and_preset_parsing() {
        assert_eq!(
            "coreFavorites.minPlays".parse::<ThresholdField>(),
            Ok(ThresholdField::CoreFavoritesMinPlays)
        );
        assert_eq!(
            "core_favorites.min_plays".parse::<ThresholdField>(),
            Ok(ThresholdField::CoreFavoritesMinPlays)
        );
        assert!("tourists.minPlays".parse::<ThresholdField>().is_err());
        assert_eq!("Aggressive".parse::<Preset>(), Ok(Preset::Aggressive));
        assert!("wild".parse::<Preset>().is_err());
        assert_eq!(
            ThresholdField::TouristsMaxMinutes.get(&ThresholdConfig::default()),
            5.0
        );
    }
}

use std::env;
use std::time::Duration;

use crate::layout::GridLayout;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_IMAGE_COUNT: usize = 4;
pub const DEFAULT_BRIEF_TIMEOUT_S: f64 = 30.0;
pub const DEFAULT_PROBE_TIMEOUT_S: f64 = 12.0;

const BRIEF_TIMEOUT_RANGE_S: (f64, f64) = (5.0, 120.0);
const PROBE_TIMEOUT_RANGE_S: (f64, f64) = (1.0, 60.0);
const IMAGE_COUNT_RANGE: (f64, f64) = (1.0, 16.0);

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Gates real vs placeholder brief acquisition.
    pub api_key: Option<String>,
    pub api_base: String,
    pub text_model: String,
    pub brief_timeout: Duration,
    pub probe_timeout: Duration,
    pub image_count: usize,
    pub layout: GridLayout,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            brief_timeout: Duration::from_secs_f64(DEFAULT_BRIEF_TIMEOUT_S),
            probe_timeout: Duration::from_secs_f64(DEFAULT_PROBE_TIMEOUT_S),
            image_count: DEFAULT_IMAGE_COUNT,
            layout: GridLayout::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            api_key: get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")),
            api_base: get("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            text_model: get("MOODBOARD_TEXT_MODEL").unwrap_or(defaults.text_model),
            brief_timeout: Duration::from_secs_f64(clamped_f64(
                get("MOODBOARD_BRIEF_TIMEOUT").as_deref(),
                DEFAULT_BRIEF_TIMEOUT_S,
                BRIEF_TIMEOUT_RANGE_S.0,
                BRIEF_TIMEOUT_RANGE_S.1,
            )),
            probe_timeout: Duration::from_secs_f64(clamped_f64(
                get("MOODBOARD_PROBE_TIMEOUT").as_deref(),
                DEFAULT_PROBE_TIMEOUT_S,
                PROBE_TIMEOUT_RANGE_S.0,
                PROBE_TIMEOUT_RANGE_S.1,
            )),
            image_count: clamped_f64(
                get("MOODBOARD_IMAGE_COUNT").as_deref(),
                DEFAULT_IMAGE_COUNT as f64,
                IMAGE_COUNT_RANGE.0,
                IMAGE_COUNT_RANGE.1,
            )
            .round() as usize,
            layout: defaults.layout,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self
    }

    /// Seconds, clamped like the environment value.
    pub fn with_brief_timeout_secs(mut self, secs: f64) -> Self {
        let (min, max) = BRIEF_TIMEOUT_RANGE_S;
        let secs = if secs.is_finite() { secs } else { DEFAULT_BRIEF_TIMEOUT_S };
        self.brief_timeout = Duration::from_secs_f64(secs.clamp(min, max));
        self
    }

    pub fn with_probe_timeout_secs(mut self, secs: f64) -> Self {
        let (min, max) = PROBE_TIMEOUT_RANGE_S;
        let secs = if secs.is_finite() { secs } else { DEFAULT_PROBE_TIMEOUT_S };
        self.probe_timeout = Duration::from_secs_f64(secs.clamp(min, max));
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

pub(crate) fn clamped_f64(raw: Option<&str>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}

//! Engine-wide configuration.

use serde::{Deserialize, Serialize};

use crate::acceptance::AcceptanceOptions;
use crate::bbox::BBoxOptions;
use crate::choice::ChoiceOptions;
use crate::expand::ExpandOptions;
use crate::layout::LayoutOptions;
use crate::validation::{TestProfile, ValidatorOptions};

/// Every tunable of the engine in one place. Missing JSON fields take their
/// defaults, so a config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: LayoutOptions,
    pub bbox: BBoxOptions,
    pub expand: ExpandOptions,
    pub choice: ChoiceOptions,
    pub validator: ValidatorOptions,
    pub acceptance: AcceptanceOptions,
    pub profile: TestProfile,
    /// Fail a part whose segmentation report has errors. Default: false.
    pub strict_validation: bool,
    /// Write one PDF per diagram choice next to each accepted question.
    /// Default: false.
    pub emit_choice_regions: bool,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the page margin used by both geometry and choice detection.
    pub fn set_page_margin(&mut self, margin: f64) {
        self.bbox.page_margin = margin;
        self.choice.page_margin = margin;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.bbox.page_margin, 18.0);
        assert_eq!(config.validator.max_pages, 5);
        assert_eq!(config.profile.name, "regular");
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config = EngineConfig::from_json(
            r#"{
                "bbox": {"anchor_padding": 2.5},
                "expand": {"max_expansion": 30},
                "profile": {"name": "custom", "expected_questions": 40, "sequential": true},
                "emit_choice_regions": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.bbox.anchor_padding, 2.5);
        assert_eq!(config.bbox.page_margin, 18.0);
        assert_eq!(config.expand.max_expansion, 30.0);
        assert_eq!(config.expand.safety_margin, 6.0);
        assert_eq!(config.profile.expected_questions, Some(40));
        assert!(config.emit_choice_regions);
    }

    #[test]
    fn margin_applies_to_geometry_and_choices() {
        let mut config = EngineConfig::default();
        config.set_page_margin(10.0);
        assert_eq!(config.bbox.page_margin, 10.0);
        assert_eq!(config.choice.page_margin, 10.0);
    }
}

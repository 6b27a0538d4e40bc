//! Image conversion configuration
//!
//! Conversions are configured per collection, with a `*` group applying to every
//! collection:
//!
//! ```json
//! {
//!   "*":       { "thumbnail": { "fit": "crop", "width": 150, "height": 150 } },
//!   "avatars": { "original": false, "thumbnail": { "width": 64 } }
//! }
//! ```
//!
//! Resolution for a collection merges the collection group over the `*` group field by
//! field, then drops entries without a usable fit mode or without any dimension. An
//! unknown fit mode only drops its own entry; the rest of the configuration still loads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Group key applying to every collection
pub const WILDCARD: &str = "*";

/// How a rendition is fitted into the configured dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fit {
    /// Scale to fit inside the box, keeping aspect ratio (may upscale)
    Contain,
    /// Like `Contain`, but never upscale
    Max,
    /// Fit inside the box and pad the rest with a white background
    Fill,
    /// Like `Fill`, but never upscale the image itself
    FillMax,
    /// Resize to exactly the box, ignoring aspect ratio
    Stretch,
    /// Cover the box and crop the overflow around the center
    Crop,
}

impl FromStr for Fit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contain" => Ok(Fit::Contain),
            "max" => Ok(Fit::Max),
            "fill" => Ok(Fit::Fill),
            "fill-max" | "fill_max" => Ok(Fit::FillMax),
            "stretch" => Ok(Fit::Stretch),
            "crop" => Ok(Fit::Crop),
            _ => Err(anyhow::anyhow!("Invalid fit mode: {}", s)),
        }
    }
}

impl Display for Fit {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            Fit::Contain => "contain",
            Fit::Max => "max",
            Fit::Fill => "fill",
            Fit::FillMax => "fill-max",
            Fit::Stretch => "stretch",
            Fit::Crop => "crop",
        };
        f.write_str(s)
    }
}

/// A possibly incomplete conversion entry as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionRule {
    /// Fit mode as written; parsed when the rule is resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ConversionRule {
    /// Field-by-field merge where `other` wins wherever it sets a value.
    pub fn merged_with(&self, other: &ConversionRule) -> ConversionRule {
        ConversionRule {
            fit: other.fit.clone().or_else(|| self.fit.clone()),
            width: other.width.or(self.width),
            height: other.height.or(self.height),
            format: other.format.clone().or_else(|| self.format.clone()),
        }
    }

    /// Turn the rule into a usable conversion, or `None` when it lacks a valid fit
    /// mode or both dimensions. Zero dimensions count as unset.
    pub fn resolve(&self, name: &str) -> Option<Conversion> {
        let fit = match self.fit.as_deref()?.parse::<Fit>() {
            Ok(fit) => fit,
            Err(e) => {
                tracing::warn!(conversion = name, error = %e, "Conversion dropped");
                return None;
            }
        };
        let width = self.width.filter(|w| *w > 0);
        let height = self.height.filter(|h| *h > 0);
        if width.is_none() && height.is_none() {
            return None;
        }

        Some(Conversion {
            name: name.to_string(),
            fit,
            width,
            height,
            format: self
                .format
                .as_ref()
                .map(|f| f.trim().to_lowercase())
                .filter(|f| !f.is_empty()),
        })
    }
}

/// Conversions configured for one collection (or the `*` group).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConversions {
    /// `Some(false)` disables manipulation of the original image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<bool>,
    #[serde(flatten)]
    pub rules: BTreeMap<String, ConversionRule>,
}

/// A fully resolved conversion ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    pub name: String,
    pub fit: Fit,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

/// All conversion groups keyed by collection name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionsConfig(pub BTreeMap<String, CollectionConversions>);

impl ConversionsConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Single-conversion config for the `*` group; handy for defaults and tests.
    pub fn wildcard(name: &str, rule: ConversionRule) -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(name.to_string(), rule);
        let mut groups = BTreeMap::new();
        groups.insert(
            WILDCARD.to_string(),
            CollectionConversions {
                original: None,
                rules,
            },
        );
        ConversionsConfig(groups)
    }

    pub fn group(&self, collection_name: &str) -> Option<&CollectionConversions> {
        self.0.get(collection_name)
    }

    /// Merged and filtered conversions for a collection, ordered by name.
    pub fn for_collection(&self, collection_name: &str) -> Vec<Conversion> {
        merge_conversions(self.group(WILDCARD), self.group(collection_name))
    }

    /// Whether manipulation of originals is switched off for this collection.
    pub fn original_disabled(&self, collection_name: &str) -> bool {
        let disabled = |group: Option<&CollectionConversions>| {
            group.and_then(|g| g.original) == Some(false)
        };
        disabled(self.group(WILDCARD)) || disabled(self.group(collection_name))
    }
}

/// Merge a collection group over the wildcard group, then drop unusable entries.
///
/// Pure; no storage or queue access.
pub fn merge_conversions(
    wildcard: Option<&CollectionConversions>,
    specific: Option<&CollectionConversions>,
) -> Vec<Conversion> {
    let mut merged: BTreeMap<&str, ConversionRule> = BTreeMap::new();

    for group in [wildcard, specific].into_iter().flatten() {
        for (name, rule) in &group.rules {
            let next = match merged.get(name.as_str()) {
                Some(base) => base.merged_with(rule),
                None => rule.clone(),
            };
            merged.insert(name.as_str(), next);
        }
    }

    merged
        .into_iter()
        .filter_map(|(name, rule)| rule.resolve(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> ConversionsConfig {
        ConversionsConfig::from_json(json).unwrap()
    }

    #[test]
    fn collection_overrides_wildcard_field_by_field() {
        let cfg = config(
            r#"{
                "*": {"thumb": {"fit": "max", "width": 100}},
                "avatars": {"thumb": {"width": 200}}
            }"#,
        );

        let merged = cfg.for_collection("avatars");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "thumb");
        assert_eq!(merged[0].fit, Fit::Max);
        assert_eq!(merged[0].width, Some(200));
        assert_eq!(merged[0].height, None);

        // Other collections only see the wildcard.
        let other = cfg.for_collection("banners");
        assert_eq!(other[0].width, Some(100));
    }

    #[test]
    fn entries_without_fit_or_dimensions_are_dropped() {
        let cfg = config(
            r#"{
                "*": {
                    "no_fit": {"width": 100},
                    "no_dims": {"fit": "crop"},
                    "zero_dims": {"fit": "crop", "width": 0, "height": 0},
                    "ok": {"fit": "crop", "height": 50, "format": " WEBP "}
                }
            }"#,
        );

        let merged = cfg.for_collection("anything");
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "ok");
        assert_eq!(merged[0].format.as_deref(), Some("webp"));
    }

    #[test]
    fn collection_can_complete_an_incomplete_wildcard_entry() {
        let cfg = config(
            r#"{
                "*": {"hero": {"width": 1200}},
                "pages": {"hero": {"fit": "contain"}}
            }"#,
        );

        assert!(cfg.for_collection("posts").is_empty());
        let merged = cfg.for_collection("pages");
        assert_eq!(merged[0].fit, Fit::Contain);
        assert_eq!(merged[0].width, Some(1200));
    }

    #[test]
    fn original_flag_is_not_a_conversion() {
        let cfg = config(
            r#"{
                "*": {"thumb": {"fit": "max", "width": 10}},
                "docs": {"original": false}
            }"#,
        );

        assert!(cfg.original_disabled("docs"));
        assert!(!cfg.original_disabled("avatars"));
        assert_eq!(cfg.for_collection("docs").len(), 1);
    }

    #[test]
    fn wildcard_original_flag_disables_every_collection() {
        let cfg = config(r#"{"*": {"original": false}}"#);
        assert!(cfg.original_disabled("avatars"));
    }

    #[test]
    fn unknown_fit_drops_only_its_entry() {
        let cfg = config(
            r#"{
                "*": {"thumb": {"fit": "max", "width": 100}},
                "banners": {
                    "cover": {"fit": "cover", "width": 300},
                    "thumb": {"fit": "zoom"}
                }
            }"#,
        );

        assert!(cfg.for_collection("banners").is_empty());
        let other = cfg.for_collection("avatars");
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].fit, Fit::Max);
    }

    #[test]
    fn fit_parses_config_spellings() {
        assert_eq!("fill-max".parse::<Fit>().unwrap(), Fit::FillMax);
        assert_eq!("CROP".parse::<Fit>().unwrap(), Fit::Crop);
        assert!("cover".parse::<Fit>().is_err());
        assert_eq!(Fit::FillMax.to_string(), "fill-max");
    }
}

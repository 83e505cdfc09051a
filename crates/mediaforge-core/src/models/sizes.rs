//! Named size specifications for variant fan-out.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Which axis a named size targets; the other axis is derived from the
/// original aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeAxis {
    Height,
    Width,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSpec {
    pub name: String,
    pub axis: SizeAxis,
    pub target: u32,
}

/// The set of named sizes currently in effect. Parsed from config; variant
/// generation is re-runnable against a changed set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSpecSet(Vec<SizeSpec>);

impl SizeSpecSet {
    /// Parse "name=target[,name=target]". Target is a height in pixels;
    /// append `w` to target the width instead. Empty input yields an empty
    /// set (variant generation disabled).
    pub fn parse(input: &str) -> MediaResult<Self> {
        let mut specs = Vec::new();
        for entry in input.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (name, raw_target) = entry.split_once('=').ok_or_else(|| {
                MediaError::InvalidInput(format!("Invalid size entry '{}', expected name=target", entry))
            })?;
            let name = name.trim();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return Err(MediaError::InvalidInput(format!(
                    "Invalid size name '{}'",
                    name
                )));
            }
            let raw_target = raw_target.trim();
            let (axis, digits) = match raw_target.strip_suffix(['w', 'W']) {
                Some(d) => (SizeAxis::Width, d),
                None => (SizeAxis::Height, raw_target.strip_suffix(['h', 'H']).unwrap_or(raw_target)),
            };
            let target: u32 = digits.parse().map_err(|_| {
                MediaError::InvalidInput(format!("Invalid size target '{}'", raw_target))
            })?;
            if target == 0 {
                return Err(MediaError::InvalidInput(format!(
                    "Size target for '{}' must be > 0",
                    name
                )));
            }
            if specs.iter().any(|s: &SizeSpec| s.name == name) {
                return Err(MediaError::InvalidInput(format!(
                    "Duplicate size name '{}'",
                    name
                )));
            }
            specs.push(SizeSpec {
                name: name.to_string(),
                axis,
                target,
            });
        }
        Ok(Self(specs))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&SizeSpec> {
        self.0.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SizeSpec> {
        self.0.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_height_and_width_targets() {
        let set = SizeSpecSet::parse("icon=64,thumb=240,banner=1200w").unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.get("icon"),
            Some(&SizeSpec {
                name: "icon".into(),
                axis: SizeAxis::Height,
                target: 64
            })
        );
        assert_eq!(set.get("banner").unwrap().axis, SizeAxis::Width);
        assert_eq!(set.get("banner").unwrap().target, 1200);
    }

    #[test]
    fn empty_input_is_empty_set() {
        assert!(SizeSpecSet::parse("").unwrap().is_empty());
        assert!(SizeSpecSet::parse(" , ").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(SizeSpecSet::parse("icon").is_err());
        assert!(SizeSpecSet::parse("icon=abc").is_err());
        assert!(SizeSpecSet::parse("icon=0").is_err());
        assert!(SizeSpecSet::parse("ic on=64").is_err());
        assert!(SizeSpecSet::parse("icon=64,icon=128").is_err());
    }

    #[test]
    fn lookup_by_name() {
        let set = SizeSpecSet::parse("icon=64,thumb=240").unwrap();
        assert!(set.contains("thumb"));
        assert!(!set.contains("uhd"));
        assert_eq!(set.names(), vec!["icon", "thumb"]);
    }
}

//! Run configuration: per-object detection, tracking, attribute and write
//! options, grouped into hierarchy levels.
//!
//! All structs deserialize from JSON with missing fields filled from
//! `Default`.

use crate::attribute::AttributeKind;
use crate::error::{ConfigError, Result};
use crate::steiner::SteinerOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How the objects of one category are obtained each time step.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Convective regions of the Steiner classification
    Steiner {
        #[serde(default)]
        steiner: SteinerOptions,
    },
    /// Connected regions at or above a reflectivity threshold (dBZ)
    Threshold { threshold: f64 },
    /// Connected union of member objects detected at lower levels
    Group { members: Vec<String> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOptions {
    #[serde(flatten)]
    pub method: DetectionMethod,
    /// Objects smaller than this (km²) are discarded
    pub min_area: f64,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            method: DetectionMethod::Steiner {
                steiner: SteinerOptions::default(),
            },
            min_area: 10.0,
        }
    }
}

/// Correlation matcher configuration. Margins are in grid cells.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingOptions {
    /// Largest shift searched for the domain-wide flow
    pub global_flow_margin: usize,
    /// Largest deviation of an object's local flow from the global flow
    pub local_flow_margin: usize,
    /// Padding of an object's bounding box for its local flow
    pub search_margin: usize,
    /// Largest distance between predicted and observed centres
    pub max_match_distance: f64,
    /// Cost of leaving an object unmatched in the assignment
    pub dummy_cost: f64,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            global_flow_margin: 10,
            local_flow_margin: 3,
            search_margin: 5,
            max_match_distance: 10.0,
            dummy_cost: 1000.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Simulated seconds between writes
    pub interval: f64,
    pub save_masks: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            interval: 3600.0,
            save_masks: true,
        }
    }
}

/// Options of one object category (e.g. "cell", "mcs").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectOptions {
    pub name: String,
    /// Dataset providing the grid this object is detected on
    pub dataset: Option<String>,
    pub detection: DetectionOptions,
    /// `None` disables matching for this category
    pub tracking: Option<TrackingOptions>,
    pub attributes: Vec<AttributeKind>,
    /// Capacity of every bounded history
    pub deque_length: usize,
    pub write: WriteOptions,
}

impl Default for ObjectOptions {
    fn default() -> Self {
        Self {
            name: "cell".into(),
            dataset: None,
            detection: DetectionOptions::default(),
            tracking: Some(TrackingOptions::default()),
            attributes: AttributeKind::defaults(),
            deque_length: 2,
            write: WriteOptions::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LevelOptions {
    pub objects: Vec<ObjectOptions>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackOptions {
    pub levels: Vec<LevelOptions>,
}

impl TrackOptions {
    /// Validate object names, datasets, group members and attribute sets.
    /// Group members must be detected at a strictly lower level.
    pub fn check(&self, datasets: &[&str]) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for level in &self.levels {
            let lower = seen.clone();
            for obj in &level.objects {
                if !seen.insert(obj.name.as_str()) {
                    return Err(ConfigError::DuplicateObject(obj.name.clone()).into());
                }
                if let Some(dataset) = &obj.dataset {
                    if !datasets.contains(&dataset.as_str()) {
                        return Err(ConfigError::UnknownDataset(dataset.clone()).into());
                    }
                }
                if obj.deque_length == 0 {
                    return Err(ConfigError::InvalidOption {
                        name: format!("{}.deque_length", obj.name),
                        reason: "must be at least 1".into(),
                    }
                    .into());
                }
                match &obj.detection.method {
                    DetectionMethod::Group { members } => {
                        for member in members {
                            if !lower.contains(member.as_str()) {
                                return Err(ConfigError::UnknownMember {
                                    object: obj.name.clone(),
                                    member: member.clone(),
                                }
                                .into());
                            }
                        }
                    }
                    _ if obj.dataset.is_none() => {
                        return Err(ConfigError::InvalidOption {
                            name: format!("{}.dataset", obj.name),
                            reason: "detection from a grid requires a dataset".into(),
                        }
                        .into());
                    }
                    _ => {}
                }
                crate::attribute::check_attributes(&obj.attributes, obj)?;
            }
        }
        Ok(())
    }

    pub fn object_names(&self) -> Vec<&str> {
        self.levels
            .iter()
            .flat_map(|l| l.objects.iter().map(|o| o.name.as_str()))
            .collect()
    }
}

/// Convective cells plus stratiform anvils at level 0, grouped into mesoscale
/// convective systems at level 1.
pub fn default_track_options(dataset: &str) -> TrackOptions {
    let cell = ObjectOptions {
        name: "cell".into(),
        dataset: Some(dataset.into()),
        ..Default::default()
    };
    let anvil = ObjectOptions {
        name: "anvil".into(),
        dataset: Some(dataset.into()),
        detection: DetectionOptions {
            method: DetectionMethod::Threshold { threshold: 15.0 },
            min_area: 50.0,
        },
        tracking: None,
        attributes: vec![AttributeKind::Time, AttributeKind::Id, AttributeKind::Area],
        ..Default::default()
    };
    let mcs = ObjectOptions {
        name: "mcs".into(),
        dataset: Some(dataset.into()),
        detection: DetectionOptions {
            method: DetectionMethod::Group {
                members: vec!["cell".into(), "anvil".into()],
            },
            min_area: 200.0,
        },
        ..Default::default()
    };
    TrackOptions {
        levels: vec![
            LevelOptions {
                objects: vec![cell, anvil],
            },
            LevelOptions { objects: vec![mcs] },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackError;

    #[test]
    fn default_options_pass_checks() {
        let opts = default_track_options("synthetic");
        opts.check(&["synthetic"]).unwrap();
        assert_eq!(opts.object_names(), vec!["cell", "anvil", "mcs"]);
    }

    #[test]
    fn unknown_dataset_is_rejected() {
        let opts = default_track_options("gridrad");
        let err = opts.check(&["synthetic"]).unwrap_err();
        assert!(matches!(err, TrackError::Config(ConfigError::UnknownDataset(_))));
    }

    #[test]
    fn group_member_must_be_on_lower_level() {
        let mut opts = default_track_options("synthetic");
        let mcs = opts.levels.pop().unwrap().objects.remove(0);
        opts.levels[0].objects.push(mcs);
        let err = opts.check(&["synthetic"]).unwrap_err();
        assert!(matches!(err, TrackError::Config(ConfigError::UnknownMember { .. })));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let json = r#"{
            "levels": [{"objects": [{
                "name": "cell",
                "dataset": "synthetic",
                "detection": {"method": "threshold", "threshold": 35.0}
            }]}]
        }"#;
        let opts: TrackOptions = serde_json::from_str(json).unwrap();
        let cell = &opts.levels[0].objects[0];
        assert!(matches!(cell.detection.method, DetectionMethod::Threshold { threshold } if threshold == 35.0));
        assert_eq!(cell.detection.min_area, 10.0);
        assert_eq!(cell.deque_length, 2);
        assert!(cell.tracking.is_some());
    }
}

//! Haar cascade model, loaded from the XML layout OpenCV writes for
//! `opencv-cascade-classifier` (BOOST stages over HAAR features).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// OpenCV subtracts this from every stage threshold when loading.
const STAGE_THRESHOLD_EPS: f64 = 1e-5;

#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("failed to read cascade file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse cascade XML: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
    #[error("malformed cascade: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
}

/// One split in a weak classifier tree. `left`/`right` greater than zero
/// index another node; zero or below index leaf `-left` / `-right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<Node>,
    pub leaves: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub threshold: f64,
    pub classifiers: Vec<WeakClassifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cascade {
    pub window_width: u32,
    pub window_height: u32,
    pub stages: Vec<Stage>,
    pub features: Vec<HaarFeature>,
}

#[derive(Deserialize)]
struct RawStorage {
    cascade: RawCascade,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCascade {
    stage_type: String,
    feature_type: String,
    height: String,
    width: String,
    stages: RawList<RawStage>,
    features: RawList<RawFeature>,
}

// OpenCV serialises sequences as repeated `<_>` children.
#[derive(Deserialize)]
struct RawList<T> {
    #[serde(rename = "_", default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStage {
    stage_threshold: String,
    weak_classifiers: RawList<RawWeakClassifier>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWeakClassifier {
    internal_nodes: String,
    leaf_values: String,
}

#[derive(Deserialize)]
struct RawFeature {
    rects: RawList<String>,
    #[serde(default)]
    tilted: Option<String>,
}

impl Cascade {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CascadeError> {
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml(&xml)
    }

    pub fn from_xml(xml: &str) -> Result<Self, CascadeError> {
        let raw: RawStorage = quick_xml::de::from_str(xml)?;
        Self::from_raw(raw.cascade)
    }

    fn from_raw(raw: RawCascade) -> Result<Self, CascadeError> {
        if raw.stage_type.trim() != "BOOST" {
            return Err(CascadeError::Unsupported(format!(
                "stage type {}",
                raw.stage_type.trim()
            )));
        }
        if raw.feature_type.trim() != "HAAR" {
            return Err(CascadeError::Unsupported(format!(
                "feature type {}",
                raw.feature_type.trim()
            )));
        }

        let window_width: u32 = parse_number(&raw.width, "width")?;
        let window_height: u32 = parse_number(&raw.height, "height")?;
        if window_width < 3 || window_height < 3 {
            return Err(CascadeError::Malformed(format!(
                "window {}x{} is too small",
                window_width, window_height
            )));
        }

        let features = raw
            .features
            .items
            .iter()
            .enumerate()
            .map(|(idx, feature)| parse_feature(idx, feature, window_width, window_height))
            .collect::<Result<Vec<_>, _>>()?;

        let stages = raw
            .stages
            .items
            .iter()
            .enumerate()
            .map(|(idx, stage)| parse_stage(idx, stage, features.len()))
            .collect::<Result<Vec<_>, _>>()?;

        if stages.is_empty() {
            return Err(CascadeError::Malformed("no stages".into()));
        }

        Ok(Cascade {
            window_width,
            window_height,
            stages,
            features,
        })
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, CascadeError> {
    raw.trim()
        .parse()
        .map_err(|_| CascadeError::Malformed(format!("bad {}: {:?}", what, raw.trim())))
}

fn parse_feature(
    idx: usize,
    raw: &RawFeature,
    window_width: u32,
    window_height: u32,
) -> Result<HaarFeature, CascadeError> {
    if let Some(tilted) = &raw.tilted {
        if tilted.trim() != "0" {
            return Err(CascadeError::Unsupported(format!(
                "feature {} is tilted",
                idx
            )));
        }
    }

    if raw.rects.items.is_empty() || raw.rects.items.len() > 3 {
        return Err(CascadeError::Malformed(format!(
            "feature {} has {} rects",
            idx,
            raw.rects.items.len()
        )));
    }

    let mut rects = Vec::with_capacity(raw.rects.items.len());
    for text in &raw.rects.items {
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CascadeError::Malformed(format!(
                "feature {} rect {:?}",
                idx,
                text.trim()
            )));
        }
        let rect = WeightedRect {
            x: parse_number(parts[0], "rect x")?,
            y: parse_number(parts[1], "rect y")?,
            width: parse_number(parts[2], "rect width")?,
            height: parse_number(parts[3], "rect height")?,
            weight: parse_number(parts[4], "rect weight")?,
        };
        if rect.x + rect.width > window_width || rect.y + rect.height > window_height {
            return Err(CascadeError::Malformed(format!(
                "feature {} rect falls outside the window",
                idx
            )));
        }
        rects.push(rect);
    }

    Ok(HaarFeature { rects })
}

fn parse_stage(idx: usize, raw: &RawStage, feature_count: usize) -> Result<Stage, CascadeError> {
    let threshold: f64 = parse_number(&raw.stage_threshold, "stage threshold")?;

    let classifiers = raw
        .weak_classifiers
        .items
        .iter()
        .map(|weak| parse_weak_classifier(idx, weak, feature_count))
        .collect::<Result<Vec<_>, _>>()?;

    if classifiers.is_empty() {
        return Err(CascadeError::Malformed(format!(
            "stage {} has no weak classifiers",
            idx
        )));
    }

    Ok(Stage {
        threshold: threshold - STAGE_THRESHOLD_EPS,
        classifiers,
    })
}

fn parse_weak_classifier(
    stage: usize,
    raw: &RawWeakClassifier,
    feature_count: usize,
) -> Result<WeakClassifier, CascadeError> {
    let values: Vec<&str> = raw.internal_nodes.split_whitespace().collect();
    if values.is_empty() || values.len() % 4 != 0 {
        return Err(CascadeError::Malformed(format!(
            "stage {} internal nodes must come in groups of four",
            stage
        )));
    }

    let leaves = raw
        .leaf_values
        .split_whitespace()
        .map(|v| parse_number::<f64>(v, "leaf value"))
        .collect::<Result<Vec<_>, _>>()?;

    let nodes = values
        .chunks(4)
        .map(|chunk| {
            Ok(Node {
                left: parse_number(chunk[0], "node left")?,
                right: parse_number(chunk[1], "node right")?,
                feature: parse_number(chunk[2], "node feature")?,
                threshold: parse_number(chunk[3], "node threshold")?,
            })
        })
        .collect::<Result<Vec<_>, CascadeError>>()?;

    for (at, node) in nodes.iter().enumerate() {
        if node.feature >= feature_count {
            return Err(CascadeError::Malformed(format!(
                "stage {} references missing feature {}",
                stage, node.feature
            )));
        }
        for link in [node.left, node.right] {
            // child nodes always follow their parent, which also rules out cycles
            let in_range = if link > 0 {
                (link as usize) > at && (link as usize) < nodes.len()
            } else {
                (link.unsigned_abs() as usize) < leaves.len()
            };
            if !in_range {
                return Err(CascadeError::Malformed(format!(
                    "stage {} has a dangling tree link {}",
                    stage, link
                )));
            }
        }
    }

    Ok(WeakClassifier { nodes, leaves })
}

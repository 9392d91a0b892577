//! Wire and view model shared by the renderer, the input controller and the
//! synchronizer.
//!
//! Map entities and characters keep their numeric geometry optional so one
//! bad entry from the server does not poison the whole payload. Accessors
//! such as [`Building::rect`] and [`Character::position`] return `None` for
//! malformed entries and callers skip them.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::geometry::{Rect, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub width: f32,
    pub height: f32,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub buildings: Vec<Building>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub trees: Vec<Tree>,
    #[serde(default, deserialize_with = "lenient_paths")]
    pub paths: Paths,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paths {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub lines: Vec<PathLine>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub points: Vec<PathPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathLine {
    pub x1: Option<f32>,
    pub y1: Option<f32>,
    pub x2: Option<f32>,
    pub y2: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: Option<f32>,
    pub y: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub target_x: Option<f32>,
    pub target_y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_id: Option<u64>,
}

/// Body of a character creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCharacter {
    pub name: String,
    pub role: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub target_x: f32,
    pub target_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub progress: f32,
}

/// Whole-view loading state. `Error` keeps whatever data already arrived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Loading,
    Ready,
    Error(String),
}

impl LoadStatus {
    pub fn label(&self) -> &str {
        match self {
            LoadStatus::Loading => "loading",
            LoadStatus::Ready => "ready",
            LoadStatus::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapCounts {
    pub buildings: usize,
    pub trees: usize,
    pub path_lines: usize,
    pub path_points: usize,
}

impl WorldMap {
    pub fn empty(width: f32, height: f32) -> Self {
        Self {
            id: None,
            width,
            height,
            buildings: Vec::new(),
            trees: Vec::new(),
            paths: Paths::default(),
        }
    }

    /// Map size when both dimensions are finite and positive.
    pub fn dimensions(&self) -> Option<(f32, f32)> {
        let valid = |value: f32| value.is_finite() && value > 0.0;
        (valid(self.width) && valid(self.height)).then_some((self.width, self.height))
    }

    pub fn counts(&self) -> MapCounts {
        MapCounts {
            buildings: self.buildings.len(),
            trees: self.trees.len(),
            path_lines: self.paths.lines.len(),
            path_points: self.paths.points.len(),
        }
    }

    pub fn malformed_entity_count(&self) -> usize {
        self.buildings.iter().filter(|b| b.rect().is_none()).count()
            + self.trees.iter().filter(|t| t.circle().is_none()).count()
            + self.paths.lines.iter().filter(|l| l.segment().is_none()).count()
            + self.paths.points.iter().filter(|p| p.position().is_none()).count()
    }

    pub fn valid_path_points(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.paths.points.iter().filter_map(PathPoint::position)
    }
}

impl Building {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            width: Some(width),
            height: Some(height),
            color: None,
        }
    }

    pub fn rect(&self) -> Option<Rect> {
        let rect = Rect {
            x: finite(self.x)?,
            y: finite(self.y)?,
            width: finite(self.width)?,
            height: finite(self.height)?,
        };
        (rect.width >= 0.0 && rect.height >= 0.0).then_some(rect)
    }
}

impl Tree {
    pub fn new(x: f32, y: f32, size: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            size: Some(size),
            color: None,
        }
    }

    /// Center and radius.
    pub fn circle(&self) -> Option<(Vec2, f32)> {
        let center = Vec2::new(finite(self.x)?, finite(self.y)?);
        let size = finite(self.size)?;
        (size >= 0.0).then_some((center, size))
    }
}

impl PathLine {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: Some(x1),
            y1: Some(y1),
            x2: Some(x2),
            y2: Some(y2),
            color: None,
        }
    }

    pub fn segment(&self) -> Option<(Vec2, Vec2)> {
        Some((
            Vec2::new(finite(self.x1)?, finite(self.y1)?),
            Vec2::new(finite(self.x2)?, finite(self.y2)?),
        ))
    }
}

impl PathPoint {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }

    pub fn position(&self) -> Option<Vec2> {
        Some(Vec2::new(finite(self.x)?, finite(self.y)?))
    }
}

impl Character {
    pub fn position(&self) -> Option<Vec2> {
        Some(Vec2::new(finite(self.x)?, finite(self.y)?))
    }

    /// Movement target; a character without one is standing still.
    pub fn target(&self) -> Option<Vec2> {
        match (finite(self.target_x), finite(self.target_y)) {
            (Some(x), Some(y)) => Some(Vec2::new(x, y)),
            _ => self.position(),
        }
    }

    pub fn has_pending_target(&self) -> bool {
        match (self.position(), self.target()) {
            (Some(position), Some(target)) => position != target,
            _ => false,
        }
    }

    pub fn set_target(&mut self, target: Vec2) {
        self.target_x = Some(target.x);
        self.target_y = Some(target.y);
    }
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// The server stores paths as a JSON blob and answers `[]` when none exist.
fn lenient_paths<'de, D>(deserializer: D) -> Result<Paths, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Object(_) => serde_json::from_value(value).map_err(D::Error::custom),
        _ => Ok(Paths::default()),
    }
}

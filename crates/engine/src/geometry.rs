use crate::model::{Character, PathPoint};

/// Pick tolerance for characters; matches the drawn body radius.
pub const CHARACTER_HIT_RADIUS_PX: f32 = 15.0;
pub const PATH_POINT_HIT_RADIUS_PX: f32 = 6.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn offset(self, dx: f32, dy: f32) -> Vec2 {
        Vec2 {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

pub fn within_radius(center: Vec2, point: Vec2, radius: f32) -> bool {
    center.distance_to(point) <= radius
}

pub fn hit_test_characters(point: Vec2, characters: &[Character], radius: f32) -> Option<&Character> {
    characters
        .iter()
        .find(|character| {
            character
                .position()
                .is_some_and(|position| within_radius(position, point, radius))
        })
}

pub fn hit_test_path_points(point: Vec2, points: &[PathPoint], radius: f32) -> Option<&PathPoint> {
    points.iter().find(|candidate| {
        candidate
            .position()
            .is_some_and(|position| within_radius(position, point, radius))
    })
}

/// Squared distance from `point` to the segment `a..b`.
pub(crate) fn distance_sq_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((point.x - a.x) * abx + (point.y - a.y) * aby) / len_sq).clamp(0.0, 1.0)
    };
    let cx = a.x + abx * t - point.x;
    let cy = a.y + aby * t - point.y;
    cx * cx + cy * cy
}

use crate::geometry::{
    hit_test_characters, hit_test_path_points, Vec2, CHARACTER_HIT_RADIUS_PX,
    PATH_POINT_HIT_RADIUS_PX,
};
use crate::model::{Character, CharacterId, PathPoint};

pub const KEY_MOVE_STEP_PX: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameAction {
    SelectCharacter(CharacterId),
    MoveCharacterTo { id: CharacterId, target: Vec2 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Other,
}

impl Key {
    const fn step(self) -> Option<(f32, f32)> {
        match self {
            Key::ArrowUp => Some((0.0, -KEY_MOVE_STEP_PX)),
            Key::ArrowDown => Some((0.0, KEY_MOVE_STEP_PX)),
            Key::ArrowLeft => Some((-KEY_MOVE_STEP_PX, 0.0)),
            Key::ArrowRight => Some((KEY_MOVE_STEP_PX, 0.0)),
            Key::Other => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyOutcome {
    pub action: Option<GameAction>,
    /// Set exactly when a move was emitted, so the host can swallow the key.
    pub suppress_default: bool,
}

impl KeyOutcome {
    const IGNORED: KeyOutcome = KeyOutcome {
        action: None,
        suppress_default: false,
    };
}

/// Turns raw pointer and key events into game actions. Holds no state; the
/// caller passes the current characters and selection every time.
#[derive(Debug, Clone, Copy)]
pub struct InputController {
    character_radius: f32,
    path_point_radius: f32,
}

impl Default for InputController {
    fn default() -> Self {
        Self {
            character_radius: CHARACTER_HIT_RADIUS_PX,
            path_point_radius: PATH_POINT_HIT_RADIUS_PX,
        }
    }
}

impl InputController {
    pub fn with_radii(character_radius: f32, path_point_radius: f32) -> Self {
        Self {
            character_radius,
            path_point_radius,
        }
    }

    pub fn on_pointer_down(
        &self,
        point: Vec2,
        characters: &[Character],
        path_points: &[PathPoint],
        selected: Option<CharacterId>,
    ) -> Option<GameAction> {
        if let Some(character) = hit_test_characters(point, characters, self.character_radius) {
            return Some(GameAction::SelectCharacter(character.id));
        }

        let id = selected?;
        let path_point = hit_test_path_points(point, path_points, self.path_point_radius)?;
        let target = path_point.position()?;
        Some(GameAction::MoveCharacterTo { id, target })
    }

    pub fn on_key_down(
        &self,
        key: Key,
        characters: &[Character],
        selected: Option<CharacterId>,
    ) -> KeyOutcome {
        let Some((dx, dy)) = key.step() else {
            return KeyOutcome::IGNORED;
        };
        let Some(character) = selected.and_then(|id| characters.iter().find(|c| c.id == id))
        else {
            return KeyOutcome::IGNORED;
        };
        let Some(position) = character.position() else {
            return KeyOutcome::IGNORED;
        };

        KeyOutcome {
            action: Some(GameAction::MoveCharacterTo {
                id: character.id,
                target: position.offset(dx, dy),
            }),
            suppress_default: true,
        }
    }
}

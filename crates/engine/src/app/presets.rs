use crate::model::NewCharacter;

pub const CHARACTER_ROLES: [&str; 3] = ["Worker", "Farmer", "Miner"];
pub const CHARACTER_COLORS: [&str; 6] = [
    "#3498db", "#2ecc71", "#e74c3c", "#f1c40f", "#9b59b6", "#1abc9c",
];

/// Creation request for the `index`-th character spawned from the keyboard.
/// Roles and colors rotate independently so neighbours never look alike.
pub fn preset_for_index(index: usize, map_id: Option<u64>) -> NewCharacter {
    let role = CHARACTER_ROLES[index % CHARACTER_ROLES.len()];
    NewCharacter {
        name: format!("{role} {}", index + 1),
        role: role.to_string(),
        color: CHARACTER_COLORS[index % CHARACTER_COLORS.len()].to_string(),
        map_id,
    }
}

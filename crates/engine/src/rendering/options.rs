use super::Rgba;

/// Every color, size and stroke width the scene renderer uses.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub background: Rgba,
    pub building_fill: Rgba,
    pub building_outline: Rgba,
    pub building_outline_width: f32,
    pub tree_fill: Rgba,
    pub tree_outline: Rgba,
    pub tree_outline_width: f32,
    pub path_line_color: Rgba,
    pub path_line_width: f32,
    pub path_point_color: Rgba,
    pub path_point_radius: f32,
    pub character_radius: f32,
    pub character_fill: Rgba,
    pub character_border: Rgba,
    pub character_border_width: f32,
    pub name_text_size: f32,
    pub role_text_size: f32,
    pub label_color: Rgba,
    pub label_gap: f32,
    pub selection_color: Rgba,
    pub selection_radius: f32,
    pub selection_width: f32,
    pub target_color: Rgba,
    pub target_radius: f32,
    pub target_width: f32,
    pub placeholder_fill: Rgba,
    pub placeholder_text: Rgba,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            background: Rgba::rgb(0xf9, 0xf9, 0xf9),
            building_fill: Rgba::rgb(0x8b, 0x45, 0x13),
            building_outline: Rgba::rgb(0x65, 0x43, 0x21),
            building_outline_width: 2.0,
            tree_fill: Rgba::rgb(0x2e, 0xcc, 0x71),
            tree_outline: Rgba::rgb(0x00, 0x64, 0x00),
            tree_outline_width: 1.0,
            path_line_color: Rgba::rgb(0xff, 0xd7, 0x00),
            path_line_width: 6.0,
            path_point_color: Rgba::rgb(0xff, 0xa5, 0x00),
            path_point_radius: 4.0,
            character_radius: 15.0,
            character_fill: Rgba::rgb(0x34, 0x98, 0xdb),
            character_border: Rgba::rgb(0x29, 0x80, 0xb9),
            character_border_width: 2.0,
            name_text_size: 10.0,
            role_text_size: 8.0,
            label_color: Rgba::rgb(0x2c, 0x3e, 0x50),
            label_gap: 3.0,
            selection_color: Rgba::rgb(0xf1, 0xc4, 0x0f),
            selection_radius: 19.0,
            selection_width: 2.0,
            target_color: Rgba::rgb(0xe7, 0x4c, 0x3c),
            target_radius: 8.0,
            target_width: 1.0,
            placeholder_fill: Rgba::rgb(0x3a, 0x1f, 0x2b),
            placeholder_text: Rgba::rgb(0xff, 0xd6, 0xe0),
        }
    }
}

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub const fn with_alpha(self, alpha: u8) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, alpha])
    }

    pub fn alpha(self) -> u8 {
        self.0[3]
    }

    /// Parses `#rrggbb`, `#rgb` or one of the few CSS names the server and
    /// older clients emit.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex(hex);
        }
        named_color(&trimmed.to_ascii_lowercase())
    }

    pub fn parse_or(raw: Option<&str>, fallback: Rgba) -> Rgba {
        raw.and_then(Rgba::parse).unwrap_or(fallback)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, _] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some(Rgba::rgb(channel(0)?, channel(2)?, channel(4)?))
        }
        3 => {
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 1], 16)
                    .ok()
                    .map(|nibble| nibble * 17)
            };
            Some(Rgba::rgb(channel(0)?, channel(1)?, channel(2)?))
        }
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Rgba> {
    let color = match name {
        "black" => Rgba::BLACK,
        "white" => Rgba::WHITE,
        "red" => Rgba::rgb(255, 0, 0),
        "green" => Rgba::rgb(0, 128, 0),
        "blue" => Rgba::rgb(0, 0, 255),
        "yellow" => Rgba::rgb(255, 255, 0),
        "orange" => Rgba::rgb(255, 165, 0),
        "brown" => Rgba::rgb(165, 42, 42),
        "gray" | "grey" => Rgba::rgb(128, 128, 128),
        _ => return None,
    };
    Some(color)
}

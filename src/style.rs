//! Theme palette.

pub type Rgba = [f64; 4];

/// Stripe color for critical notifications, `#CC0000`.
pub const CRITICAL_COLOR: Rgba = [0.8, 0.0, 0.0, 1.0];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Style {
    /// Popup background.
    pub base: Rgba,
    /// Neutral widget background, used for low urgency.
    pub bg_normal: Rgba,
    /// Selection/accent background, used for normal urgency.
    pub bg_selected: Rgba,
    /// Countdown pie fill.
    pub bg_active: Rgba,
    pub text: Rgba,
    pub border: Rgba,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            base: [1.0, 1.0, 1.0, 1.0],
            bg_normal: [0.929, 0.929, 0.929, 1.0],
            bg_selected: [0.208, 0.518, 0.894, 1.0],
            bg_active: [0.804, 0.804, 0.804, 1.0],
            text: [0.0, 0.0, 0.0, 1.0],
            border: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

pub fn parse_hex_color(value: &str) -> Option<Rgba> {
    let hex = value.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let (r, g, b, a) = match hex.len() {
        6 => (channel(0)?, channel(2)?, channel(4)?, 255),
        8 => (channel(0)?, channel(2)?, channel(4)?, channel(6)?),
        _ => return None,
    };

    Some([
        r as f64 / 255.0,
        g as f64 / 255.0,
        b as f64 / 255.0,
        a as f64 / 255.0,
    ])
}

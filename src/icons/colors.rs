pub const RED: (u8, u8, u8) = (220, 38, 38);
pub const GREEN: (u8, u8, u8) = (22, 163, 74);
pub const ORANGE: (u8, u8, u8) = (234, 88, 12);
pub const GRAY: (u8, u8, u8) = (128, 128, 128);

/// Parses a named color or `#rrggbb`.
pub fn parse(color: &str) -> Option<(u8, u8, u8)> {
    let color = color.trim();
    match color.to_ascii_lowercase().as_str() {
        "red" => return Some(RED),
        "green" => return Some(GREEN),
        "orange" => return Some(ORANGE),
        "gray" | "grey" => return Some(GRAY),
        _ => {}
    }

    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

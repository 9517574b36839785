use crate::icons::colors;

const ICON_SIZE: u32 = 22;
const BACKGROUND: (u8, u8, u8, u8) = (60, 60, 60, 200);
const TEXT_COLOR: (u8, u8, u8) = (255, 255, 255);

const GLYPH_WIDTH: usize = 3;
const GLYPH_HEIGHT: usize = 5;
const GLYPH_GAP: usize = 1;
const MAX_GLYPHS: usize = 4;

/// Renders the tray badge: a neutral rounded square, overlaid with a pill in
/// the badge color carrying the badge text when there is any.
pub struct IconRenderer {
    size: u32,
}

impl IconRenderer {
    pub fn new() -> Self {
        Self { size: ICON_SIZE }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns RGBA pixels, row-major.
    pub fn render(&self, text: &str, color: &str) -> Vec<u8> {
        let width = self.size as usize;
        let height = self.size as usize;
        let mut pixels = vec![0u8; width * height * 4];

        draw_rounded_rect(&mut pixels, width, 0, 0, width, height, 5.0, BACKGROUND);

        let text = badge_text(text);
        if text.is_empty() {
            return pixels;
        }

        let glyphs = text.chars().count();
        let text_width = glyphs * GLYPH_WIDTH + (glyphs - 1) * GLYPH_GAP;
        let scale = if text_width * 2 + 4 <= width { 2 } else { 1 };

        let pill_width = (text_width * scale + 4).min(width);
        let pill_height = (GLYPH_HEIGHT * scale + 4).min(height);
        let pill_x = (width - pill_width) / 2;
        let pill_y = (height - pill_height) / 2;
        let (r, g, b) = colors::parse(color).unwrap_or(colors::RED);

        draw_rounded_rect(
            &mut pixels,
            width,
            pill_x,
            pill_y,
            pill_width,
            pill_height,
            3.0,
            (r, g, b, 255),
        );

        let mut x = pill_x + 2;
        for ch in text.chars() {
            draw_glyph(&mut pixels, width, x, pill_y + 2, ch, scale);
            x += (GLYPH_WIDTH + GLYPH_GAP) * scale;
        }

        pixels
    }
}

impl Default for IconRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Clips badge text to what fits on the icon: large counts become `99+`.
pub fn badge_text(text: &str) -> String {
    if text.chars().count() <= MAX_GLYPHS - 1 {
        return text.to_string();
    }
    if text.chars().all(|c| c.is_ascii_digit()) {
        return "99+".to_string();
    }
    text.chars().take(MAX_GLYPHS - 1).collect()
}

/// Converts RGBA pixels to the ARGB32 layout StatusNotifier hosts expect.
pub fn rgba_to_argb(pixels: &[u8]) -> Vec<u8> {
    pixels
        .chunks_exact(4)
        .flat_map(|p| [p[3], p[0], p[1], p[2]])
        .collect()
}

fn glyph(ch: char) -> Option<[u8; GLYPH_HEIGHT]> {
    // Each row is three bits, most significant on the left.
    let rows = match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        _ => return None,
    };
    Some(rows)
}

fn draw_glyph(pixels: &mut [u8], stride: usize, x: usize, y: usize, ch: char, scale: usize) {
    let Some(rows) = glyph(ch) else {
        return;
    };
    let (r, g, b) = TEXT_COLOR;

    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (0b100 >> col) == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = x + col * scale + dx;
                    let py = y + row * scale + dy;
                    if px >= stride {
                        continue;
                    }
                    let idx = (py * stride + px) * 4;
                    if idx + 3 < pixels.len() {
                        pixels[idx] = r;
                        pixels[idx + 1] = g;
                        pixels[idx + 2] = b;
                        pixels[idx + 3] = 255;
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_rounded_rect(
    pixels: &mut [u8],
    stride: usize,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
    radius: f32,
    color: (u8, u8, u8, u8),
) {
    let (r, g, b, a) = color;
    for y in 0..height {
        for x in 0..width {
            if !inside_rounded_rect(x, y, width, height, radius) {
                continue;
            }
            let idx = ((y0 + y) * stride + x0 + x) * 4;
            if idx + 3 < pixels.len() {
                pixels[idx] = r;
                pixels[idx + 1] = g;
                pixels[idx + 2] = b;
                pixels[idx + 3] = a;
            }
        }
    }
}

fn inside_rounded_rect(x: usize, y: usize, width: usize, height: usize, radius: f32) -> bool {
    let x = x as f32;
    let y = y as f32;
    let width = width as f32;
    let height = height as f32;
    let r = radius.max(0.0);

    if x >= r && x < width - r {
        return true;
    }
    if y >= r && y < height - r {
        return true;
    }

    let cx = if x < r { r } else { width - r };
    let cy = if y < r { r } else { height - r };
    let dx = x - cx;
    let dy = y - cy;
    dx * dx + dy * dy <= r * r
}

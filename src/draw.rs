// Window + software drawing utilities.
// Visual effects provided here:
// 1) A window that shows the latest generated frame, upscaled to fill it.
// 2) Keyboard controls standing in for the prompt panel's sliders and button.
// 3) A tiny 5x7 bitmap font to render the HUD on top of the image.

use image::imageops::{self, FilterType};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::error::AppError;
use crate::types::{Frame, FrameBuffer, GenerationParameters};

/// One user intent read from the keyboard this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    ToggleGeneration,
    Strength(f32),
    Guidance(f32),
    Steps(i32),
    Seed(i64),
}

impl Action {
    /// Apply a slider nudge; `ToggleGeneration` is the caller's business.
    pub fn apply(self, params: &mut GenerationParameters) {
        match self {
            Action::ToggleGeneration => {}
            Action::Strength(d) => params.nudge_strength(d),
            Action::Guidance(d) => params.nudge_guidance(d),
            Action::Steps(d) => params.nudge_steps(d),
            Action::Seed(d) => params.nudge_seed(d),
        }
    }
}

pub struct Drawer {
    window: Window, // the on-screen window you see
}

impl Drawer {
    /// Visual: a new empty (black) window appears with your chosen title.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, AppError> {
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| AppError::WindowInit(e.to_string()))?;
        window.set_target_fps(60);
        Ok(Self { window })
    }

    /// Push the pixels for this frame to the screen.
    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), AppError> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| AppError::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// Returns false when the user closes the window (so we can stop the loop).
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Keys pressed since the last update. Slider keys auto-repeat, Space does not.
    pub fn actions(&self) -> Vec<Action> {
        let mut out = Vec::new();
        if self.window.is_key_pressed(Key::Space, KeyRepeat::No) {
            out.push(Action::ToggleGeneration);
        }
        let bindings = [
            (Key::Up, Action::Strength(0.1)),
            (Key::Down, Action::Strength(-0.1)),
            (Key::Right, Action::Guidance(0.1)),
            (Key::Left, Action::Guidance(-0.1)),
            (Key::PageUp, Action::Steps(1)),
            (Key::PageDown, Action::Steps(-1)),
            (Key::Equal, Action::Seed(1)),
            (Key::Minus, Action::Seed(-1)),
        ];
        for (key, action) in bindings {
            if self.window.is_key_pressed(key, KeyRepeat::Yes) {
                out.push(action);
            }
        }
        out
    }
}

/// Scale `frame` to the screen size (Lanczos, like a canvas resize) and pack it
/// as 0x00RRGGBB into `screen`.
pub fn frame_to_buffer(frame: &Frame, screen: &mut FrameBuffer) {
    let (w, h) = (screen.width as u32, screen.height as u32);
    let scaled;
    let src = if frame.dimensions() == (w, h) {
        frame.as_image()
    } else {
        scaled = imageops::resize(frame.as_image(), w, h, FilterType::Lanczos3);
        &scaled
    };

    screen.pixels.clear();
    screen.pixels.extend(src.pixels().map(|p| {
        let [r, g, b] = p.0;
        ((r as u32) << 16) | ((g as u32) << 8) | b as u32
    }));
}

/// The status line drawn in the top-left corner.
pub fn hud_line(running: bool, params: &GenerationParameters, frames_shown: u64, fps: f32) -> String {
    let state = if running { "RUN" } else { "IDLE" };
    format!(
        "{state} | SEED: {} | FRAME: {frames_shown} | STR: {:.1} CFG: {:.1} STEPS: {} | FPS: {fps:.1}",
        params.seed, params.strength, params.guidance_scale, params.steps
    )
}

/* ---------- Software drawing: pixels + tiny bitmap font ---------- */

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
#[inline]
fn put_pixel(fb: &mut FrameBuffer, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = color;
}

/// Return a 5x7 glyph bitmap for the characters the HUD uses.
/// Each u8 is a row; the low 5 bits are the pixels (bit 4 = leftmost).
fn glyph5x7(ch: char) -> Option<[u8; 7]> {
    macro_rules! g { ($a:expr,$b:expr,$c:expr,$d:expr,$e:expr,$f:expr,$g:expr) => {
        Some([$a,$b,$c,$d,$e,$f,$g])
    }; }

    match ch.to_ascii_uppercase() {
        '0' => g!(0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110),
        '1' => g!(0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110),
        '2' => g!(0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111),
        '3' => g!(0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110),
        '4' => g!(0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010),
        '5' => g!(0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110),
        '6' => g!(0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110),
        '7' => g!(0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000),
        '8' => g!(0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110),
        '9' => g!(0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100),

        'A' => g!(0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001),
        'C' => g!(0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110),
        'D' => g!(0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100),
        'E' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111),
        'F' => g!(0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000),
        'G' => g!(0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111),
        'I' => g!(0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110),
        'L' => g!(0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111),
        'M' => g!(0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001),
        'N' => g!(0b10001,0b11001,0b10101,0b10011,0b10001,0b10001,0b10001),
        'O' => g!(0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),
        'P' => g!(0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000),
        'R' => g!(0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001),
        'S' => g!(0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110),
        'T' => g!(0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        'U' => g!(0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110),

        ' ' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000),
        '|' => g!(0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100),
        ':' => g!(0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000),
        '.' => g!(0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000),

        _ => None,
    }
}

/// Draw a single 5x7 character at (x,y) with a 1-pixel black shadow for contrast.
fn draw_char_5x7(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u32) {
    let Some(rows) = glyph5x7(ch) else { return };
    for (offset, c) in [(1, 0x00000000), (0, color)] {
        for (ry, rowbits) in rows.iter().enumerate() {
            for rx in 0..5 {
                if (rowbits & (1 << (4 - rx))) != 0 {
                    put_pixel(fb, x + rx as i32 + offset, y + ry as i32 + offset, c);
                }
            }
        }
    }
}

/// Draw a text string using 5x7 glyphs, 1 pixel apart.
pub fn draw_text_5x7(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, color);
        x += 6;
    }
}

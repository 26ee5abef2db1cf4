//! Renderer backed by a raylib window.
//!
//! Two layers, one per buffer slot. The active layer is drawn opaque; during a
//! reveal the incoming layer fades in on top of it while a radar sweep and an
//! expanding ring are drawn as an overlay. Textures can only be created on the
//! window thread, so `show` just records the handle and [`RaylibRenderer::upload`]
//! turns it into a texture on the next frame.
//!
//! The layer drawn underneath only ever moves to a layer that has content. If
//! an upload fails, the last good image stays on screen.

use std::time::Duration;

use anyhow::anyhow;
use raylib::prelude::*;
use tracing::{debug, warn};

use crate::buffer::{BufferRole, SlotId};
use crate::constants::*;
use crate::preload::{DecodedImage, ImageHandle};
use crate::renderer::Renderer;

#[derive(Default)]
struct Layer {
    pending: Option<ImageHandle>,
    texture: Option<Texture2D>,
    opacity: f32,
}

impl Layer {
    fn has_content(&self) -> bool {
        self.texture.is_some() || self.pending.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reveal {
    pub incoming: SlotId,
    pub elapsed: f32,
    pub duration: f32,
}

impl Reveal {
    /// 0.0 at start, 1.0 once the duration has elapsed.
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }
}

pub struct RaylibRenderer {
    layers: [Layer; 2],
    /// Layer drawn underneath.
    active: SlotId,
    reveal: Option<Reveal>,
}

impl Default for RaylibRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RaylibRenderer {
    pub fn new() -> Self {
        Self {
            layers: [Layer::default(), Layer::default()],
            active: SlotId::A,
            reveal: None,
        }
    }

    /// Creates textures for content handed over since the last frame.
    pub fn upload(&mut self, rl: &mut RaylibHandle, thread: &RaylibThread) {
        for layer in self.layers.iter_mut() {
            let Some(handle) = layer.pending.take() else {
                continue;
            };
            match load_texture(rl, thread, &handle) {
                Ok(texture) => layer.texture = Some(texture),
                Err(e) => {
                    warn!("texture upload failed: {e}");
                    layer.texture = None;
                }
            }
        }
    }

    pub fn update(&mut self, dt: f32) {
        if let Some(reveal) = self.reveal.as_mut() {
            reveal.elapsed += dt;
            let progress = reveal.progress();
            self.layers[reveal.incoming.index()].opacity = progress;
        }
    }

    pub fn draw(&self, d: &mut RaylibDrawHandle, screen_width: f32, screen_height: f32) {
        d.clear_background(Color::BLACK);

        let active = &self.layers[self.active.index()];
        match &active.texture {
            Some(texture) => draw_fitted(d, texture, 1.0, screen_width, screen_height),
            None if self.reveal.is_none() => draw_placeholder(d, screen_width, screen_height),
            None => {}
        }

        if let Some(reveal) = self.reveal {
            let incoming = &self.layers[reveal.incoming.index()];
            if let Some(texture) = &incoming.texture {
                draw_fitted(d, texture, incoming.opacity, screen_width, screen_height);
            }
            draw_radar(d, reveal.progress(), screen_width, screen_height);
        }
    }

    pub fn reveal(&self) -> Option<Reveal> {
        self.reveal
    }

    pub fn active(&self) -> SlotId {
        self.active
    }
}

impl Renderer<ImageHandle> for RaylibRenderer {
    fn show(&mut self, slot: SlotId, role: BufferRole, handle: &ImageHandle) {
        let layer = &mut self.layers[slot.index()];
        layer.pending = Some(handle.clone());
        layer.opacity = match role {
            BufferRole::Active => 1.0,
            BufferRole::Standby => 0.0,
        };
    }

    fn start_transition_effect(&mut self, incoming: SlotId, duration: Duration) {
        self.reveal = Some(Reveal {
            incoming,
            elapsed: 0.0,
            duration: duration.as_secs_f32(),
        });
    }

    fn end_transition_effect(&mut self) {
        self.reveal = None;
    }

    fn set_active(&mut self, slot: SlotId) {
        if !self.layers[slot.index()].has_content() && self.layers[self.active.index()].has_content() {
            warn!(?slot, "promoted layer has no texture, keeping the previous image");
            return;
        }
        self.layers[slot.index()].opacity = 1.0;
        self.active = slot;
    }

    fn reset_standby(&mut self, slot: SlotId) {
        if slot == self.active {
            debug!(?slot, "layer still on screen, not reset");
            return;
        }
        debug!(?slot, "standby layer reset");
        self.layers[slot.index()] = Layer::default();
    }
}

// --- Upload Verified Pixels Into A Texture ---
fn load_texture(
    rl: &mut RaylibHandle,
    thread: &RaylibThread,
    image: &DecodedImage,
) -> anyhow::Result<Texture2D> {
    let width = i32::try_from(image.width)?;
    let height = i32::try_from(image.height)?;
    let canvas = Image::gen_image_color(width, height, Color::BLANK);
    let mut texture = rl
        .load_texture_from_image(thread, &canvas)
        .map_err(|e| anyhow!("failed to create texture: {e}"))?;
    texture
        .update_texture(&image.pixels)
        .map_err(|e| anyhow!("failed to fill texture: {e}"))?;
    Ok(texture)
}

/// Destination rectangle that fits `tex` inside `FIT_RATIO` of the screen,
/// centered, preserving aspect ratio.
pub fn fit_rect(tex_width: f32, tex_height: f32, screen_width: f32, screen_height: f32) -> Rectangle {
    if tex_width <= 0.0 || tex_height <= 0.0 {
        return Rectangle::new(screen_width * 0.5, screen_height * 0.5, 0.0, 0.0);
    }
    let scale = (screen_width * FIT_RATIO / tex_width).min(screen_height * FIT_RATIO / tex_height);
    let width = tex_width * scale;
    let height = tex_height * scale;
    Rectangle::new(
        (screen_width - width) * 0.5,
        (screen_height - height) * 0.5,
        width,
        height,
    )
}

fn draw_fitted(
    d: &mut RaylibDrawHandle,
    texture: &Texture2D,
    opacity: f32,
    screen_width: f32,
    screen_height: f32,
) {
    let tex_width = texture.width() as f32;
    let tex_height = texture.height() as f32;
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0) as u8;
    d.draw_texture_pro(
        texture,
        Rectangle::new(0.0, 0.0, tex_width, tex_height),
        fit_rect(tex_width, tex_height, screen_width, screen_height),
        Vector2::new(0.0, 0.0),
        0.0,
        Color::new(255, 255, 255, alpha),
    );
}

fn draw_radar(d: &mut RaylibDrawHandle, progress: f32, screen_width: f32, screen_height: f32) {
    let center = Vector2::new(screen_width * 0.5, screen_height * 0.5);
    let max_radius = (screen_width * screen_width + screen_height * screen_height).sqrt() * 0.5;
    let radius = max_radius * progress;
    let fade = ((1.0 - progress) * 160.0) as u8;

    let sweep = progress * SWEEP_TURNS * 360.0;
    d.draw_circle_sector(
        center,
        max_radius,
        sweep - 30.0,
        sweep,
        24,
        Color::new(0, 255, 120, fade / 2),
    );
    d.draw_ring(
        center,
        (radius - 4.0).max(0.0),
        radius,
        0.0,
        360.0,
        96,
        Color::new(0, 255, 120, fade),
    );
}

fn draw_placeholder(d: &mut RaylibDrawHandle, screen_width: f32, screen_height: f32) {
    let x = (screen_width * 0.5) as i32 - 110;
    let y = (screen_height * 0.5) as i32 - 10;
    d.draw_text("Waiting for image...", x, y, 20, Color::GRAY);
}

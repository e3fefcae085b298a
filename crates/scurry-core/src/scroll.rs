use serde::{Deserialize, Serialize};

use crate::config::ScrollConfig;

/// Forward scroll along the level axis. Position only moves forward during
/// play; it is reset at level start and repositioned explicitly on respawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrollState {
    position: f32,
    base_speed: f32,
    offset: f32,
    offset_limit: f32,
}

impl ScrollState {
    pub fn new(cfg: &ScrollConfig) -> Self {
        Self {
            position: 0.0,
            base_speed: cfg.base_speed,
            offset: 0.0,
            offset_limit: cfg.offset_limit,
        }
    }

    /// Base speed modulated by the clamped external offset.
    pub fn effective_speed(&self) -> f32 {
        self.base_speed * (1.0 + self.offset)
    }

    pub fn update(&mut self, dt: f32) {
        self.position += self.effective_speed() * dt;
    }

    /// External speed control (crown/slider), clamped to the symmetric
    /// limit. Non-finite input is treated as zero.
    pub fn set_offset(&mut self, value: f32) {
        let value = if value.is_finite() { value } else { 0.0 };
        self.offset = value.clamp(-self.offset_limit, self.offset_limit);
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn reset_offset(&mut self) {
        self.offset = 0.0;
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    /// Hard reposition, used when a respawn moves the run backward or
    /// forward onto a platform.
    pub fn set_position(&mut self, position: f32) {
        self.position = position;
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.offset = 0.0;
    }
}

/// Soft-follow camera: eases toward `scroll + lead` each tick, closing a
/// fixed fraction of the remaining gap, with a hard `jump_to` for respawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCamera {
    pub x: f32,
    pub y: f32,
    target_x: f32,
    lead: f32,
    easing: f32,
}

impl GameCamera {
    pub fn new(cfg: &ScrollConfig) -> Self {
        Self {
            x: cfg.viewport_width / 2.0,
            y: cfg.viewport_height / 2.0,
            target_x: cfg.viewport_width / 2.0,
            lead: cfg.camera_lead,
            easing: cfg.camera_easing,
        }
    }

    pub fn follow(&mut self, scroll_position: f32) {
        self.target_x = scroll_position + self.lead;
        self.x += (self.target_x - self.x) * self.easing;
    }

    /// Snap to a scroll position, bypassing the easing.
    pub fn jump_to(&mut self, scroll_position: f32) {
        tracing::debug!(scroll_position, "camera hard jump");
        self.x = scroll_position + self.lead;
        self.target_x = self.x;
    }

    pub fn reset(&mut self, cfg: &ScrollConfig) {
        self.x = cfg.viewport_width / 2.0;
        self.y = cfg.viewport_height / 2.0;
        self.target_x = self.x;
    }
}

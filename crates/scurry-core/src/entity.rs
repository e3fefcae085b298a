use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box. Edge touches count as overlap so a player
/// resting exactly on a platform top stays in the contact set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl Aabb {
    pub fn centered(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            left: x - width / 2.0,
            right: x + width / 2.0,
            bottom: y - height / 2.0,
            top: y + height / 2.0,
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.left <= other.right
            && self.right >= other.left
            && self.bottom <= other.top
            && self.top >= other.bottom
    }
}

/// Oscillation axis for moving platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Behavior variant tag. Parameters are baked in at spawn time from the
/// entity config so a pooled instance is self-contained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Platform,
    MovingPlatform { axis: Axis, speed: f32, range: f32 },
    TimedPlatform { on_secs: f32, off_secs: f32, blink_window: f32 },
    Spike,
    PopupSpike { cycle_secs: f32 },
    RailSpike { speed: f32, range: f32 },
    Knife { speed: f32, warning_secs: f32 },
    Quicksand,
    Treasure,
}

/// Broad class an entity recycles under. A recycled instance may be
/// re-parameterized to any variant of its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityClass {
    Platform,
    Spike,
    Quicksand,
    Knife,
    Treasure,
}

impl EntityKind {
    pub fn class(&self) -> EntityClass {
        match self {
            EntityKind::Platform
            | EntityKind::MovingPlatform { .. }
            | EntityKind::TimedPlatform { .. } => EntityClass::Platform,
            EntityKind::Spike | EntityKind::PopupSpike { .. } | EntityKind::RailSpike { .. } => {
                EntityClass::Spike
            },
            EntityKind::Knife { .. } => EntityClass::Knife,
            EntityKind::Quicksand => EntityClass::Quicksand,
            EntityKind::Treasure => EntityClass::Treasure,
        }
    }
}

/// A pooled scene object. Owned by value by either a free list or the
/// active registry, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Spawn origin; oscillators swing around it and `reset` returns here.
    pub origin_x: f32,
    pub origin_y: f32,
    /// Oscillation direction, +1 or -1.
    pub move_dir: f32,
    /// Behavior clock: cycle time for timed/popup variants, age for knives.
    pub behavior_clock: f32,
    /// Presentation hint (alpha on/off, blink).
    pub visible: bool,
    /// Whether the entity participates in contacts this tick. Toggled in
    /// lockstep with the visible phase for timed platforms and popup spikes.
    pub tangible: bool,
    /// One-shot open flag for the goal chest.
    pub opened: bool,
}

impl Entity {
    pub fn new(id: u32, kind: EntityKind, width: f32, height: f32) -> Self {
        Self {
            id,
            kind,
            x: 0.0,
            y: 0.0,
            width,
            height,
            origin_x: 0.0,
            origin_y: 0.0,
            move_dir: 1.0,
            behavior_clock: 0.0,
            visible: true,
            tangible: true,
            opened: false,
        }
    }

    pub fn class(&self) -> EntityClass {
        self.kind.class()
    }

    /// Set position and move origin together. Spawning calls this once per
    /// placement; behaviors then swing around the origin.
    pub fn place(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.origin_x = x;
        self.origin_y = y;
    }

    /// Re-parameterize a recycled instance before placement.
    pub fn reconfigure(&mut self, kind: EntityKind, width: f32, height: f32) {
        self.kind = kind;
        self.width = width;
        self.height = height;
    }

    /// Restore deterministic default state for recycling: back to origin,
    /// clocks zeroed, visibility and tangibility restored.
    pub fn reset(&mut self) {
        self.x = self.origin_x;
        self.y = self.origin_y;
        self.move_dir = 1.0;
        self.behavior_clock = 0.0;
        self.visible = true;
        self.tangible = true;
        self.opened = false;
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::centered(self.x, self.y, self.width, self.height)
    }

    /// Knife warning pulse: purely presentational, the hazard is live from
    /// spawn.
    pub fn warning_active(&self) -> bool {
        match self.kind {
            EntityKind::Knife { warning_secs, .. } => self.behavior_clock < warning_secs,
            _ => false,
        }
    }

    /// Advance this entity's behavior by one tick.
    pub fn step(&mut self, dt: f32) {
        match self.kind {
            EntityKind::MovingPlatform { axis, speed, range } => match axis {
                Axis::Horizontal => self.oscillate_x(speed, range, dt),
                Axis::Vertical => self.oscillate_y(speed, range, dt),
            },
            EntityKind::TimedPlatform {
                on_secs,
                off_secs,
                blink_window,
            } => {
                self.behavior_clock += dt;
                let cycle_time = self.behavior_clock % (on_secs + off_secs);
                let solid = cycle_time < on_secs;
                self.tangible = solid;
                if solid {
                    let time_left = on_secs - cycle_time;
                    // Fast blink warning before vanishing
                    self.visible = time_left >= blink_window || (time_left * 20.0).sin() > 0.0;
                } else {
                    self.visible = false;
                }
            },
            EntityKind::PopupSpike { cycle_secs } => {
                self.behavior_clock += dt;
                let cycle_time = self.behavior_clock % cycle_secs;
                let extended = cycle_time < cycle_secs / 2.0;
                self.tangible = extended;
                self.visible = extended;
            },
            EntityKind::RailSpike { speed, range } => self.oscillate_x(speed, range, dt),
            EntityKind::Knife { speed, .. } => {
                self.behavior_clock += dt;
                self.x -= speed * dt;
            },
            EntityKind::Platform
            | EntityKind::Spike
            | EntityKind::Quicksand
            | EntityKind::Treasure => {},
        }
    }

    fn oscillate_x(&mut self, speed: f32, range: f32, dt: f32) {
        self.x += speed * self.move_dir * dt;
        if self.x > self.origin_x + range {
            self.move_dir = -1.0;
        } else if self.x < self.origin_x - range {
            self.move_dir = 1.0;
        }
    }

    fn oscillate_y(&mut self, speed: f32, range: f32, dt: f32) {
        self.y += speed * self.move_dir * dt;
        if self.y > self.origin_y + range {
            self.move_dir = -1.0;
        } else if self.y < self.origin_y - range {
            self.move_dir = 1.0;
        }
    }
}

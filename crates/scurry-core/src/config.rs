use serde::{Deserialize, Serialize};

/// Player body and integration tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity acceleration (units/s^2, downward).
    pub gravity: f32,
    /// Vertical velocity set by a normal jump (units/s).
    pub jump_velocity: f32,
    /// Vertical velocity set by a high jump (units/s).
    pub high_jump_velocity: f32,
    /// Player collision width.
    pub player_width: f32,
    /// Player collision height when standing.
    pub player_height: f32,
    /// Multiplier applied to the collision height while ducking.
    pub duck_height_factor: f32,
    /// Seconds before a duck auto-reverts to standing.
    pub duck_duration: f32,
    /// Horizontal distance the player rides ahead of the scroll position.
    pub player_start_x: f32,
    /// Default ground height used for the initial drop and respawn fallback.
    pub player_ground_y: f32,
    /// |vy| below which a non-forced jump is honored despite grounded=false.
    pub jump_rest_tolerance: f32,
    /// Max upward vy at contact for a platform touch to count as a landing.
    pub land_velocity_tolerance: f32,
    /// How far below a platform top the player bottom may sit and still land.
    pub land_depth_tolerance: f32,
    /// How far above a platform top the player bottom may sit and still land.
    pub land_snap_tolerance: f32,
    /// Delay before a lost platform contact clears the grounded flag.
    pub unground_delay: f32,
    /// vy must be below this when the unground delay fires for it to apply.
    pub unground_velocity: f32,
    /// Player y below which the fall boundary triggers rescue or life loss.
    pub fall_boundary_y: f32,
    /// Rescue may target platforms starting this far behind the player.
    pub rescue_lookbehind: f32,
    /// Respawn after a knife hit targets platforms past the knife by this much.
    pub respawn_knife_margin: f32,
    /// Vertical clearance above the respawn platform top.
    pub respawn_clearance: f32,
    /// Physics-freeze grace after a life loss (seconds).
    pub respawn_delay: f32,
    /// Physics-freeze grace after a no-cost rescue (seconds).
    pub rescue_delay: f32,
    /// Delay after a run starts before the initial resting-ground check.
    pub start_grace_delay: f32,
    /// |vy| below which the initial ground check marks the player grounded.
    pub start_grace_velocity: f32,
    /// Upper bound on a single integration step (seconds).
    pub max_step_secs: f32,
    /// Nominal delta used for the first tick after a (re)start or resume.
    pub first_step_secs: f32,
    /// Integration substeps per tick; keeps fast falls from tunneling
    /// through thin platforms.
    pub substeps: u32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: -1350.0,
            jump_velocity: 500.0,
            high_jump_velocity: 700.0,
            player_width: 16.0,
            player_height: 16.0,
            duck_height_factor: 0.5,
            duck_duration: 0.8,
            player_start_x: 40.0,
            player_ground_y: 40.0,
            jump_rest_tolerance: 5.0,
            land_velocity_tolerance: 1.0,
            land_depth_tolerance: 8.0,
            land_snap_tolerance: 1.0,
            unground_delay: 0.05,
            unground_velocity: -1.0,
            fall_boundary_y: -10.0,
            rescue_lookbehind: 20.0,
            respawn_knife_margin: 10.0,
            respawn_clearance: 2.0,
            respawn_delay: 1.0,
            rescue_delay: 0.3,
            start_grace_delay: 0.15,
            start_grace_velocity: 2.0,
            max_step_secs: 1.0 / 15.0,
            first_step_secs: 1.0 / 30.0,
            substeps: 4,
        }
    }
}

/// Scroll, camera, and streaming-window tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Base scroll speed (units/s).
    pub base_speed: f32,
    /// Symmetric clamp on the external speed offset (e.g. 0.10 = ±10%).
    pub offset_limit: f32,
    /// How far ahead of the scroll position the camera aims.
    pub camera_lead: f32,
    /// Fraction of the remaining camera gap closed per tick.
    pub camera_easing: f32,
    /// Visible viewport width.
    pub viewport_width: f32,
    /// Visible viewport height.
    pub viewport_height: f32,
    /// Extra margin past the viewport edge before an entity is culled.
    pub cull_margin: f32,
    /// Segments spawn once within camera + viewport_width * this factor.
    pub spawn_lookahead: f32,
    /// The goal spawns once within camera + viewport_width * this factor.
    pub goal_lookahead: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            base_speed: 60.0,
            offset_limit: 0.10,
            camera_lead: 50.0,
            camera_easing: 0.1,
            viewport_width: 184.0,
            viewport_height: 224.0,
            cull_margin: 40.0,
            spawn_lookahead: 1.5,
            goal_lookahead: 1.0,
        }
    }
}

/// Level geometry and run tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Total level length (units); ~60s of travel at the base scroll speed.
    pub length: f32,
    /// Width reserved at the end of generation for the closing flat segment.
    pub closing_margin: f32,
    /// The goal chest sits this far before the end of the level.
    pub goal_margin: f32,
    /// How far past the chest the player must be for the pass check to fire.
    pub goal_pass_margin: f32,
    /// Chest height above the generator's final platform height.
    pub goal_height_offset: f32,
    /// Platform height the height walk starts from.
    pub base_height: f32,
    /// Max |height change| between consecutive segments.
    pub height_delta: f32,
    /// Lower clamp of the height walk.
    pub min_height: f32,
    /// Upper clamp of the height walk.
    pub max_height: f32,
    /// Lives per run.
    pub max_lives: u32,
    /// Difficulty is min(level, this cap).
    pub difficulty_cap: u32,
    /// Soft active-entity target; a generation-density guideline, never
    /// enforced by the pool.
    pub active_node_target: u32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            length: 3600.0,
            closing_margin: 200.0,
            goal_margin: 50.0,
            goal_pass_margin: 20.0,
            goal_height_offset: 20.0,
            base_height: 40.0,
            height_delta: 15.0,
            min_height: 25.0,
            max_height: 120.0,
            max_lives: 3,
            difficulty_cap: 50,
            active_node_target: 25,
        }
    }
}

/// Per-entity sizes and behavior timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Platform collision height.
    pub platform_height: f32,
    /// Moving platform speed (units/s).
    pub moving_speed: f32,
    /// Moving platform oscillation range around its origin.
    pub moving_range: f32,
    /// Speed multiplier for vertically moving platforms.
    pub vertical_speed_factor: f32,
    /// Range multiplier for vertically moving platforms.
    pub vertical_range_factor: f32,
    /// Timed platform solid phase duration (seconds).
    pub timed_on_secs: f32,
    /// Timed platform intangible phase duration (seconds).
    pub timed_off_secs: f32,
    /// Blink warning window at the end of the solid phase.
    pub timed_blink_window: f32,
    /// Spike collision width.
    pub spike_width: f32,
    /// Spike collision height.
    pub spike_height: f32,
    /// Popup spike full cycle duration (half extended, half retracted).
    pub popup_cycle_secs: f32,
    /// Rail spike oscillation speed (units/s).
    pub rail_speed: f32,
    /// Rail spike oscillation range around its origin.
    pub rail_range: f32,
    /// Knife collision extent (square).
    pub knife_size: f32,
    /// Knife travel speed, leftward (units/s).
    pub knife_speed: f32,
    /// Duration of the knife's pulsing warning after spawn.
    pub knife_warning_secs: f32,
    /// Quicksand collision height.
    pub quicksand_height: f32,
    /// Seconds a player may stay in quicksand before losing a life.
    pub quicksand_duration: f32,
    /// Downward drift while the quicksand countdown runs (units/s).
    pub quicksand_sink_rate: f32,
    /// Goal chest collision width.
    pub treasure_width: f32,
    /// Goal chest collision height.
    pub treasure_height: f32,
    /// Delay between the chest opening and the level-complete transition.
    pub treasure_open_delay: f32,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            platform_height: 8.0,
            moving_speed: 30.0,
            moving_range: 40.0,
            vertical_speed_factor: 0.7,
            vertical_range_factor: 0.5,
            timed_on_secs: 2.0,
            timed_off_secs: 1.5,
            timed_blink_window: 0.5,
            spike_width: 12.0,
            spike_height: 14.0,
            popup_cycle_secs: 3.0,
            rail_speed: 25.0,
            rail_range: 30.0,
            knife_size: 14.0,
            knife_speed: 50.0,
            knife_warning_secs: 1.8,
            quicksand_height: 10.0,
            quicksand_duration: 10.0,
            quicksand_sink_rate: 2.0,
            treasure_width: 20.0,
            treasure_height: 16.0,
            treasure_open_delay: 0.35,
        }
    }
}

/// Top-level tuning for the whole game core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScurryConfig {
    pub physics: PhysicsConfig,
    pub scroll: ScrollConfig,
    pub level: LevelConfig,
    pub entities: EntityConfig,
}

impl ScurryConfig {
    /// Parse overrides from a TOML document. Missing fields keep their
    /// defaults; an unparseable document falls back to defaults entirely.
    pub fn from_toml_str(contents: &str) -> Self {
        match toml::from_str::<Self>(contents) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("Failed to parse config TOML: {e}, using defaults");
                Self::default()
            },
        }
    }
}

//! Deterministic game core for Scurry, a side-scrolling obstacle run.
//!
//! The crate holds the whole simulation: phase machine, seeded level
//! generation, entity pooling and streaming, player physics, and the
//! notification stream a front end renders from. It never draws, stores,
//! or talks to a clock; callers feed wall time into [`ScurryGame::advance`]
//! and drain the returned notifications.

pub mod config;
pub mod entity;
pub mod events;
pub mod level_gen;
pub mod physics;
pub mod pool;
pub mod scheduler;
pub mod scroll;
pub mod state_machine;

pub use config::ScurryConfig;
pub use entity::{Entity, EntityClass, EntityKind};
pub use events::GameNotification;
pub use state_machine::GamePhase;

use tracing::{debug, info, warn};

use crate::level_gen::LevelPlan;
use crate::physics::{ContactPhase, PlayerBody, QuicksandClock, QuicksandTick};
use crate::pool::EntityPool;
use crate::scheduler::{TaskKind, TaskQueue};
use crate::scroll::{GameCamera, ScrollState};
use crate::state_machine::PhaseMachine;

/// Drop-in height above the resting ground line, used at run start and as
/// the respawn fallback when no platform is available.
const DROP_IN_OFFSET: f32 = 20.0;

/// Why a respawn is underway. Decides the placement rule and the grace
/// length.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RespawnCause {
    /// A life was already deducted; a knife hit targets the respawn past
    /// the knife's position.
    LifeLoss { knife_x: Option<f32> },
    /// Free boundary rescue onto a specific platform, no life cost.
    Rescue { platform_id: u32 },
}

/// The complete game simulation. Construct it, `configure` a level, call
/// `start_game`, then drive it with `advance` and the input commands.
#[derive(Debug, Clone)]
pub struct ScurryGame {
    config: ScurryConfig,
    phase: PhaseMachine,
    scheduler: TaskQueue,
    pool: EntityPool,
    plan: Option<LevelPlan>,
    scroll: ScrollState,
    camera: GameCamera,
    player: PlayerBody,
    quicksand: QuicksandClock,
    outbox: Vec<GameNotification>,
    level: u32,
    skin: String,
    seed_override: Option<u64>,
    lives: u32,
    /// Simulation clock; advances only while a run is active (Playing or
    /// Respawning), so scheduled tasks never fire across a pause.
    clock: f32,
    last_now: Option<f64>,
    active_run: bool,
    elapsed_play: f32,
    /// Entity ids overlapping the player last tick, ascending.
    touching: Vec<u32>,
    treasure_opened: bool,
    pending_respawn: Option<RespawnCause>,
}

impl ScurryGame {
    pub fn new(config: ScurryConfig) -> Self {
        let player = PlayerBody::new(
            config.physics.player_start_x,
            config.physics.player_ground_y + DROP_IN_OFFSET,
        );
        Self {
            phase: PhaseMachine::new(),
            scheduler: TaskQueue::new(),
            pool: EntityPool::new(),
            plan: None,
            scroll: ScrollState::new(&config.scroll),
            camera: GameCamera::new(&config.scroll),
            player,
            quicksand: QuicksandClock::new(config.entities.quicksand_duration),
            outbox: Vec::new(),
            level: 1,
            skin: String::new(),
            seed_override: None,
            lives: config.level.max_lives,
            clock: 0.0,
            last_now: None,
            active_run: false,
            elapsed_play: 0.0,
            touching: Vec::new(),
            treasure_opened: false,
            pending_respawn: None,
            config,
        }
    }

    // ---- run lifecycle ----

    /// Select the level and skin for the next run. Takes effect on
    /// `start_game`.
    pub fn configure(&mut self, level: u32, skin: impl Into<String>) {
        self.level = level;
        self.skin = skin.into();
        self.seed_override = None;
    }

    /// Like `configure`, but pins the generation seed.
    pub fn configure_seeded(&mut self, level: u32, skin: impl Into<String>, seed: u64) {
        self.level = level;
        self.skin = skin.into();
        self.seed_override = Some(seed);
    }

    /// Start (or restart) a run on the configured level: rebuild the world,
    /// enter Playing, and schedule the initial ground check.
    pub fn start_game(&mut self) {
        self.reset_level();
        self.enter_phase(GamePhase::Playing);
        self.active_run = true;
        self.last_now = None;
        self.scheduler.schedule(
            self.clock + self.config.physics.start_grace_delay,
            TaskKind::ConfirmInitialGround,
        );
        info!(level = self.level, skin = %self.skin, "run started");
    }

    /// Restart the current level from scratch.
    pub fn restart_level(&mut self) {
        self.start_game();
    }

    /// Advance to the next level and start it.
    pub fn next_level(&mut self) {
        self.level = self.level.saturating_add(1);
        self.start_game();
    }

    /// Pause during play, resume while paused. No-op elsewhere.
    pub fn toggle_pause(&mut self) {
        match self.phase.current() {
            GamePhase::Playing => self.enter_phase(GamePhase::Paused),
            GamePhase::Paused => self.resume_game(),
            _ => {},
        }
    }

    /// Resume from pause. The next tick integrates the nominal first step,
    /// so the pause gap never reaches the physics.
    pub fn resume_game(&mut self) {
        if self.phase.current() == GamePhase::Paused {
            self.enter_phase(GamePhase::Playing);
        }
    }

    // ---- input commands ----

    /// Jump; `high` selects the stronger impulse. Only honored during play
    /// while grounded or near vertical rest. Returns whether it fired.
    pub fn jump(&mut self, high: bool) -> bool {
        if self.phase.current() != GamePhase::Playing {
            return false;
        }
        self.player.request_jump(&self.config.physics, high)
    }

    /// Jump regardless of support (double-tap affordance). Still gated on
    /// play.
    pub fn force_jump(&mut self, high: bool) -> bool {
        if self.phase.current() != GamePhase::Playing {
            return false;
        }
        self.player.force_jump(&self.config.physics, high)
    }

    /// Duck. Re-ducking restarts the auto-stand timer.
    pub fn duck(&mut self) {
        if self.phase.current() != GamePhase::Playing {
            return;
        }
        let began = self.player.start_duck();
        self.scheduler.reschedule(
            self.clock + self.config.physics.duck_duration,
            TaskKind::StandUpFromDuck,
        );
        if began {
            self.outbox.push(GameNotification::DuckStarted);
        }
    }

    /// External speed control (crown/slider). Always accepted; applies
    /// while the world scrolls.
    pub fn set_scroll_speed_offset(&mut self, offset: f32) {
        self.scroll.set_offset(offset);
    }

    // ---- simulation ----

    /// Advance the simulation to wall-clock `now` (seconds) and return the
    /// notifications produced since the last call. The first tick after a
    /// start or resume integrates the nominal first step; later ticks are
    /// capped at the hitch limit.
    pub fn advance(&mut self, now: f64) -> Vec<GameNotification> {
        if !now.is_finite() || !self.active_run {
            return std::mem::take(&mut self.outbox);
        }
        let dt = match self.last_now {
            Some(last) if now > last => {
                ((now - last) as f32).min(self.config.physics.max_step_secs)
            },
            Some(_) => 0.0,
            None => self.config.physics.first_step_secs,
        };
        self.last_now = Some(now);
        if dt > 0.0 {
            self.clock += dt;
            match self.phase.current() {
                GamePhase::Playing => self.tick_playing(dt),
                GamePhase::Respawning => self.tick_respawning(dt),
                _ => {},
            }
            self.apply_due_tasks();
        }
        std::mem::take(&mut self.outbox)
    }

    fn tick_playing(&mut self, dt: f32) {
        self.elapsed_play += dt;

        // Scroll the world and drag the player along with it.
        self.scroll.update(dt);
        self.camera.follow(self.scroll.position());
        self.player.x = self.scroll.position() + self.config.physics.player_start_x;

        self.stream_level();

        // Entity behaviors first, then player physics against the updated
        // platform positions.
        for entity in self.pool.active_mut() {
            entity.step(dt);
        }
        physics::step_player(&mut self.player, self.pool.active(), &self.config.physics, dt);

        // Contact transitions against last tick's overlap set.
        let bounds = self.player.bounds(&self.config.physics);
        let current = physics::overlap_set(&bounds, self.pool.active());
        let previous = std::mem::replace(&mut self.touching, current.clone());
        for contact in physics::diff_contacts(&previous, &current) {
            match contact.phase {
                ContactPhase::Begin => self.on_contact_begin(contact.entity_id),
                ContactPhase::End => self.on_contact_end(contact.entity_id),
            }
            if self.phase.current() != GamePhase::Playing {
                // A hazard ended play; the rest of this tick's work is moot.
                return;
            }
        }

        match self.quicksand.tick(dt) {
            QuicksandTick::Running { remaining } => {
                self.player.y -= self.config.entities.quicksand_sink_rate * dt;
                self.outbox.push(GameNotification::QuicksandCountdown {
                    remaining_secs: remaining,
                });
            },
            QuicksandTick::Expired => {
                debug!("quicksand countdown expired");
                self.lose_life(None);
                return;
            },
            QuicksandTick::Idle => {},
        }

        self.pool.cull_offscreen(
            self.camera.x,
            self.camera.y,
            self.config.scroll.viewport_width,
            self.config.scroll.viewport_height,
            self.config.scroll.cull_margin,
        );

        // Passing the chest without touching it still finishes the level.
        let goal_x = level_gen::goal_position(&self.config.level);
        if !self.treasure_opened && self.player.x > goal_x + self.config.level.goal_pass_margin {
            let chest = self
                .pool
                .active()
                .iter()
                .find(|e| e.class() == EntityClass::Treasure)
                .map(|e| e.id);
            match chest {
                Some(id) => self.open_treasure(id),
                None => self.enter_phase(GamePhase::LevelComplete),
            }
            if self.phase.current() != GamePhase::Playing {
                return;
            }
        }

        // Fall boundary: rescue onto the next platform, else lose a life.
        if self.player.y < self.config.physics.fall_boundary_y {
            self.handle_fall_boundary();
        }
    }

    /// During the respawn grace the world keeps breathing: behaviors and
    /// timers run, but scrolling, streaming, contacts, and player physics
    /// stay suspended.
    fn tick_respawning(&mut self, dt: f32) {
        for entity in self.pool.active_mut() {
            entity.step(dt);
        }
    }

    fn stream_level(&mut self) {
        let Some(plan) = self.plan.as_mut() else {
            return;
        };
        plan.spawn_if_needed(
            &mut self.pool,
            self.camera.x,
            &self.config.scroll,
            &self.config.entities,
        );
        plan.spawn_goal_if_needed(
            &mut self.pool,
            self.camera.x,
            &self.config.scroll,
            &self.config.level,
            &self.config.entities,
        );
        let active = self.pool.active_count();
        if active > self.config.level.active_node_target as usize {
            debug!(active, "active entities over the density target");
        }
    }

    fn on_contact_begin(&mut self, id: u32) {
        let (class, entity_x) = match self.pool.get(id) {
            Some(e) => (e.class(), e.x),
            None => return,
        };
        match class {
            // Landing and support are resolved by the physics snap; a
            // platform begin needs no extra handling.
            EntityClass::Platform => {},
            EntityClass::Spike => self.lose_life(None),
            EntityClass::Knife => self.lose_life(Some(entity_x)),
            EntityClass::Quicksand => {
                self.player.in_quicksand = true;
                self.quicksand.start();
                debug!("entered quicksand");
            },
            EntityClass::Treasure => self.open_treasure(id),
        }
    }

    fn on_contact_end(&mut self, id: u32) {
        let class = match self.pool.get(id) {
            Some(e) => e.class(),
            None => return,
        };
        match class {
            EntityClass::Platform => {
                // Debounced unground: re-validated against vy at fire time,
                // so brushing a platform edge never strands the player
                // airborne-flagged.
                self.scheduler.schedule(
                    self.clock + self.config.physics.unground_delay,
                    TaskKind::ClearGrounded,
                );
            },
            EntityClass::Quicksand => {
                self.player.in_quicksand = false;
                self.quicksand.stop();
                debug!("left quicksand");
            },
            _ => {},
        }
    }

    fn open_treasure(&mut self, id: u32) {
        if self.treasure_opened {
            return;
        }
        self.treasure_opened = true;
        if let Some(chest) = self.pool.get_mut(id) {
            chest.opened = true;
        }
        self.scheduler.schedule(
            self.clock + self.config.entities.treasure_open_delay,
            TaskKind::CompleteLevel,
        );
        debug!("goal chest opened");
    }

    fn handle_fall_boundary(&mut self) {
        let target = physics::next_platform_ahead(
            self.pool.active(),
            self.player.x,
            self.config.physics.rescue_lookbehind,
        )
        .map(|e| e.id);
        match target {
            Some(platform_id) => {
                debug!(platform_id, "fall boundary rescue");
                self.pending_respawn = Some(RespawnCause::Rescue { platform_id });
                self.enter_phase(GamePhase::Respawning);
            },
            None => self.lose_life(None),
        }
    }

    /// Deduct a life. Only valid during play, so simultaneous hazard
    /// contacts in one tick cannot double-charge.
    fn lose_life(&mut self, knife_x: Option<f32>) {
        if self.phase.current() != GamePhase::Playing {
            return;
        }
        self.lives = self.lives.saturating_sub(1);
        self.outbox.push(GameNotification::LivesChanged { lives: self.lives });
        debug!(lives = self.lives, "life lost");
        if self.lives == 0 {
            self.enter_phase(GamePhase::GameOver);
        } else {
            self.pending_respawn = Some(RespawnCause::LifeLoss { knife_x });
            self.enter_phase(GamePhase::Respawning);
        }
    }

    /// Run a transition through the machine; side effects fire only when
    /// it is accepted.
    fn enter_phase(&mut self, next: GamePhase) {
        if !self.phase.try_enter(next) {
            return;
        }
        self.outbox.push(GameNotification::PhaseChanged { phase: next });
        match next {
            GamePhase::Playing => {
                self.active_run = true;
                self.last_now = None;
            },
            GamePhase::Paused => self.active_run = false,
            GamePhase::Respawning => self.begin_respawn(),
            GamePhase::LevelComplete => {
                self.active_run = false;
                info!(
                    level = self.level,
                    lives = self.lives,
                    elapsed = self.elapsed_play,
                    "level complete"
                );
                self.outbox.push(GameNotification::LevelComplete {
                    level: self.level,
                    lives_remaining: self.lives,
                    elapsed_secs: self.elapsed_play,
                });
            },
            GamePhase::GameOver => {
                self.active_run = false;
                info!(level = self.level, "game over");
                self.outbox.push(GameNotification::GameOver);
            },
        }
    }

    /// Place the player for the pending respawn and freeze physics for the
    /// grace window.
    fn begin_respawn(&mut self) {
        let cause = self
            .pending_respawn
            .take()
            .unwrap_or(RespawnCause::LifeLoss { knife_x: None });
        let anchor = self.scroll.position() + self.config.physics.player_start_x;

        let target = match cause {
            RespawnCause::Rescue { platform_id } => self.pool.get(platform_id).map(top_center),
            RespawnCause::LifeLoss { knife_x } => knife_x
                .and_then(|kx| {
                    physics::first_platform_after(
                        self.pool.active(),
                        kx,
                        self.config.physics.respawn_knife_margin,
                    )
                })
                .or_else(|| physics::nearest_platform(self.pool.active(), anchor))
                .map(top_center),
        };
        let (x, y) = match target {
            Some((px, top)) => (
                px,
                top + self.config.physics.player_height / 2.0 + self.config.physics.respawn_clearance,
            ),
            None => {
                warn!(anchor, "no platform in range to respawn on; using the ground line");
                (anchor, self.config.physics.player_ground_y + DROP_IN_OFFSET)
            },
        };
        let grace = match cause {
            RespawnCause::LifeLoss { .. } => self.config.physics.respawn_delay,
            RespawnCause::Rescue { .. } => self.config.physics.rescue_delay,
        };

        // Rewind the run so the landing platform sits under the ride line.
        self.scroll.set_position(x - self.config.physics.player_start_x);
        self.scroll.reset_offset();
        self.camera.jump_to(self.scroll.position());
        self.player.x = x;
        self.player.y = y;
        self.player.vy = 0.0;
        self.player.grounded = true;
        self.player.frozen = true;
        self.player.in_quicksand = false;
        self.quicksand.stop();
        self.touching.clear();
        self.scheduler
            .reschedule(self.clock + grace, TaskKind::EndRespawnGrace);
        debug!(x, y, grace, "respawn placement");
    }

    fn apply_due_tasks(&mut self) {
        for task in self.scheduler.poll(self.clock) {
            match task.kind {
                TaskKind::ClearGrounded => {
                    // Only a player actually falling gets ungrounded; a
                    // landing in the meantime leaves the flag alone.
                    if !self.player.frozen && self.player.vy < self.config.physics.unground_velocity
                    {
                        self.player.grounded = false;
                    }
                },
                TaskKind::EndRespawnGrace => {
                    if self.phase.current() == GamePhase::Respawning {
                        self.player.frozen = false;
                        self.player.vy = 0.0;
                        self.enter_phase(GamePhase::Playing);
                    }
                },
                TaskKind::StandUpFromDuck => {
                    if self.player.stand_up() {
                        self.outbox.push(GameNotification::DuckEnded);
                    }
                },
                TaskKind::CompleteLevel => match self.phase.current() {
                    GamePhase::Playing => self.enter_phase(GamePhase::LevelComplete),
                    GamePhase::Respawning => {
                        // The open sequence outlived a death; finish once
                        // play resumes.
                        self.scheduler.schedule(
                            self.clock + self.config.entities.treasure_open_delay,
                            TaskKind::CompleteLevel,
                        );
                    },
                    _ => {},
                },
                TaskKind::ConfirmInitialGround => {
                    if self.phase.current() == GamePhase::Playing
                        && self.player.vy.abs() < self.config.physics.start_grace_velocity
                    {
                        self.player.grounded = true;
                    }
                },
            }
        }
    }

    /// Clear the previous run and build the configured level.
    fn reset_level(&mut self) {
        self.pool.deactivate_all();
        self.scheduler.clear();
        self.quicksand = QuicksandClock::new(self.config.entities.quicksand_duration);
        self.scroll.reset();
        self.camera.reset(&self.config.scroll);
        self.clock = 0.0;
        self.elapsed_play = 0.0;
        self.touching.clear();
        self.pending_respawn = None;
        self.treasure_opened = false;

        let plan = level_gen::generate(
            self.level,
            self.seed_override,
            &self.config.level,
            &self.config.entities,
        );
        debug!(level = self.level, seed = plan.seed, "level ready");
        self.plan = Some(plan);

        self.player = PlayerBody::new(
            self.config.physics.player_start_x,
            self.config.physics.player_ground_y + DROP_IN_OFFSET,
        );
        self.lives = self.config.level.max_lives;
        self.outbox.push(GameNotification::LivesChanged { lives: self.lives });

        // Seed the world ahead of the first tick so the drop-in has ground.
        self.stream_level();
    }

    // ---- accessors ----

    pub fn phase(&self) -> GamePhase {
        self.phase.current()
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn skin(&self) -> &str {
        &self.skin
    }

    /// Run progress in [0, 1] along the level length.
    pub fn progress(&self) -> f32 {
        (self.scroll.position() / self.config.level.length).clamp(0.0, 1.0)
    }

    /// Active-play seconds for the current run; pauses and respawn grace
    /// excluded.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed_play
    }

    pub fn scroll_position(&self) -> f32 {
        self.scroll.position()
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll.offset()
    }

    pub fn player(&self) -> &PlayerBody {
        &self.player
    }

    pub fn camera(&self) -> &GameCamera {
        &self.camera
    }

    pub fn active_entities(&self) -> &[Entity] {
        self.pool.active()
    }

    pub fn config(&self) -> &ScurryConfig {
        &self.config
    }
}

impl Default for ScurryGame {
    fn default() -> Self {
        Self::new(ScurryConfig::default())
    }
}

fn top_center(platform: &Entity) -> (f32, f32) {
    (platform.x, platform.y + platform.height / 2.0)
}

//! Seeded level generation: a fixed opening run, a difficulty-gated random
//! walk of hazard segments, and a closing run that carries the player to the
//! goal chest. The same (level, seed) pair always produces the same plan.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tracing::debug;

use crate::config::{EntityConfig, LevelConfig, ScrollConfig};
use crate::entity::{Axis, EntityKind};
use crate::pool::EntityPool;

/// LCG constants mixing the level number into a per-level seed.
const SEED_MULTIPLIER: u64 = 6364136223846793005;
const SEED_INCREMENT: u64 = 1442695040888963407;

/// Difficulty at which each hazard segment joins the selection deck.
const SPIKE_FIELD_UNLOCK: u32 = 2;
const MOVING_BRIDGE_UNLOCK: u32 = 3;
const KNIFE_ALLEY_UNLOCK: u32 = 4;
const QUICKSAND_PIT_UNLOCK: u32 = 5;
const TIMED_PLATFORMS_UNLOCK: u32 = 10;
const MIXED_HAZARDS_UNLOCK: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    FlatRun,
    StairUp,
    StairDown,
    Gap,
    MovingBridge,
    SpikeField,
    QuicksandPit,
    KnifeAlley,
    TimedPlatforms,
    MixedHazards,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformStyle {
    Solid,
    MovingH,
    MovingV,
    Timed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikeStyle {
    Fixed,
    Popup,
    Rail,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PieceKind {
    Platform { style: PlatformStyle, width: f32 },
    Spike { style: SpikeStyle },
    Quicksand { width: f32 },
    Knife,
}

/// One entity placement within a segment: `dx` is the center offset from the
/// segment start, `y` the world height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPiece {
    pub kind: PieceKind,
    pub dx: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelSegment {
    pub kind: SegmentKind,
    pub width: f32,
    pub pieces: Vec<SegmentPiece>,
}

/// A generated level: the segment sequence plus the streaming cursor that
/// feeds segments into the pool as the camera approaches them.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelPlan {
    pub level: u32,
    pub seed: u64,
    pub segments: Vec<LevelSegment>,
    pub total_width: f32,
    pub final_height: f32,
    next_spawn_x: f32,
    next_segment: usize,
    goal_spawned: bool,
}

/// Seed for a level: the explicit override when given, otherwise an LCG mix
/// of the level number so consecutive levels get unrelated layouts.
fn level_seed(level: u32, seed_override: Option<u64>) -> u64 {
    seed_override.unwrap_or_else(|| {
        u64::from(level)
            .wrapping_mul(SEED_MULTIPLIER)
            .wrapping_add(SEED_INCREMENT)
    })
}

/// Segment deck for a difficulty tier, in a fixed unlock order so the RNG
/// index draw stays reproducible across tiers.
fn unlocked_kinds(difficulty: u32) -> Vec<SegmentKind> {
    let mut deck = vec![
        SegmentKind::FlatRun,
        SegmentKind::StairUp,
        SegmentKind::StairDown,
        SegmentKind::Gap,
    ];
    if difficulty >= SPIKE_FIELD_UNLOCK {
        deck.push(SegmentKind::SpikeField);
    }
    if difficulty >= MOVING_BRIDGE_UNLOCK {
        deck.push(SegmentKind::MovingBridge);
    }
    if difficulty >= KNIFE_ALLEY_UNLOCK {
        deck.push(SegmentKind::KnifeAlley);
    }
    if difficulty >= QUICKSAND_PIT_UNLOCK {
        deck.push(SegmentKind::QuicksandPit);
    }
    if difficulty >= TIMED_PLATFORMS_UNLOCK {
        deck.push(SegmentKind::TimedPlatforms);
    }
    if difficulty >= MIXED_HAZARDS_UNLOCK {
        deck.push(SegmentKind::MixedHazards);
    }
    deck
}

/// Generate the plan for a level. Draw order per segment is fixed: kind
/// index first, then the height delta.
pub fn generate(
    level: u32,
    seed_override: Option<u64>,
    level_cfg: &LevelConfig,
    entities: &EntityConfig,
) -> LevelPlan {
    let seed = level_seed(level, seed_override);
    let mut rng = Pcg32::seed_from_u64(seed);
    let difficulty = level.min(level_cfg.difficulty_cap);
    let deck = unlocked_kinds(difficulty);

    let mut segments = Vec::new();
    let mut height = level_cfg.base_height;
    let mut used = 0.0_f32;

    // Opening flat run so the drop-in always has ground under it.
    let opening = flat_run(height);
    used += opening.width;
    segments.push(opening);

    while used < level_cfg.length - level_cfg.closing_margin {
        let kind = deck[rng.random_range(0..deck.len())];
        let delta = rng.random_range(-level_cfg.height_delta..=level_cfg.height_delta);
        height = (height + delta).clamp(level_cfg.min_height, level_cfg.max_height);
        let segment = build_segment(kind, height, entities);
        used += segment.width;
        segments.push(segment);
    }

    // Closing flat run at the final height carries the player to the chest.
    let closing = flat_run(height);
    used += closing.width;
    segments.push(closing);

    debug!(
        level,
        seed,
        difficulty,
        segments = segments.len(),
        total_width = used,
        "Generated level plan"
    );

    LevelPlan {
        level,
        seed,
        segments,
        total_width: used,
        final_height: height,
        next_spawn_x: 0.0,
        next_segment: 0,
        goal_spawned: false,
    }
}

impl LevelPlan {
    /// Feed segments whose start falls inside the spawn window into the
    /// pool. The cursor only moves forward; a segment spawns exactly once.
    /// Returns how many entities were spawned.
    pub fn spawn_if_needed(
        &mut self,
        pool: &mut EntityPool,
        camera_x: f32,
        scroll_cfg: &ScrollConfig,
        entities: &EntityConfig,
    ) -> usize {
        let window = camera_x + scroll_cfg.viewport_width * scroll_cfg.spawn_lookahead;
        let mut spawned = 0;
        while self.next_segment < self.segments.len() && self.next_spawn_x < window {
            let start = self.next_spawn_x;
            let width = self.segments[self.next_segment].width;
            for piece in &self.segments[self.next_segment].pieces {
                spawn_piece(pool, piece, start, entities);
                spawned += 1;
            }
            self.next_spawn_x += width;
            self.next_segment += 1;
        }
        spawned
    }

    /// Spawn the goal chest once its position enters the goal window.
    /// Returns true on the call that spawns it.
    pub fn spawn_goal_if_needed(
        &mut self,
        pool: &mut EntityPool,
        camera_x: f32,
        scroll_cfg: &ScrollConfig,
        level_cfg: &LevelConfig,
        entities: &EntityConfig,
    ) -> bool {
        if self.goal_spawned {
            return false;
        }
        let goal_x = goal_position(level_cfg);
        let window = camera_x + scroll_cfg.viewport_width * scroll_cfg.goal_lookahead;
        if goal_x >= window {
            return false;
        }
        self.goal_spawned = true;
        let y = self.final_height + level_cfg.goal_height_offset;
        pool.spawn(
            EntityKind::Treasure,
            entities.treasure_width,
            entities.treasure_height,
            goal_x,
            y,
        );
        debug!(goal_x, y, "Spawned goal chest");
        true
    }

    pub fn goal_spawned(&self) -> bool {
        self.goal_spawned
    }

    pub fn next_spawn_x(&self) -> f32 {
        self.next_spawn_x
    }

    pub fn segments_remaining(&self) -> usize {
        self.segments.len() - self.next_segment
    }
}

/// World x of the goal chest.
pub fn goal_position(level_cfg: &LevelConfig) -> f32 {
    level_cfg.length - level_cfg.goal_margin
}

fn spawn_piece(
    pool: &mut EntityPool,
    piece: &SegmentPiece,
    segment_start: f32,
    entities: &EntityConfig,
) {
    let x = segment_start + piece.dx;
    match piece.kind {
        PieceKind::Platform { style, width } => {
            let kind = match style {
                PlatformStyle::Solid => EntityKind::Platform,
                PlatformStyle::MovingH => EntityKind::MovingPlatform {
                    axis: Axis::Horizontal,
                    speed: entities.moving_speed,
                    range: entities.moving_range,
                },
                PlatformStyle::MovingV => EntityKind::MovingPlatform {
                    axis: Axis::Vertical,
                    speed: entities.moving_speed * entities.vertical_speed_factor,
                    range: entities.moving_range * entities.vertical_range_factor,
                },
                PlatformStyle::Timed => EntityKind::TimedPlatform {
                    on_secs: entities.timed_on_secs,
                    off_secs: entities.timed_off_secs,
                    blink_window: entities.timed_blink_window,
                },
            };
            pool.spawn(kind, width, entities.platform_height, x, piece.y);
        },
        PieceKind::Spike { style } => {
            let kind = match style {
                SpikeStyle::Fixed => EntityKind::Spike,
                SpikeStyle::Popup => EntityKind::PopupSpike {
                    cycle_secs: entities.popup_cycle_secs,
                },
                SpikeStyle::Rail => EntityKind::RailSpike {
                    speed: entities.rail_speed,
                    range: entities.rail_range,
                },
            };
            pool.spawn(kind, entities.spike_width, entities.spike_height, x, piece.y);
        },
        PieceKind::Quicksand { width } => {
            pool.spawn(EntityKind::Quicksand, width, entities.quicksand_height, x, piece.y);
        },
        PieceKind::Knife => {
            pool.spawn(
                EntityKind::Knife {
                    speed: entities.knife_speed,
                    warning_secs: entities.knife_warning_secs,
                },
                entities.knife_size,
                entities.knife_size,
                x,
                piece.y,
            );
        },
    }
}

fn platform(style: PlatformStyle, width: f32, dx: f32, y: f32) -> SegmentPiece {
    SegmentPiece {
        kind: PieceKind::Platform { style, width },
        dx,
        y,
    }
}

fn spike(style: SpikeStyle, dx: f32, y: f32) -> SegmentPiece {
    SegmentPiece {
        kind: PieceKind::Spike { style },
        dx,
        y,
    }
}

/// Height at which a spike sits flush on a platform of the given height.
fn atop(platform_y: f32, entities: &EntityConfig) -> f32 {
    platform_y + entities.platform_height / 2.0 + entities.spike_height / 2.0
}

fn flat_run(y: f32) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::FlatRun,
        width: 160.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 48.0, 24.0, y),
            platform(PlatformStyle::Solid, 40.0, 55.0, y),
            platform(PlatformStyle::Solid, 36.0, 130.0, y),
        ],
    }
}

fn stair_up(y: f32) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::StairUp,
        width: 170.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 32.0, 20.0, y),
            platform(PlatformStyle::Solid, 28.0, 60.0, y + 20.0),
            platform(PlatformStyle::Solid, 28.0, 100.0, y + 40.0),
            platform(PlatformStyle::Solid, 36.0, 145.0, y + 55.0),
        ],
    }
}

fn stair_down(y: f32) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::StairDown,
        width: 160.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 32.0, 20.0, y),
            platform(PlatformStyle::Solid, 28.0, 60.0, y - 20.0),
            platform(PlatformStyle::Solid, 28.0, 100.0, y - 35.0),
            platform(PlatformStyle::Solid, 36.0, 140.0, y - 45.0),
        ],
    }
}

fn gap(y: f32) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::Gap,
        width: 130.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 36.0, 18.0, y),
            platform(PlatformStyle::Solid, 36.0, 100.0, y),
        ],
    }
}

fn moving_bridge(y: f32) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::MovingBridge,
        width: 180.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 28.0, 14.0, y),
            platform(PlatformStyle::MovingH, 28.0, 60.0, y),
            platform(PlatformStyle::MovingH, 28.0, 110.0, y + 10.0),
            platform(PlatformStyle::Solid, 28.0, 160.0, y),
        ],
    }
}

fn spike_field(y: f32, entities: &EntityConfig) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::SpikeField,
        width: 160.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 48.0, 24.0, y),
            spike(SpikeStyle::Fixed, 50.0, atop(y, entities)),
            platform(PlatformStyle::Solid, 36.0, 90.0, y),
            platform(PlatformStyle::Solid, 36.0, 140.0, y + 15.0),
        ],
    }
}

fn quicksand_pit(y: f32) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::QuicksandPit,
        width: 170.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 28.0, 14.0, y),
            SegmentPiece {
                kind: PieceKind::Quicksand { width: 40.0 },
                dx: 55.0,
                y: y - 4.0,
            },
            platform(PlatformStyle::Solid, 28.0, 100.0, y),
            platform(PlatformStyle::Solid, 36.0, 145.0, y),
        ],
    }
}

fn knife_alley(y: f32) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::KnifeAlley,
        width: 160.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 32.0, 16.0, y),
            SegmentPiece {
                kind: PieceKind::Knife,
                dx: 60.0,
                y: y + 35.0,
            },
            platform(PlatformStyle::Solid, 36.0, 90.0, y),
            platform(PlatformStyle::Solid, 32.0, 140.0, y + 15.0),
        ],
    }
}

fn timed_platforms(y: f32) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::TimedPlatforms,
        width: 160.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 28.0, 14.0, y),
            platform(PlatformStyle::Timed, 28.0, 55.0, y + 10.0),
            platform(PlatformStyle::Timed, 28.0, 95.0, y),
            platform(PlatformStyle::Solid, 32.0, 140.0, y + 5.0),
        ],
    }
}

fn mixed_hazards(y: f32, entities: &EntityConfig) -> LevelSegment {
    LevelSegment {
        kind: SegmentKind::MixedHazards,
        width: 160.0,
        pieces: vec![
            platform(PlatformStyle::Solid, 28.0, 14.0, y),
            spike(SpikeStyle::Popup, 40.0, atop(y, entities)),
            platform(PlatformStyle::MovingV, 28.0, 70.0, y + 15.0),
            SegmentPiece {
                kind: PieceKind::Knife,
                dx: 100.0,
                y: y + 40.0,
            },
            platform(PlatformStyle::Solid, 32.0, 140.0, y),
        ],
    }
}

fn build_segment(kind: SegmentKind, y: f32, entities: &EntityConfig) -> LevelSegment {
    match kind {
        SegmentKind::FlatRun => flat_run(y),
        SegmentKind::StairUp => stair_up(y),
        SegmentKind::StairDown => stair_down(y),
        SegmentKind::Gap => gap(y),
        SegmentKind::MovingBridge => moving_bridge(y),
        SegmentKind::SpikeField => spike_field(y, entities),
        SegmentKind::QuicksandPit => quicksand_pit(y),
        SegmentKind::KnifeAlley => knife_alley(y),
        SegmentKind::TimedPlatforms => timed_platforms(y),
        SegmentKind::MixedHazards => mixed_hazards(y, entities),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityClass;

    fn configs() -> (LevelConfig, EntityConfig, ScrollConfig) {
        (
            LevelConfig::default(),
            EntityConfig::default(),
            ScrollConfig::default(),
        )
    }

    #[test]
    fn same_level_produces_the_same_plan() {
        let (level_cfg, entities, _) = configs();
        let a = generate(7, None, &level_cfg, &entities);
        let b = generate(7, None, &level_cfg, &entities);
        assert_eq!(a, b, "level generation must be deterministic");
    }

    #[test]
    fn seed_override_pins_the_layout() {
        let (level_cfg, entities, _) = configs();
        let a = generate(3, Some(42), &level_cfg, &entities);
        let b = generate(3, Some(42), &level_cfg, &entities);
        let c = generate(3, Some(43), &level_cfg, &entities);
        assert_eq!(a, b);
        assert_ne!(a.segments, c.segments, "different seeds should diverge");
    }

    #[test]
    fn consecutive_levels_get_different_layouts() {
        let (level_cfg, entities, _) = configs();
        let a = generate(1, None, &level_cfg, &entities);
        let b = generate(2, None, &level_cfg, &entities);
        assert_ne!(a.segments, b.segments);
    }

    #[test]
    fn plan_opens_and_closes_with_flat_runs() {
        let (level_cfg, entities, _) = configs();
        let plan = generate(5, None, &level_cfg, &entities);
        assert_eq!(plan.segments.first().map(|s| s.kind), Some(SegmentKind::FlatRun));
        assert_eq!(plan.segments.last().map(|s| s.kind), Some(SegmentKind::FlatRun));
        // Opening run sits at the base height
        for piece in &plan.segments[0].pieces {
            assert_eq!(piece.y, level_cfg.base_height);
        }
    }

    #[test]
    fn plan_covers_the_level_length() {
        let (level_cfg, entities, _) = configs();
        for level in [1, 2, 10, 50, 120] {
            let plan = generate(level, None, &level_cfg, &entities);
            // The closing run must carry the player past the chest.
            assert!(
                plan.total_width >= goal_position(&level_cfg),
                "level {level} too short: {}",
                plan.total_width
            );
        }
    }

    #[test]
    fn early_levels_never_contain_locked_segments() {
        let (level_cfg, entities, _) = configs();
        let plan = generate(1, None, &level_cfg, &entities);
        for segment in &plan.segments {
            assert!(
                matches!(
                    segment.kind,
                    SegmentKind::FlatRun
                        | SegmentKind::StairUp
                        | SegmentKind::StairDown
                        | SegmentKind::Gap
                ),
                "level 1 must not contain {:?}",
                segment.kind
            );
        }

        let plan = generate(4, None, &level_cfg, &entities);
        for segment in &plan.segments {
            assert!(
                !matches!(
                    segment.kind,
                    SegmentKind::QuicksandPit
                        | SegmentKind::TimedPlatforms
                        | SegmentKind::MixedHazards
                ),
                "level 4 must not contain {:?}",
                segment.kind
            );
        }
    }

    #[test]
    fn high_levels_mix_in_hazard_segments() {
        let (level_cfg, entities, _) = configs();
        let plan = generate(50, None, &level_cfg, &entities);
        let hazardous = plan.segments.iter().any(|s| {
            !matches!(
                s.kind,
                SegmentKind::FlatRun
                    | SegmentKind::StairUp
                    | SegmentKind::StairDown
                    | SegmentKind::Gap
            )
        });
        assert!(hazardous, "a level-50 plan should include hazard segments");
    }

    #[test]
    fn difficulty_caps_at_the_configured_level() {
        let (level_cfg, entities, _) = configs();
        // Same seed, levels past the cap draw from the same deck.
        let a = generate(50, Some(9), &level_cfg, &entities);
        let b = generate(200, Some(9), &level_cfg, &entities);
        assert_eq!(a.segments, b.segments);
    }

    #[test]
    fn spawning_streams_segments_into_the_window() {
        let (level_cfg, entities, scroll_cfg) = configs();
        let mut plan = generate(1, None, &level_cfg, &entities);
        let mut pool = EntityPool::new();

        // Window at camera 0 reaches 184 * 1.5 = 276: the opening run
        // (start 0) and the following segment (start 160) spawn.
        let spawned = plan.spawn_if_needed(&mut pool, 0.0, &scroll_cfg, &entities);
        assert!(spawned > 0);
        assert_eq!(plan.segments_remaining(), plan.segments.len() - 2);

        // Same camera again: the cursor does not re-spawn anything.
        let again = plan.spawn_if_needed(&mut pool, 0.0, &scroll_cfg, &entities);
        assert_eq!(again, 0);

        // The cursor never moves backwards.
        let behind = plan.spawn_if_needed(&mut pool, -500.0, &scroll_cfg, &entities);
        assert_eq!(behind, 0);
    }

    #[test]
    fn spawned_pieces_land_at_segment_offsets() {
        let (level_cfg, entities, scroll_cfg) = configs();
        let mut plan = generate(1, None, &level_cfg, &entities);
        let mut pool = EntityPool::new();
        plan.spawn_if_needed(&mut pool, 0.0, &scroll_cfg, &entities);

        // Opening flat run: first platform centered at dx 24, base height.
        let first = &pool.active()[0];
        assert_eq!(first.x, 24.0);
        assert_eq!(first.y, level_cfg.base_height);
        assert_eq!(first.width, 48.0);
        assert_eq!(first.class(), EntityClass::Platform);
    }

    #[test]
    fn goal_chest_spawns_exactly_once() {
        let (level_cfg, entities, scroll_cfg) = configs();
        let mut plan = generate(1, None, &level_cfg, &entities);
        let mut pool = EntityPool::new();

        // Too far away: nothing happens.
        assert!(!plan.spawn_goal_if_needed(&mut pool, 0.0, &scroll_cfg, &level_cfg, &entities));
        assert!(!plan.goal_spawned());

        // Camera close to the end: spawns once, then never again.
        let near = level_cfg.length - 100.0;
        assert!(plan.spawn_goal_if_needed(&mut pool, near, &scroll_cfg, &level_cfg, &entities));
        assert!(plan.goal_spawned());
        assert!(!plan.spawn_goal_if_needed(&mut pool, near, &scroll_cfg, &level_cfg, &entities));

        let chests: Vec<_> = pool
            .active()
            .iter()
            .filter(|e| e.class() == EntityClass::Treasure)
            .collect();
        assert_eq!(chests.len(), 1);
        assert_eq!(chests[0].x, goal_position(&level_cfg));
        assert_eq!(chests[0].y, plan.final_height + level_cfg.goal_height_offset);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn any_seed_reproduces_its_plan(level in 0u32..200, seed in any::<u64>()) {
                let (level_cfg, entities, _) = configs();
                let a = generate(level, Some(seed), &level_cfg, &entities);
                let b = generate(level, Some(seed), &level_cfg, &entities);
                prop_assert_eq!(a, b);
            }

            #[test]
            fn heights_stay_inside_the_walk_envelope(level in 0u32..200) {
                let (level_cfg, entities, _) = configs();
                let plan = generate(level, None, &level_cfg, &entities);
                // Segment-internal offsets reach at most 55 above and 45
                // below the walked base height.
                let floor = level_cfg.min_height - 45.0 - 5.0;
                let ceiling = level_cfg.max_height + 55.0 + entities.spike_height;
                for segment in &plan.segments {
                    for piece in &segment.pieces {
                        prop_assert!(
                            piece.y >= floor && piece.y <= ceiling,
                            "piece height {} outside envelope in {:?}",
                            piece.y,
                            segment.kind
                        );
                    }
                }
            }

            #[test]
            fn every_plan_covers_its_length(level in 0u32..100, seed in any::<u64>()) {
                let (level_cfg, entities, _) = configs();
                let plan = generate(level, Some(seed), &level_cfg, &entities);
                prop_assert!(plan.total_width >= goal_position(&level_cfg));
                prop_assert!(!plan.segments.is_empty());
            }
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::config::PhysicsConfig;
use crate::entity::{Aabb, Entity, EntityClass};

/// The player's vertical physics body. Horizontal position is kinematic:
/// the game drags it along with the scroll every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBody {
    pub x: f32,
    pub y: f32,
    pub vy: f32,
    pub grounded: bool,
    pub ducking: bool,
    pub in_quicksand: bool,
    /// All physics is suspended while frozen (respawn grace).
    pub frozen: bool,
    /// Last confirmed-landing position.
    pub safe_x: f32,
    pub safe_y: f32,
}

impl PlayerBody {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            vy: 0.0,
            grounded: false,
            ducking: false,
            in_quicksand: false,
            frozen: false,
            safe_x: x,
            safe_y: y,
        }
    }

    /// Collision box. Ducking halves the height around the same center.
    pub fn bounds(&self, cfg: &PhysicsConfig) -> Aabb {
        let height = if self.ducking {
            cfg.player_height * cfg.duck_height_factor
        } else {
            cfg.player_height
        };
        Aabb::centered(self.x, self.y, cfg.player_width, height)
    }

    fn half_height(&self, cfg: &PhysicsConfig) -> f32 {
        let bounds = self.bounds(cfg);
        (bounds.top - bounds.bottom) / 2.0
    }

    pub fn mark_safe(&mut self) {
        self.safe_x = self.x;
        self.safe_y = self.y;
    }

    /// Jump if grounded or near vertical rest. The rest tolerance papers
    /// over the grounded flag flickering while riding a moving platform.
    /// Returns whether the jump fired.
    pub fn request_jump(&mut self, cfg: &PhysicsConfig, high: bool) -> bool {
        if self.frozen {
            return false;
        }
        if self.grounded || self.vy.abs() < cfg.jump_rest_tolerance {
            self.perform_jump(cfg, high);
            true
        } else {
            false
        }
    }

    /// Jump regardless of support. Frozen still blocks it.
    pub fn force_jump(&mut self, cfg: &PhysicsConfig, high: bool) -> bool {
        if self.frozen {
            return false;
        }
        self.perform_jump(cfg, high);
        true
    }

    fn perform_jump(&mut self, cfg: &PhysicsConfig, high: bool) {
        self.vy = if high {
            cfg.high_jump_velocity
        } else {
            cfg.jump_velocity
        };
        self.grounded = false;
    }

    /// Returns true on the standing-to-ducking transition.
    pub fn start_duck(&mut self) -> bool {
        if self.ducking {
            return false;
        }
        self.ducking = true;
        true
    }

    /// Returns true on the ducking-to-standing transition.
    pub fn stand_up(&mut self) -> bool {
        if !self.ducking {
            return false;
        }
        self.ducking = false;
        true
    }
}

/// Advance the player's vertical physics one tick. Integration runs in
/// substeps, resolving platform support after each one, so a fast fall
/// cannot step over a thin platform within a single tick.
pub fn step_player(player: &mut PlayerBody, entities: &[Entity], cfg: &PhysicsConfig, dt: f32) {
    if player.frozen {
        return;
    }
    let substeps = cfg.substeps.max(1);
    let sub_dt = dt / substeps as f32;
    for _ in 0..substeps {
        let prev_y = player.y;
        integrate(player, cfg, sub_dt);
        settle_on_platforms(player, prev_y, entities, cfg);
    }
}

fn integrate(player: &mut PlayerBody, cfg: &PhysicsConfig, dt: f32) {
    if player.in_quicksand && player.vy <= 0.0 {
        // Quicksand carries the player; sinking comes from its countdown,
        // not from gravity.
        player.vy = 0.0;
        return;
    }
    player.vy += cfg.gravity * dt;
    player.y += player.vy * dt;
}

/// Snap a descending player onto the first tangible platform whose top the
/// player's bottom crossed this substep. A fresh landing sets the grounded
/// flag and records the safe position; repeated support just re-snaps.
/// Returns whether the player is supported after the call.
pub fn settle_on_platforms(
    player: &mut PlayerBody,
    prev_y: f32,
    entities: &[Entity],
    cfg: &PhysicsConfig,
) -> bool {
    if player.vy > cfg.land_velocity_tolerance {
        return false;
    }
    let half_height = player.half_height(cfg);
    let half_width = cfg.player_width / 2.0;
    let prev_bottom = prev_y - half_height;
    let bottom = player.y - half_height;

    for entity in entities {
        if entity.class() != EntityClass::Platform || !entity.tangible {
            continue;
        }
        let platform = entity.bounds();
        if player.x + half_width < platform.left || player.x - half_width > platform.right {
            continue;
        }
        // Came from at most slightly below the top, ended at or under it.
        let from_above = prev_bottom >= platform.top - cfg.land_depth_tolerance;
        let reached = bottom <= platform.top + cfg.land_snap_tolerance;
        if from_above && reached {
            player.y = platform.top + half_height;
            player.vy = 0.0;
            if !player.grounded {
                player.grounded = true;
                player.mark_safe();
            }
            return true;
        }
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Begin,
    End,
}

/// A contact transition between the player and one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub entity_id: u32,
    pub phase: ContactPhase,
}

/// Ids of tangible entities overlapping the player, ascending.
pub fn overlap_set(player_bounds: &Aabb, entities: &[Entity]) -> Vec<u32> {
    let mut ids: Vec<u32> = entities
        .iter()
        .filter(|e| e.tangible && e.bounds().overlaps(player_bounds))
        .map(|e| e.id)
        .collect();
    ids.sort_unstable();
    ids
}

/// Diff two overlap sets into transitions: begins first, then ends, each
/// group ordered by entity id.
pub fn diff_contacts(previous: &[u32], current: &[u32]) -> Vec<Contact> {
    let mut contacts = Vec::new();
    for &id in current {
        if !previous.contains(&id) {
            contacts.push(Contact {
                entity_id: id,
                phase: ContactPhase::Begin,
            });
        }
    }
    for &id in previous {
        if !current.contains(&id) {
            contacts.push(Contact {
                entity_id: id,
                phase: ContactPhase::End,
            });
        }
    }
    contacts
}

/// Countdown that runs while the player stands in quicksand. Stepping out
/// resets it in full; letting it expire costs a life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuicksandClock {
    active: bool,
    remaining: f32,
    duration: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuicksandTick {
    Idle,
    Running { remaining: f32 },
    Expired,
}

impl QuicksandClock {
    pub fn new(duration: f32) -> Self {
        Self {
            active: false,
            remaining: duration,
            duration,
        }
    }

    /// Begin the countdown. Starting while already active keeps the current
    /// remaining time.
    pub fn start(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.remaining = self.duration;
    }

    /// Stop and restore the full countdown.
    pub fn stop(&mut self) {
        self.active = false;
        self.remaining = self.duration;
    }

    pub fn tick(&mut self, dt: f32) -> QuicksandTick {
        if !self.active {
            return QuicksandTick::Idle;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.stop();
            QuicksandTick::Expired
        } else {
            QuicksandTick::Running {
                remaining: self.remaining,
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }
}

fn platforms(entities: &[Entity]) -> impl Iterator<Item = &Entity> {
    // Respawn targeting considers every platform the level laid out,
    // whatever a timed platform's phase happens to be.
    entities.iter().filter(|e| e.class() == EntityClass::Platform)
}

/// Leftmost platform ahead of (or slightly behind) a position. Used by the
/// fall-boundary rescue.
pub fn next_platform_ahead(entities: &[Entity], from_x: f32, lookbehind: f32) -> Option<&Entity> {
    platforms(entities)
        .filter(|e| e.x > from_x - lookbehind)
        .min_by(|a, b| a.x.total_cmp(&b.x))
}

/// Leftmost platform strictly past a position plus margin. Used to respawn
/// beyond the knife that caused a death.
pub fn first_platform_after(entities: &[Entity], x: f32, margin: f32) -> Option<&Entity> {
    platforms(entities)
        .filter(|e| e.x > x + margin)
        .min_by(|a, b| a.x.total_cmp(&b.x))
}

/// Platform closest to a position by |dx|.
pub fn nearest_platform(entities: &[Entity], target_x: f32) -> Option<&Entity> {
    platforms(entities).min_by(|a, b| {
        (a.x - target_x).abs().total_cmp(&(b.x - target_x).abs())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;

    const DT: f32 = 1.0 / 30.0;

    fn cfg() -> PhysicsConfig {
        PhysicsConfig::default()
    }

    fn platform_at(id: u32, x: f32, y: f32, width: f32) -> Entity {
        let mut e = Entity::new(id, EntityKind::Platform, width, 8.0);
        e.place(x, y);
        e
    }

    fn run_until_grounded(player: &mut PlayerBody, entities: &[Entity], max_secs: f32) -> bool {
        let steps = (max_secs / DT).ceil() as usize;
        for _ in 0..steps {
            step_player(player, entities, &cfg(), DT);
            if player.grounded {
                return true;
            }
        }
        false
    }

    #[test]
    fn gravity_pulls_the_player_down() {
        let mut player = PlayerBody::new(40.0, 100.0);
        step_player(&mut player, &[], &cfg(), DT);
        assert!(player.vy < 0.0);
        assert!(player.y < 100.0);
    }

    #[test]
    fn player_lands_on_a_platform_from_above() {
        let platform = platform_at(1, 40.0, 40.0, 48.0);
        let mut player = PlayerBody::new(40.0, 80.0);
        assert!(run_until_grounded(&mut player, &[platform.clone()], 3.0));
        // Snapped flush: player bottom on the platform top.
        assert_eq!(player.y, platform.bounds().top + 8.0);
        assert_eq!(player.vy, 0.0);
        assert_eq!(player.safe_x, 40.0, "landing should record a safe spot");
    }

    #[test]
    fn fast_fall_does_not_tunnel_through_a_thin_platform() {
        let platform = platform_at(1, 40.0, 40.0, 48.0);
        let mut player = PlayerBody::new(40.0, 600.0);
        assert!(
            run_until_grounded(&mut player, &[platform.clone()], 5.0),
            "a long fall must still catch the platform"
        );
        assert_eq!(player.y, platform.bounds().top + 8.0);
    }

    #[test]
    fn ascending_player_passes_through_platforms() {
        let platform = platform_at(1, 40.0, 80.0, 48.0);
        let mut player = PlayerBody::new(40.0, 48.0);
        player.vy = 500.0;
        player.grounded = false;
        // Rise through the platform band without landing
        for _ in 0..6 {
            step_player(&mut player, &[platform.clone()], &cfg(), DT);
            assert!(!player.grounded, "must not land while moving up");
        }
        assert!(player.y > platform.bounds().top);
    }

    #[test]
    fn player_misses_a_platform_it_is_not_over() {
        let platform = platform_at(1, 200.0, 40.0, 48.0);
        let mut player = PlayerBody::new(40.0, 80.0);
        assert!(!run_until_grounded(&mut player, &[platform], 1.0));
    }

    #[test]
    fn intangible_platforms_give_no_support() {
        let mut platform = platform_at(1, 40.0, 40.0, 48.0);
        platform.tangible = false;
        let mut player = PlayerBody::new(40.0, 80.0);
        assert!(!run_until_grounded(&mut player, &[platform], 1.0));
    }

    #[test]
    fn support_loss_resumes_the_fall() {
        let platform = platform_at(1, 40.0, 40.0, 48.0);
        let mut player = PlayerBody::new(40.0, 80.0);
        run_until_grounded(&mut player, &[platform], 3.0);

        // Platform gone: gravity takes over again.
        let resting_y = player.y;
        step_player(&mut player, &[], &cfg(), DT);
        assert!(player.y < resting_y);
    }

    #[test]
    fn frozen_player_ignores_physics_and_jumps() {
        let mut player = PlayerBody::new(40.0, 100.0);
        player.frozen = true;
        step_player(&mut player, &[], &cfg(), DT);
        assert_eq!(player.y, 100.0);
        assert_eq!(player.vy, 0.0);
        assert!(!player.request_jump(&cfg(), false));
        assert!(!player.force_jump(&cfg(), true));
    }

    #[test]
    fn grounded_jump_sets_upward_velocity() {
        let mut player = PlayerBody::new(40.0, 48.0);
        player.grounded = true;
        assert!(player.request_jump(&cfg(), false));
        assert_eq!(player.vy, 500.0);
        assert!(!player.grounded);
    }

    #[test]
    fn high_jump_is_stronger() {
        let mut player = PlayerBody::new(40.0, 48.0);
        player.grounded = true;
        assert!(player.request_jump(&cfg(), true));
        assert_eq!(player.vy, 700.0);
    }

    #[test]
    fn midair_jump_is_rejected_but_force_jump_fires() {
        let mut player = PlayerBody::new(40.0, 100.0);
        player.grounded = false;
        player.vy = -200.0;
        assert!(!player.request_jump(&cfg(), false));
        assert!(player.force_jump(&cfg(), false));
        assert_eq!(player.vy, 500.0);
    }

    #[test]
    fn near_rest_jump_is_honored_despite_grounded_flicker() {
        let mut player = PlayerBody::new(40.0, 48.0);
        player.grounded = false;
        player.vy = -3.0; // within the rest tolerance
        assert!(player.request_jump(&cfg(), false));
    }

    #[test]
    fn ducking_halves_the_collision_height() {
        let mut player = PlayerBody::new(40.0, 48.0);
        let standing = player.bounds(&cfg());
        assert!(player.start_duck());
        assert!(!player.start_duck(), "repeat duck is not a transition");
        let ducked = player.bounds(&cfg());
        assert_eq!(ducked.top - ducked.bottom, (standing.top - standing.bottom) / 2.0);
        assert!(player.stand_up());
        assert!(!player.stand_up());
    }

    #[test]
    fn ducked_player_reseats_on_its_platform() {
        let platform = platform_at(1, 40.0, 40.0, 48.0);
        let mut player = PlayerBody::new(40.0, 80.0);
        run_until_grounded(&mut player, &[platform.clone()], 3.0);
        // Halving the box lifts the feet briefly; gravity re-seats the
        // shorter box flush on the top within a couple of ticks.
        player.start_duck();
        for _ in 0..3 {
            step_player(&mut player, &[platform.clone()], &cfg(), DT);
        }
        assert_eq!(player.y, platform.bounds().top + 4.0);
        assert!(player.grounded, "the dip must not read as leaving the platform");
    }

    #[test]
    fn quicksand_suspends_the_fall_but_not_a_jump() {
        let mut player = PlayerBody::new(40.0, 36.0);
        player.in_quicksand = true;
        player.vy = 0.0;
        step_player(&mut player, &[], &cfg(), DT);
        assert_eq!(player.y, 36.0, "quicksand holds a non-rising player");
        assert_eq!(player.vy, 0.0);

        assert!(player.force_jump(&cfg(), false));
        step_player(&mut player, &[], &cfg(), DT);
        assert!(player.y > 36.0, "a jump still escapes upward");
    }

    #[test]
    fn overlap_set_reports_tangible_overlaps_sorted() {
        let near = platform_at(3, 40.0, 40.0, 48.0);
        let mut hidden = platform_at(1, 40.0, 40.0, 48.0);
        hidden.tangible = false;
        let far = platform_at(2, 400.0, 40.0, 48.0);
        let entities = vec![near, hidden, far];

        let player = PlayerBody::new(40.0, 48.0);
        let ids = overlap_set(&player.bounds(&cfg()), &entities);
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn diff_contacts_orders_begins_before_ends() {
        let contacts = diff_contacts(&[1, 4, 7], &[2, 4, 9]);
        assert_eq!(
            contacts,
            vec![
                Contact { entity_id: 2, phase: ContactPhase::Begin },
                Contact { entity_id: 9, phase: ContactPhase::Begin },
                Contact { entity_id: 1, phase: ContactPhase::End },
                Contact { entity_id: 7, phase: ContactPhase::End },
            ]
        );
    }

    #[test]
    fn diff_contacts_is_empty_for_identical_sets() {
        assert!(diff_contacts(&[1, 2], &[1, 2]).is_empty());
        assert!(diff_contacts(&[], &[]).is_empty());
    }

    #[test]
    fn quicksand_clock_expires_exactly_once() {
        let mut clock = QuicksandClock::new(10.0);
        clock.start();
        let mut expired = 0;
        for _ in 0..400 {
            if clock.tick(DT) == QuicksandTick::Expired {
                expired += 1;
            }
        }
        assert_eq!(expired, 1, "expiry must fire once, then deactivate");
        assert!(!clock.is_active());
    }

    #[test]
    fn leaving_quicksand_restores_the_full_countdown() {
        let mut clock = QuicksandClock::new(10.0);
        clock.start();
        for _ in 0..60 {
            clock.tick(DT);
        }
        assert!(clock.remaining() < 10.0);
        clock.stop();
        assert_eq!(clock.remaining(), 10.0);

        clock.start();
        match clock.tick(DT) {
            QuicksandTick::Running { remaining } => assert!(remaining > 9.0),
            other => panic!("expected a running countdown, got {other:?}"),
        }
    }

    #[test]
    fn restarting_an_active_countdown_keeps_the_remaining_time() {
        let mut clock = QuicksandClock::new(10.0);
        clock.start();
        for _ in 0..90 {
            clock.tick(DT);
        }
        let before = clock.remaining();
        clock.start();
        assert_eq!(clock.remaining(), before);
    }

    #[test]
    fn rescue_targets_the_leftmost_platform_ahead() {
        let entities = vec![
            platform_at(1, 10.0, 40.0, 48.0),
            platform_at(2, 120.0, 40.0, 48.0),
            platform_at(3, 90.0, 60.0, 36.0),
        ];
        let target = next_platform_ahead(&entities, 100.0, 20.0);
        assert_eq!(target.map(|e| e.id), Some(3), "x=90 is within the lookbehind");

        let none_ahead = next_platform_ahead(&entities, 300.0, 20.0);
        assert!(none_ahead.is_none());
    }

    #[test]
    fn knife_respawn_skips_platforms_behind_the_knife() {
        let entities = vec![
            platform_at(1, 50.0, 40.0, 48.0),
            platform_at(2, 105.0, 40.0, 48.0),
            platform_at(3, 160.0, 40.0, 48.0),
        ];
        let target = first_platform_after(&entities, 100.0, 10.0);
        assert_eq!(target.map(|e| e.id), Some(3), "x=105 is inside the exclusion margin");
    }

    #[test]
    fn nearest_platform_measures_absolute_distance() {
        let entities = vec![
            platform_at(1, 10.0, 40.0, 48.0),
            platform_at(2, 95.0, 40.0, 48.0),
            platform_at(3, 300.0, 40.0, 48.0),
        ];
        let target = nearest_platform(&entities, 100.0);
        assert_eq!(target.map(|e| e.id), Some(2));
        assert!(nearest_platform(&[], 100.0).is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// No drop height tunnels through a platform under the player.
            #[test]
            fn any_drop_height_lands(start_y in 60.0f32..600.0) {
                let platform = platform_at(1, 40.0, 40.0, 48.0);
                let mut player = PlayerBody::new(40.0, start_y);
                prop_assert!(run_until_grounded(&mut player, &[platform.clone()], 8.0));
                prop_assert!((player.y - (platform.bounds().top + 8.0)).abs() < 1e-3);
                prop_assert_eq!(player.vy, 0.0);
            }

            /// Larger ticks (frame hitches) may not cause tunneling either.
            #[test]
            fn hitched_ticks_still_land(start_y in 60.0f32..600.0) {
                let platform = platform_at(1, 40.0, 40.0, 48.0);
                let mut player = PlayerBody::new(40.0, start_y);
                let dt = 1.0 / 15.0;
                let mut grounded = false;
                for _ in 0..150 {
                    step_player(&mut player, &[platform.clone()], &cfg(), dt);
                    if player.grounded {
                        grounded = true;
                        break;
                    }
                }
                prop_assert!(grounded);
            }

            /// Contact diffing partitions cleanly: every current id is either
            /// carried over or reported as a begin.
            #[test]
            fn contact_diff_partitions(
                prev in prop::collection::btree_set(0u32..40, 0..12),
                cur in prop::collection::btree_set(0u32..40, 0..12),
            ) {
                let prev: Vec<u32> = prev.into_iter().collect();
                let cur: Vec<u32> = cur.into_iter().collect();
                let contacts = diff_contacts(&prev, &cur);
                let begins: Vec<u32> = contacts
                    .iter()
                    .filter(|c| c.phase == ContactPhase::Begin)
                    .map(|c| c.entity_id)
                    .collect();
                let ends: Vec<u32> = contacts
                    .iter()
                    .filter(|c| c.phase == ContactPhase::End)
                    .map(|c| c.entity_id)
                    .collect();
                for id in &begins {
                    prop_assert!(cur.contains(id) && !prev.contains(id));
                }
                for id in &ends {
                    prop_assert!(prev.contains(id) && !cur.contains(id));
                }
                prop_assert_eq!(
                    begins.len() + ends.len(),
                    cur.iter().filter(|id| !prev.contains(id)).count()
                        + prev.iter().filter(|id| !cur.contains(id)).count()
                );
            }
        }
    }
}

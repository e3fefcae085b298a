use serde::{Deserialize, Serialize};

/// Run-level game phase. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Playing,
    Paused,
    Respawning,
    LevelComplete,
    GameOver,
}

/// Phase holder with an explicit transition table. Anything outside the
/// table is rejected with no state change, which keeps duplicate or racing
/// trigger events (two hazard contacts in one tick, say) from double-firing
/// side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseMachine {
    current: GamePhase,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            current: GamePhase::Playing,
        }
    }

    pub fn current(&self) -> GamePhase {
        self.current
    }

    /// Attempt a transition. Returns whether it was accepted; callers fire
    /// side effects only on `true`.
    pub fn try_enter(&mut self, next: GamePhase) -> bool {
        use GamePhase::*;
        let valid = matches!(
            (self.current, next),
            (Playing, Paused)
                | (Playing, Respawning)
                | (Playing, LevelComplete)
                | (Playing, GameOver)
                | (Paused, Playing)
                | (Respawning, Playing)
                | (Respawning, GameOver)
                | (LevelComplete, Playing)
                | (GameOver, Playing)
        );
        if valid {
            tracing::debug!(from = ?self.current, to = ?next, "phase transition");
            self.current = next;
        }
        valid
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use GamePhase::*;

    const ALL: [GamePhase; 5] = [Playing, Paused, Respawning, LevelComplete, GameOver];

    fn allowed(from: GamePhase, to: GamePhase) -> bool {
        matches!(
            (from, to),
            (Playing, Paused)
                | (Playing, Respawning)
                | (Playing, LevelComplete)
                | (Playing, GameOver)
                | (Paused, Playing)
                | (Respawning, Playing)
                | (Respawning, GameOver)
                | (LevelComplete, Playing)
                | (GameOver, Playing)
        )
    }

    fn machine_in(phase: GamePhase) -> PhaseMachine {
        PhaseMachine { current: phase }
    }

    #[test]
    fn starts_playing() {
        assert_eq!(PhaseMachine::new().current(), Playing);
    }

    #[test]
    fn accepts_every_table_entry() {
        for from in ALL {
            for to in ALL {
                if allowed(from, to) {
                    let mut m = machine_in(from);
                    assert!(m.try_enter(to), "{from:?} -> {to:?} should be accepted");
                    assert_eq!(m.current(), to);
                }
            }
        }
    }

    #[test]
    fn rejects_everything_outside_the_table() {
        for from in ALL {
            for to in ALL {
                if !allowed(from, to) {
                    let mut m = machine_in(from);
                    assert!(!m.try_enter(to), "{from:?} -> {to:?} should be rejected");
                    assert_eq!(m.current(), from, "rejected transition must not move");
                }
            }
        }
    }

    #[test]
    fn self_transitions_are_rejected() {
        for phase in ALL {
            let mut m = machine_in(phase);
            assert!(!m.try_enter(phase), "{phase:?} -> itself should be rejected");
        }
    }

    #[test]
    fn terminal_states_only_exit_to_playing() {
        for terminal in [LevelComplete, GameOver] {
            for to in ALL {
                let mut m = machine_in(terminal);
                let accepted = m.try_enter(to);
                assert_eq!(
                    accepted,
                    to == Playing,
                    "{terminal:?} should only accept Playing, tried {to:?}"
                );
            }
        }
    }

    #[test]
    fn paused_cannot_reach_game_over_directly() {
        let mut m = machine_in(Paused);
        assert!(!m.try_enter(GameOver));
        assert_eq!(m.current(), Paused);
    }
}

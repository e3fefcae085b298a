use serde::{Deserialize, Serialize};

use crate::state_machine::GamePhase;

/// Outbound notifications for presentation/persistence collaborators,
/// drained by each `advance` call. The core never touches storage or UI
/// itself; these carry everything needed to drive screens, score-keeping,
/// and unlock checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameNotification {
    /// The state machine accepted a transition.
    PhaseChanged { phase: GamePhase },
    /// Lives changed (run start or life loss).
    LivesChanged { lives: u32 },
    /// The goal chest opened and the run finished.
    LevelComplete {
        level: u32,
        lives_remaining: u32,
        /// Active-play seconds for the run (pauses and respawn grace excluded).
        elapsed_secs: f32,
    },
    /// The run ended with no lives remaining.
    GameOver,
    /// The player ducked; reverts via `DuckEnded`.
    DuckStarted,
    DuckEnded,
    /// Emitted each tick while the quicksand countdown runs.
    QuicksandCountdown { remaining_secs: f32 },
}

pub mod grid;
pub mod scheduler;
pub mod scoring;

pub use grid::Grid;
pub use scheduler::{
    RoundPhase, RoundResult, RoundScheduler, RoundTiming, SessionView, TapOutcome, Transition,
};
pub use scoring::round_score;

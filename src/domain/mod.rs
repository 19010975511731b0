//! Domain records produced by the engine.

pub mod turn;

pub use turn::{TurnEvent, TurnStatus};

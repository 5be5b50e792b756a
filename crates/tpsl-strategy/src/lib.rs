//! Per-trade decision logic: where a position's targets sit, which one the
//! price reaches first, and what happens when neither is reached in time.

pub mod evaluator;
pub mod exit_policy;
pub mod position;

pub use evaluator::evaluate;
pub use exit_policy::resolve_timeout;
pub use position::Position;

// 8.0: the stateful coordinator. positions, pools, the logical clock, and the
// port wiring live in core; the lifecycle entry points are split by concern.
// deterministic and event-driven with no internal I/O beyond the ports.

mod core;
mod liquidations;
mod liquidity;
mod positions;
mod results;

pub use core::Engine;
pub use results::{
    CloseResult, EngineError, LiquidationOutcome, PartialCloseResult, WithdrawalResult,
};

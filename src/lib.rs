// margin-core: leveraged position and liquidity accounting engine.
// solvency-first architecture: health math and liquidation take priority.
// all computation is deterministic; the only outside world is three ports.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: PositionId, OwnerId, Token, SeqNo, Price, Quote, Leverage
//   4.x  position.rs: position struct, pnl, pro-rata slicing
//   5.x  health.rs: health factor = effective collateral / required margin
//   6.x  liquidation.rs: bonus tiers, per-call cap, settlement planning
//   7.x  config.rs: injected read-only parameters
//   8.x  engine/: stateful coordinator: positions, liquidations, liquidity
//   9.x  pool.rs: LP shares and the fee-per-share index
//   10.x oracle.rs / custody.rs / backstop.rs: external ports (in-memory impls)
//   11.x events.rs: ledger mutation records for external indexers

// core accounting modules
pub mod config;
pub mod engine;
pub mod events;
pub mod health;
pub mod liquidation;
pub mod pool;
pub mod position;
pub mod types;

// external ports
pub mod backstop;
pub mod custody;
pub mod oracle;

// re exports for convenience
pub use config::*;
pub use engine::*;
pub use events::*;
pub use health::*;
pub use liquidation::*;
pub use pool::*;
pub use position::*;
pub use types::*;
pub use backstop::{BackstopError, BackstopFund, BackstopPort};
pub use custody::{CustodyError, CustodyPort, InMemoryCustody};
pub use oracle::{OracleError, PriceOracle, PriceQuote, SettableOracle};

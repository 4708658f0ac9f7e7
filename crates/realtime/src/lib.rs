//! Wall-clock runner for the cluster engine.
//!
//! Where the simulation runner drives the engine on a virtual clock, this
//! crate drives it on tokio's clock: a fixed tick interval while the
//! session runs and a one-shot settle timer after each rebalance. Callers
//! interact through a [`RealtimeHandle`].
//!
//! ```text
//! RealtimeHandle ──mpsc──► RealtimeRunner ──► ClusterStateMachine
//!        ▲                   │  ▲   ▲
//!        └──── oneshot ──────┘  │   └── sleep (rebalance settle)
//!        ▲                      └────── interval (tick)
//!        └──── watch<ClusterSnapshot>
//! ```

mod handle;
mod runner;

pub use handle::RealtimeHandle;
pub use runner::RealtimeRunner;

use brokersim_core::CommandError;
use thiserror::Error;

/// Why a submitted command produced no snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("realtime runner stopped")]
    Stopped,
}

//! Boundary to the advisory text collaborator.

use brokersim_types::AdvisorySnapshot;

/// Produces explanatory text about the running simulation.
///
/// The engine hands over a read-only snapshot and a free-text concept
/// query; the reply is only displayed, never consumed.
pub trait Advisor {
    fn advise(&self, snapshot: &AdvisorySnapshot, concept: &str) -> String;
}

//! LACP state verifier.
//!
//! Invariants are declarative predicates over a topology snapshot.
//! [`verify`] evaluates one against a snapshot already in hand;
//! [`verify_with_poll`] re-queries live state through a [`StateProbe`]
//! with bounded retries and exponential backoff, for invariants about
//! transient state (post-fault convergence, renegotiation after a
//! system-ID change).
//!
//! Outcome semantics are strict: an invariant that never comes to hold
//! within the budget is a **failure**, not an error. Only a
//! communication breakdown while probing — something distinct from the
//! invariant simply not holding yet — produces an error outcome.

mod invariant;
mod poll;
mod result;

pub use invariant::Invariant;
pub use poll::{verify_with_poll, PollPolicy, StateProbe};
pub use result::{Outcome, VerificationResult};

use lacplab_topology::Topology;

/// Evaluates an invariant against a snapshot, single shot.
pub fn verify(invariant: &Invariant, topology: &Topology) -> VerificationResult {
    match invariant.eval(topology) {
        Ok(()) => VerificationResult::passed(invariant, 1, topology.clone(), None),
        Err(violation) => {
            VerificationResult::failed(invariant, 1, Some(topology.clone()), violation)
        }
    }
}

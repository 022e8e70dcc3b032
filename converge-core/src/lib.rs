//! Converge Core
//!
//! Shared pieces for driving cloud resources toward a desired state: the
//! resource model, attribute schemas, per-operation timeouts and the state
//! poller that waits for a resource to settle after a mutating call.

pub mod provider;
pub mod resource;
pub mod schema;
pub mod timeouts;
pub mod waiter;

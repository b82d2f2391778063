//! Worker Space Registry: one lazily-materialized space per
//! `(user_id, project_id)`, an agent cache with a soft TTL, deterministic
//! orchestrated routing, and the bus-facing executor that actually runs an
//! agent turn.
//!
//! - [`registry::WorkerSpaceRegistry`]: get_or_create/get/remove/cleanup_all.
//! - [`space::WorkerSpace`]: one tenant's agents plus their cache.
//! - [`agent_cache::AgentCache`]: soft-TTL, LRU-evicted agent cache.
//! - [`routing`]: the Jaccard-overlap orchestrated routing policy.
//! - [`dispatch::Dispatcher`]: direct vs orchestrated agent resolution.
//! - [`executor::WorkspaceExecutor`]: the `atrium_bus::TaskExecutor` impl.
//! - [`context`]: the seam to an agent's long-term memory (vector store).

mod agent_cache;
mod context;
mod dispatch;
mod executor;
mod registry;
mod routing;
mod space;

pub use context::{collection_name, ContextHit, ContextRecord, ContextStore, NullContextStore};
pub use dispatch::{DispatchMode, Dispatcher};
pub use executor::{AgentInvoker, WorkspaceExecutor};
pub use registry::{RegistryStats, WorkerSpaceRegistry};
pub use space::WorkerSpace;

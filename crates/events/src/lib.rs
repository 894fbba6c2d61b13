//! Domain event contracts and distribution mechanics.
//!
//! Events are the persisted facts of this system; stock counters and the
//! ledger are projections of them. This crate defines the typed `Event`
//! contract, the tenant-scoped `EventEnvelope`, and the pub/sub bus used to
//! fan committed events out to projections and notification handlers.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};

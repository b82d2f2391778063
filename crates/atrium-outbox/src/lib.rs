//! Transactional Outbox publisher: the write side lives in
//! `atrium-storage::OutboxRepo` (domain write + outbox insert share one
//! transaction); this crate is only the background claim-publish-retry loop.

mod publisher;

pub use publisher::OutboxPublisher;

//! `dossier-events` — live status fan-out.
//!
//! One hub, many observers: the queue publishes job lifecycle events keyed by
//! job id, transports (WebSocket handlers, tests) subscribe per job.

pub mod hub;

pub use hub::{JobEvent, JobEventHub};

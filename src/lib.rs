//! rosterd — duty roster engine behind a Postgres-wire front door.
//!
//! Soldiers and time-boxed duties live in per-tenant in-memory state,
//! made durable by an append-only WAL of domain events. The engine
//! assigns eligible, non-conflicting soldiers to duties, balancing
//! cumulative load via the justice board.

pub mod auth;
pub mod clock;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod scheduler;
pub mod sql;
pub mod tenant;
pub mod tls;
pub mod wal;
pub mod wire;

//! # triage-engine
//!
//! The ordering and locking core of a clinical-document triage worklist.
//!
//! Tracks each item's time left against its SLA deadline ([`sla`],
//! [`countdown`]), ranks items by a composite priority ([`priority`]),
//! arbitrates exclusive review access with leased locks ([`lock`]), and
//! assembles the filtered, ordered, lock-annotated worklist ([`worklist`]).

pub mod clock;
pub mod config;
pub mod countdown;
pub mod error;
pub mod lock;
pub mod model;
pub mod policy;
pub mod priority;
pub mod sla;
pub mod source;
pub mod telemetry;
pub mod worklist;

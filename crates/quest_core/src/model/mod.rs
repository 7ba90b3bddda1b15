//! Domain model for the station reservation and scoring ledger.
//!
//! # Responsibility
//! - Define plain data structures shared by repositories and services.
//! - Keep amounts exact through the fixed-point [`points::Points`] type.
//!
//! # Invariants
//! - Station numbers and group numbers never change once created.
//! - A station is occupied iff it references a group.

pub mod group;
pub mod participant;
pub mod phase;
pub mod points;
pub mod station;

//! Per-kind response parsing, one module per helper response contract.
//! These are pure functions operating on accumulated buffer text;
//! `crate::state_machine` wires them into the per-operation `feed`
//! dispatch.

pub mod command;
pub mod fs_mutation;
pub mod hashes;
pub mod listing;
pub mod stat;
pub mod status;

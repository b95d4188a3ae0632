//! Nube — declarative cloud topology planning.
//!
//! Configuration in, resource graph out. Components decide which nodes must
//! exist and how they depend on each other; nothing here talks to a
//! provider. BLAKE3 plan fingerprints make identical inputs provably
//! identical plans.

pub mod aws;
pub mod cli;
pub mod graph;
pub mod stack;

//! # Core Models Module
//!
//! Data structures describing a molecule while it is being prepared for docking.
//!
//! ## Key Components
//!
//! - [`element`] - Element identity and valence tables
//! - [`atom`] - Setup atoms, including glue and water pseudo-atoms
//! - [`bond`] - Bond keys, orders and per-bond flexibility flags
//! - [`setup`] - The [`MoleculeSetup`](setup::MoleculeSetup) aggregate, rings and the terminal-atom merger
//! - [`flex`] - The rooted tree of rigid bodies produced by the flexibility stage
//!
//! Atom indices are stable across the whole pipeline, so every structure here
//! refers to atoms by plain `usize` index.

pub mod atom;
pub mod bond;
pub mod element;
pub mod flex;
pub mod setup;

//! Welcome to `partsim`!
//!
//! A discrete-time model of an operating system that keeps a fixed
//! number of memory partitions and a single CPU. Processes arrive,
//! are admitted into the smallest free partition that fits them
//! (best-fit), are scheduled by Shortest Remaining Time First with
//! preemption, and retire once their burst is exhausted.
//!
//! The engine is the [`Simulation`] type: an exhaustible sequence of
//! [`Snapshot`]s, one for every tick in which something arrived or
//! something terminated. Once the sequence is drained, a [`Report`]
//! with per-process and aggregate timing statistics can be produced.

pub mod helpe;
pub mod process;
pub mod procset;
pub mod memory;
pub mod sched;
pub mod clock;
pub mod stats;
pub mod config;
pub mod render;
pub mod io;

pub use crate::helpe::*;

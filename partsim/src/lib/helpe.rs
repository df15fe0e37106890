pub use std::{
    collections::{BTreeSet, HashMap, HashSet},
    hash::BuildHasherDefault,
    io::{BufRead, BufReader, BufWriter, Write},
    path::PathBuf,
};
pub use ahash::AHasher;
pub use clap::{Parser, ValueEnum};
pub use indexmap::IndexMap;
pub use itertools::Itertools;
pub use serde::{Deserialize, Serialize};
pub use thiserror::Error;

pub use crate::{
    clock::{Cause, Simulation, Snapshot},
    config::SimConfig,
    io::{read_trace, write_trace, Trace},
    memory::{MemoryAllocator, MemoryLayout, Partition, PartitionView},
    process::{ProcDescr, ProcState, ProcView, Process},
    procset::{ProcCSVParser, ProcGen},
    sched::Scheduler,
    stats::{ProcStats, Report},
};

/// The unit for measuring logical time. One tick is also exactly one
/// unit of CPU work: there is no fractional execution.
pub type Tick = usize;

/// The unit for measuring memory. `partsim` attaches no meaning to it
/// (the classic exercise speaks of kilobytes), it only needs to be
/// comparable and subtractable.
pub type MemUnits = usize;

/// Externally supplied, stable process identifier.
pub type ProcId = u32;

/// Partition identifiers are handed out in layout order, starting at 1.
pub type PartId = u32;

/// Every process known to a run, keyed by its id. Insertion order is
/// the order in which descriptors were handed over.
pub type ProcRegistry = IndexMap<ProcId, Process, BuildHasherDefault<AHasher>>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Malformed memory layout or run parameters. Fatal before the first
/// tick is ever simulated.
pub enum ConfigError {
    #[error("memory layout has no partitions")]
    NoPartitions,
    #[error("partition #{0} has zero size")]
    ZeroPartition(usize),
    #[error("layout needs {needed} units but memory only has {total}")]
    Overcommitted {
        needed: MemUnits,
        total:  MemUnits,
    },
    #[error("degree of multiprogramming must be at least 1")]
    ZeroDegree,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// A programming-logic fault. Never a recoverable runtime condition:
/// the simulation stops as soon as one is detected.
pub enum InvariantViolation {
    #[error("process {0} is not part of this run")]
    UnknownProcess(ProcId),
    #[error("process {0} was admitted while already holding partition {1}")]
    DoubleAdmission(ProcId, PartId),
    #[error("process {0} holds no partition")]
    NotResident(ProcId),
    #[error("partition {0} does not agree with its occupant")]
    Asymmetric(PartId),
    #[error("process {0} executed with no remaining work")]
    Overrun(ProcId),
    #[error("process {0} finished twice")]
    FinishedTwice(ProcId),
    #[error("process {0} was handed over twice")]
    DuplicateProcess(ProcId),
    #[error("process {0} is not in exactly one collection matching its state")]
    Membership(ProcId),
    #[error("{resident} processes resident with a degree of {degree}")]
    DegreeExceeded {
        resident:   usize,
        degree:     usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("bad configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

#[derive(Error, Debug)]
#[error("{message}\n{:?}", culprit)]
/// Appears while gathering the *original* process descriptors
/// of a run.
pub struct ProcError {
    pub message: String,
    pub culprit: ProcDescr,
}

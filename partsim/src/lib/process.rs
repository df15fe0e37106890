use crate::helpe::*;

/// What the outside world tells us about a process: who it is, how much
/// memory it wants, when it shows up and how much CPU it needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcDescr {
    pub id:         ProcId,
    pub size:       MemUnits,
    pub arrival:    Tick,
    pub burst:      Tick,
}

impl ProcDescr {
    pub fn new(id: ProcId, size: MemUnits, arrival: Tick, burst: Tick) -> Self {
        Self { id, size, arrival, burst }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcState {
    /// Not arrived yet.
    New,
    /// In memory, waiting for the CPU.
    Ready,
    Executing,
    /// Did not fit in memory, or the degree of multiprogramming
    /// was exhausted when it asked.
    Suspended,
    Terminated,
}

/// A process as the simulation sees it.
///
/// The descriptor part never changes. `remaining` only ever goes down,
/// and only while the process holds the CPU. `first_exec` and `finish`
/// are write-once: see [`Process::mark_dispatched`] and
/// [`Process::retire`].
///
/// `partition` is one half of the occupancy relation. Only the
/// [`MemoryAllocator`] writes it, together with the other half.
#[derive(Clone, Debug)]
pub struct Process {
    pub descr:          ProcDescr,
    pub remaining:      Tick,
    pub state:          ProcState,
    pub first_exec:     Option<Tick>,
    pub finish:         Option<Tick>,
    pub(crate) partition: Option<PartId>,
}

impl Process {
    pub fn new(descr: ProcDescr) -> Self {
        Self {
            descr,
            remaining:  descr.burst,
            state:      ProcState::New,
            first_exec: None,
            finish:     None,
            partition:  None,
        }
    }

    #[inline]
    pub fn id(&self) -> ProcId { self.descr.id }

    #[inline]
    pub fn size(&self) -> MemUnits { self.descr.size }

    #[inline]
    pub fn arrival(&self) -> Tick { self.descr.arrival }

    /// The partition currently holding this process, if any.
    #[inline]
    pub fn partition(&self) -> Option<PartId> { self.partition }

    /// Hands the CPU to the process. The first dispatch is remembered
    /// forever; later ones leave it untouched.
    pub fn mark_dispatched(&mut self, now: Tick) {
        self.state = ProcState::Executing;
        if self.first_exec.is_none() {
            self.first_exec = Some(now);
        }
    }

    /// Consumes one unit of CPU. Returns `true` if that was the last one.
    pub fn run_once(&mut self) -> Result<bool, InvariantViolation> {
        self.remaining = self.remaining
            .checked_sub(1)
            .ok_or(InvariantViolation::Overrun(self.id()))?;

        Ok(self.remaining == 0)
    }

    /// Moves the process to its terminal state. It completes at the
    /// boundary of the tick it last executed in, hence `now + 1`.
    pub fn retire(&mut self, now: Tick) -> Result<(), InvariantViolation> {
        if self.finish.is_some() {
            return Err(InvariantViolation::FinishedTwice(self.id()));
        }
        self.finish = Some(now + 1);
        self.state = ProcState::Terminated;

        Ok(())
    }

    /// Finish time minus arrival time. Undefined until the process
    /// terminates.
    pub fn turnaround(&self) -> Option<Tick> {
        self.finish.map(|f| f - self.arrival())
    }

    /// Time spent between arrival and the very first dispatch. Later
    /// preemptions do not add to it.
    pub fn wait(&self) -> Option<Tick> {
        self.first_exec.map(|t| t - self.arrival())
    }

    pub fn view(&self) -> ProcView {
        ProcView {
            id:         self.id(),
            size:       self.size(),
            state:      self.state,
            remaining:  self.remaining,
            partition:  self.partition,
        }
    }
}

/// Plain-data picture of a [`Process`] at some tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcView {
    pub id:         ProcId,
    pub size:       MemUnits,
    pub state:      ProcState,
    pub remaining:  Tick,
    pub partition:  Option<PartId>,
}

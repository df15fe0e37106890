use crate::helpe::*;
use log::{debug, info, warn};
use std::iter::FusedIterator;

/// Why a [`Snapshot`] was taken. Observation is throttled to ticks in
/// which at least one process arrived or one terminated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    pub arrived:    Vec<ProcId>,
    pub terminated: Option<ProcId>,
}

/// Plain-data picture of the whole system at the end of a tick, i.e.
/// after execution and termination but before the counter advances.
/// Rendering it is somebody else's business.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick:           Tick,
    pub cause:          Cause,
    pub os_reserved:    MemUnits,
    pub memory:         Vec<PartitionView>,
    pub executing:      Option<ProcId>,
    pub ready:          Vec<ProcId>,
    /// In promotion order: longest-suspended first, then lowest id.
    pub suspended:      Vec<ProcId>,
    /// Not arrived yet, in arrival order.
    pub pending:        Vec<ProcId>,
    /// In order of termination.
    pub terminated:     Vec<ProcId>,
    pub procs:          Vec<ProcView>,
}

/// The discrete-time driver, and the sole owner of a run's state.
///
/// Every process lives in exactly one of five places: `pending` (not
/// arrived), `ready`, `suspended`, `executing` or `terminated`. Each
/// tick goes through the same motions:
///
/// 1. admit arrivals, or suspend them;
/// 2. promote suspended processes while memory and the degree allow;
/// 3. let the [`Scheduler`] preempt and/or dispatch;
/// 4. stamp first-execution times;
/// 5. run the executing process for one unit;
/// 6. retire it if done, free its partition and backfill from the
///    suspended set;
/// 7. emit a [`Snapshot`] if anything arrived or terminated;
/// 8. advance the counter.
///
/// A [`Simulation`] is consumed as an [`Iterator`] of snapshots. Once it
/// returns `None` it stays exhausted: one run, one sequence. Call
/// [`Simulation::report`] afterwards for the statistics.
#[derive(Clone, Debug)]
pub struct Simulation {
    config:     SimConfig,
    tick:       Tick,
    procs:      ProcRegistry,
    memory:     MemoryAllocator,
    // Keyed by arrival, then id.
    pending:    BTreeSet<(Tick, ProcId)>,
    ready:      Vec<ProcId>,
    // Keyed by the tick suspension began. Iteration order is thus
    // "suspended the longest first", then lowest id.
    suspended:  BTreeSet<(Tick, ProcId)>,
    executing:  Option<ProcId>,
    terminated: Vec<ProcId>,
    // Who held the CPU at every elapsed tick.
    timeline:   Vec<Option<ProcId>>,
    exhausted:  bool,
    truncated:  bool,
}

impl Simulation {
    pub fn new(config: SimConfig, descrs: Vec<ProcDescr>) -> Result<Self, SimError> {
        config.validate()?;
        let memory = MemoryAllocator::new(&config.layout)?;
        let mut procs = ProcRegistry::default();
        let mut pending = BTreeSet::new();
        for d in descrs {
            if procs.insert(d.id, Process::new(d)).is_some() {
                return Err(InvariantViolation::DuplicateProcess(d.id).into());
            }
            pending.insert((d.arrival, d.id));
        }
        info!(
            "Simulating {} processes over {} partitions, degree {}",
            procs.len(),
            memory.partitions().len(),
            config.degree
        );

        Ok(Self {
            config,
            tick:       0,
            procs,
            memory,
            pending,
            ready:      vec![],
            suspended:  BTreeSet::new(),
            executing:  None,
            terminated: vec![],
            timeline:   vec![],
            exhausted:  false,
            truncated:  false,
        })
    }

    /// Drains the whole sequence, keeping every snapshot.
    pub fn run(mut self) -> Result<(Vec<Snapshot>, Report), SimError> {
        let snapshots = self.by_ref().collect::<Result<Vec<_>, _>>()?;

        Ok((snapshots, self.report()))
    }

    #[inline]
    pub fn tick(&self) -> Tick { self.tick }

    #[inline]
    pub fn config(&self) -> &SimConfig { &self.config }

    #[inline]
    pub fn memory(&self) -> &MemoryAllocator { &self.memory }

    #[inline]
    pub fn executing(&self) -> Option<ProcId> { self.executing }

    pub fn process(&self, id: ProcId) -> Option<&Process> {
        self.procs.get(&id)
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.procs.values()
    }

    /// Processes currently in memory: ready plus executing.
    pub fn resident(&self) -> usize {
        self.ready.len() + self.executing.iter().count()
    }

    /// `true` once no process can make any further progress.
    ///
    /// A process larger than every partition stays suspended forever.
    /// It must not keep the loop spinning, so it does not count.
    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
            && self.ready.is_empty()
            && self.executing.is_none()
            && self.suspended
                .iter()
                .filter_map(|(_, id)| self.procs.get(id))
                .all(|p| !self.memory.could_ever_fit(p.size()))
    }

    pub fn report(&self) -> Report {
        Report::new(
            self.tick,
            self.procs.values(),
            self.timeline.clone(),
            !self.truncated,
        )
    }

    fn lookup(&self, id: ProcId) -> Result<&Process, InvariantViolation> {
        self.procs
            .get(&id)
            .ok_or(InvariantViolation::UnknownProcess(id))
    }

    fn lookup_mut(&mut self, id: ProcId) -> Result<&mut Process, InvariantViolation> {
        self.procs
            .get_mut(&id)
            .ok_or(InvariantViolation::UnknownProcess(id))
    }

    /// One tick. Returns a snapshot only if something arrived or
    /// terminated.
    fn step(&mut self) -> Result<Option<Snapshot>, SimError> {
        let arrived = self.admit_arrivals()?;
        self.promote_suspended()?;
        self.dispatch()?;
        let terminated = self.execute()?;
        if cfg!(debug_assertions) {
            self.check_consistency()?;
        }

        let snap = if !arrived.is_empty() || terminated.is_some() {
            Some(self.snapshot(Cause { arrived, terminated }))
        } else { None };
        self.tick += 1;

        Ok(snap)
    }

    fn admit_arrivals(&mut self) -> Result<Vec<ProcId>, SimError> {
        let mut arrived = vec![];
        while let Some(&(at, id)) = self.pending.first() {
            if at > self.tick { break; }
            self.pending.pop_first();
            arrived.push(id);
            if self.try_admit(id)? {
                debug!("t={}: process {} arrived and was admitted", self.tick, id);
            } else {
                self.suspend(id)?;
            }
        }

        Ok(arrived)
    }

    /// Admission requires both a free partition that fits and room
    /// under the degree of multiprogramming, the latter evaluated
    /// before this very process is counted.
    fn try_admit(&mut self, id: ProcId) -> Result<bool, SimError> {
        if self.resident() >= self.config.degree {
            return Ok(false);
        }
        let p = self.procs
            .get_mut(&id)
            .ok_or(InvariantViolation::UnknownProcess(id))?;
        if !self.memory.allocate(p)? {
            return Ok(false);
        }
        p.state = ProcState::Ready;
        self.ready.push(id);

        Ok(true)
    }

    fn suspend(&mut self, id: ProcId) -> Result<(), SimError> {
        let now = self.tick;
        let p = self.procs
            .get_mut(&id)
            .ok_or(InvariantViolation::UnknownProcess(id))?;
        p.state = ProcState::Suspended;
        if !self.memory.could_ever_fit(p.size()) {
            warn!(
                "Process {} needs {} units, more than any partition offers. It will never run.",
                id,
                p.size()
            );
        } else {
            debug!("t={}: process {} suspended", now, id);
        }
        self.suspended.insert((now, id));

        Ok(())
    }

    fn promote_suspended(&mut self) -> Result<Vec<ProcId>, SimError> {
        let mut promoted = vec![];
        let queue: Vec<(Tick, ProcId)> = self.suspended
            .iter()
            .copied()
            .collect();
        for key in queue {
            if self.resident() >= self.config.degree { break; }
            if self.try_admit(key.1)? {
                self.suspended.remove(&key);
                debug!("t={}: process {} promoted from suspended", self.tick, key.1);
                promoted.push(key.1);
            }
        }

        Ok(promoted)
    }

    /// Preempts if SRTF says so, then dispatches if the CPU is idle.
    /// Returns the preempted process, if any.
    fn dispatch(&mut self) -> Result<Option<ProcId>, SimError> {
        let mut preempted = None;
        if let Some(cur) = self.executing {
            let running = self.lookup(cur)?;
            let ready = self.ready
                .iter()
                .filter_map(|id| self.procs.get(id));
            if !Scheduler::should_preempt(running, ready) {
                return Ok(None);
            }
            // Memory is retained across preemption.
            self.lookup_mut(cur)?.state = ProcState::Ready;
            self.ready.push(cur);
            self.executing = None;
            debug!("t={}: process {} preempted", self.tick, cur);
            preempted = Some(cur);
        }

        let next = Scheduler::select_next(
            self.ready
                .iter()
                .filter_map(|id| self.procs.get(id))
        ).map(|p| p.id());
        if let Some(id) = next {
            let now = self.tick;
            self.ready.retain(|r| *r != id);
            self.lookup_mut(id)?.mark_dispatched(now);
            self.executing = Some(id);
            debug!("t={}: process {} dispatched", now, id);
        }

        Ok(preempted)
    }

    /// Runs the executing process for one unit. Returns it if that
    /// was its last one.
    fn execute(&mut self) -> Result<Option<ProcId>, SimError> {
        self.timeline.push(self.executing);
        let Some(id) = self.executing else { return Ok(None) };
        let now = self.tick;
        let p = self.procs
            .get_mut(&id)
            .ok_or(InvariantViolation::UnknownProcess(id))?;
        if !p.run_once()? {
            return Ok(None);
        }
        let freed = self.memory.free(p)?;
        p.retire(now)?;
        self.executing = None;
        self.terminated.push(id);
        debug!("t={}: process {} terminated, partition {} freed", now, id, freed);
        // Backfill the vacancy before the next scheduling decision.
        self.promote_suspended()?;

        Ok(Some(id))
    }

    fn snapshot(&self, cause: Cause) -> Snapshot {
        Snapshot {
            tick:           self.tick,
            cause,
            os_reserved:    self.config.layout.os_reserved,
            memory:         self.memory.table(),
            executing:      self.executing,
            ready:          self.ready.clone(),
            suspended:      self.suspended.iter().map(|(_, id)| *id).collect(),
            pending:        self.pending.iter().map(|(_, id)| *id).collect(),
            terminated:     self.terminated.clone(),
            procs:          self.procs.values().map(|p| p.view()).collect(),
        }
    }

    /// Verifies that every process sits in exactly one collection that
    /// agrees with its state, that occupancy is symmetric, that only
    /// resident processes hold memory and that the degree holds.
    ///
    /// Runs after every tick in debug builds.
    pub fn check_consistency(&self) -> Result<(), InvariantViolation> {
        let members = self.pending.iter().map(|(_, id)| (*id, ProcState::New))
            .chain(self.ready.iter().map(|id| (*id, ProcState::Ready)))
            .chain(self.suspended.iter().map(|(_, id)| (*id, ProcState::Suspended)))
            .chain(self.executing.iter().map(|id| (*id, ProcState::Executing)))
            .chain(self.terminated.iter().map(|id| (*id, ProcState::Terminated)));
        let mut placed: HashMap<ProcId, ProcState> = HashMap::with_capacity(self.procs.len());
        for (id, state) in members {
            if self.lookup(id)?.state != state || placed.insert(id, state).is_some() {
                return Err(InvariantViolation::Membership(id));
            }
        }
        if let Some(p) = self.procs
            .values()
            .find(|p| !placed.contains_key(&p.id())) {
                return Err(InvariantViolation::Membership(p.id()));
        }

        for part in self.memory.partitions() {
            if let Some(occ) = part.occupant() {
                if self.lookup(occ)?.partition != Some(part.id) {
                    return Err(InvariantViolation::Asymmetric(part.id));
                }
            }
        }
        for p in self.procs.values() {
            let resident = matches!(p.state, ProcState::Ready | ProcState::Executing);
            match p.partition {
                Some(held)  => {
                    let agrees = self.memory
                        .get(held)
                        .is_some_and(|part| part.occupant() == Some(p.id()));
                    if !agrees { return Err(InvariantViolation::Asymmetric(held)); }
                    if !resident { return Err(InvariantViolation::Membership(p.id())); }
                },
                None        => {
                    if resident { return Err(InvariantViolation::NotResident(p.id())); }
                }
            }
        }

        if self.resident() > self.config.degree {
            return Err(InvariantViolation::DegreeExceeded {
                resident:   self.resident(),
                degree:     self.config.degree,
            });
        }

        Ok(())
    }
}

impl Iterator for Simulation {
    type Item = Result<Snapshot, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted {
            if self.is_done() {
                self.exhausted = true;
                info!("Run finished after {} ticks", self.tick);
                break;
            }
            if let Some(limit) = self.config.max_ticks {
                if self.tick >= limit {
                    warn!("Tick limit of {} reached, stopping early", limit);
                    self.exhausted = true;
                    self.truncated = true;
                    break;
                }
            }
            match self.step() {
                Ok(Some(snap))  => { return Some(Ok(snap)); },
                Ok(None)        => {},
                Err(e)          => {
                    // A broken invariant poisons the run.
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }

        None
    }
}

impl FusedIterator for Simulation {}

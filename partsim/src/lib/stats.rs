use crate::helpe::*;

/// Timing statistics of one process. Everything that depends on a
/// finish time is `None` for processes that never terminated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcStats {
    pub id:         ProcId,
    pub size:       MemUnits,
    pub arrival:    Tick,
    pub burst:      Tick,
    pub first_exec: Option<Tick>,
    pub finish:     Option<Tick>,
    pub turnaround: Option<Tick>,
    pub wait:       Option<Tick>,
}

impl ProcStats {
    pub fn new(p: &Process) -> Self {
        Self {
            id:         p.id(),
            size:       p.size(),
            arrival:    p.arrival(),
            burst:      p.descr.burst,
            first_exec: p.first_exec,
            finish:     p.finish,
            turnaround: p.turnaround(),
            wait:       p.wait(),
        }
    }
}

/// End-of-run statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Ticks elapsed until no process could make further progress.
    pub ticks:          Tick,
    /// Sorted by id.
    pub procs:          Vec<ProcStats>,
    pub terminated:     usize,
    /// Averages are taken over terminated processes only.
    pub avg_turnaround: f64,
    pub avg_wait:       f64,
    /// Terminated processes per tick.
    pub throughput:     f64,
    /// The process holding the CPU at every elapsed tick.
    pub timeline:       Vec<Option<ProcId>>,
    /// `false` if the run was cut short by a tick limit.
    pub complete:       bool,
}

impl Report {
    pub fn new<'a, I>(
        ticks:      Tick,
        procs:      I,
        timeline:   Vec<Option<ProcId>>,
        complete:   bool,
    ) -> Self
    where I: IntoIterator<Item = &'a Process> {
        let procs: Vec<ProcStats> = procs.into_iter()
            .map(ProcStats::new)
            .sorted_unstable_by_key(|s| s.id)
            .collect();
        let done: Vec<&ProcStats> = procs.iter()
            .filter(|s| s.finish.is_some())
            .collect();
        let terminated = done.len();
        let (avg_turnaround, avg_wait) = if terminated > 0 {
            (
                done.iter().filter_map(|s| s.turnaround).sum::<Tick>() as f64 / terminated as f64,
                done.iter().filter_map(|s| s.wait).sum::<Tick>() as f64 / terminated as f64,
            )
        } else { (0.0, 0.0) };
        let throughput = if ticks > 0 {
            terminated as f64 / ticks as f64
        } else { 0.0 };

        Self {
            ticks,
            procs,
            terminated,
            avg_turnaround,
            avg_wait,
            throughput,
            timeline,
            complete,
        }
    }

    pub fn get(&self, id: ProcId) -> Option<&ProcStats> {
        self.procs.iter().find(|s| s.id == id)
    }
}

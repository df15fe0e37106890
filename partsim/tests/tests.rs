use partsim::*;
use partsim::{procset::{self, LoadShape}, render};
use rand::{rngs::StdRng, SeedableRng};

fn get_crate_root() -> Result<PathBuf, std::env::VarError> {
    Ok(PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?))
}

fn read_from_path(p: &str, limit: Option<usize>) -> Result<Vec<ProcDescr>, Box<dyn std::error::Error>> {
    let mut csv_path = get_crate_root()?;
    csv_path.push(p);
    let parser = ProcCSVParser::new(csv_path).with_limit(limit);
    let procs = parser.read_procs()?;
    assert!(procs.len() > 0);

    Ok(procset::init(procs)?)
}

fn d(id: ProcId, size: MemUnits, arrival: Tick, burst: Tick) -> ProcDescr {
    ProcDescr::new(id, size, arrival, burst)
}

fn run(config: SimConfig, descrs: Vec<ProcDescr>) -> (Vec<Snapshot>, Report) {
    Simulation::new(config, descrs)
        .unwrap()
        .run()
        .unwrap()
}

fn with_degree(degree: usize) -> SimConfig {
    SimConfig::new(degree, MemoryLayout::standard())
}

fn standard_memory() -> MemoryAllocator {
    MemoryAllocator::new(&MemoryLayout::standard()).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

//---START MEMORY ALLOCATOR
#[test]
fn best_fit_picks_tightest_partition() {
    let mut mem = standard_memory();
    let mut p = Process::new(d(1, 80, 0, 1));
    assert_eq!(mem.find_best_fit(&p), Some(2));
    assert!(mem.allocate(&mut p).unwrap());
    assert_eq!(p.partition(), Some(2));
    let part = mem.get(2).unwrap();
    assert_eq!(part.occupant(), Some(1));
    assert_eq!(part.fragmentation(), 70);
    assert!(mem.get(1).unwrap().is_free());
}

#[test]
fn best_fit_ties_go_to_lowest_id() {
    let mem = MemoryAllocator::new(&MemoryLayout::new(0, vec![100, 50, 100])).unwrap();
    let p = Process::new(d(1, 90, 0, 1));
    assert_eq!(mem.find_best_fit(&p), Some(1));
}

#[test]
fn best_fit_skips_occupied_partitions() {
    let mut mem = standard_memory();
    let mut a = Process::new(d(1, 80, 0, 1));
    let mut b = Process::new(d(2, 80, 0, 1));
    let mut c = Process::new(d(3, 80, 0, 1));
    assert!(mem.allocate(&mut a).unwrap());
    assert!(mem.allocate(&mut b).unwrap());
    assert_eq!(b.partition(), Some(1));
    assert_eq!(mem.get(1).unwrap().fragmentation(), 170);
    // Only the 50-partition is left.
    assert_eq!(mem.find_best_fit(&c), None);
    assert!(!mem.allocate(&mut c).unwrap());
    assert_eq!(c.partition(), None);
    assert_eq!(c.state, ProcState::New);
}

#[test]
fn free_clears_both_sides() {
    let mut mem = standard_memory();
    let mut p = Process::new(d(7, 40, 0, 1));
    assert!(mem.allocate(&mut p).unwrap());
    assert_eq!(mem.free(&mut p), Ok(3));
    assert_eq!(p.partition(), None);
    let part = mem.get(3).unwrap();
    assert!(part.is_free());
    assert_eq!(part.fragmentation(), 0);
    assert_eq!(mem.free(&mut p), Err(InvariantViolation::NotResident(7)));
}

#[test]
fn double_admission_is_a_violation() {
    let mut mem = standard_memory();
    let mut p = Process::new(d(4, 40, 0, 1));
    assert!(mem.allocate(&mut p).unwrap());
    assert_eq!(mem.allocate(&mut p), Err(InvariantViolation::DoubleAdmission(4, 3)));
}

#[test]
fn fit_in_principle() {
    let mem = standard_memory();
    assert!(mem.could_ever_fit(250));
    assert!(!mem.could_ever_fit(251));
}

#[test]
fn layout_addresses_follow_os() {
    let mem = standard_memory();
    let starts: Vec<MemUnits> = mem.partitions()
        .iter()
        .map(|p| p.start)
        .collect();
    assert_eq!(starts, vec![100, 350, 500]);
    assert_eq!(MemoryLayout::standard().total, 550);
}

#[test]
fn bad_layouts_are_rejected() {
    assert_eq!(MemoryLayout::new(100, vec![]).validate(), Err(ConfigError::NoPartitions));
    assert_eq!(MemoryLayout::new(100, vec![10, 0]).validate(), Err(ConfigError::ZeroPartition(2)));
    assert_eq!(
        MemoryLayout::standard().with_total(500).validate(),
        Err(ConfigError::Overcommitted { needed: 550, total: 500 })
    );
    assert_eq!(with_degree(0).validate(), Err(ConfigError::ZeroDegree));
    assert!(matches!(
        Simulation::new(with_degree(0), vec![d(1, 10, 0, 1)]),
        Err(SimError::Config(ConfigError::ZeroDegree))
    ));
}
//---END MEMORY ALLOCATOR

//---START SCHEDULER
fn with_remaining(descr: ProcDescr, remaining: Tick) -> Process {
    let mut p = Process::new(descr);
    p.remaining = remaining;
    p
}

#[test]
fn srtf_picks_least_remaining() {
    let ready = vec![
        with_remaining(d(1, 10, 0, 9), 5),
        with_remaining(d(2, 10, 4, 9), 2),
        with_remaining(d(3, 10, 1, 9), 2),
    ];
    // Equal remaining time: earliest arrival wins.
    assert_eq!(Scheduler::select_next(&ready).map(|p| p.id()), Some(3));
    assert!(Scheduler::select_next(&Vec::<Process>::new()).is_none());
}

#[test]
fn srtf_ties_resolve_by_id() {
    let ready = vec![
        with_remaining(d(3, 10, 0, 4), 4),
        with_remaining(d(1, 10, 0, 4), 4),
        with_remaining(d(2, 10, 0, 4), 4),
    ];
    for _ in 0..3 {
        assert_eq!(Scheduler::select_next(&ready).map(|p| p.id()), Some(1));
    }
    assert_eq!(Scheduler::select_next(ready.iter().rev()).map(|p| p.id()), Some(1));
}

#[test]
fn preemption_needs_strictly_less() {
    let running = with_remaining(d(1, 10, 0, 9), 5);
    let equal = vec![with_remaining(d(2, 10, 0, 5), 5)];
    let shorter = vec![with_remaining(d(3, 10, 0, 4), 4)];
    assert!(!Scheduler::should_preempt(&running, &equal));
    assert!(Scheduler::should_preempt(&running, &shorter));
    assert!(!Scheduler::should_preempt(&running, &Vec::<Process>::new()));
}
//---END SCHEDULER

//---START CONTROL LOOP
#[test]
fn single_process_end_to_end() {
    let (snaps, report) = run(SimConfig::default(), vec![d(1, 100, 0, 5)]);
    assert_eq!(snaps.iter().map(|s| s.tick).collect::<Vec<_>>(), vec![0, 4]);

    let first = &snaps[0];
    assert_eq!(first.cause.arrived, vec![1]);
    assert_eq!(first.executing, Some(1));
    assert_eq!(first.memory[1].occupant, Some(1));
    assert_eq!(first.memory[1].fragmentation, 50);

    let last = &snaps[1];
    assert_eq!(last.cause.terminated, Some(1));
    assert_eq!(last.terminated, vec![1]);
    assert!(last.memory.iter().all(|p| p.occupant.is_none()));

    let s = report.get(1).unwrap();
    assert_eq!(s.finish, Some(5));
    assert_eq!(s.turnaround, Some(5));
    assert_eq!(s.wait, Some(0));
    assert_eq!(report.ticks, 5);
    assert!(close(report.throughput, 0.2));
    assert_eq!(report.timeline, vec![Some(1); 5]);
    assert!(report.complete);
}

#[test]
fn shorter_arrival_preempts() {
    let (snaps, report) = run(
        SimConfig::default(),
        vec![d(1, 50, 0, 10), d(2, 30, 3, 2)]
    );
    assert_eq!(snaps.iter().map(|s| s.tick).collect::<Vec<_>>(), vec![0, 3, 4, 11]);

    let at_3 = &snaps[1];
    assert_eq!(at_3.executing, Some(2));
    assert_eq!(at_3.ready, vec![1]);
    // Preemption keeps memory.
    assert_eq!(at_3.memory[2].occupant, Some(1));
    assert_eq!(at_3.memory[1].occupant, Some(2));
    assert_eq!(at_3.memory[1].fragmentation, 120);

    let one = report.get(1).unwrap();
    let two = report.get(2).unwrap();
    assert_eq!(one.first_exec, Some(0));
    assert_eq!(one.finish, Some(12));
    assert_eq!(one.turnaround, Some(12));
    assert_eq!(one.wait, Some(0));
    assert_eq!(two.first_exec, Some(3));
    assert_eq!(two.finish, Some(5));
    assert_eq!(two.turnaround, Some(2));
    assert_eq!(two.wait, Some(0));
    assert_eq!(report.ticks, 12);
    assert!(close(report.throughput, 2.0 / 12.0));
    assert!(close(report.avg_turnaround, 7.0));
    assert_eq!(
        report.timeline,
        [1, 1, 1, 2, 2, 1, 1, 1, 1, 1, 1, 1].iter().map(|id| Some(*id)).collect::<Vec<_>>()
    );
}

#[test]
fn wait_is_frozen_at_first_execution() {
    let (_, report) = run(
        SimConfig::default(),
        vec![d(1, 10, 0, 6), d(2, 10, 1, 2), d(3, 10, 1, 4)]
    );
    // Process 1 sits preempted in the ready set from t=1 to t=7,
    // none of which counts as waiting.
    let one = report.get(1).unwrap();
    assert_eq!(one.first_exec, Some(0));
    assert_eq!(one.wait, Some(0));
    assert_eq!(one.finish, Some(12));
    assert_eq!(report.get(2).unwrap().finish, Some(3));
    let three = report.get(3).unwrap();
    assert_eq!(three.first_exec, Some(3));
    assert_eq!(three.wait, Some(2));
    assert_eq!(three.finish, Some(7));
    assert!(close(report.avg_wait, 2.0 / 3.0));
}

#[test]
fn oversized_process_never_blocks_termination() {
    let (snaps, report) = run(
        SimConfig::default(),
        vec![d(1, 300, 0, 2), d(2, 10, 0, 3)]
    );
    let last = snaps.last().unwrap();
    assert_eq!(last.suspended, vec![1]);
    assert_eq!(last.terminated, vec![2]);

    let big = report.get(1).unwrap();
    assert_eq!(big.finish, None);
    assert_eq!(big.turnaround, None);
    assert_eq!(big.wait, None);
    assert_eq!(report.get(2).unwrap().finish, Some(3));
    assert_eq!(report.ticks, 3);
    assert_eq!(report.terminated, 1);
    assert!(close(report.throughput, 1.0 / 3.0));
}

#[test]
fn degree_limit_suspends_then_backfills() {
    let (snaps, report) = run(
        with_degree(1),
        vec![d(1, 10, 0, 2), d(2, 10, 0, 1)]
    );
    let at_0 = &snaps[0];
    assert_eq!(at_0.executing, Some(1));
    assert_eq!(at_0.suspended, vec![2]);
    assert!(at_0.ready.is_empty());

    // Process 1 retires at t=1 and process 2 takes its place
    // before the next scheduling decision.
    let at_1 = &snaps[1];
    assert_eq!(at_1.tick, 1);
    assert_eq!(at_1.ready, vec![2]);
    assert!(at_1.suspended.is_empty());

    assert_eq!(report.get(1).unwrap().finish, Some(2));
    let two = report.get(2).unwrap();
    assert_eq!(two.first_exec, Some(2));
    assert_eq!(two.wait, Some(2));
    assert_eq!(two.finish, Some(3));
}

#[test]
fn longest_suspended_is_promoted_first() {
    let (_, report) = run(
        with_degree(1),
        vec![d(1, 10, 0, 3), d(3, 10, 1, 1), d(2, 10, 2, 1)]
    );
    assert_eq!(report.get(1).unwrap().finish, Some(3));
    assert_eq!(report.get(3).unwrap().finish, Some(4));
    assert_eq!(report.get(2).unwrap().finish, Some(5));
}

#[test]
fn equally_old_suspensions_promote_by_id() {
    let (_, report) = run(
        with_degree(1),
        vec![d(1, 10, 0, 2), d(3, 10, 0, 1), d(2, 10, 0, 1)]
    );
    assert_eq!(report.get(2).unwrap().finish, Some(3));
    assert_eq!(report.get(3).unwrap().finish, Some(4));
}

#[test]
fn snapshots_only_on_arrival_or_termination() {
    let (snaps, report) = run(
        SimConfig::default(),
        vec![d(1, 10, 0, 3), d(2, 10, 5, 1)]
    );
    assert_eq!(snaps.iter().map(|s| s.tick).collect::<Vec<_>>(), vec![0, 2, 5]);
    assert_eq!(snaps[2].cause.arrived, vec![2]);
    assert_eq!(snaps[2].cause.terminated, Some(2));
    assert_eq!(snaps[0].pending, vec![2]);
    assert_eq!(report.timeline, vec![Some(1), Some(1), Some(1), None, None, Some(2)]);
    assert_eq!(report.ticks, 6);
}

#[test]
fn sequence_is_exhaustible_once() {
    let mut sim = Simulation::new(SimConfig::default(), vec![d(1, 10, 0, 2)]).unwrap();
    let mut seen = 0;
    while let Some(snap) = sim.next() {
        snap.unwrap();
        seen += 1;
    }
    assert_eq!(seen, 2);
    assert!(sim.is_done());
    assert!(sim.next().is_none());
    assert_eq!(sim.tick(), 2);
}

#[test]
fn every_observation_is_consistent() {
    let mut rng = StdRng::seed_from_u64(7);
    let shape = LoadShape { size: (10, 300), ..LoadShape::default() };
    let procs = procset::init(procset::random_set(&mut rng, &shape, 30)).unwrap();
    let total = procs.len();
    let mut sim = Simulation::new(with_degree(3), procs).unwrap();

    while let Some(snap) = sim.next() {
        let snap = snap.unwrap();
        sim.check_consistency().unwrap();
        let mut members: Vec<ProcId> = snap.ready.iter()
            .chain(snap.suspended.iter())
            .chain(snap.pending.iter())
            .chain(snap.terminated.iter())
            .chain(snap.executing.iter())
            .copied()
            .collect();
        members.sort_unstable();
        members.dedup();
        assert_eq!(members.len(), total);
        assert!(snap.ready.len() + snap.executing.iter().count() <= 3);
        for part in &snap.memory {
            if let Some(occ) = part.occupant {
                let view = snap.procs.iter().find(|p| p.id == occ).unwrap();
                assert_eq!(view.partition, Some(part.id));
                assert_eq!(part.fragmentation, part.size - view.size);
            }
        }
    }

    let report = sim.report();
    assert!(report.complete);
    for s in &report.procs {
        match s.finish {
            Some(f) => {
                assert_eq!(s.turnaround, Some(f - s.arrival));
                assert!(s.wait.unwrap() + s.burst <= s.turnaround.unwrap());
            },
            None    => { assert!(s.size > 250); }
        }
    }
}

#[test]
fn tick_limit_cuts_the_run_short() {
    let mut config = SimConfig::default();
    config.max_ticks = Some(10);
    let (_, report) = run(config, vec![d(1, 10, 0, 100)]);
    assert!(!report.complete);
    assert_eq!(report.ticks, 10);
    assert_eq!(report.get(1).unwrap().finish, None);
    assert_eq!(report.get(1).unwrap().wait, Some(0));
}

#[test]
fn duplicate_ids_are_refused() {
    let res = Simulation::new(SimConfig::default(), vec![d(1, 10, 0, 1), d(1, 20, 0, 1)]);
    assert!(matches!(
        res,
        Err(SimError::Invariant(InvariantViolation::DuplicateProcess(1)))
    ));
}

#[test]
fn empty_workload() {
    let (snaps, report) = run(SimConfig::default(), vec![]);
    assert!(snaps.is_empty());
    assert_eq!(report.ticks, 0);
    assert!(close(report.throughput, 0.0));
}
//---END CONTROL LOOP

//---START EXTERNAL INTERFACES
#[test]
fn csv_loader_skips_bad_rows() {
    let procs = read_from_path("tests/data/procs.csv", None).unwrap();
    assert_eq!(procs.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 6, 3, 4, 2]);
    assert_eq!(procs[1], d(6, 300, 0, 2));
}

#[test]
fn csv_loader_honours_limit() {
    assert_eq!(read_from_path("tests/data/many.csv", Some(10)).unwrap().len(), 10);
    assert_eq!(read_from_path("tests/data/many.csv", None).unwrap().len(), 12);
    assert!(read_from_path("tests/data/missing.csv", None).is_err());
}

#[test]
fn gate_rejects_bad_descriptors() {
    let err = procset::init(vec![d(1, 10, 0, 1), d(1, 10, 0, 2)]).unwrap_err();
    assert_eq!(err.culprit, d(1, 10, 0, 2));
    let err = procset::init(vec![d(1, 10, 0, 0)]).unwrap_err();
    assert_eq!(err.message, "Process with 0 burst found!");
    let err = procset::init(vec![d(2, 0, 0, 3)]).unwrap_err();
    assert_eq!(err.culprit.id, 2);
}

#[test]
fn generated_workload_reads_back() {
    let mut rng = StdRng::seed_from_u64(42);
    let shape = LoadShape::default();
    let procs = procset::random_set(&mut rng, &shape, 8);
    assert!(procs.iter().all(|p| p.size >= 10 && p.size <= 250 && p.burst >= 1 && p.arrival <= 20));

    let path = std::env::temp_dir().join("partsim_generated_workload.csv");
    let mut w = BufWriter::new(std::fs::File::create(&path).unwrap());
    procset::write_csv(&mut w, &procs).unwrap();
    drop(w);
    let read = ProcCSVParser::new(path)
        .with_limit(None)
        .read_procs()
        .unwrap();
    assert_eq!(
        read.iter().map(|p| p.id).sorted().collect::<Vec<_>>(),
        (1..=8).collect::<Vec<ProcId>>()
    );
    assert!(read.iter().all(|p| procs.contains(p)));
}

#[test]
fn trace_survives_the_disk() {
    let trace = Trace::record(
        SimConfig::default(),
        vec![d(1, 50, 0, 10), d(2, 30, 3, 2), d(3, 400, 1, 1)]
    ).unwrap();
    let path = std::env::temp_dir().join("partsim_trace_roundtrip.json");
    write_trace(&trace, &path).unwrap();
    let back = read_trace(&path).unwrap();
    assert_eq!(back.config, trace.config);
    assert_eq!(back.snapshots, trace.snapshots);
    assert_eq!(back.report.procs, trace.report.procs);
    assert_eq!(back.report.timeline, trace.report.timeline);
}

#[test]
fn tables_mark_free_and_undefined() {
    let (snaps, report) = run(
        SimConfig::default(),
        vec![d(1, 300, 0, 2), d(2, 10, 0, 3)]
    );
    let mem = render::memory_table(snaps[0].os_reserved, &snaps[0].memory);
    assert!(mem.contains("OS"));
    assert!(mem.contains("Free"));
    let queues = render::queues_table(&snaps[0]);
    assert!(queues.contains("Suspended   1"));
    let stats = render::stats_table(&report);
    assert!(stats.contains("N/A"));
    assert!(stats.contains("Average"));
}
//---END EXTERNAL INTERFACES

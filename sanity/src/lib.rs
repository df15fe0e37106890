//! Offline checks for recorded `partsim` runs.
//!
//! A [`Trace`] carries enough to re-derive everything the engine
//! promises about a run, without re-running it: every snapshot must
//! describe a consistent system, and the final report must agree with
//! the CPU timeline it was computed from.
use partsim::*;
use rayon::prelude::*;
use thiserror::Error;

const EPSILON: f64 = 1e-9;

/// One broken promise, found in a [`Trace`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Finding {
    #[error("t={tick}: process {id} is not in exactly one collection matching its state")]
    Membership {
        tick:   Tick,
        id:     ProcId,
    },
    #[error("t={tick}: partition {part} and process {id} disagree on occupancy")]
    Asymmetric {
        tick:   Tick,
        part:   PartId,
        id:     ProcId,
    },
    #[error("t={tick}: process {id} is {state:?} but its partition is {held:?}")]
    Residency {
        tick:   Tick,
        id:     ProcId,
        state:  ProcState,
        held:   Option<PartId>,
    },
    #[error("t={tick}: partition {part} reports fragmentation {reported}, expected {expected:?}")]
    Fragmentation {
        tick:       Tick,
        part:       PartId,
        reported:   MemUnits,
        expected:   Option<MemUnits>,
    },
    #[error("t={tick}: {resident} processes resident with a degree of {degree}")]
    Degree {
        tick:       Tick,
        resident:   usize,
        degree:     usize,
    },
    #[error("t={tick}: snapshot out of order or taken for no reason")]
    Sequence {
        tick:   Tick,
    },
    #[error("process {id}: {what}")]
    Timing {
        id:     ProcId,
        what:   String,
    },
    #[error("process {id} never ran although some partition could hold it")]
    Stranded {
        id:     ProcId,
    },
    #[error("report: {0}")]
    Aggregate(String),
}

/// Runs every check over `trace`. An empty result means the run is
/// sound.
pub fn audit(trace: &Trace) -> Vec<Finding> {
    let degree = trace.config.degree;
    let mut findings = audit_sequence(trace);
    findings.extend(
        trace.snapshots
            .par_iter()
            .flat_map_iter(|s| audit_snapshot(s, degree))
            .collect::<Vec<_>>()
    );
    findings.extend(audit_report(trace));

    findings
}

/// Checks a single snapshot in isolation.
pub fn audit_snapshot(snap: &Snapshot, degree: usize) -> Vec<Finding> {
    let tick = snap.tick;
    let mut findings = vec![];

    let mut placed: HashMap<ProcId, Vec<ProcState>> = HashMap::new();
    let members = snap.pending.iter().map(|id| (*id, ProcState::New))
        .chain(snap.ready.iter().map(|id| (*id, ProcState::Ready)))
        .chain(snap.suspended.iter().map(|id| (*id, ProcState::Suspended)))
        .chain(snap.executing.iter().map(|id| (*id, ProcState::Executing)))
        .chain(snap.terminated.iter().map(|id| (*id, ProcState::Terminated)));
    for (id, state) in members {
        placed.entry(id).or_default().push(state);
    }
    for v in &snap.procs {
        let agrees = placed
            .remove(&v.id)
            .is_some_and(|states| states == [v.state]);
        if !agrees {
            findings.push(Finding::Membership { tick, id: v.id });
        }
    }
    // Whatever is left was listed without being known.
    findings.extend(
        placed.into_keys()
            .sorted_unstable()
            .map(|id| Finding::Membership { tick, id })
    );

    for part in &snap.memory {
        let Some(occ) = part.occupant else {
            if part.fragmentation != 0 {
                findings.push(Finding::Fragmentation {
                    tick,
                    part:       part.id,
                    reported:   part.fragmentation,
                    expected:   Some(0),
                });
            }
            continue;
        };
        let Some(view) = snap.procs.iter().find(|v| v.id == occ) else {
            findings.push(Finding::Asymmetric { tick, part: part.id, id: occ });
            continue;
        };
        if view.partition != Some(part.id) {
            findings.push(Finding::Asymmetric { tick, part: part.id, id: occ });
        }
        let expected = part.size.checked_sub(view.size);
        if expected != Some(part.fragmentation) {
            findings.push(Finding::Fragmentation {
                tick,
                part:       part.id,
                reported:   part.fragmentation,
                expected,
            });
        }
    }

    for v in &snap.procs {
        let resident = matches!(v.state, ProcState::Ready | ProcState::Executing);
        match v.partition {
            Some(held)  => {
                let agrees = snap.memory
                    .iter()
                    .any(|p| p.id == held && p.occupant == Some(v.id));
                if !agrees {
                    findings.push(Finding::Asymmetric { tick, part: held, id: v.id });
                }
                if !resident {
                    findings.push(Finding::Residency { tick, id: v.id, state: v.state, held: v.partition });
                }
            },
            None        => {
                if resident {
                    findings.push(Finding::Residency { tick, id: v.id, state: v.state, held: None });
                }
            }
        }
    }

    let resident = snap.ready.len() + snap.executing.iter().count();
    if resident > degree {
        findings.push(Finding::Degree { tick, resident, degree });
    }

    findings
}

/// Snapshots must come in strictly increasing tick order, each one
/// prompted by an arrival or a termination that really happened then.
pub fn audit_sequence(trace: &Trace) -> Vec<Finding> {
    let report = &trace.report;
    let mut findings = vec![];
    let mut last = None;
    for snap in &trace.snapshots {
        let tick = snap.tick;
        let ordered = last.map_or(true, |l| l < tick);
        let prompted = !snap.cause.arrived.is_empty() || snap.cause.terminated.is_some();
        let arrivals_hold = snap.cause.arrived
            .iter()
            .all(|id| report.get(*id).is_some_and(|s| s.arrival == tick));
        let termination_holds = snap.cause.terminated
            .map_or(true, |id| report.get(id).is_some_and(|s| s.finish == Some(tick + 1)));
        if !(ordered && prompted && arrivals_hold && termination_holds) {
            findings.push(Finding::Sequence { tick });
        }
        last = Some(tick);
    }

    findings
}

/// Re-derives every statistic of the report from its CPU timeline.
pub fn audit_report(trace: &Trace) -> Vec<Finding> {
    let report = &trace.report;
    let largest = trace.config.layout.partitions
        .iter()
        .copied()
        .max()
        .unwrap_or(0);
    let mut findings = vec![];
    if report.timeline.len() != report.ticks {
        findings.push(Finding::Aggregate(format!(
            "timeline covers {} ticks, run lasted {}",
            report.timeline.len(),
            report.ticks
        )));
    }

    for s in &report.procs {
        let mut wrong: Vec<String> = vec![];
        let ran: Vec<Tick> = report.timeline
            .iter()
            .positions(|slot| *slot == Some(s.id))
            .collect();
        if ran.first().is_some_and(|t| *t < s.arrival) {
            wrong.push(format!("ran before arriving at t={}", s.arrival));
        }
        if ran.first().copied() != s.first_exec {
            wrong.push(format!("first ran at {:?}, reported {:?}", ran.first(), s.first_exec));
        }
        if s.wait != s.first_exec.map(|t| t.saturating_sub(s.arrival)) {
            wrong.push(format!("wait {:?} does not match first execution {:?}", s.wait, s.first_exec));
        }
        match s.finish {
            Some(f) => {
                if ran.len() != s.burst {
                    wrong.push(format!("ran {} ticks for a burst of {}", ran.len(), s.burst));
                }
                if ran.last().map(|t| t + 1) != Some(f) {
                    wrong.push(format!("last ran at {:?} but finished at {}", ran.last(), f));
                }
                if s.turnaround != f.checked_sub(s.arrival) {
                    wrong.push(format!("turnaround {:?} for finish {}", s.turnaround, f));
                }
            },
            None    => {
                if s.turnaround.is_some() {
                    wrong.push(String::from("turnaround defined without a finish"));
                }
                if ran.len() >= s.burst {
                    wrong.push(format!("ran {} ticks without finishing a burst of {}", ran.len(), s.burst));
                }
                if report.complete && ran.is_empty() && s.size <= largest {
                    findings.push(Finding::Stranded { id: s.id });
                }
            }
        }
        findings.extend(wrong.into_iter().map(|what| Finding::Timing { id: s.id, what }));
    }

    let done: Vec<&ProcStats> = report.procs
        .iter()
        .filter(|s| s.finish.is_some())
        .collect();
    if done.len() != report.terminated {
        findings.push(Finding::Aggregate(format!(
            "{} processes finished, {} reported",
            done.len(),
            report.terminated
        )));
    }
    let throughput = if report.ticks > 0 {
        done.len() as f64 / report.ticks as f64
    } else { 0.0 };
    if (throughput - report.throughput).abs() > EPSILON {
        findings.push(Finding::Aggregate(format!(
            "throughput is {:.4}, reported {:.4}",
            throughput,
            report.throughput
        )));
    }
    if !done.is_empty() {
        let avg_turnaround = done.iter().filter_map(|s| s.turnaround).sum::<Tick>() as f64 / done.len() as f64;
        if (avg_turnaround - report.avg_turnaround).abs() > EPSILON {
            findings.push(Finding::Aggregate(format!(
                "average turnaround is {:.4}, reported {:.4}",
                avg_turnaround,
                report.avg_turnaround
            )));
        }
    }

    findings
}

/// Run-wide figures that the engine's report does not carry.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub ticks:              Tick,
    /// Ticks in which the CPU was not idle.
    pub busy:               Tick,
    pub utilisation:        f64,
    /// Most processes resident at once, over all snapshots.
    pub peak_resident:      usize,
    /// Worst total internal fragmentation, over all snapshots.
    pub peak_fragmentation: MemUnits,
}

impl Summary {
    pub fn new(trace: &Trace) -> Self {
        let ticks = trace.report.ticks;
        let busy = trace.report.timeline
            .iter()
            .filter(|slot| slot.is_some())
            .count();
        let utilisation = if ticks > 0 { busy as f64 / ticks as f64 } else { 0.0 };
        let peak_resident = trace.snapshots
            .iter()
            .map(|s| s.ready.len() + s.executing.iter().count())
            .max()
            .unwrap_or(0);
        let peak_fragmentation = trace.snapshots
            .iter()
            .map(|s| s.memory.iter().map(|p| p.fragmentation).sum::<MemUnits>())
            .max()
            .unwrap_or(0);

        Self { ticks, busy, utilisation, peak_resident, peak_fragmentation }
    }
}

pub mod plot {
    use plotters::prelude::*;
    use partsim::*;
    use std::{error::Error, path::Path};

    type PlotResult = Result<(), Box<dyn Error>>;

    /// One row per process, one filled cell per tick it held the CPU.
    pub fn plot_gantt(trace: &Trace, f: &Path) -> PlotResult {
        let ids: Vec<ProcId> = trace.report.procs
            .iter()
            .map(|s| s.id)
            .collect();
        let ticks = trace.report.ticks.max(1);
        let backend = BitMapBackend::new(f, (1920, 1080)).into_drawing_area();
        backend.fill(&WHITE)?;
        let backend = backend.margin(10u32, 10u32, 10u32, 10u32);

        let mut chart = ChartBuilder::on(&backend)
                            .caption("CPU", ("sans-serif", 30))
                            .x_label_area_size(20u32)
                            .y_label_area_size(60u32)
                            .build_cartesian_2d(0..ticks, 0..ids.len().max(1))?;

        chart
            .configure_mesh()
            .x_labels(10)
            .y_labels(ids.len().max(1))
            .y_label_formatter(&|row: &usize| ids.get(*row).map_or_else(String::new, |id| format!("P{}", id)))
            .draw()?;

        chart.draw_series(gantt_series(&trace.report, &ids))?;

        Ok(())
    }

    fn gantt_series(report: &Report, ids: &[ProcId]) -> Vec<Rectangle<(usize, usize)>> {
        let mut cells = vec![];
        // Contiguous runs of the same process become one bar.
        for (slot, group) in &report.timeline.iter().enumerate().chunk_by(|(_, slot)| **slot) {
            let Some(id) = slot else { continue };
            let Some(row) = ids.iter().position(|i| *i == id) else { continue };
            let ticks: Vec<Tick> = group.map(|(t, _)| t).collect();
            let (Some(first), Some(last)) = (ticks.first(), ticks.last()) else { continue };
            cells.push(Rectangle::new(
                [(*first, row), (last + 1, row + 1)],
                Palette99::pick(row).filled()
            ));
        }

        cells
    }

    /// Memory over time: partition outlines, and one filled box per
    /// stay of a process, as tall as the process itself.
    pub fn plot_partitions(trace: &Trace, f: &Path) -> PlotResult {
        let layout = &trace.config.layout;
        let ticks = trace.report.ticks.max(1);
        let backend = BitMapBackend::new(f, (1920, 1080)).into_drawing_area();
        backend.fill(&WHITE)?;
        let backend = backend.margin(10u32, 10u32, 10u32, 10u32);

        let mut chart = ChartBuilder::on(&backend)
                            .caption("Partitions", ("sans-serif", 30))
                            .x_label_area_size(20u32)
                            .y_label_area_size(60u32)
                            .build_cartesian_2d(0..ticks, 0..layout.total + 1)?;

        chart
            .configure_mesh()
            .x_labels(10)
            .y_labels(10)
            .draw()?;

        chart.draw_series(outline_series(trace, ticks))?;
        chart.draw_series(stay_series(trace, ticks))?;

        Ok(())
    }

    fn outline_series(trace: &Trace, ticks: Tick) -> Vec<Rectangle<(usize, usize)>> {
        let Some(first) = trace.snapshots.first() else { return vec![] };
        let mut outlines = vec![Rectangle::new(
            [(0, 0), (ticks, first.os_reserved)],
            BLACK.mix(0.3).filled()
        )];
        for part in &first.memory {
            outlines.push(Rectangle::new(
                [(0, part.start), (ticks, part.start + part.size)],
                ShapeStyle {
                    color: BLACK.into(),
                    filled: false,
                    stroke_width: 1,
                }
            ));
        }

        outlines
    }

    fn stay_series(trace: &Trace, ticks: Tick) -> Vec<Rectangle<(usize, usize)>> {
        // (process, partition) -> tick the stay was first observed.
        let mut stays: Vec<((ProcId, PartId), Tick)> = vec![];
        for snap in &trace.snapshots {
            for part in &snap.memory {
                let Some(occ) = part.occupant else { continue };
                if !stays.iter().any(|(k, _)| *k == (occ, part.id)) {
                    stays.push(((occ, part.id), snap.tick));
                }
            }
        }

        stays.into_iter()
            .filter_map(|((id, part), from)| {
                let view = trace.snapshots.first()?.memory.iter().find(|p| p.id == part)?;
                let stats = trace.report.get(id)?;
                let until = stats.finish.unwrap_or(ticks);
                Some(Rectangle::new(
                    [(from, view.start), (until, view.start + stats.size)],
                    Palette99::pick(id as usize).mix(0.8).filled()
                ))
            })
            .collect()
    }
}

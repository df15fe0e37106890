//! Plain-text tables for snapshots and reports.
use crate::helpe::*;

const EMPTY: &str = "---";
const UNDEFINED: &str = "N/A";

fn or_undefined(v: Option<Tick>) -> String {
    v.map_or_else(|| UNDEFINED.to_string(), |t| t.to_string())
}

fn id_list(ids: &[ProcId]) -> String {
    if ids.is_empty() { EMPTY.to_string() } else { ids.iter().join(", ") }
}

/// The partition table, with the OS-reserved region as its first row.
pub fn memory_table(os_reserved: MemUnits, rows: &[PartitionView]) -> String {
    let mut out = format!(
        "{:<10} {:>7} {:>7} {:>8} {:>10}\n",
        "Partition", "Start", "Size", "Process", "Int. frag"
    );
    out.push_str(&format!(
        "{:<10} {:>7} {:>7} {:>8} {:>10}\n",
        "OS", 0, os_reserved, "OS", EMPTY
    ));
    for r in rows {
        let (occupant, frag) = match r.occupant {
            Some(id)    => (id.to_string(), r.fragmentation.to_string()),
            None        => ("Free".to_string(), EMPTY.to_string()),
        };
        out.push_str(&format!(
            "{:<10} {:>7} {:>7} {:>8} {:>10}\n",
            r.id, r.start, r.size, occupant, frag
        ));
    }

    out
}

pub fn queues_table(snap: &Snapshot) -> String {
    let executing: Vec<ProcId> = snap.executing.into_iter().collect();
    [
        ("Executing", &executing[..]),
        ("Ready", &snap.ready[..]),
        ("Suspended", &snap.suspended[..]),
        ("Pending", &snap.pending[..]),
        ("Terminated", &snap.terminated[..]),
    ].iter()
        .map(|(name, ids)| format!("{:<11} {}\n", name, id_list(ids)))
        .collect()
}

pub fn snapshot(snap: &Snapshot) -> String {
    let mut out = format!("=== t = {} ", snap.tick);
    if !snap.cause.arrived.is_empty() {
        out.push_str(&format!("| arrived: {} ", id_list(&snap.cause.arrived)));
    }
    if let Some(id) = snap.cause.terminated {
        out.push_str(&format!("| terminated: {} ", id));
    }
    out.push('\n');
    out.push_str(&memory_table(snap.os_reserved, &snap.memory));
    out.push('\n');
    out.push_str(&queues_table(snap));

    out
}

pub fn stats_table(report: &Report) -> String {
    let mut out = format!(
        "{:<8} {:>8} {:>8} {:>8} {:>11} {:>8}\n",
        "Process", "Arrival", "Burst", "Finish", "Turnaround", "Wait"
    );
    for s in &report.procs {
        out.push_str(&format!(
            "{:<8} {:>8} {:>8} {:>8} {:>11} {:>8}\n",
            s.id,
            s.arrival,
            s.burst,
            or_undefined(s.finish),
            or_undefined(s.turnaround),
            or_undefined(s.wait)
        ));
    }
    out.push_str(&format!(
        "{:<8} {:>8} {:>8} {:>8} {:>11.2} {:>8.2}\n",
        "Average", EMPTY, EMPTY, EMPTY, report.avg_turnaround, report.avg_wait
    ));
    out.push_str(&format!(
        "Throughput:\t{} / {} = {:.3} processes per tick\n",
        report.terminated, report.ticks, report.throughput
    ));
    if !report.complete {
        out.push_str("Run was cut short by the tick limit.\n");
    }

    out
}

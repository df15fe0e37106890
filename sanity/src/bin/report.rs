use sanity::*;
use partsim::*;
use anyhow::{anyhow, bail};

/// An utility for auditing recorded
/// partition-simulator runs.
#[derive(Parser, Debug)]
struct Arg {
    /// Path to a JSON trace, as written by `partsim --trace`
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    input:          PathBuf,

    /// Draw a CPU Gantt chart into this PNG
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    gantt:          Option<PathBuf>,

    /// Draw a partition occupancy chart into this PNG
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    memory:         Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Arg::parse();
    if !cli.input.is_file() {
        bail!("{:?} does not exist", cli.input);
    }
    let trace = read_trace(&cli.input)?;
    log::info!(
        "Auditing {} snapshots over {} ticks",
        trace.snapshots.len(),
        trace.report.ticks
    );

    let summary = Summary::new(&trace);
    println!(
        "Ticks:\t\t\t{}\nCPU busy:\t\t{} ({:.2}%)\nTerminated:\t\t{} / {}\nPeak resident:\t\t{}\nPeak fragmentation:\t{} units",
        summary.ticks,
        summary.busy,
        summary.utilisation * 100.0,
        trace.report.terminated,
        trace.report.procs.len(),
        summary.peak_resident,
        summary.peak_fragmentation
    );

    if let Some(out) = &cli.gantt {
        plot::plot_gantt(&trace, out).map_err(|e| anyhow!("{}", e))?;
    }
    if let Some(out) = &cli.memory {
        plot::plot_partitions(&trace, out).map_err(|e| anyhow!("{}", e))?;
    }

    let findings = audit(&trace);
    if findings.is_empty() {
        println!("Trace is sound.");
        return Ok(());
    }
    for f in &findings {
        eprintln!("{}", f);
    }

    bail!("{} findings", findings.len())
}

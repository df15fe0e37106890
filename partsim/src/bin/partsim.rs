use partsim::*;
use partsim::{
    config::DEFAULT_DEGREE,
    procset::{self, DEFAULT_MAX_PROCS},
    render,
};
use rayon::prelude::*;
use std::time::Instant;

/// A fixed-partition memory and SRTF scheduling simulator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a CSV of processes (id,size,arrival,burst)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    input:          PathBuf,

    /// Partition layout
    #[arg(short, long, value_enum, default_value_t = Preset::Standard)]
    preset:         Preset,

    /// Custom partition sizes, e.g. 250,150,50. Overrides the preset
    #[arg(long, value_delimiter = ',')]
    partitions:     Option<Vec<MemUnits>>,

    /// Memory reserved for the OS, used with custom partitions
    #[arg(long, default_value_t = 100)]
    os_reserved:    MemUnits,

    /// Total memory (defaults to OS plus partitions)
    #[arg(long)]
    total:          Option<MemUnits>,

    /// Degree of multiprogramming
    #[arg(short, long, default_value_t = DEFAULT_DEGREE)]
    degree:         usize,

    /// Maximum number of processes read from the input (0 for no limit)
    #[arg(long, default_value_t = DEFAULT_MAX_PROCS)]
    max_procs:      usize,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks:      Option<Tick>,

    /// Record the whole run as JSON
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    trace:          Option<PathBuf>,

    /// Print the final statistics only
    #[arg(short, long)]
    quiet:          bool,

    /// Wait for Enter after every snapshot
    #[arg(long, conflicts_with = "quiet")]
    step:           bool,

    /// Run every degree from 1 up to --degree and compare
    #[arg(long)]
    sweep:          bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Preset {
    /// OS 100, then 250, 150 and 50
    Standard,
    /// OS 100, then 60, 120 and 250
    Alternate,
}

impl Preset {
    fn layout(self) -> MemoryLayout {
        match self {
            Preset::Standard    => MemoryLayout::standard(),
            Preset::Alternate   => MemoryLayout::alternate(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Args::parse();
    anyhow::ensure!(cli.input.is_file(), "Invalid input path: {:?}", cli.input);

    let limit = if cli.max_procs == 0 { None } else { Some(cli.max_procs) };
    let descrs = ProcCSVParser::new(cli.input.clone())
        .with_limit(limit)
        .read_procs()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let descrs = procset::init(descrs)?;

    let layout = match cli.partitions {
        Some(sizes) => MemoryLayout::new(cli.os_reserved, sizes),
        None        => cli.preset.layout(),
    };
    let layout = match cli.total {
        Some(t) => layout.with_total(t),
        None    => layout,
    };
    let mut config = SimConfig::new(cli.degree, layout);
    config.max_ticks = cli.max_ticks;
    config.validate()?;

    if cli.sweep {
        return sweep(&config, &descrs);
    }

    let total = Instant::now();
    let mut sim = Simulation::new(config.clone(), descrs)?;
    let mut snapshots = vec![];
    for snap in sim.by_ref() {
        let snap = snap?;
        if !cli.quiet {
            println!("{}", render::snapshot(&snap));
            if cli.step { wait_for_enter()?; }
        }
        if cli.trace.is_some() {
            snapshots.push(snap);
        }
    }
    let report = sim.report();
    println!("{}", render::stats_table(&report));
    println!("Total simulation time: {} μs", total.elapsed().as_micros());

    if let Some(path) = cli.trace {
        write_trace(&Trace { config, snapshots, report }, &path)?;
        println!("Trace written to {:?}", path);
    }

    Ok(())
}

/// Same workload, every degree from 1 to the configured one, in parallel.
fn sweep(config: &SimConfig, descrs: &[ProcDescr]) -> anyhow::Result<()> {
    let rows = (1..=config.degree)
        .into_par_iter()
        .map(|degree| -> Result<(usize, Report), SimError> {
            let mut cfg = config.clone();
            cfg.degree = degree;
            let (_, report) = Simulation::new(cfg, descrs.to_vec())?.run()?;

            Ok((degree, report))
        })
        .collect::<Result<Vec<_>, _>>()?;

    println!(
        "{:<7} {:>6} {:>11} {:>11} {:>8} {:>11}",
        "Degree", "Ticks", "Terminated", "Turnaround", "Wait", "Throughput"
    );
    for (degree, r) in rows {
        println!(
            "{:<7} {:>6} {:>11} {:>11.2} {:>8.2} {:>11.3}",
            degree, r.ticks, r.terminated, r.avg_turnaround, r.avg_wait, r.throughput
        );
    }

    Ok(())
}

fn wait_for_enter() -> anyhow::Result<()> {
    print!("Press Enter to continue...");
    std::io::stdout().flush()?;
    let mut buf = String::new();
    std::io::stdin().read_line(&mut buf)?;

    Ok(())
}

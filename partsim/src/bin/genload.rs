use partsim::*;
use partsim::procset::{self, LoadShape};
use rand::{rngs::StdRng, SeedableRng};
use std::fs::File;

/// A random workload generator for partsim
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of processes
    #[arg(short, long, default_value_t = 10)]
    count:          u32,

    /// Smallest process size
    #[arg(long, default_value_t = 10)]
    min_size:       MemUnits,

    /// Largest process size
    #[arg(long, default_value_t = 250)]
    max_size:       MemUnits,

    /// Latest arrival time
    #[arg(long, default_value_t = 20)]
    max_arrival:    Tick,

    /// Shortest burst
    #[arg(long, default_value_t = 1)]
    min_burst:      Tick,

    /// Longest burst
    #[arg(long, default_value_t = 10)]
    max_burst:      Tick,

    /// Seed, for reproducible workloads
    #[arg(short, long)]
    seed:           Option<u64>,

    /// Where to write the CSV (stdout if absent)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    output:         Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Args::parse();
    anyhow::ensure!(cli.min_size <= cli.max_size, "Bad size range");
    anyhow::ensure!(cli.min_burst <= cli.max_burst, "Bad burst range");

    let shape = LoadShape {
        size:       (cli.min_size, cli.max_size),
        arrival:    (0, cli.max_arrival),
        burst:      (cli.min_burst, cli.max_burst),
    };
    let mut rng = match cli.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None    => StdRng::from_entropy(),
    };
    let procs = procset::random_set(&mut rng, &shape, cli.count);

    match cli.output {
        Some(path)  => {
            let mut w = BufWriter::new(File::create(&path)?);
            procset::write_csv(&mut w, &procs)?;
            log::info!("Wrote {} processes to {:?}", procs.len(), path);
        },
        None        => {
            procset::write_csv(&mut std::io::stdout().lock(), &procs)?;
        }
    }

    Ok(())
}

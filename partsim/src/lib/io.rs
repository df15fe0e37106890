use crate::helpe::*;
use std::{fs::File, path::Path};

/// A complete recorded run: what it was configured with, everything it
/// let us observe and how it ended. This is what `sanity` audits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub config:     SimConfig,
    pub snapshots:  Vec<Snapshot>,
    pub report:     Report,
}

impl Trace {
    pub fn record(config: SimConfig, descrs: Vec<ProcDescr>) -> Result<Self, SimError> {
        let (snapshots, report) = Simulation::new(config.clone(), descrs)?.run()?;

        Ok(Self { config, snapshots, report })
    }
}

pub fn write_trace(trace: &Trace, path: &Path) -> anyhow::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut w, trace)?;
    w.flush()?;

    Ok(())
}

pub fn read_trace(path: &Path) -> anyhow::Result<Trace> {
    let r = BufReader::new(File::open(path)?);

    Ok(serde_json::from_reader(r)?)
}

use crate::helpe::*;
use log::warn;

/// Rows read from a CSV unless told otherwise.
pub const DEFAULT_MAX_PROCS: usize = 10;

/// Checks a set of descriptors before a run sees them.
/// A successfully returned set is guaranteed to be compliant with all
/// of `partsim`'s assumptions:
/// - no process has zero size
/// - no process has zero burst
/// - no two processes share an id
///
/// The set comes back sorted by arrival. Sorting is stable: processes
/// arriving together keep their input order.
pub fn init(mut in_elts: Vec<ProcDescr>) -> Result<Vec<ProcDescr>, ProcError> {
    let mut seen: HashSet<ProcId> = HashSet::with_capacity(in_elts.len());
    let mut fault = None;
    for (idx, d) in in_elts.iter().enumerate() {
        let message = if d.size == 0 {
            "Process with 0 size found!"
        } else if d.burst == 0 {
            "Process with 0 burst found!"
        } else if !seen.insert(d.id) {
            "Process with duplicate id found!"
        } else { continue; };
        fault = Some((idx, message));
        break;
    }
    if let Some((idx, message)) = fault {
        return Err(ProcError {
            message: String::from(message),
            culprit: in_elts.remove(idx),
        });
    }
    in_elts.sort_by_key(|d| d.arrival);

    Ok(in_elts)
}

/// Defines the interface for reading process descriptors.
///
/// We ship a reader for the four-column CSV of the classic exercise.
/// The user can implement their own types as needed.
pub trait ProcGen<T> {
    /// Either a set of descriptors is successfully returned, or some
    /// arbitrary type that implements [std::error::Error].
    fn read_procs(&self) -> Result<Vec<ProcDescr>, Box<dyn std::error::Error>>;
    /// Uses some available data to spawn one [ProcDescr]. `None` if
    /// the data does not describe a process.
    fn gen_single(&self, d: T) -> Option<ProcDescr>;
}

/// `id,size,arrival,burst`, one process per line, with a header.
///
/// Rows that do not hold exactly four non-negative integers are
/// skipped with a warning. Reading stops after
/// [`limit`](ProcCSVParser::limit) processes, if one is set.
pub struct ProcCSVParser {
    pub path:   PathBuf,
    pub limit:  Option<usize>,
}

impl ProcCSVParser {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            limit: Some(DEFAULT_MAX_PROCS),
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

impl ProcGen<&str> for ProcCSVParser {
    fn read_procs(&self) -> Result<Vec<ProcDescr>, Box<dyn std::error::Error>> {
        let mut res = vec![];
        let fd = std::fs::File::open(self.path.as_path())?;
        let reader = BufReader::new(fd);
        for line in reader.lines()
            // First line is the header!
            .skip(1) {
            let line = line?;
            if line.trim().is_empty() { continue; }
            if self.limit.is_some_and(|l| res.len() >= l) {
                warn!("Limit of {} processes reached, ignoring the rest", res.len());
                break;
            }
            match self.gen_single(line.as_str()) {
                Some(d) => { res.push(d); },
                None    => { warn!("Skipping malformed row: {}", line); }
            }
        }
        if res.is_empty() {
            return Err(format!("No processes could be read from {:?}", self.path).into());
        }
        res.sort_by_key(|d| d.arrival);

        Ok(res)
    }

    fn gen_single(&self, d: &str) -> Option<ProcDescr> {
        let fields: Vec<usize> = d.split(',')
            .map(|x| x.trim().parse::<usize>())
            .collect::<Result<_, _>>()
            .ok()?;
        if fields.len() != 4 { return None; }
        let id = ProcId::try_from(fields[0]).ok()?;

        Some(ProcDescr::new(id, fields[1], fields[2], fields[3]))
    }
}

/// Ranges a random workload is drawn from. All bounds are inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadShape {
    pub size:       (MemUnits, MemUnits),
    pub arrival:    (Tick, Tick),
    pub burst:      (Tick, Tick),
}

impl Default for LoadShape {
    fn default() -> Self {
        Self {
            size:       (10, 250),
            arrival:    (0, 20),
            burst:      (1, 10),
        }
    }
}

/// Draws `count` processes with ids `1..=count`, uniformly within `shape`.
/// Zero sizes and bursts are bumped to 1 so that the result always
/// passes [`init`].
pub fn random_set<R: rand::Rng>(rng: &mut R, shape: &LoadShape, count: u32) -> Vec<ProcDescr> {
    (1..=count)
        .map(|id| {
            ProcDescr::new(
                id,
                rng.gen_range(shape.size.0..=shape.size.1).max(1),
                rng.gen_range(shape.arrival.0..=shape.arrival.1),
                rng.gen_range(shape.burst.0..=shape.burst.1).max(1),
            )
        })
        .collect()
}

/// Writes descriptors in the format [`ProcCSVParser`] reads.
pub fn write_csv<W: Write>(w: &mut W, procs: &[ProcDescr]) -> std::io::Result<()> {
    writeln!(w, "id,size,arrival,burst")?;
    for d in procs {
        writeln!(w, "{},{},{},{}", d.id, d.size, d.arrival, d.burst)?;
    }

    w.flush()
}

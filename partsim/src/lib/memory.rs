use crate::helpe::*;

/// How physical memory is carved up before the first tick.
///
/// The lowest [`os_reserved`](MemoryLayout::os_reserved) units belong
/// to the operating system. The user partitions follow back to back, in
/// the given order, and never change for the rest of the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLayout {
    pub total:          MemUnits,
    pub os_reserved:    MemUnits,
    pub partitions:     Vec<MemUnits>,
}

impl MemoryLayout {
    /// Total memory is whatever the OS and the partitions add up to.
    pub fn new(os_reserved: MemUnits, partitions: Vec<MemUnits>) -> Self {
        let total = os_reserved + partitions.iter().sum::<MemUnits>();
        Self { total, os_reserved, partitions }
    }

    pub fn with_total(mut self, total: MemUnits) -> Self {
        self.total = total;
        self
    }

    /// 100 units for the OS, then 250, 150 and 50 for
    /// large, medium and small jobs.
    pub fn standard() -> Self {
        Self::new(100, vec![250, 150, 50])
    }

    pub fn alternate() -> Self {
        Self::new(100, vec![60, 120, 250])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partitions.is_empty() {
            return Err(ConfigError::NoPartitions);
        }
        if let Some((idx, _)) = self.partitions
            .iter()
            .find_position(|s| **s == 0) {
                return Err(ConfigError::ZeroPartition(idx + 1));
        }
        let needed = self.os_reserved + self.partitions.iter().sum::<MemUnits>();
        if needed > self.total {
            return Err(ConfigError::Overcommitted { needed, total: self.total });
        }

        Ok(())
    }
}

/// A fixed memory region. Holds at most one process at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub id:             PartId,
    pub size:           MemUnits,
    /// Purely descriptive. Nothing in the engine looks at it.
    pub start:          MemUnits,
    occupant:           Option<ProcId>,
    fragmentation:      MemUnits,
}

impl Partition {
    fn new(id: PartId, size: MemUnits, start: MemUnits) -> Self {
        Self {
            id,
            size,
            start,
            occupant:       None,
            fragmentation:  0,
        }
    }

    #[inline]
    pub fn is_free(&self) -> bool { self.occupant.is_none() }

    #[inline]
    pub fn occupant(&self) -> Option<ProcId> { self.occupant }

    /// Unused space inside the partition. Zero while free.
    #[inline]
    pub fn fragmentation(&self) -> MemUnits { self.fragmentation }

    pub fn view(&self) -> PartitionView {
        PartitionView {
            id:             self.id,
            start:          self.start,
            size:           self.size,
            occupant:       self.occupant,
            fragmentation:  self.fragmentation,
        }
    }
}

/// Plain-data row of the partition table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionView {
    pub id:             PartId,
    pub start:          MemUnits,
    pub size:           MemUnits,
    pub occupant:       Option<ProcId>,
    pub fragmentation:  MemUnits,
}

/// Sole owner of the partitions, and sole writer of the occupancy
/// relation between partitions and processes. Both sides are always
/// updated together, so that `process.partition() == Some(p)` holds iff
/// partition `p` reports that process as its occupant.
///
/// Partition counts are small and fixed, so a flat vector scanned
/// linearly is all we need.
#[derive(Clone, Debug)]
pub struct MemoryAllocator {
    parts: Vec<Partition>,
}

impl MemoryAllocator {
    pub fn new(layout: &MemoryLayout) -> Result<Self, ConfigError> {
        layout.validate()?;
        let mut start = layout.os_reserved;
        let mut parts = Vec::with_capacity(layout.partitions.len());
        for (idx, size) in layout.partitions.iter().enumerate() {
            parts.push(Partition::new(idx as PartId + 1, *size, start));
            start += size;
        }

        Ok(Self { parts })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.parts
    }

    pub fn get(&self, id: PartId) -> Option<&Partition> {
        self.slot(id).map(|idx| &self.parts[idx])
    }

    // Ids are handed out in layout order starting at 1.
    fn slot(&self, id: PartId) -> Option<usize> {
        let idx = (id as usize).checked_sub(1)?;
        if idx < self.parts.len() { Some(idx) } else { None }
    }

    /// Among free partitions large enough for `p`, the one that
    /// wastes the least. Ties go to the lowest id.
    ///
    /// `None` means "does not fit right now". Whether it could *ever*
    /// fit is answered by [`MemoryAllocator::could_ever_fit`].
    pub fn find_best_fit(&self, p: &Process) -> Option<PartId> {
        self.parts
            .iter()
            .filter(|part| part.is_free() && part.size >= p.size())
            // `min_by_key` keeps the first of equal minima.
            .min_by_key(|part| part.size - p.size())
            .map(|part| part.id)
    }

    /// Links `p` to its best-fit partition. On failure nothing is
    /// touched and the caller decides what becomes of `p`.
    pub fn allocate(&mut self, p: &mut Process) -> Result<bool, InvariantViolation> {
        if let Some(held) = p.partition {
            return Err(InvariantViolation::DoubleAdmission(p.id(), held));
        }
        match self.find_best_fit(p).and_then(|id| self.slot(id)) {
            Some(idx) => {
                let part = &mut self.parts[idx];
                part.occupant = Some(p.id());
                part.fragmentation = part.size - p.size();
                p.partition = Some(part.id);

                Ok(true)
            },
            None    => Ok(false),
        }
    }

    /// Breaks both sides of the link held by `p`. Returns the freed
    /// partition.
    pub fn free(&mut self, p: &mut Process) -> Result<PartId, InvariantViolation> {
        let held = p.partition.ok_or(InvariantViolation::NotResident(p.id()))?;
        let idx = self.slot(held).ok_or(InvariantViolation::Asymmetric(held))?;
        let part = &mut self.parts[idx];
        if part.occupant != Some(p.id()) {
            return Err(InvariantViolation::Asymmetric(held));
        }
        part.occupant = None;
        part.fragmentation = 0;
        p.partition = None;

        Ok(held)
    }

    /// `true` if some partition, free or not, is large enough.
    pub fn could_ever_fit(&self, size: MemUnits) -> bool {
        self.parts
            .iter()
            .any(|part| part.size >= size)
    }

    pub fn table(&self) -> Vec<PartitionView> {
        self.parts
            .iter()
            .map(|part| part.view())
            .collect()
    }
}

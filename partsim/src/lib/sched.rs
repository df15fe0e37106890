use crate::helpe::*;

/// Shortest Remaining Time First, with preemption.
///
/// The scheduler carries no state of its own. Every decision is a pure
/// function of the processes handed to it, which is why everything
/// here is an associated function.
pub struct Scheduler;

impl Scheduler {
    /// The ready process with the least remaining work.
    ///
    /// SRTF alone leaves ties open, so they are broken by earliest
    /// arrival and then by lowest id. Same input, same pick.
    pub fn select_next<'a, I>(ready: I) -> Option<&'a Process>
    where I: IntoIterator<Item = &'a Process> {
        ready.into_iter()
            .min_by_key(|p| (p.remaining, p.arrival(), p.id()))
    }

    /// `true` iff some ready process needs strictly less than what
    /// `running` still needs. Equality never preempts.
    pub fn should_preempt<'a, I>(running: &Process, ready: I) -> bool
    where I: IntoIterator<Item = &'a Process> {
        ready.into_iter()
            .any(|p| p.remaining < running.remaining)
    }
}

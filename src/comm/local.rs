//! In-process simulated communicators
//!
//! A [`LocalUniverse`] runs every simulated process on its own scoped thread. The
//! processes of a communicator share a context holding an all-gather exchange, and
//! each split derives child contexts from it, so grids can be built and checked
//! without an MPI launcher.
use crate::comm::{Communicator, ProcessGroup};
use crate::types::{GridError, Result};
use itertools::{Either, Itertools};
use log::trace;
use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread;

#[derive(Debug, Clone, Copy)]
struct SplitEntry {
    color: Option<usize>,
    key: usize,
}

struct Exchange {
    generation: u64,
    arrived: usize,
    entries: Vec<Option<SplitEntry>>,
    gathered: Arc<Vec<SplitEntry>>,
}

/// State shared by every context of one universe.
struct Shared {
    aborted: AtomicBool,
    contexts: Mutex<Vec<Weak<Context>>>,
}

impl Shared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            aborted: AtomicBool::new(false),
            contexts: Mutex::new(vec![]),
        })
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Fail every pending and future exchange of the universe.
    ///
    /// Returns `true` for the first call.
    fn abort(&self) -> bool {
        let first = !self.aborted.swap(true, Ordering::SeqCst);
        let live = self
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .collect::<Vec<_>>();
        for context in live {
            // Notifying under the lock orders the wake-up after any waiter's flag check
            let _exchange = context
                .exchange
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            context.completed.notify_all();
        }
        first
    }
}

/// A child context waiting for its members to pick it up.
struct PendingChild {
    context: Arc<Context>,
    remaining: usize,
}

struct Context {
    /// Universe-wide process ids in rank order
    members: Arc<Vec<usize>>,
    shared: Arc<Shared>,
    exchange: Mutex<Exchange>,
    completed: Condvar,
    children: Mutex<HashMap<(u64, usize), PendingChild>>,
}

fn poisoned<T>(_: PoisonError<T>) -> GridError {
    GridError::CollectiveFailure(
        "a simulated process panicked during a collective call".to_string(),
    )
}

fn aborted() -> GridError {
    GridError::CollectiveFailure("another simulated process panicked".to_string())
}

impl Context {
    fn new(shared: &Arc<Shared>, members: Vec<usize>) -> Arc<Self> {
        let size = members.len();
        let context = Arc::new(Self {
            members: Arc::new(members),
            shared: Arc::clone(shared),
            exchange: Mutex::new(Exchange {
                generation: 0,
                arrived: 0,
                entries: vec![None; size],
                gathered: Arc::new(vec![]),
            }),
            completed: Condvar::new(),
            children: Mutex::new(HashMap::new()),
        });
        let mut contexts = shared
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        contexts.retain(|c| c.strong_count() > 0);
        contexts.push(Arc::downgrade(&context));
        context
    }

    /// Block until every member has contributed, then return all entries in rank order.
    fn all_gather(&self, rank: usize, entry: SplitEntry) -> Result<Arc<Vec<SplitEntry>>> {
        let mut exchange = self.exchange.lock().map_err(poisoned)?;
        if self.shared.is_aborted() {
            return Err(aborted());
        }
        let generation = exchange.generation;
        exchange.entries[rank] = Some(entry);
        exchange.arrived += 1;

        if exchange.arrived == self.members.len() {
            let gathered = exchange
                .entries
                .iter_mut()
                .map(Option::take)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    GridError::CollectiveFailure(
                        "a process contributed twice to the same exchange".to_string(),
                    )
                })?;
            exchange.gathered = Arc::new(gathered);
            exchange.arrived = 0;
            exchange.generation += 1;
            self.completed.notify_all();
            return Ok(Arc::clone(&exchange.gathered));
        }

        while exchange.generation == generation {
            if self.shared.is_aborted() {
                return Err(aborted());
            }
            exchange = self.completed.wait(exchange).map_err(poisoned)?;
        }
        Ok(Arc::clone(&exchange.gathered))
    }

    /// Take a handle on the context of one part of a split.
    ///
    /// The part is forgotten once each of its members has taken it, so only the
    /// communicators keep it alive.
    fn child(&self, split: u64, color: usize, members: Vec<usize>) -> Result<Arc<Context>> {
        let mut children = self.children.lock().map_err(poisoned)?;
        let pending = children
            .entry((split, color))
            .or_insert_with(|| PendingChild {
                remaining: members.len(),
                context: Context::new(&self.shared, members),
            });
        let context = Arc::clone(&pending.context);
        pending.remaining -= 1;
        if pending.remaining == 0 {
            children.remove(&(split, color));
        }
        Ok(context)
    }
}

/// A set of simulated processes.
pub struct LocalUniverse {
    size: usize,
}

impl LocalUniverse {
    /// Create a universe of `size` processes.
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    /// Number of processes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `f` once per process with that process's world communicator.
    ///
    /// The results are returned in rank order. When a process panics, the
    /// collective calls its peers are blocked in fail with
    /// [`GridError::CollectiveFailure`], and the first panic is resumed on the
    /// calling thread once every process has finished.
    pub fn run<F, R>(&self, f: F) -> Vec<R>
    where
        F: Fn(LocalComm) -> R + Sync,
        R: Send,
    {
        let shared = Shared::new();
        let world = Context::new(&shared, (0..self.size).collect());
        let f = &f;
        let outcomes = thread::scope(|scope| {
            let handles = (0..self.size)
                .map(|rank| {
                    let comm = LocalComm::new(Arc::clone(&world), rank);
                    let shared = Arc::clone(&shared);
                    scope.spawn(move || {
                        panic::catch_unwind(AssertUnwindSafe(move || f(comm)))
                            .map_err(|payload| (shared.abort(), payload))
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                .collect::<Vec<_>>()
        });

        let (results, panics): (Vec<_>, Vec<_>) =
            outcomes.into_iter().partition_map(|outcome| match outcome {
                Ok(result) => Either::Left(result),
                Err(panic) => Either::Right(panic),
            });
        if let Some((_, payload)) = panics.into_iter().max_by_key(|(first, _)| *first) {
            panic::resume_unwind(payload);
        }
        results
    }
}

/// The group of a [`LocalComm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalGroup {
    members: Arc<Vec<usize>>,
    process: usize,
}

impl LocalGroup {
    /// Universe-wide process ids of the members in rank order.
    pub fn members(&self) -> &[usize] {
        &self.members
    }
}

impl ProcessGroup for LocalGroup {
    fn size(&self) -> usize {
        self.members.len()
    }

    fn rank(&self) -> Option<usize> {
        self.members.iter().position(|&p| p == self.process)
    }

    fn translate_rank(&self, rank: usize, other: &Self) -> Option<usize> {
        let process = self.members.get(rank)?;
        other.members.iter().position(|p| p == process)
    }

    fn include(&self, ranks: &[usize]) -> Result<Self> {
        if !ranks.iter().all_unique() {
            return Err(GridError::InvalidArgument(format!(
                "ranks {ranks:?} contain duplicates"
            )));
        }
        let members = ranks
            .iter()
            .map(|&rank| {
                self.members.get(rank).copied().ok_or_else(|| {
                    GridError::InvalidArgument(format!(
                        "rank {rank} is outside a group of {} processes",
                        self.members.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            members: Arc::new(members),
            process: self.process,
        })
    }
}

/// A simulated communicator handle owned by one process.
pub struct LocalComm {
    context: Arc<Context>,
    rank: usize,
    splits: Cell<u64>,
}

impl LocalComm {
    fn new(context: Arc<Context>, rank: usize) -> Self {
        Self {
            context,
            rank,
            splits: Cell::new(0),
        }
    }

    /// A communicator containing only the calling process.
    pub fn solo() -> Self {
        Self::new(Context::new(&Shared::new(), vec![0]), 0)
    }

    /// Universe-wide id of the calling process.
    pub fn process(&self) -> usize {
        self.context.members[self.rank]
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        trace!(
            "Releasing local communicator of size {} at rank {}",
            self.context.members.len(),
            self.rank
        );
    }
}

impl Communicator for LocalComm {
    type Group = LocalGroup;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.context.members.len()
    }

    fn group(&self) -> LocalGroup {
        LocalGroup {
            members: Arc::clone(&self.context.members),
            process: self.process(),
        }
    }

    fn duplicate(&self) -> Result<Self> {
        self.split(Some(0), self.rank)?.ok_or_else(|| {
            GridError::CollectiveFailure("duplicate produced no communicator".to_string())
        })
    }

    fn split(&self, color: Option<usize>, key: usize) -> Result<Option<Self>> {
        // Only a completed exchange advances the split counter
        let split = self.splits.get();
        let entries = self.context.all_gather(self.rank, SplitEntry { color, key })?;
        self.splits.set(split + 1);
        let Some(color) = color else {
            return Ok(None);
        };

        let ranks = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.color == Some(color))
            .sorted_by_key(|(rank, entry)| (entry.key, *rank))
            .map(|(rank, _)| rank)
            .collect::<Vec<_>>();
        let new_rank = ranks
            .iter()
            .position(|&rank| rank == self.rank)
            .ok_or_else(|| {
                GridError::CollectiveFailure(format!(
                    "rank {} is missing from its own split",
                    self.rank
                ))
            })?;
        let members = ranks
            .iter()
            .map(|&rank| self.context.members[rank])
            .collect();
        let context = self.context.child(split, color, members)?;
        trace!(
            "Split color {color}: rank {} -> {new_rank} of {}",
            self.rank,
            context.members.len()
        );
        Ok(Some(Self::new(context, new_rank)))
    }

    fn create_from_group(&self, group: &LocalGroup) -> Result<Option<Self>> {
        if let Some(outsider) = group
            .members
            .iter()
            .find(|&&p| !self.context.members.contains(&p))
        {
            return Err(GridError::InvalidArgument(format!(
                "process {outsider} is not a member of the communicator"
            )));
        }
        let process = self.process();
        let key = group.members.iter().position(|&p| p == process);
        self.split(key.map(|_| 0), key.unwrap_or(0))
    }
}

//! The intra-process scheduler: a pool of workers over per-worker deques of
//! pending branches. The owner pushes and pops at the back, so local
//! execution is depth first and memory stays bounded; thieves pop at the
//! front, taking the shallowest frontier, which transfers the largest
//! remaining subtree per steal.

use crate::cnf::Formula;
use crate::dpll::branch::BranchItem;
use crate::engine::{Propagation, Searcher};
use crate::params::Tunable;
use crate::sink::{Solution, SolutionSet};
use crate::stats::SearchStats;
use crate::StopToken;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

static SOLUTION_CHANNEL_CAPACITY: Tunable<usize> =
    Tunable::new("SWEEPSAT_SOLUTION_CHANNEL_CAPACITY", "1024");

/// How long an idle worker sleeps between re-checks of the stop flag.
const IDLE_RECHECK: Duration = Duration::from_millis(10);

/// Decision taken by the rank-level coordinator when the whole local pool
/// has gone quiescent: either the solve is over, or fresh work (typically
/// stolen from a peer rank) should be injected.
pub(crate) enum Quiescence {
    Finished,
    NewWork(Vec<BranchItem>),
}

/// Hook consulted by the last worker to go idle once every deque is empty.
/// The single-process solver always finishes; the inter-process distributor
/// first tries to steal from peer ranks.
pub(crate) trait IdleHandler: Send {
    fn on_quiescent(&mut self) -> Quiescence;
}

pub(crate) struct LocalOnly;

impl IdleHandler for LocalOnly {
    fn on_quiescent(&mut self) -> Quiescence {
        Quiescence::Finished
    }
}

/// What the distributor's communication loop feeds back to a starving pool.
pub(crate) enum Feed {
    Work(Vec<BranchItem>),
    Finished,
}

/// Idle handler of one distributed rank: reports the pool's quiescence to
/// the communication loop and parks until it is either fed stolen work or
/// told that the world has terminated.
pub(crate) struct RankHandler {
    hunger: Sender<()>,
    feed: Receiver<Feed>,
    stop: StopToken,
}

impl RankHandler {
    pub(crate) fn new(hunger: Sender<()>, feed: Receiver<Feed>, stop: StopToken) -> RankHandler {
        RankHandler { hunger, feed, stop }
    }
}

impl IdleHandler for RankHandler {
    fn on_quiescent(&mut self) -> Quiescence {
        if self.hunger.send(()).is_err() {
            return Quiescence::Finished;
        }
        loop {
            match self.feed.recv_timeout(Duration::from_millis(100)) {
                Ok(Feed::Work(items)) => return Quiescence::NewWork(items),
                Ok(Feed::Finished) => return Quiescence::Finished,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    return Quiescence::Finished
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    if self.stop.is_stopped() {
                        return Quiescence::Finished;
                    }
                }
            }
        }
    }
}

struct Critical {
    idle: usize,
    coordinating: bool,
    shutdown: bool,
}

pub(crate) struct Shared {
    formula: Arc<Formula>,
    max_unsat: u32,
    deques: Vec<Mutex<VecDeque<BranchItem>>>,
    critical: Mutex<Critical>,
    monitor: Condvar,
    /// Mirror of `Critical::idle`, readable without the lock so that the
    /// push fast path can skip signalling when nobody is parked.
    idle_hint: AtomicUsize,
    stop: StopToken,
    handler: Mutex<Box<dyn IdleHandler>>,
}

impl Shared {
    pub(crate) fn new(
        formula: Arc<Formula>,
        max_unsat: u32,
        num_workers: usize,
        stop: StopToken,
        handler: Box<dyn IdleHandler>,
    ) -> Arc<Shared> {
        debug_assert!(num_workers >= 1);
        Arc::new(Shared {
            formula,
            max_unsat,
            deques: (0..num_workers)
                .map(|_| Mutex::new(VecDeque::new()))
                .collect(),
            critical: Mutex::new(Critical {
                idle: 0,
                coordinating: false,
                shutdown: false,
            }),
            monitor: Condvar::new(),
            idle_hint: AtomicUsize::new(0),
            stop,
            handler: Mutex::new(handler),
        })
    }

    fn all_deques_empty(&self) -> bool {
        self.deques.iter().all(|d| d.lock().is_empty())
    }

    /// Takes one branch from the shallow end of some deque, on behalf of a
    /// requesting peer rank.
    pub(crate) fn steal_for_peer(&self) -> Option<BranchItem> {
        for deque in &self.deques {
            if let Some(item) = deque.lock().pop_front() {
                return Some(item);
            }
        }
        None
    }

    /// Wakes parked workers if any; must be called after pushing work.
    fn signal_work(&self) {
        if self.idle_hint.load(Ordering::SeqCst) > 0 {
            let _guard = self.critical.lock();
            self.monitor.notify_all();
        }
    }

    /// Hands work to the pool from outside a worker (the distributor path).
    pub(crate) fn inject(&self, items: Vec<BranchItem>) {
        if items.is_empty() {
            return;
        }
        {
            let mut deque = self.deques[0].lock();
            deque.extend(items);
        }
        self.signal_work();
    }
}

pub(crate) struct PoolOutcome {
    pub solutions: SolutionSet,
    pub stats: SearchStats,
    pub interrupted: bool,
}

/// Runs a worker pool to completion over the given seed branches.
pub(crate) fn run(
    shared: Arc<Shared>,
    seeds: Vec<BranchItem>,
    retain_limit: Option<usize>,
    stop_on_first: bool,
) -> PoolOutcome {
    let num_workers = shared.deques.len();
    let stop = shared.stop.clone();
    shared.inject(seeds);

    let (sol_tx, sol_rx) = crossbeam_channel::bounded(SOLUTION_CHANNEL_CAPACITY.get());

    let (solutions, stats) = std::thread::scope(|s| {
        let collector = {
            let stop = stop.clone();
            s.spawn(move || {
                let mut set = SolutionSet::with_retain_limit(retain_limit);
                while let Ok(sol) = sol_rx.recv() {
                    if set.insert(sol) && stop_on_first {
                        stop.stop();
                    }
                }
                set
            })
        };
        let workers: Vec<_> = (0..num_workers)
            .map(|id| {
                let shared = shared.clone();
                let sink = sol_tx.clone();
                s.spawn(move || worker_loop(&shared, id, &sink))
            })
            .collect();
        drop(sol_tx);

        let mut stats = SearchStats::default();
        for w in workers {
            stats.merge(&w.join().expect("worker panicked"));
        }
        let solutions = collector.join().expect("solution collector panicked");
        (solutions, stats)
    });

    PoolOutcome {
        solutions,
        stats,
        interrupted: stop.is_stopped(),
    }
}

fn worker_loop(shared: &Shared, id: usize, sink: &Sender<Solution>) -> SearchStats {
    let mut searcher = Searcher::new(shared.formula.clone(), shared.max_unsat);
    while let Some(item) = find_work(shared, id, &mut searcher.stats) {
        if !explore(shared, &mut searcher, id, &item, sink) {
            break;
        }
    }
    searcher.stats
}

/// Expands the subtree of `item` depth first, materialising every untaken
/// sibling branch on the owner's deque. Returns false when the solve was
/// cancelled.
fn explore(
    shared: &Shared,
    searcher: &mut Searcher,
    id: usize,
    item: &BranchItem,
    sink: &Sender<Solution>,
) -> bool {
    if searcher.establish(item.decisions()) == Propagation::BoundExceeded {
        return true;
    }
    loop {
        if shared.stop.is_stopped() {
            return false;
        }
        if searcher.propagate() == Propagation::BoundExceeded {
            return true;
        }
        if searcher.all_assigned() {
            let solution = searcher.snapshot();
            searcher.stats.solutions += 1;
            // a full channel blocks us here: enumeration must not drop
            // solutions. An error means the collector is gone, i.e. stop.
            return sink.send(solution).is_ok();
        }
        let var = searcher.next_unset_var().expect("unassigned variable");
        let sibling = BranchItem::child(searcher.path(), var.neg());
        shared.deques[id].lock().push_back(sibling);
        shared.signal_work();
        searcher.decide(var.pos());
    }
}

/// Fetches the next branch: own deque first (depth first), then a steal
/// sweep over the other workers, then the idle protocol.
fn find_work(shared: &Shared, id: usize, stats: &mut SearchStats) -> Option<BranchItem> {
    let num_workers = shared.deques.len();
    loop {
        if shared.stop.is_stopped() {
            return None;
        }
        if let Some(item) = shared.deques[id].lock().pop_back() {
            return Some(item);
        }
        for offset in 1..num_workers {
            let victim = (id + offset) % num_workers;
            if let Some(item) = shared.deques[victim].lock().pop_front() {
                stats.steals += 1;
                tracing::debug!(thief = id, victim, depth = item.depth(), "stole branch");
                return Some(item);
            }
        }

        let mut crit = shared.critical.lock();
        if crit.shutdown {
            return None;
        }
        crit.idle += 1;
        shared.idle_hint.store(crit.idle, Ordering::SeqCst);
        // the deques may have been refilled between our sweep and taking the
        // lock; re-checking under the lock pairs with `signal_work`
        if !shared.all_deques_empty() {
            crit.idle -= 1;
            shared.idle_hint.store(crit.idle, Ordering::SeqCst);
            continue;
        }
        if crit.idle == num_workers && !crit.coordinating {
            // everyone is parked and nothing is queued: this worker becomes
            // the coordinator and asks the idle handler what comes next
            crit.coordinating = true;
            drop(crit);
            tracing::debug!(worker = id, "pool quiescent");
            let outcome = shared.handler.lock().on_quiescent();
            let mut crit = shared.critical.lock();
            crit.coordinating = false;
            match outcome {
                Quiescence::Finished => {
                    crit.shutdown = true;
                    shared.monitor.notify_all();
                    return None;
                }
                Quiescence::NewWork(mut items) => {
                    crit.idle -= 1;
                    shared.idle_hint.store(crit.idle, Ordering::SeqCst);
                    drop(crit);
                    let first = items.pop();
                    shared.inject(items);
                    match first {
                        Some(item) => return Some(item),
                        None => continue,
                    }
                }
            }
        } else {
            let _ = shared.monitor.wait_for(&mut crit, IDLE_RECHECK);
            let done = crit.shutdown;
            crit.idle -= 1;
            shared.idle_hint.store(crit.idle, Ordering::SeqCst);
            if done {
                return None;
            }
        }
    }
}

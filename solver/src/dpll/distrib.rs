//! Peer-to-peer work stealing between cooperating processes.
//!
//! Every rank runs a full intra-process pool. When a rank's pool goes
//! quiescent it asks random peers for a branch; a peer either ships the
//! shallowest branch of one of its deques or declines. Global termination is
//! detected with a circulating two-colour token that also accumulates each
//! rank's shipped-minus-received work count: a rank turns black when work
//! reaches it, and rank 0 announces shutdown once a white token returns to
//! a white, starving rank 0 with a zero total count, which rules out work
//! still in flight. Local solution sets are then forwarded to rank 0, which
//! merges and deduplicates them for the final emit.
//!
//! The message-passing runtime itself is out of scope: the [`Transport`]
//! trait captures the contract required of it, and [`ChannelTransport`]
//! provides the in-process implementation the tests run against.

use crate::cnf::Formula;
use crate::dpll::branch::BranchItem;
use crate::dpll::pool::{self, Feed, RankHandler, Shared};
use crate::dpll::{DpllParams, SolveReport};
use crate::params::Tunable;
use crate::sink::{Solution, SolutionSet};
use crate::StopToken;
use crossbeam_channel::{Receiver, Sender};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};

static POLL_INTERVAL_US: Tunable<u64> = Tunable::new("SWEEPSAT_POLL_INTERVAL_US", "200");

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("peer {0} is unreachable")]
    Disconnected(usize),
    #[error("communication failure: {0}")]
    Failed(String),
}

/// Colour of the termination token.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenColour {
    White,
    Black,
}

/// Messages exchanged between ranks.
#[derive(Clone, Debug)]
pub enum Message {
    /// An idle rank asks the receiver for a branch.
    StealRequest,
    /// One serialised branch, shipped in response to a steal request.
    Work(BranchItem),
    /// The receiver's steal request cannot be served.
    Declined,
    /// The termination token. `count` accumulates every rank's shipped
    /// minus received work messages, so that work still in flight blocks
    /// termination even on transports that reorder messages.
    Token { colour: TokenColour, count: i64 },
    /// A rank's local solutions, forwarded to rank 0 after shutdown.
    Solutions(Vec<Solution>),
    /// Rank 0 announces global termination.
    Shutdown,
}

/// The contract the distributor requires of a message-passing runtime:
/// reliable typed point-to-point delivery, non-blocking send, polled
/// receive, and a collective barrier. No ordering between a pair of ranks
/// is assumed beyond what the protocol itself tags.
pub trait Transport: Send {
    fn rank(&self) -> usize;
    fn world(&self) -> usize;
    /// Non-blocking send.
    fn send(&self, to: usize, msg: Message) -> Result<(), TransportError>;
    /// Non-blocking probe and receive of the next pending message, with its
    /// sender rank.
    fn try_recv(&self) -> Result<Option<(usize, Message)>, TransportError>;
    fn barrier(&self) -> Result<(), TransportError>;
}

/// An in-process [Transport] over a mesh of crossbeam channels, one inbox
/// per rank. A launcher-provided runtime takes its place in deployments.
pub struct ChannelTransport {
    rank: usize,
    outboxes: Vec<Sender<(usize, Message)>>,
    inbox: Receiver<(usize, Message)>,
    barrier: Arc<std::sync::Barrier>,
}

impl ChannelTransport {
    /// Builds a fully connected mesh of `world` ranks.
    pub fn mesh(world: usize) -> Vec<ChannelTransport> {
        let mut outboxes = Vec::with_capacity(world);
        let mut inboxes = Vec::with_capacity(world);
        for _ in 0..world {
            let (tx, rx) = crossbeam_channel::unbounded();
            outboxes.push(tx);
            inboxes.push(rx);
        }
        let barrier = Arc::new(std::sync::Barrier::new(world));
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelTransport {
                rank,
                outboxes: outboxes.clone(),
                inbox,
                barrier: barrier.clone(),
            })
            .collect()
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world(&self) -> usize {
        self.outboxes.len()
    }

    fn send(&self, to: usize, msg: Message) -> Result<(), TransportError> {
        self.outboxes[to]
            .send((self.rank, msg))
            .map_err(|_| TransportError::Disconnected(to))
    }

    fn try_recv(&self) -> Result<Option<(usize, Message)>, TransportError> {
        match self.inbox.try_recv() {
            Ok(pair) => Ok(Some(pair)),
            Err(crossbeam_channel::TryRecvError::Empty) => Ok(None),
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                Err(TransportError::Failed("inbox closed".to_string()))
            }
        }
    }

    fn barrier(&self) -> Result<(), TransportError> {
        self.barrier.wait();
        Ok(())
    }
}

struct CommsFinish {
    /// Globally merged solutions; only rank 0 gets them.
    merged: Option<SolutionSet>,
    shipped: u64,
    received: u64,
}

/// Solves over all ranks of the transport's world. Returns the globally
/// merged report on rank 0 and `None` on every other rank.
pub fn solve_with_transport<T: Transport>(
    formula: &Arc<Formula>,
    params: &DpllParams,
    stop: &StopToken,
    transport: T,
) -> Result<Option<SolveReport>, TransportError> {
    let rank = transport.rank();
    let world = transport.world();
    if world <= 1 {
        return Ok(Some(crate::dpll::solve(formula, params, stop)));
    }
    let start = Instant::now();

    let (hunger_tx, hunger_rx) = crossbeam_channel::unbounded();
    let (feed_tx, feed_rx) = crossbeam_channel::unbounded();
    let (local_tx, local_rx) = crossbeam_channel::unbounded();

    let handler = RankHandler::new(hunger_tx, feed_rx, stop.clone());
    let shared = Shared::new(
        formula.clone(),
        params.max_unsat,
        params.resolved_workers(),
        stop.clone(),
        Box::new(handler),
    );

    let seeds = if rank == 0 {
        vec![BranchItem::root()]
    } else {
        Vec::new()
    };

    let (mut outcome, comms_result) = std::thread::scope(|s| {
        let comms = {
            let shared = shared.clone();
            let stop = stop.clone();
            s.spawn(move || {
                let result = comms_loop(transport, shared, hunger_rx, &feed_tx, local_rx, &stop);
                if result.is_err() {
                    // a dead transport must not leave the local pool parked
                    stop.stop();
                    let _ = feed_tx.send(Feed::Finished);
                }
                result
            })
        };
        let mut outcome = pool::run(shared, seeds, params.retain_limit, params.stop_on_first);
        // hand the local solutions to the comms thread for the final exchange
        let local = std::mem::take(&mut outcome.solutions);
        let _ = local_tx.send(local);
        drop(local_tx);
        let comms_result = comms.join().expect("comms thread panicked");
        (outcome, comms_result)
    });

    match comms_result? {
        CommsFinish {
            merged: Some(merged),
            shipped,
            received,
        } => {
            outcome.stats.sheds += shipped;
            outcome.stats.steals += received;
            Ok(Some(SolveReport {
                solutions: merged,
                stats: outcome.stats,
                interrupted: outcome.interrupted,
                elapsed: start.elapsed(),
            }))
        }
        CommsFinish { merged: None, .. } => Ok(None),
    }
}

/// The communication loop of one rank: serves steal requests, feeds stolen
/// work to the local pool, circulates the termination token, and runs the
/// final solution exchange once rank 0 announces shutdown.
fn comms_loop<T: Transport>(
    transport: T,
    shared: Arc<Shared>,
    hunger: Receiver<()>,
    feed: &Sender<Feed>,
    local: Receiver<SolutionSet>,
    stop: &StopToken,
) -> Result<CommsFinish, TransportError> {
    let rank = transport.rank();
    let world = transport.world();
    let poll = Duration::from_micros(POLL_INTERVAL_US.get());
    let mut rng = SmallRng::seed_from_u64(rank as u64 + 1);

    let mut black = false;
    // work messages shipped minus received by this rank
    let mut msg_count = 0i64;
    let mut token: Option<(TokenColour, i64)> = None;
    let mut token_in_flight = false; // rank 0 only
    let mut hungry = false;
    let mut outstanding: Option<usize> = None;
    let mut round: Vec<usize> = Vec::new();
    let mut shipped = 0u64;
    let mut received = 0u64;
    let mut early_solutions: Vec<Solution> = Vec::new();
    let mut early_batches = 0usize;
    let mut shutdown = false;

    while !shutdown {
        while hunger.try_recv().is_ok() {
            hungry = true;
        }

        while let Some((from, msg)) = transport.try_recv()? {
            match msg {
                Message::StealRequest => {
                    let item = if stop.is_stopped() {
                        None
                    } else {
                        shared.steal_for_peer()
                    };
                    match item {
                        Some(item) => {
                            tracing::debug!(to = from, depth = item.depth(), "shipping branch");
                            transport.send(from, Message::Work(item))?;
                            msg_count += 1;
                            shipped += 1;
                        }
                        None => transport.send(from, Message::Declined)?,
                    }
                }
                Message::Work(item) => {
                    received += 1;
                    msg_count -= 1;
                    black = true;
                    hungry = false;
                    outstanding = None;
                    round.clear();
                    let _ = feed.send(Feed::Work(vec![item]));
                }
                Message::Declined => outstanding = None,
                Message::Token { colour, count } => {
                    token = Some((colour, count));
                    if rank == 0 {
                        token_in_flight = false;
                    }
                }
                Message::Solutions(sols) => {
                    // a fast peer may report before we leave the main loop
                    early_solutions.extend(sols);
                    early_batches += 1;
                }
                Message::Shutdown => {
                    let _ = feed.send(Feed::Finished);
                    shutdown = true;
                }
            }
        }
        if shutdown {
            break;
        }

        if stop.is_stopped() && rank == 0 {
            // cancellation: tear the ring down from rank 0
            for r in 1..world {
                transport.send(r, Message::Shutdown)?;
            }
            let _ = feed.send(Feed::Finished);
            break;
        }

        if hungry && outstanding.is_none() && !stop.is_stopped() {
            if round.is_empty() {
                round = (0..world).filter(|&r| r != rank).collect();
                round.shuffle(&mut rng);
            }
            if let Some(peer) = round.pop() {
                transport.send(peer, Message::StealRequest)?;
                outstanding = Some(peer);
            }
        }

        if hungry {
            if rank == 0 {
                match token.take() {
                    Some((TokenColour::White, count)) if !black && count + msg_count == 0 => {
                        // every rank was passive for a whole circulation and
                        // no work message is still in flight
                        tracing::debug!("termination token returned clean, shutting down");
                        for r in 1..world {
                            transport.send(r, Message::Shutdown)?;
                        }
                        let _ = feed.send(Feed::Finished);
                        break;
                    }
                    _ if !token_in_flight => {
                        black = false;
                        token_in_flight = true;
                        transport.send(
                            1,
                            Message::Token {
                                colour: TokenColour::White,
                                count: 0,
                            },
                        )?;
                    }
                    _ => {}
                }
            } else if let Some((colour, count)) = token.take() {
                let colour = if black { TokenColour::Black } else { colour };
                black = false;
                transport.send(
                    (rank + 1) % world,
                    Message::Token {
                        colour,
                        count: count + msg_count,
                    },
                )?;
            }
        }

        std::thread::sleep(poll);
    }

    // final exchange: everyone reports to rank 0, then a barrier
    let local_set = local.recv().unwrap_or_default();
    if rank == 0 {
        let mut merged = local_set;
        for sol in early_solutions {
            merged.insert(sol);
        }
        let mut pending = world - 1 - early_batches;
        while pending > 0 {
            match transport.try_recv()? {
                Some((_, Message::Solutions(sols))) => {
                    for sol in sols {
                        merged.insert(sol);
                    }
                    pending -= 1;
                }
                Some((from, Message::StealRequest)) => {
                    transport.send(from, Message::Declined)?;
                }
                Some(_) => {}
                None => std::thread::sleep(poll),
            }
        }
        transport.barrier()?;
        Ok(CommsFinish {
            merged: Some(merged),
            shipped,
            received,
        })
    } else {
        let sols: Vec<Solution> = local_set.iter().cloned().collect();
        transport.send(0, Message::Solutions(sols))?;
        transport.barrier()?;
        Ok(CommsFinish {
            merged: None,
            shipped,
            received,
        })
    }
}

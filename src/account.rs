//! Per-account mutex engine and its receive/worker loops. The shared state
//! lock is never held across a fabric send, so a parked send can always be
//! drained by the peer's loops.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use color_print::cformat;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::fabric::{ApprovalRx, Fabric, RequestRx};
use crate::ledger::Ledger;
use crate::log;
use crate::message::{Approval, Request, Transaction};
use crate::metrics::Metrics;

const FUNDS_POLL: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    RicartAgrawala,
    RoucairolCarvalho,
}

impl Algorithm {
    pub fn from_label(label: &str) -> Self {
        if label == "optimized" {
            Self::RoucairolCarvalho
        } else {
            Self::RicartAgrawala
        }
    }

    pub fn retains_permits(self) -> bool {
        matches!(self, Self::RoucairolCarvalho)
    }

    pub fn ledger_file(self) -> &'static str {
        match self {
            Self::RicartAgrawala => "logs_og.txt",
            Self::RoucairolCarvalho => "logs.txt",
        }
    }

    pub fn balances_file(self) -> &'static str {
        match self {
            Self::RicartAgrawala => "final_og.txt",
            Self::RoucairolCarvalho => "final.txt",
        }
    }
}

#[derive(Debug)]
struct MutexState {
    clock: u64,
    highest_seen: u64,
    requesting: bool,
    deferred: VecDeque<Request>,
    // true while an unrevoked permit from that peer is held
    permits_held: Vec<bool>,
}

pub struct Account {
    id: usize,
    algorithm: Algorithm,
    quorum: Vec<usize>,
    state: Mutex<MutexState>,
}

impl Account {
    pub fn new(id: usize, quorum: Vec<usize>, algorithm: Algorithm, accounts: usize) -> Self {
        Self {
            id,
            algorithm,
            quorum,
            state: Mutex::new(MutexState {
                clock: 0,
                highest_seen: 0,
                requesting: false,
                deferred: VecDeque::new(),
                permits_held: vec![false; accounts],
            }),
        }
    }

    pub async fn acquire(&self, fabric: &Fabric, approvals: &mut ApprovalRx, metrics: &Metrics) {
        let (request, send_set) = {
            let mut state = self.state.lock().await;
            state.clock = state.clock.max(state.highest_seen) + 1;
            state.requesting = true;
            let send_set: Vec<usize> = self
                .quorum
                .iter()
                .copied()
                .filter(|&peer| peer != self.id && !state.permits_held[peer])
                .collect();
            (
                Request {
                    turn: state.clock,
                    origin: self.id,
                },
                send_set,
            )
        };

        for &peer in &send_set {
            fabric.send_request(peer, request).await;
        }
        metrics.count_requests(send_set.len() as u64);

        // The receive loop may surrender a held permit mid-wait and ask the
        // peer again on our behalf, so completion is permit coherence over
        // the whole quorum rather than a fixed approval count.
        loop {
            {
                let state = self.state.lock().await;
                if self
                    .quorum
                    .iter()
                    .all(|&peer| peer == self.id || state.permits_held[peer])
                {
                    return;
                }
            }
            match approvals.recv().await {
                Some(approval) => {
                    let mut state = self.state.lock().await;
                    state.permits_held[approval.from] = true;
                }
                None => return,
            }
        }
    }

    pub async fn release(&self, fabric: &Fabric, metrics: &Metrics) {
        let drained: Vec<Request> = {
            let mut state = self.state.lock().await;
            state.requesting = false;
            if !self.algorithm.retains_permits() {
                // permission is single-use
                state.permits_held.fill(false);
            }
            let drained: Vec<Request> = state.deferred.drain(..).collect();
            for request in &drained {
                state.permits_held[request.origin] = false;
            }
            drained
        };

        for request in drained {
            fabric
                .send_approval(request.origin, Approval { from: self.id })
                .await;
            metrics.count_approval();
        }
    }

    pub async fn handle_request(&self, request: Request, fabric: &Fabric, metrics: &Metrics) {
        let reply = {
            let mut state = self.state.lock().await;
            state.highest_seen = state.highest_seen.max(request.turn);
            let ours = Request {
                turn: state.clock,
                origin: self.id,
            };
            if !state.requesting || request < ours {
                // Approving surrenders whatever permit the origin had granted
                // us; with a request of our own still in flight we must ask
                // that peer again or we would enter without its permit.
                let resend = state.requesting && state.permits_held[request.origin];
                state.permits_held[request.origin] = false;
                Some((resend, ours))
            } else {
                state.deferred.push_back(request);
                None
            }
        };

        if let Some((resend, ours)) = reply {
            fabric
                .send_approval(request.origin, Approval { from: self.id })
                .await;
            metrics.count_approval();
            if resend {
                fabric.send_request(request.origin, ours).await;
                metrics.count_requests(1);
            }
        }
    }

    pub async fn receive_loop(
        self: Arc<Self>,
        mut requests: RequestRx,
        fabric: Fabric,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                incoming = requests.recv() => match incoming {
                    Some(request) => self.handle_request(request, &fabric, &metrics).await,
                    None => break,
                },
            }
        }
    }

    pub async fn run_worker(
        self: Arc<Self>,
        transactions: Arc<Vec<Transaction>>,
        fabric: Fabric,
        mut approvals: ApprovalRx,
        ledger: Ledger,
        metrics: Arc<Metrics>,
    ) {
        for transaction in transactions.iter().filter(|t| t.from == self.id) {
            self.acquire(&fabric, &mut approvals, &metrics).await;

            if ledger.balance(self.id) < transaction.amount {
                // give the section back and wait for inbound transfers to
                // land through their own appends
                self.release(&fabric, &metrics).await;
                log::info(&cformat!(
                    "Account <bold>{}</bold> is waiting for funds to transfer <bold>{}</bold>.",
                    self.id,
                    transaction.amount
                ));
                while ledger.balance(self.id) < transaction.amount {
                    sleep(FUNDS_POLL).await;
                }
                self.acquire(&fabric, &mut approvals, &metrics).await;
            }

            ledger.append(transaction);
            self.release(&fabric, &metrics).await;

            if transaction.post_delay_ms > 0 {
                sleep(Duration::from_millis(transaction.post_delay_ms)).await;
            }
        }
    }
}

use color_print::cformat;
use tokio::sync::mpsc;

use crate::log;
use crate::message::{Approval, Request};

pub type RequestTx = mpsc::Sender<Request>;
pub type RequestRx = mpsc::Receiver<Request>;
pub type ApprovalTx = mpsc::Sender<Approval>;
pub type ApprovalRx = mpsc::Receiver<Approval>;

#[derive(Clone)]
pub struct Fabric {
    requests: Vec<RequestTx>,
    approvals: Vec<ApprovalTx>,
}

impl Fabric {
    pub fn new(accounts: usize) -> (Self, Vec<RequestRx>, Vec<ApprovalRx>) {
        let mut requests = Vec::with_capacity(accounts);
        let mut request_rxs = Vec::with_capacity(accounts);
        let mut approvals = Vec::with_capacity(accounts);
        let mut approval_rxs = Vec::with_capacity(accounts);

        // one slot per channel: a sender parks until the peer's loop drains
        // the message, keeping delivery FIFO per ordered pair
        for _ in 0..accounts {
            let (tx, rx) = mpsc::channel(1);
            requests.push(tx);
            request_rxs.push(rx);

            let (tx, rx) = mpsc::channel(1);
            approvals.push(tx);
            approval_rxs.push(rx);
        }

        (Self { requests, approvals }, request_rxs, approval_rxs)
    }

    pub async fn send_request(&self, to: usize, request: Request) {
        if self.requests[to].send(request).await.is_err() {
            log::error(&cformat!(
                "The request channel of account <bold>{to}</bold> is closed."
            ));
        }
    }

    pub async fn send_approval(&self, to: usize, approval: Approval) {
        if self.approvals[to].send(approval).await.is_err() {
            log::error(&cformat!(
                "The approval channel of account <bold>{to}</bold> is closed."
            ));
        }
    }
}

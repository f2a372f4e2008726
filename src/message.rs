// The derived `(turn, origin)` order is the request priority: the smaller
// request wins, with equal turns broken by the smaller origin id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Request {
    pub turn: u64,
    pub origin: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Approval {
    pub from: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub from: usize,
    pub to: usize,
    pub amount: i64,
    pub post_delay_ms: u64,
}

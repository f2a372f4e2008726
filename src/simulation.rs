use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use color_print::cformat;
use tokio_util::sync::CancellationToken;

use crate::account::{Account, Algorithm};
use crate::fabric::Fabric;
use crate::input::{self, Case};
use crate::ledger::Ledger;
use crate::log;
use crate::metrics::{Metrics, MetricsReport};

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub case_dir: PathBuf,
    pub output_dir: PathBuf,
    pub algorithm: Algorithm,
    pub label: String,
    // the CLI always recreates the ledger; tests may seed history and turn
    // this off
    pub reset_ledger: bool,
}

impl SimConfig {
    pub fn new(case_dir: impl Into<PathBuf>, label: &str) -> Self {
        Self {
            case_dir: case_dir.into(),
            output_dir: PathBuf::from("."),
            algorithm: Algorithm::from_label(label),
            label: label.to_string(),
            reset_ledger: true,
        }
    }
}

pub async fn run(config: SimConfig) -> Result<MetricsReport, Box<dyn Error + Send + Sync>> {
    let start = Instant::now();
    let Case {
        accounts: account_count,
        transactions,
        quorums,
    } = input::load_case(&config.case_dir, config.algorithm)?;
    let transactions = Arc::new(transactions);

    let ledger = Ledger::new(config.output_dir.join(config.algorithm.ledger_file()));
    if config.reset_ledger {
        ledger.reset();
    }

    let metrics = Arc::new(Metrics::default());
    let (fabric, request_rxs, approval_rxs) = Fabric::new(account_count);
    let cancel = CancellationToken::new();

    let accounts: Vec<Arc<Account>> = quorums
        .into_iter()
        .enumerate()
        .map(|(id, quorum)| Arc::new(Account::new(id, quorum, config.algorithm, account_count)))
        .collect();

    let mut receive_loops = Vec::with_capacity(account_count);
    for (account, requests) in accounts.iter().zip(request_rxs) {
        receive_loops.push(tokio::spawn(account.clone().receive_loop(
            requests,
            fabric.clone(),
            metrics.clone(),
            cancel.clone(),
        )));
    }

    let mut workers = Vec::with_capacity(account_count);
    for (account, approvals) in accounts.iter().zip(approval_rxs) {
        workers.push(tokio::spawn(account.clone().run_worker(
            transactions.clone(),
            fabric.clone(),
            approvals,
            ledger.clone(),
            metrics.clone(),
        )));
    }

    for worker in workers {
        worker.await?;
    }
    let duration = start.elapsed();

    // with every worker done there is no request in flight and no deferred
    // entry left, so the receive loops can stop
    cancel.cancel();
    for receive_loop in receive_loops {
        receive_loop.await?;
    }

    ledger.write_balances(
        &config.output_dir.join(config.algorithm.balances_file()),
        account_count,
    )?;

    let report = MetricsReport::new(
        &config.label,
        account_count,
        transactions.len(),
        &metrics,
        duration,
    );
    let metrics_path = config.output_dir.join(format!("metrics_{}.json", config.label));
    report.write(&metrics_path)?;

    log::info(&cformat!(
        "Metrics saved to <bold>{}</bold>.",
        metrics_path.display()
    ));
    log::info(&cformat!(
        "<bold>{}</bold>: {} accounts, {} transactions, {} requests + {} approvals = <bold>{}</bold> messages in {} ms.",
        report.algorithm,
        report.accounts,
        report.transactions,
        report.requests,
        report.approvals,
        report.total_messages,
        report.duration_ms
    ));

    Ok(report)
}

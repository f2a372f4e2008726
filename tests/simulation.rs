//! End-to-end runs over small seeded cases. Scenarios that need money to
//! move seed the ledger with credits from an id outside the simulated range
//! before running, so the sufficiency check passes where intended.

use std::path::Path;
use std::time::Duration;

use quorum_teller::ledger::Ledger;
use quorum_teller::message::Transaction;
use quorum_teller::simulation::{run, SimConfig};
use quorum_teller::Algorithm;
use tempfile::TempDir;

const BANK: usize = 99;

fn write_case(dir: &Path, header: &str, rows: &[&str]) {
    let mut contents = String::from(header);
    contents.push('\n');
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    std::fs::write(dir.join("transactions.txt"), contents).unwrap();
}

fn config(case: &TempDir, out: &TempDir, algorithm: Algorithm, label: &str) -> SimConfig {
    SimConfig {
        case_dir: case.path().to_path_buf(),
        output_dir: out.path().to_path_buf(),
        algorithm,
        label: label.to_string(),
        reset_ledger: false,
    }
}

fn seed(out: &TempDir, algorithm: Algorithm, credits: &[(usize, i64)]) {
    let ledger = Ledger::new(out.path().join(algorithm.ledger_file()));
    for &(to, amount) in credits {
        ledger.append(&Transaction {
            from: BANK,
            to,
            amount,
            post_delay_ms: 0,
        });
    }
}

fn ledger_lines(out: &TempDir, algorithm: Algorithm) -> Vec<String> {
    std::fs::read_to_string(out.path().join(algorithm.ledger_file()))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn final_balances(out: &TempDir, algorithm: Algorithm) -> Vec<(usize, i64)> {
    std::fs::read_to_string(out.path().join(algorithm.balances_file()))
        .unwrap()
        .lines()
        .map(|line| {
            let (id, balance) = line.split_once(',').unwrap();
            (id.parse().unwrap(), balance.parse().unwrap())
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn a_single_transfer_costs_one_message_round() {
    let case = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_case(case.path(), "2,1", &["0,10,1,0"]);
    seed(&out, Algorithm::RoucairolCarvalho, &[(0, 10)]);

    let report = run(config(&case, &out, Algorithm::RoucairolCarvalho, "optimized"))
        .await
        .unwrap();

    assert_eq!(report.requests, 1);
    assert_eq!(report.approvals, 1);
    assert_eq!(report.total_messages, 2);
    assert_eq!(
        final_balances(&out, Algorithm::RoucairolCarvalho),
        vec![(0, 0), (1, 10)]
    );
    assert_eq!(ledger_lines(&out, Algorithm::RoucairolCarvalho).len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn symmetric_contention_settles_in_two_rounds() {
    let case = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_case(case.path(), "2,2", &["0,5,1,0", "1,5,0,0"]);
    seed(&out, Algorithm::RoucairolCarvalho, &[(0, 5), (1, 5)]);

    let report = run(config(&case, &out, Algorithm::RoucairolCarvalho, "optimized"))
        .await
        .unwrap();

    // one request and one approval per contender, however the race lands
    assert_eq!(report.requests, 2);
    assert_eq!(report.approvals, 2);
    assert_eq!(
        final_balances(&out, Algorithm::RoucairolCarvalho),
        vec![(0, 5), (1, 5)]
    );
    assert_eq!(ledger_lines(&out, Algorithm::RoucairolCarvalho).len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn a_broadcast_ring_pays_the_full_quadratic_price() {
    let case = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_case(case.path(), "3,3", &["0,3,1,0", "1,3,2,0", "2,3,0,0"]);
    seed(&out, Algorithm::RicartAgrawala, &[(0, 3), (1, 3), (2, 3)]);

    let report = run(config(&case, &out, Algorithm::RicartAgrawala, "original"))
        .await
        .unwrap();

    assert_eq!(report.requests, 6);
    assert_eq!(report.approvals, 6);
    assert_eq!(
        final_balances(&out, Algorithm::RicartAgrawala),
        vec![(0, 3), (1, 3), (2, 3)]
    );
    assert_eq!(ledger_lines(&out, Algorithm::RicartAgrawala).len(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn an_unfundable_transfer_waits_forever_outside_the_section() {
    let case = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_case(case.path(), "2,2", &["0,100,1,0", "1,50,0,10"]);
    // account 1 can fund its transfer; account 0 can never reach 100
    seed(&out, Algorithm::RoucairolCarvalho, &[(1, 50)]);

    let simulation = tokio::spawn(run(config(
        &case,
        &out,
        Algorithm::RoucairolCarvalho,
        "optimized",
    )));

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(!simulation.is_finished(), "the run should hang by design");

    let lines = ledger_lines(&out, Algorithm::RoucairolCarvalho);
    assert!(
        lines.iter().any(|line| line.starts_with("Participant 1 ")),
        "the funded transfer should have landed"
    );
    assert!(
        !lines.iter().any(|line| line.starts_with("Participant 0 ")),
        "the unfundable transfer must never land"
    );
    // account 0 received the 50 and still cannot proceed
    let ledger = Ledger::new(out.path().join(Algorithm::RoucairolCarvalho.ledger_file()));
    assert_eq!(ledger.balance(0), 50);

    simulation.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn retained_permits_make_the_second_entry_free() {
    let case = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_case(case.path(), "3,2", &["0,1,1,0", "0,1,1,0"]);
    seed(&out, Algorithm::RoucairolCarvalho, &[(0, 2)]);

    let report = run(config(&case, &out, Algorithm::RoucairolCarvalho, "optimized"))
        .await
        .unwrap();

    // two critical sections, one message round
    assert_eq!(report.requests, 2);
    assert_eq!(report.approvals, 2);
    assert_eq!(
        final_balances(&out, Algorithm::RoucairolCarvalho),
        vec![(0, 0), (1, 2), (2, 0)]
    );
    assert_eq!(ledger_lines(&out, Algorithm::RoucairolCarvalho).len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_quorums_route_through_the_intersection() {
    let case = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_case(case.path(), "4,2", &["0,1,1,0", "3,1,2,0"]);
    std::fs::write(case.path().join("quorum.txt"), "0,1,2\n1\n2\n1,2,3\n").unwrap();
    seed(&out, Algorithm::RoucairolCarvalho, &[(0, 1), (3, 1)]);

    let report = run(config(&case, &out, Algorithm::RoucairolCarvalho, "optimized"))
        .await
        .unwrap();

    // both contenders ask {1,2} once and get answered once
    assert_eq!(report.requests, 4);
    assert_eq!(report.approvals, 4);
    assert_eq!(
        final_balances(&out, Algorithm::RoucairolCarvalho),
        vec![(0, 0), (1, 1), (2, 1), (3, 0)]
    );
    assert_eq!(ledger_lines(&out, Algorithm::RoucairolCarvalho).len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_crisscross_workload_conserves_money_under_both_variants() {
    let accounts = 4;
    let transfers_per_account = 10;
    let rows: Vec<String> = (0..transfers_per_account)
        .flat_map(|_| (0..accounts).map(|from| format!("{},10,{},0", from, (from + 1) % accounts)))
        .collect();
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
    let header = format!("{},{}", accounts, rows.len());

    let mut totals = Vec::new();
    for (algorithm, label) in [
        (Algorithm::RicartAgrawala, "original"),
        (Algorithm::RoucairolCarvalho, "optimized"),
    ] {
        let case = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_case(case.path(), &header, &rows);
        seed(&out, algorithm, &[(0, 100), (1, 100), (2, 100), (3, 100)]);

        let report = run(config(&case, &out, algorithm, label)).await.unwrap();

        // every request is answered exactly once
        assert_eq!(report.requests, report.approvals);
        if algorithm == Algorithm::RicartAgrawala {
            // 40 entries, 3 peers each, no permit reuse
            assert_eq!(report.requests, 120);
        }

        let lines = ledger_lines(&out, algorithm);
        assert_eq!(lines.len(), 4 + rows.len());
        assert!(lines.iter().all(|line| line.starts_with("Participant ")));

        let finals = final_balances(&out, algorithm);
        assert_eq!(finals, vec![(0, 100), (1, 100), (2, 100), (3, 100)]);
        assert_eq!(finals.iter().map(|&(_, b)| b).sum::<i64>(), 400);

        totals.push(report.total_messages);
    }

    // permit retention never costs more than the broadcast
    assert!(totals[1] <= totals[0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn the_metrics_report_lands_next_to_the_other_outputs() {
    let case = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_case(case.path(), "2,1", &["0,10,1,0"]);
    seed(&out, Algorithm::RoucairolCarvalho, &[(0, 10)]);

    run(config(&case, &out, Algorithm::RoucairolCarvalho, "optimized"))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(out.path().join("metrics_optimized.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["algorithm"], "optimized");
    assert_eq!(value["accounts"], 2);
    assert_eq!(value["transactions"], 1);
    assert_eq!(value["totalMessages"], 2);
}

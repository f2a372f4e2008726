use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use color_print::cformat;

use crate::account::Algorithm;
use crate::log;
use crate::message::Transaction;

#[derive(Clone, Debug)]
pub struct Case {
    pub accounts: usize,
    pub transactions: Vec<Transaction>,
    pub quorums: Vec<Vec<usize>>,
}

pub fn load_case(dir: &Path, algorithm: Algorithm) -> Result<Case, Box<dyn Error + Send + Sync>> {
    let file = File::open(dir.join("transactions.txt"))
        .or_else(|_| File::open(dir.join("transacciones.txt")))
        .map_err(|error| {
            format!(
                "could not open the transaction list in {}: {error}",
                dir.display()
            )
        })?;

    let mut lines = BufReader::new(file).lines();
    let header = lines.next().ok_or("the transaction list is empty")??;
    let (accounts, declared) = parse_header(&header)?;

    let mut transactions = Vec::with_capacity(declared);
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_transaction(&line) {
            Some(transaction) => transactions.push(transaction),
            None => log::warn(&cformat!(
                "Skipping a malformed transaction line: <bold>{line}</bold>"
            )),
        }
    }
    if transactions.len() != declared {
        log::warn(&cformat!(
            "The header declares <bold>{declared}</bold> transactions but <bold>{}</bold> were read.",
            transactions.len()
        ));
    }

    let quorums = match algorithm {
        Algorithm::RicartAgrawala => full_quorums(accounts),
        Algorithm::RoucairolCarvalho => read_quorums(dir, accounts),
    };

    Ok(Case {
        accounts,
        transactions,
        quorums,
    })
}

fn parse_header(line: &str) -> Result<(usize, usize), Box<dyn Error + Send + Sync>> {
    let mut parts = line.split(',');
    let accounts = parts.next().and_then(|part| part.trim().parse().ok());
    let declared = parts.next().and_then(|part| part.trim().parse().ok());
    match (accounts, declared) {
        (Some(accounts), Some(declared)) if accounts > 0 => Ok((accounts, declared)),
        _ => Err(format!("invalid transaction list header: {line}").into()),
    }
}

fn parse_transaction(line: &str) -> Option<Transaction> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 4 {
        return None;
    }
    Some(Transaction {
        from: parts[0].trim().parse().ok()?,
        amount: parts[1].trim().parse().ok()?,
        to: parts[2].trim().parse().ok()?,
        post_delay_ms: parts[3].trim().parse().ok()?,
    })
}

fn full_quorums(accounts: usize) -> Vec<Vec<usize>> {
    (0..accounts).map(|_| (0..accounts).collect()).collect()
}

fn read_quorums(dir: &Path, accounts: usize) -> Vec<Vec<usize>> {
    let file = match File::open(dir.join("quorum.txt")) {
        Ok(file) => file,
        Err(_) => {
            log::warn("No quorum.txt found; every account falls back to the full quorum.");
            return full_quorums(accounts);
        }
    };

    let mut lines = BufReader::new(file).lines();
    (0..accounts)
        .map(|id| match lines.next() {
            Some(Ok(line)) => parse_quorum(&line, id, accounts),
            _ => {
                log::warn(&cformat!(
                    "Missing quorum line for account <bold>{id}</bold>; using the full quorum."
                ));
                (0..accounts).collect()
            }
        })
        .collect()
}

fn parse_quorum(line: &str, id: usize, accounts: usize) -> Vec<usize> {
    let mut quorum: Vec<usize> = line
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .filter(|&peer| {
            if peer < accounts {
                true
            } else {
                log::warn(&cformat!(
                    "Dropping out-of-range peer <bold>{peer}</bold> from the quorum of account <bold>{id}</bold>."
                ));
                false
            }
        })
        .collect();
    if quorum.is_empty() {
        log::warn(&cformat!(
            "Unusable quorum line for account <bold>{id}</bold>; using the full quorum."
        ));
        quorum = (0..accounts).collect();
    }
    quorum
}

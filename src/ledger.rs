use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use color_print::cformat;

use crate::log;
use crate::message::Transaction;

#[derive(Clone, Debug)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn reset(&self) {
        let _ = std::fs::remove_file(&self.path);
    }

    // Concurrent appends are serialized by the mutex engine, not by anything
    // the file operations do themselves.
    pub fn append(&self, transaction: &Transaction) {
        let entry = format!(
            "Participant {} has transferred {} to participant {}.\n",
            transaction.from, transaction.amount, transaction.to
        );
        let result = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));
        if let Err(error) = result {
            log::error(&cformat!(
                "Could not append to the transaction log: <bold>{error}</bold>."
            ));
        }
    }

    pub fn balance(&self, id: usize) -> i64 {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(_) => return 0,
        };

        let mut balance = 0;
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                Err(error) => {
                    log::warn(&cformat!(
                        "Could not read the transaction log: <bold>{error}</bold>."
                    ));
                    break;
                }
            };
            let Some((from, amount, to)) = parse_entry(&line) else {
                log::warn(&cformat!("Skipping a malformed log line: <bold>{line}</bold>"));
                continue;
            };
            if from == id {
                balance -= amount;
            } else if to == id {
                balance += amount;
            }
        }
        balance
    }

    pub fn write_balances(&self, path: &Path, accounts: usize) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        for id in 0..accounts {
            writeln!(file, "{},{}", id, self.balance(id))?;
        }
        Ok(())
    }
}

fn parse_entry(line: &str) -> Option<(usize, i64, usize)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 8 {
        return None;
    }
    let from = parts[1].parse().ok()?;
    let amount = parts[4].strip_prefix('$').unwrap_or(parts[4]).parse().ok()?;
    let to = parts[7].trim_end_matches('.').parse().ok()?;
    Some((from, amount, to))
}

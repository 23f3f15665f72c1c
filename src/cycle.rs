//! The ingestion cycle.
//!
//! One cooperative task drives `Discovering → Reading → Parsing → {Skipped |
//! Recording} → Finalizing → Done` for at most one trace file per tick. The
//! timer loop awaits the whole cycle before the next tick (chained
//! scheduling), so no two cycles can race to list, read or relocate the same
//! file. Finalizing always relocates the file, whichever branch was taken;
//! that is the one guaranteed side effect of a cycle and is what keeps a
//! malformed file from being reprocessed forever.

use crate::dedup::DuplicateIndex;
use crate::ledger::OrderLedger;
use crate::parser::{ParseError, TraceRecord};
use crate::snapshot::{DuplicateNotice, SnapshotHandle};
use crate::source::TraceFileSource;
use crate::store::StoreError;
use std::io;
use tokio::time::{interval, Duration, MissedTickBehavior};

#[derive(Debug)]
pub enum CycleError {
    /// Zero-line trace file.
    EmptyInput(String),
    /// Required field absent from the header.
    Parse(ParseError),
    /// Header parsed but carried no part code, so the record is unusable.
    MissingPartCode(String),
    Io(io::Error),
    Store(StoreError),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::EmptyInput(file) => write!(f, "Trace file - {} is empty", file),
            CycleError::Parse(err) => write!(f, "{}", err),
            CycleError::MissingPartCode(file) => {
                write!(f, "Trace file - {} has no part code", file)
            }
            CycleError::Io(err) => write!(f, "I/O failure: {}", err),
            CycleError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CycleError {}

impl From<ParseError> for CycleError {
    fn from(err: ParseError) -> Self {
        CycleError::Parse(err)
    }
}

impl From<io::Error> for CycleError {
    fn from(err: io::Error) -> Self {
        CycleError::Io(err)
    }
}

impl From<StoreError> for CycleError {
    fn from(err: StoreError) -> Self {
        CycleError::Store(err)
    }
}

/// What one cycle did, for logging and tests.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing pending in the watch directory.
    Idle,
    /// The file was consumed without ledger/index effect.
    Skipped,
    /// The file was recorded; counts duplicate notices raised.
    Recorded { duplicates: usize },
}

enum Stage {
    Discovering,
    Reading(String),
    Parsing(String, Vec<String>),
    Recording(String, TraceRecord),
    Skipped(String, CycleError),
    Finalizing(String, CycleOutcome),
    Done(CycleOutcome),
}

pub struct IngestionCycle {
    source: TraceFileSource,
    ledger: OrderLedger,
    dedup: DuplicateIndex,
    snapshot: SnapshotHandle,
}

impl IngestionCycle {
    pub fn new(
        source: TraceFileSource,
        ledger: OrderLedger,
        dedup: DuplicateIndex,
        snapshot: SnapshotHandle,
    ) -> Self {
        Self {
            source,
            ledger,
            dedup,
            snapshot,
        }
    }

    /// Advance the state machine until Done. Per-file errors never escape;
    /// they route to Skipped and the file is relocated regardless.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let mut stage = Stage::Discovering;
        loop {
            stage = match stage {
                Stage::Discovering => match self.source.list_pending().await {
                    Ok(files) => match files.into_iter().next() {
                        Some(file) => Stage::Reading(file),
                        None => Stage::Done(CycleOutcome::Idle),
                    },
                    Err(err) => {
                        log::error!("Failed to list watch directory: {}", err);
                        Stage::Done(CycleOutcome::Idle)
                    }
                },

                Stage::Reading(file) => match self.source.read_lines(&file).await {
                    Ok(lines) if lines.is_empty() => {
                        Stage::Skipped(file.clone(), CycleError::EmptyInput(file))
                    }
                    Ok(lines) => Stage::Parsing(file, lines),
                    Err(err) => Stage::Skipped(file, err.into()),
                },

                Stage::Parsing(file, lines) => match TraceRecord::from_lines(&lines) {
                    Ok(record) if record.is_valid() => Stage::Recording(file, record),
                    Ok(_) => Stage::Skipped(file.clone(), CycleError::MissingPartCode(file)),
                    Err(err) => Stage::Skipped(file, err.into()),
                },

                Stage::Recording(file, record) => {
                    // Partial application is accepted: the ledger write may
                    // land even when the advisory duplicate check fails, and
                    // the file is still relocated.
                    let outcome = match self.record(&record).await {
                        Ok(duplicates) => CycleOutcome::Recorded { duplicates },
                        Err(err) => {
                            log::error!("Recording failed for {}: {}", file, err);
                            CycleOutcome::Recorded { duplicates: 0 }
                        }
                    };
                    Stage::Finalizing(file, outcome)
                }

                Stage::Skipped(file, err) => {
                    log::warn!("Skipping {}: {}", file, err);
                    Stage::Finalizing(file, CycleOutcome::Skipped)
                }

                Stage::Finalizing(file, outcome) => {
                    if let Err(err) = self.source.relocate(&file).await {
                        log::error!("Failed to relocate {}: {}", file, err);
                    }
                    Stage::Done(outcome)
                }

                Stage::Done(outcome) => return outcome,
            };
        }
    }

    async fn record(&self, record: &TraceRecord) -> Result<usize, StoreError> {
        // Read-then-create-or-increment is not atomic at the store level;
        // safe only because cycles are single-flight. Multiple machine lines
        // would need a conditional increment instead.
        let entry = match self.ledger.get(&record.order_number).await? {
            Some(_) => self.ledger.increment(&record.order_number, 1).await?,
            None => {
                self.ledger
                    .create(&record.order_number, &record.part_code)
                    .await?
            }
        };
        log::info!(
            "Order {} counter {} (machine {})",
            record.order_number,
            entry.counter,
            record.machine_id.as_deref().unwrap_or("?")
        );
        self.snapshot
            .publish_order(&record.order_number, &entry)
            .await;

        // Rare-format serials canonicalize; primary-format ones index under
        // the full code.
        let index_key = match record
            .canonical_board_code
            .as_deref()
            .or(record.board_code.as_deref())
        {
            Some(key) => key.to_string(),
            None => return Ok(0),
        };
        let title = record.board_code.clone().unwrap_or_else(|| index_key.clone());

        let mut duplicates = 0;
        if self
            .dedup
            .check_and_record(&index_key, &record.part_code, &title)
            .await?
        {
            log::warn!("Duplicate board {}", title);
            self.snapshot.push_notice(DuplicateNotice::board(&title)).await;
            duplicates += 1;
        }

        for pattern in &record.pattern_codes {
            if self
                .dedup
                .check_and_record(&index_key, &record.part_code, pattern)
                .await?
            {
                log::warn!("Duplicate pattern {} on board {}", pattern, title);
                self.snapshot
                    .push_notice(DuplicateNotice::pattern(&title))
                    .await;
                duplicates += 1;
            }
        }

        Ok(duplicates)
    }
}

/// Timer loop driving the cycle. The next tick is only consumed after the
/// current cycle settles, so cycles never overlap even when one outlives the
/// interval.
pub async fn run_ingestion_loop(cycle: IngestionCycle, interval_delay_ms: u64) {
    log::info!("Ingestion loop started ({}ms interval)", interval_delay_ms);
    let mut timer = interval(Duration::from_millis(interval_delay_ms));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        timer.tick().await;
        cycle.run_cycle().await;
    }
}

// src/classify/classify_reads.rs

use crossbeam::channel::{bounded, Receiver, Sender};
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use super::output::{format_row, ResumeState};
use super::score::ReadScorer;
use crate::config::TieBreak;
use crate::error::{MnbcError, Result};
use crate::fastq::ReadSource;
use crate::types::{ClassificationResult, ClassifySummary, Read};

/// Message from a consumer to the writer.
enum Scored {
    Row(ClassificationResult),
    /// Scoring panicked; the read is dropped.
    Skipped(String),
    /// The consumer saw the end of the work queue.
    Finished(usize),
}

/// One producer, `consumers` scorers and one writer joined by two bounded
/// queues. Rows are written in completion order.
pub struct ClassifyPipeline<'s, 'db> {
    scorer: &'s ReadScorer<'db>,
    consumers: usize,
    queue_capacity: usize,
}

impl<'s, 'db> ClassifyPipeline<'s, 'db> {
    pub fn new(scorer: &'s ReadScorer<'db>, consumers: usize, queue_capacity: usize) -> Self {
        Self {
            scorer,
            consumers: consumers.max(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Classifies every read of `source` not already finished in `resume`,
    /// writing one row per read to `out`.
    ///
    /// An input error stops the producer; reads already queued are still
    /// scored and written before the error is returned.
    pub fn run<W: Write>(&self, source: ReadSource, resume: &ResumeState, out: W) -> Result<ClassifySummary> {
        let scorer = self.scorer;
        run_pipeline(
            &|read: &Read| scorer.classify(read),
            scorer.params().tie_break,
            self.consumers,
            self.queue_capacity,
            source,
            resume,
            out,
        )
    }
}

/// The pipeline itself, over any per-read classifier. A classifier that
/// panics on a read costs that read its row and nothing else.
fn run_pipeline<F, W>(
    classify: &F,
    tie_break: TieBreak,
    consumers: usize,
    queue_capacity: usize,
    source: ReadSource,
    resume: &ResumeState,
    mut out: W,
) -> Result<ClassifySummary>
where
    F: Fn(&Read) -> ClassificationResult + Sync,
    W: Write,
{
    let (work_tx, work_rx) = bounded::<Read>(queue_capacity);
    let (result_tx, result_rx) = bounded::<Scored>(queue_capacity);

    thread::scope(|s| {
        let producer = s.spawn(move || produce(source, resume, work_tx));

        for consumer_id in 0..consumers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            s.spawn(move || consume(consumer_id, classify, work_rx, result_tx));
        }
        // only consumers hold the queue ends from here on
        drop(work_rx);
        drop(result_tx);

        let mut summary = ClassifySummary::default();
        let written = write_rows(&result_rx, consumers, &mut out, tie_break, &mut summary);
        drop(result_rx);

        let produced = producer
            .join()
            .map_err(|_| MnbcError::Pipeline("read producer panicked".into()))?;
        let (enqueued, previously_finished) = produced?;
        written?;

        summary.reads_enqueued = enqueued;
        summary.previously_finished = previously_finished;
        Ok(summary)
    })
}

/// Parses reads and queues every one a previous run did not finish.
/// Returns (enqueued, skipped as already finished).
fn produce(mut source: ReadSource, resume: &ResumeState, work_tx: Sender<Read>) -> Result<(usize, usize)> {
    let mut enqueued = 0usize;
    let mut previously_finished = 0usize;
    while let Some(read) = source.next_read()? {
        if resume.is_finished(&read.id) {
            previously_finished += 1;
            continue;
        }
        if work_tx.send(read).is_err() {
            // every consumer is gone, the writer has failed
            break;
        }
        enqueued += 1;
    }
    log::debug!("Producer done: {} reads queued, {} already finished", enqueued, previously_finished);
    Ok((enqueued, previously_finished))
}

fn consume<F>(consumer_id: usize, classify: &F, work_rx: Receiver<Read>, result_tx: Sender<Scored>)
where
    F: Fn(&Read) -> ClassificationResult + Sync,
{
    for read in work_rx.iter() {
        let msg = match catch_unwind(AssertUnwindSafe(|| classify(&read))) {
            Ok(result) => Scored::Row(result),
            Err(_) => {
                log::warn!("Consumer {} - scoring failed for read {}, skipping it", consumer_id, read.id);
                Scored::Skipped(read.id)
            }
        };
        if result_tx.send(msg).is_err() {
            return;
        }
    }
    let _ = result_tx.send(Scored::Finished(consumer_id));
}

fn write_rows<W: Write>(
    result_rx: &Receiver<Scored>,
    consumers: usize,
    out: &mut W,
    tie_break: TieBreak,
    summary: &mut ClassifySummary,
) -> Result<()> {
    let mut finished = 0usize;
    while finished < consumers {
        match result_rx.recv() {
            Ok(Scored::Row(result)) => {
                writeln!(out, "{}", format_row(&result, tie_break))?;
                summary.rows_written += 1;
                if result.is_resolved() {
                    summary.classified += 1;
                } else {
                    summary.unresolved += 1;
                }
            }
            Ok(Scored::Skipped(_)) => summary.skipped += 1,
            Ok(Scored::Finished(id)) => {
                log::debug!("Consumer {} finished", id);
                finished += 1;
            }
            Err(_) => {
                return Err(MnbcError::Pipeline(format!(
                    "result queue closed after {} of {} consumers finished",
                    finished, consumers
                )))
            }
        }
    }
    out.flush()?;
    Ok(())
}

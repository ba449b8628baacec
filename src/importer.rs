//! Importer Driver: orchestrates reader, segmenter, extractor, validator,
//! and planner, applies the plan through the store, and assembles the
//! [`ImportReport`].

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::ImportError;
use crate::models::{ImportReport, Plan, Record, Rejection, Warning};
use crate::planner::{ApplyMode, LookupStore, plan_batch};
use crate::{docx, extractor, log_import_summary, log_rejection, log_stage, log_store, validator};

/// Import-wide failure policy. Strict aborts all writes on any rejection;
/// lenient writes the accepted records and reports the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportMode {
    Strict,
    #[default]
    Lenient,
}

impl ImportMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Some(ImportMode::Strict),
            "lenient" => Some(ImportMode::Lenient),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    pub mode: ImportMode,
    /// Plan everything, write nothing.
    pub dry_run: bool,
}

/// The staged pipeline bound to a store. Single-threaded and synchronous
/// except at the store boundary.
pub struct Importer<S> {
    store: S,
    options: ImportOptions,
}

impl<S: LookupStore> Importer<S> {
    pub fn new(store: S, options: ImportOptions) -> Self {
        Importer { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Import a `.docx` file.
    pub async fn import_path(&self, path: &Path) -> Result<ImportReport, ImportError> {
        let lines = docx::read_lines(path)?;
        self.import_lines(&lines).await
    }

    /// Import an in-memory `.docx` byte buffer.
    pub async fn import_bytes(&self, bytes: &[u8]) -> Result<ImportReport, ImportError> {
        let lines = docx::read_lines_from_bytes(bytes)?;
        self.import_lines(&lines).await
    }

    /// Import a pre-flattened line sequence.
    pub async fn import_lines(&self, lines: &[String]) -> Result<ImportReport, ImportError> {
        self.import_lines_with_cancel(lines, &AtomicBool::new(false))
            .await
    }

    /// Import with a cancellation flag, honored between records during a
    /// lenient apply. Already-committed records stay in place; the report
    /// shows the cut-off through the per-action `applied` flags.
    pub async fn import_lines_with_cancel(
        &self,
        lines: &[String],
        cancel: &AtomicBool,
    ) -> Result<ImportReport, ImportError> {
        log_stage!("reader", lines = lines.len());

        let (records, warnings, rejections) = parse_and_validate(lines);
        log_stage!(
            "validator",
            records = records.len(),
            rejections = rejections.len()
        );

        let mut actions = plan_batch(&self.store, records).await?;

        let mut report = ImportReport::empty();
        for action in &actions {
            match action.plan {
                Plan::Insert => report.inserted += 1,
                Plan::Update => report.updated += 1,
                Plan::Skip => report.skipped += 1,
            }
        }
        report.rejected = rejections.len();
        report.warned = warnings.len();
        report.rejections = rejections;
        report.warnings = warnings;

        let strict_abort = self.options.mode == ImportMode::Strict && report.rejected > 0;
        let should_write = !self.options.dry_run && !strict_abort;

        if should_write && !cancel.load(Ordering::Relaxed) {
            match self.options.mode {
                ImportMode::Strict => {
                    // The whole batch in one transaction.
                    match self.store.apply(&actions, ApplyMode::Atomic).await {
                        Ok(outcome) => {
                            for action in &mut actions {
                                action.applied = true;
                            }
                            log_store!(applied, count = outcome.applied);
                        }
                        Err(e) => {
                            log_store!(error, e);
                            report.store_error = Some(e.to_string());
                        }
                    }
                }
                ImportMode::Lenient => {
                    // Per-record commits so cancellation and mid-batch
                    // failures leave a well-defined prefix applied.
                    for action in &mut actions {
                        if cancel.load(Ordering::Relaxed) {
                            tracing::info!("Import cancelled between records");
                            break;
                        }
                        match self
                            .store
                            .apply(std::slice::from_ref(action), ApplyMode::PerRecord)
                            .await
                        {
                            Ok(_) => action.applied = true,
                            Err(e) => {
                                log_store!(error, e);
                                report.store_error = Some(e.to_string());
                                break;
                            }
                        }
                    }
                }
            }
        }

        report.actions = actions;
        log_import_summary!(report);
        Ok(report)
    }
}

/// Run the synchronous parsing stages over a line stream. Returns accepted
/// records in source order plus all warnings and rejections, the latter
/// ordered by their blocks' first lines.
fn parse_and_validate(lines: &[String]) -> (Vec<Record>, Vec<Warning>, Vec<Rejection>) {
    let segmented = crate::segmenter::segment(lines);
    log_stage!("segmenter", blocks = segmented.blocks.len());

    let mut records = Vec::new();
    let mut warnings = Vec::new();
    let mut rejections: Vec<Rejection> = Vec::new();

    for (line, err) in &segmented.header_errors {
        log_rejection!(err.kind(), question_id = None::<&str>, line = *line, err);
        rejections.push(Rejection {
            question_id: None,
            line_range: (*line, *line),
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    let mut validator = validator::Validator::new();
    for block in &segmented.blocks {
        let fields = extractor::extract(block);
        match validator.validate(block, &fields) {
            Ok((record, mut block_warnings)) => {
                records.push(record);
                warnings.append(&mut block_warnings);
            }
            Err(err) => {
                log_rejection!(
                    err.kind(),
                    question_id = Some(block.question_id.as_str()),
                    line = block.start_line,
                    err
                );
                rejections.push(Rejection {
                    question_id: Some(block.question_id.clone()),
                    line_range: (block.start_line, block.end_line),
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }
    }

    // Header errors and block rejections interleave by source position.
    rejections.sort_by_key(|r| r.line_range.0);

    (records, warnings, rejections)
}

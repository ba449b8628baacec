// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros so pipeline stages report with consistent
/// field names and message patterns.

/// Log a pipeline stage boundary with its input/output sizes.
#[macro_export]
macro_rules! log_stage {
    ($stage:expr, lines = $lines:expr) => {
        tracing::debug!(stage = $stage, lines = $lines, "Pipeline stage completed");
    };
    ($stage:expr, blocks = $blocks:expr) => {
        tracing::debug!(stage = $stage, blocks = $blocks, "Pipeline stage completed");
    };
    ($stage:expr, records = $records:expr, rejections = $rejections:expr) => {
        tracing::debug!(
            stage = $stage,
            records = $records,
            rejections = $rejections,
            "Pipeline stage completed"
        );
    };
}

/// Log a rejected block with its source location.
#[macro_export]
macro_rules! log_rejection {
    ($kind:expr, question_id = $id:expr, line = $line:expr, $msg:expr) => {
        tracing::warn!(
            kind = ?$kind,
            question_id = ?$id,
            line = $line,
            "Block rejected: {}", $msg
        );
    };
}

/// Log store apply progress and failures.
#[macro_export]
macro_rules! log_store {
    (applied, count = $count:expr) => {
        tracing::info!(component = "store", applied = $count, "Store apply completed");
    };
    (error, $error:expr) => {
        tracing::error!(component = "store", error = %$error, "Store apply failed");
    };
}

/// Log the final import summary with all counters.
#[macro_export]
macro_rules! log_import_summary {
    ($report:expr) => {
        tracing::info!(
            inserted = $report.inserted,
            updated = $report.updated,
            skipped = $report.skipped,
            rejected = $report.rejected,
            warned = $report.warned,
            "Import finished"
        );
    };
}

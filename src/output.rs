//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Fetch
//!
//! ```text
//! /ip/large/image__width-200,height-100.jpg
//!     200 rendered → /tmp/imageprinter/large/image__width-200,height-100.jpg
//! ```
//!
//! With `--headers` the response the handler would send follows:
//!
//! ```text
//!     Content-Type: image/jpeg
//!     Content-Length: 5120
//! ```
//!
//! ## Warm
//!
//! ```text
//! rendered  large/image.jpg → large/image__width-300,height-200,crop-true,quality-80.jpg
//! failed    missing.jpg: source unavailable: missing.jpg
//! Warm: 1 rendered
//! ```
//!
//! ## Audit
//!
//! ```text
//! stale     large/image__width-200.jpg (5120 bytes)
//! foreign   notes.txt (12 bytes)
//! 3 valid, 1 stale, 0 empty, 0 orphaned, 1 foreign
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::audit::{AuditReport, EntryStatus, Pruned};
use crate::handler::{HandleError, Variant};
use crate::responder::Response;
use crate::warm::WarmReport;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Left-aligned status column.
fn status_column(label: &str) -> String {
    format!("{label:<9} ")
}

fn relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

// ============================================================================
// Fetch
// ============================================================================

pub fn format_fetch(request: &str, result: &Result<Variant, HandleError>) -> Vec<String> {
    let detail = match result {
        Ok(variant) => format!(
            "200 {} → {}",
            variant.outcome,
            variant.path.display()
        ),
        Err(e) => format!("{} {}", e.status().code(), e),
    };
    vec![request.to_string(), format!("{}{}", indent(1), detail)]
}

pub fn print_fetch(request: &str, result: &Result<Variant, HandleError>) {
    for line in format_fetch(request, result) {
        println!("{}", line);
    }
}

/// Headers of a response, one per line.
pub fn format_response(response: &Response) -> Vec<String> {
    response
        .headers
        .iter()
        .map(|(name, value)| format!("{}{}: {}", indent(1), name, value))
        .collect()
}

pub fn print_response(response: &Response) {
    for line in format_response(response) {
        println!("{}", line);
    }
}

// ============================================================================
// Warm
// ============================================================================

pub fn format_warm(report: &WarmReport, destination: &Path) -> Vec<String> {
    let mut lines: Vec<String> = report
        .results
        .iter()
        .map(|result| match &result.outcome {
            Ok((path, outcome)) => format!(
                "{}{} → {}",
                status_column(&outcome.to_string()),
                result.job.source,
                relative(path, destination).display()
            ),
            Err(e) => format!("{}{}: {}", status_column("failed"), result.job.source, e),
        })
        .collect();
    lines.push(format!("Warm: {}", report.stats));
    lines
}

pub fn print_warm(report: &WarmReport, destination: &Path) {
    for line in format_warm(report, destination) {
        println!("{}", line);
    }
}

// ============================================================================
// Audit
// ============================================================================

/// Non-valid entries one per line, then a summary.
pub fn format_audit(report: &AuditReport, pruned: Option<Pruned>) -> Vec<String> {
    let mut lines: Vec<String> = report
        .problems()
        .map(|entry| {
            format!(
                "{}{} ({} bytes)",
                status_column(&entry.status.to_string()),
                entry.path.display(),
                entry.size
            )
        })
        .collect();

    let summary = [
        EntryStatus::Valid,
        EntryStatus::Stale,
        EntryStatus::Empty,
        EntryStatus::Orphaned,
        EntryStatus::Foreign,
    ]
    .iter()
    .map(|status| format!("{} {}", report.count(*status), status))
    .collect::<Vec<_>>()
    .join(", ");
    lines.push(summary);

    if let Some(pruned) = pruned {
        lines.push(format!(
            "Pruned {} files ({} bytes)",
            pruned.files, pruned.bytes
        ));
    }
    lines
}

pub fn print_audit(report: &AuditReport, pruned: Option<Pruned>) {
    for line in format_audit(report, pruned) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEntry;
    use crate::handler::Outcome;
    use crate::materialize::MaterializeError;
    use crate::options::OptionSet;
    use crate::request::RequestError;
    use crate::responder::Status;
    use crate::source::SourceError;
    use crate::warm::{WarmJob, WarmResult, WarmStats};
    use std::path::PathBuf;

    #[test]
    fn fetch_success_shows_outcome_and_path() {
        let result = Ok(Variant {
            path: PathBuf::from("/tmp/ip/a__w-1.jpg"),
            outcome: Outcome::Rendered,
        });
        assert_eq!(
            format_fetch("/ip/a__w-1.jpg", &result),
            vec![
                "/ip/a__w-1.jpg".to_string(),
                "    200 rendered → /tmp/ip/a__w-1.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn fetch_failure_shows_status_code() {
        let result = Err(HandleError::Request(RequestError::InvalidRequestPath {
            path: "/a.jpg".into(),
            reason: "no options marker in file name",
        }));
        let lines = format_fetch("/ip/a.jpg", &result);
        assert!(lines[1].starts_with("    404 invalid request path"));

        let result = Err(HandleError::Materialize(MaterializeError::ProcessingFailed(
            "boom".into(),
        )));
        assert!(format_fetch("/ip/a__w-1.jpg", &result)[1].starts_with("    500 "));
    }

    #[test]
    fn response_headers_are_indented() {
        let response = Response::text(Status::NotFound, "Not found");
        assert_eq!(
            format_response(&response),
            vec![
                "    Content-Type: text/plain; charset=utf-8".to_string(),
                "    Content-Length: 9".to_string(),
            ]
        );
    }

    #[test]
    fn warm_lists_results_and_stats() {
        let report = WarmReport {
            results: vec![
                WarmResult {
                    job: WarmJob::new("a.jpg", OptionSet::new()),
                    outcome: Ok((PathBuf::from("/cache/a__w-1.jpg"), Outcome::Cached)),
                },
                WarmResult {
                    job: WarmJob::new("b.jpg", OptionSet::new()),
                    outcome: Err(HandleError::Materialize(
                        MaterializeError::SourceUnavailable(SourceError::NotFound("b.jpg".into())),
                    )),
                },
            ],
            stats: WarmStats {
                cached: 1,
                rendered: 0,
                failed: 1,
            },
        };
        let lines = format_warm(&report, Path::new("/cache"));
        assert_eq!(lines[0], "cached    a.jpg → a__w-1.jpg");
        assert!(lines[1].starts_with("failed    b.jpg: source unavailable"));
        assert_eq!(lines[2], "Warm: 1 cached, 0 rendered, 1 failed (2 total)");
    }

    #[test]
    fn audit_lists_only_problem_entries() {
        let report = AuditReport {
            entries: vec![
                AuditEntry {
                    path: PathBuf::from("a__w-1.jpg"),
                    status: EntryStatus::Valid,
                    size: 10,
                },
                AuditEntry {
                    path: PathBuf::from("notes.txt"),
                    status: EntryStatus::Foreign,
                    size: 12,
                },
            ],
        };
        assert_eq!(
            format_audit(&report, None),
            vec![
                "foreign   notes.txt (12 bytes)".to_string(),
                "1 valid, 0 stale, 0 empty, 0 orphaned, 1 foreign".to_string(),
            ]
        );
        assert_eq!(
            format_audit(&report, Some(Pruned { files: 1, bytes: 12 }))
                .last()
                .unwrap(),
            "Pruned 1 files (12 bytes)"
        );
    }
}

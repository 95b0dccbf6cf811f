//! CLI output formatting for build and check runs.
//!
//! # Information-First Display
//!
//! Pages are shown by their place in the source tree (positional index plus
//! directory name, indented by depth), with the generated file as secondary
//! context after `→`. Failed pages are listed separately with the stage that
//! failed and the error.
//!
//! # Output Format
//!
//! ```text
//! Pages
//! 001 . → index.html
//!     001 api → api/index.html
//!         001 fs → api/fs/index.html
//!     002 articles → articles/index.html
//!
//! Failed
//! 001 articles/streams (render)
//!     Binding failed: Cannot parse date 'next tuesday'
//!
//! Rendered 4 pages, wrote 4 files, 1 failed
//! ```
//!
//! A check run writes nothing, so its page lines carry no `→` part.
//!
//! # Architecture
//!
//! [`format_build_output`] returns `Vec<String>` for testability and
//! [`print_build_output`] writes it to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::load::relative_page_path;
use crate::pipeline::BuildReport;
use crate::write::destination;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Depth of a relative page path: 0 for the root, 1 for its children, ...
fn page_depth(rel: &str) -> usize {
    if rel == "." { 0 } else { rel.split('/').count() }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

// ============================================================================
// Build output
// ============================================================================

/// Format the result of a build or check run.
///
/// `source` and `output` are the roots the run used; paths are shown relative
/// to them.
pub fn format_build_output(report: &BuildReport, source: &Path, output: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.rendered.is_empty() {
        lines.push("Pages".to_string());
        // Sibling counters per depth; pages arrive in tree order.
        let mut positions: Vec<usize> = Vec::new();
        for page in &report.rendered {
            let rel = relative_page_path(source, page);
            let depth = page_depth(&rel);
            positions.truncate(depth + 1);
            positions.resize(depth + 1, 0);
            positions[depth] += 1;

            let name = rel.rsplit('/').next().unwrap_or(&rel);
            let header = format!("{}{} {}", indent(depth), format_index(positions[depth]), name);
            let written = destination(source, output, page)
                .ok()
                .filter(|dest| report.written.contains(dest));
            match written {
                Some(dest) => {
                    let shown = dest.strip_prefix(output).unwrap_or(dest.as_path());
                    lines.push(format!("{} \u{2192} {}", header, shown.display()));
                }
                None => lines.push(header),
            }
        }
    }

    if !report.failed.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Failed".to_string());
        for (i, failure) in report.failed.iter().enumerate() {
            lines.push(format!(
                "{} {} ({})",
                format_index(i + 1),
                relative_page_path(source, &failure.page),
                failure.error.stage()
            ));
            lines.push(format!("{}{}", indent(1), failure.error));
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Rendered {}, wrote {}, {} failed",
        plural(report.rendered.len(), "page", "pages"),
        plural(report.written.len(), "file", "files"),
        report.failed.len()
    ));
    lines
}

/// Print build output to stdout.
pub fn print_build_output(report: &BuildReport, source: &Path, output: &Path) {
    for line in format_build_output(report, source, output) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::BindingError;
    use crate::pipeline::{PageError, PageFailure};
    use crate::render::RenderError;
    use std::path::PathBuf;

    const SOURCE: &str = "/site/pages";
    const OUTPUT: &str = "/site/public";

    fn page(rel: &str) -> PathBuf {
        if rel.is_empty() {
            PathBuf::from(SOURCE)
        } else {
            Path::new(SOURCE).join(rel)
        }
    }

    fn dest(rel: &str) -> PathBuf {
        Path::new(OUTPUT).join(rel).join("index.html")
    }

    fn format(report: &BuildReport) -> Vec<String> {
        format_build_output(report, Path::new(SOURCE), Path::new(OUTPUT))
    }

    #[test]
    fn format_index_is_zero_padded() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn page_depth_counts_segments() {
        assert_eq!(page_depth("."), 0);
        assert_eq!(page_depth("api"), 1);
        assert_eq!(page_depth("api/fs"), 2);
    }

    #[test]
    fn written_pages_show_tree_and_destination() {
        let report = BuildReport {
            rendered: vec![page(""), page("api"), page("api/fs"), page("articles")],
            written: vec![dest(""), dest("api"), dest("api/fs"), dest("articles")],
            failed: Vec::new(),
        };
        assert_eq!(
            format(&report),
            vec![
                "Pages",
                "001 . \u{2192} index.html",
                "    001 api \u{2192} api/index.html",
                "        001 fs \u{2192} api/fs/index.html",
                "    002 articles \u{2192} articles/index.html",
                "",
                "Rendered 4 pages, wrote 4 files, 0 failed",
            ]
        );
    }

    #[test]
    fn check_run_shows_pages_without_destinations() {
        let report = BuildReport {
            rendered: vec![page(""), page("guides")],
            written: Vec::new(),
            failed: Vec::new(),
        };
        assert_eq!(
            format(&report),
            vec![
                "Pages",
                "001 .",
                "    001 guides",
                "",
                "Rendered 2 pages, wrote 0 files, 0 failed",
            ]
        );
    }

    #[test]
    fn failures_show_stage_and_error() {
        let report = BuildReport {
            rendered: vec![page("")],
            written: vec![dest("")],
            failed: vec![PageFailure {
                page: page("articles/streams"),
                error: PageError::Render(RenderError::Binding(BindingError::InvalidDate(
                    "next tuesday".to_string(),
                ))),
            }],
        };
        let lines = format(&report);
        assert_eq!(lines[3], "Failed");
        assert_eq!(lines[4], "001 articles/streams (render)");
        assert_eq!(
            lines[5],
            "    Binding failed: Cannot parse date 'next tuesday'"
        );
        assert_eq!(lines.last().unwrap(), "Rendered 1 page, wrote 1 file, 1 failed");
    }

    #[test]
    fn empty_report_is_just_the_summary() {
        assert_eq!(
            format(&BuildReport::default()),
            vec!["Rendered 0 pages, wrote 0 files, 0 failed"]
        );
    }
}

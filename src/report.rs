//! Run accounting.
//!
//! Every non-fatal condition lands here as a counter while the log carries
//! the detail; the CLI renders the totals as the end-of-run summary (and
//! turns a non-clean report into exit status 1). Attachment tallies are
//! additionally keyed by each description's original path, so a migration
//! can be audited per source folder.

use std::collections::BTreeMap;

use serde::Serialize;

/// Found/missing tally for one original attachment path.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PathTally {
    pub found: u64,
    pub missing: u64,
}

/// Archive-wide attachment accounting.
#[derive(Debug, Default, Serialize)]
pub struct AttachmentStats {
    /// Attachment-description lines seen in message bodies.
    pub listed: u64,
    /// Descriptions resolved to an existing file.
    pub found: u64,
    /// Descriptions with no candidate on disk.
    pub missing: u64,
    /// Per-original-path breakdown, sorted for stable output.
    pub by_path: BTreeMap<String, PathTally>,
}

impl AttachmentStats {
    pub fn record_listed(&mut self) {
        self.listed += 1;
    }

    pub fn record_found(&mut self, original_path: &str) {
        self.found += 1;
        self.by_path.entry(original_path.to_string()).or_default().found += 1;
    }

    pub fn record_missing(&mut self, original_path: &str) {
        self.missing += 1;
        self.by_path
            .entry(original_path.to_string())
            .or_default()
            .missing += 1;
    }
}

/// Counters for one archive conversion.
#[derive(Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Lines read from the archive.
    pub lines: u64,
    /// Messages emitted into the destination mbox.
    pub messages: u64,
    /// Warnings recorded; the run continued.
    pub warnings: u64,
    /// Errors recorded; the run continued.
    pub errors: u64,
    /// `cid:` image references seen in HTML bodies (data not recoverable
    /// from the archive).
    pub embedded_images: u64,
    pub attachments: AttachmentStats,
}

impl ConversionReport {
    pub fn record_warning(&mut self) {
        self.warnings += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// True when nothing was flagged during the run.
    pub fn clean(&self) -> bool {
        self.warnings == 0 && self.errors == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_tallies_accumulate() {
        let mut stats = AttachmentStats::default();
        stats.record_listed();
        stats.record_listed();
        stats.record_found("C:/attach");
        stats.record_missing("C:/attach");
        stats.record_missing("HD/Attachments");

        assert_eq!(stats.listed, 2);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.missing, 2);
        assert_eq!(stats.by_path["C:/attach"].found, 1);
        assert_eq!(stats.by_path["C:/attach"].missing, 1);
        assert_eq!(stats.by_path["HD/Attachments"].missing, 1);
    }

    #[test]
    fn test_clean_means_no_flags() {
        let mut report = ConversionReport::default();
        assert!(report.clean());
        report.record_warning();
        assert!(!report.clean());
    }

    #[test]
    fn test_report_serializes_for_json_summary() {
        let mut report = ConversionReport::default();
        report.messages = 2;
        report.attachments.record_found("a/b");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["messages"], 2);
        assert_eq!(value["attachments"]["by_path"]["a/b"]["found"], 1);
    }
}

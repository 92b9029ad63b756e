//! Per-run quality report
//!
//! The report is how systematic extraction drift across eras gets caught:
//! a sudden collapse of action counts in one era, or a spike in flagged or
//! unverified rows, shows up here before anyone queries the dataset.

use std::collections::BTreeMap;

/// Counts for one era.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EraCounts {
    /// Digests consolidated.
    pub digests: usize,
    /// Enforcement-action rows.
    pub actions: usize,
    /// Trading-suspension rows.
    pub suspensions: usize,
    /// Rows flagged by re-validation.
    pub flagged: usize,
    /// Entries whose excerpt did not verify.
    pub unverified_excerpts: usize,
}

/// Quality report for one consolidation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    /// Run identifier (UUIDv7, chronologically sortable).
    pub run_id: String,

    /// Unix seconds at run start.
    pub started_at: i64,

    /// Unix seconds at run end.
    pub finished_at: i64,

    /// Counts keyed by era label.
    pub per_era: BTreeMap<String, EraCounts>,

    /// Artifacts displaced by same-date deduplication.
    pub superseded: usize,

    /// Artifacts that could not be read or parsed from disk.
    pub unreadable_artifacts: usize,
}

impl QualityReport {
    /// Total digests across eras.
    pub fn total_digests(&self) -> usize {
        self.per_era.values().map(|c| c.digests).sum()
    }

    /// Total enforcement-action rows across eras.
    pub fn total_actions(&self) -> usize {
        self.per_era.values().map(|c| c.actions).sum()
    }

    /// Total trading-suspension rows across eras.
    pub fn total_suspensions(&self) -> usize {
        self.per_era.values().map(|c| c.suspensions).sum()
    }

    /// Total flagged rows across eras.
    pub fn total_flagged(&self) -> usize {
        self.per_era.values().map(|c| c.flagged).sum()
    }

    /// Total unverified excerpts across eras.
    pub fn total_unverified(&self) -> usize {
        self.per_era.values().map(|c| c.unverified_excerpts).sum()
    }

    /// Generate a human-readable summary block.
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Consolidation run {}", self.run_id),
            format!(
                "  digests: {}, actions: {}, suspensions: {}",
                self.total_digests(),
                self.total_actions(),
                self.total_suspensions()
            ),
            format!(
                "  flagged rows: {}, unverified excerpts: {}, superseded: {}, unreadable: {}",
                self.total_flagged(),
                self.total_unverified(),
                self.superseded,
                self.unreadable_artifacts
            ),
        ];
        for (era, counts) in &self.per_era {
            lines.push(format!(
                "  [{}] digests: {}, actions: {}, suspensions: {}, flagged: {}, unverified: {}",
                era, counts.digests, counts.actions, counts.suspensions, counts.flagged,
                counts.unverified_excerpts
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> QualityReport {
        let mut report = QualityReport {
            run_id: "0192-test".to_string(),
            ..QualityReport::default()
        };
        report.per_era.insert(
            "typeset".to_string(),
            EraCounts {
                digests: 2,
                actions: 5,
                suspensions: 1,
                flagged: 1,
                unverified_excerpts: 2,
            },
        );
        report.per_era.insert(
            "text".to_string(),
            EraCounts {
                digests: 3,
                actions: 4,
                suspensions: 0,
                flagged: 0,
                unverified_excerpts: 0,
            },
        );
        report
    }

    #[test]
    fn test_totals_sum_across_eras() {
        let report = report();
        assert_eq!(report.total_digests(), 5);
        assert_eq!(report.total_actions(), 9);
        assert_eq!(report.total_flagged(), 1);
        assert_eq!(report.total_unverified(), 2);
    }

    #[test]
    fn test_summary_lists_every_era() {
        let summary = report().summary();
        assert!(summary.contains("[typeset]"));
        assert!(summary.contains("[text]"));
        assert!(summary.contains("flagged rows: 1"));
    }
}

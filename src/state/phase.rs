/// Phase definitions for tracking analysis progress
///
/// This module defines the phases an analysis run moves through.
use std::fmt;

/// Represents the current phase of an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnalysisPhase {
    // ===== Active Phases =====
    /// Result pages are being fetched and parsed
    #[default]
    Scraping,

    /// Listing titles are being matched to products
    Normalizing,

    /// Recognized sales are being attached to products and persisted
    Saving,

    // ===== Terminal Phases =====
    /// Run finished, possibly with zero results
    Complete,

    /// Run aborted with an error
    Failed,
}

impl AnalysisPhase {
    /// Returns true if no further progress will be reported after this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Returns true if this is an active phase
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Scraping => "scraping",
            Self::Normalizing => "normalizing",
            Self::Saving => "saving",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Returns None if the string doesn't match any known phase.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "scraping" => Some(Self::Scraping),
            "normalizing" => Some(Self::Normalizing),
            "saving" => Some(Self::Saving),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AnalysisPhase; 5] = [
        AnalysisPhase::Scraping,
        AnalysisPhase::Normalizing,
        AnalysisPhase::Saving,
        AnalysisPhase::Complete,
        AnalysisPhase::Failed,
    ];

    #[test]
    fn test_terminal_phases() {
        assert!(AnalysisPhase::Complete.is_terminal());
        assert!(AnalysisPhase::Failed.is_terminal());
        assert!(AnalysisPhase::Scraping.is_active());
        assert!(AnalysisPhase::Normalizing.is_active());
        assert!(AnalysisPhase::Saving.is_active());
    }

    #[test]
    fn test_db_string_roundtrip() {
        for phase in ALL {
            assert_eq!(
                AnalysisPhase::from_db_string(phase.to_db_string()),
                Some(phase)
            );
        }
    }

    #[test]
    fn test_invalid_db_string() {
        assert_eq!(AnalysisPhase::from_db_string("paused"), None);
        assert_eq!(AnalysisPhase::from_db_string(""), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(AnalysisPhase::Saving.to_string(), "saving");
    }
}

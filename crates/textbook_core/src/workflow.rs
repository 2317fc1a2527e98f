//! crates/textbook_core/src/workflow.rs
//!
//! The workflow step machine. Steps are ordered for display and navigation,
//! but moving between them is never gated: the step is advisory state and the
//! presentation layer renders empty states for data that is not ready yet.

use crate::domain::Project;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Upload,
    Extract,
    Analyze,
    Generate,
    Preview,
    Export,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::Upload,
        Step::Extract,
        Step::Analyze,
        Step::Generate,
        Step::Preview,
        Step::Export,
    ];

    /// Zero-based position in the workflow.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Step> {
        Step::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<Step> {
        self.index().checked_sub(1).map(|i| Step::ALL[i])
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Upload => "Upload PDFs",
            Step::Extract => "Extract Text",
            Step::Analyze => "Analyze Content",
            Step::Generate => "Generate Textbook",
            Step::Preview => "Preview",
            Step::Export => "Export",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Step::Upload => "upload",
            Step::Extract => "extract",
            Step::Analyze => "analyze",
            Step::Generate => "generate",
            Step::Preview => "preview",
            Step::Export => "export",
        }
    }

    /// The step a project opens on when it is selected.
    pub fn for_selection(project: &Project) -> Step {
        if project.documents.is_empty() {
            Step::Upload
        } else {
            Step::Extract
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == wanted)
            .ok_or_else(|| format!("unknown workflow step '{}'", s))
    }
}

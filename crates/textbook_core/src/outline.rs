//! crates/textbook_core/src/outline.rs
//!
//! The shape of what an outline generator hands back, and how it is folded into
//! chapters. A generator may answer with prose or with a structured outline;
//! anything that does not parse as the structured shape is kept as prose.

use crate::domain::{Chapter, Section};
use serde::{Deserialize, Serialize};

/// Title given to the single section that wraps a free-text answer.
pub const FREE_TEXT_SECTION_TITLE: &str = "Overview";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<SectionDraft>,
}

/// `{ "chapters": [ { "title": .., "sections": [ { "title": .., "content": .. } ] } ] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlinePayload {
    pub chapters: Vec<ChapterDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutput {
    FreeText(String),
    Structured(OutlinePayload),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutlineError {
    #[error("the generated outline is empty")]
    Empty,
}

impl GenerationOutput {
    /// Classifies a raw generator answer. Never fails: unparseable payloads
    /// fall back to `FreeText`.
    pub fn from_response(raw: &str) -> Self {
        let body = strip_code_fence(raw.trim());
        match serde_json::from_str::<OutlinePayload>(body) {
            Ok(payload) => GenerationOutput::Structured(payload),
            Err(_) => GenerationOutput::FreeText(raw.trim().to_string()),
        }
    }

    /// Maps the output to chapters with positional ids (`chapter-{i}`,
    /// `section-{i}-{j}`, both 1-based). Free text becomes one chapter titled
    /// `fallback_title` holding one section.
    pub fn into_chapters(self, fallback_title: &str) -> Result<Vec<Chapter>, OutlineError> {
        match self {
            GenerationOutput::FreeText(text) => {
                if text.trim().is_empty() {
                    return Err(OutlineError::Empty);
                }
                Ok(vec![Chapter {
                    id: "chapter-1".to_string(),
                    title: fallback_title.to_string(),
                    sections: vec![Section {
                        id: "section-1-1".to_string(),
                        title: FREE_TEXT_SECTION_TITLE.to_string(),
                        content: text,
                    }],
                }])
            }
            GenerationOutput::Structured(payload) => {
                if payload.chapters.is_empty() {
                    return Err(OutlineError::Empty);
                }
                let chapters = payload
                    .chapters
                    .into_iter()
                    .enumerate()
                    .map(|(ci, draft)| {
                        let chapter_no = ci + 1;
                        let sections = draft
                            .sections
                            .into_iter()
                            .enumerate()
                            .map(|(si, section)| Section {
                                id: format!("section-{}-{}", chapter_no, si + 1),
                                title: non_blank_or(section.title, || format!("Section {}", si + 1)),
                                content: section.content,
                            })
                            .collect();
                        Chapter {
                            id: format!("chapter-{}", chapter_no),
                            title: non_blank_or(draft.title, || format!("Chapter {}", chapter_no)),
                            sections,
                        }
                    })
                    .collect();
                Ok(chapters)
            }
        }
    }
}

fn non_blank_or(value: String, fallback: impl FnOnce() -> String) -> String {
    if value.trim().is_empty() {
        fallback()
    } else {
        value
    }
}

/// LLMs often wrap JSON in a Markdown fence; peel it off when present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match rest.find('\n') {
        Some(newline) => rest[newline + 1..].trim(),
        None => rest.trim(),
    }
}

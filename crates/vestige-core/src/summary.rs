//! The "Category - Description" naming convention.
//!
//! A work item described as `Writing - Draft report` belongs to the
//! `Writing` category, and its event is routed to a calendar of that name.
//! Text without the spaced hyphen has no category.

use serde::{Deserialize, Serialize};

/// Separates the category from the rest of a summary.
pub const CATEGORY_DELIMITER: &str = " - ";

/// What [`CATEGORY_DELIMITER`] is rewritten to by [`SummaryStyle::EmDash`].
pub const EM_DASH_DELIMITER: &str = " \u{2014} ";

/// A category parsed from a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category<'a> {
    /// The category as typed, used when a calendar has to be created.
    pub name: &'a str,
    /// Lowercased name, used as the calendar lookup key.
    pub key: String,
}

/// Extracts the category from a summary.
///
/// Everything before the first [`CATEGORY_DELIMITER`] is the category.
/// Returns `None` when the delimiter is absent or the text in front of it
/// is blank.
pub fn parse_category(summary: &str) -> Option<Category<'_>> {
    let (name, _) = summary.split_once(CATEGORY_DELIMITER)?;
    if name.trim().is_empty() {
        return None;
    }

    Some(Category {
        name,
        key: name.to_lowercase(),
    })
}

/// How the summary text is presented on the calendar event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    /// Replace every `" - "` with an em-dash.
    #[default]
    EmDash,
    /// Leave the text exactly as typed.
    Plain,
}

impl SummaryStyle {
    /// Picks a style from the `em_dash` setting.
    pub fn from_em_dash(em_dash: bool) -> Self {
        if em_dash { Self::EmDash } else { Self::Plain }
    }

    /// Renders a summary for display on the calendar.
    pub fn render(&self, summary: &str) -> String {
        match self {
            Self::EmDash => summary.replace(CATEGORY_DELIMITER, EM_DASH_DELIMITER),
            Self::Plain => summary.to_string(),
        }
    }
}

//! The file list, as preview cards.

use std::fmt;

use super::FormState;

/// Shown instead of an empty grid.
pub const EMPTY_GRID_MESSAGE: &str = "No files uploaded yet.";

/// How a file can be previewed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewKind {
    /// Shown inline as an image.
    Image,
    /// Embedded in a document viewer.
    Document,
    /// No preview; name and time only.
    None,
}

impl PreviewKind {
    pub fn for_media_type(media_type: &str) -> Self {
        if media_type.starts_with("image/") {
            PreviewKind::Image
        } else if media_type == "application/pdf" {
            PreviewKind::Document
        } else {
            PreviewKind::None
        }
    }
}

/// One card in the grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewCard {
    pub kind: PreviewKind,
    pub name: String,
    pub uploaded_at: String,
    pub preview_url: String,
}

/// What the file list looks like.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileGrid {
    /// No files; show [`EMPTY_GRID_MESSAGE`].
    Empty,
    /// One card per file, newest first.
    Cards(Vec<PreviewCard>),
}

impl FileGrid {
    pub fn from_state(state: &FormState) -> Self {
        if state.files().is_empty() {
            return FileGrid::Empty;
        }
        FileGrid::Cards(
            state
                .files()
                .iter()
                .map(|entry| PreviewCard {
                    kind: PreviewKind::for_media_type(&entry.file.media_type),
                    name: entry.file.name.clone(),
                    uploaded_at: entry.uploaded_at.clone(),
                    preview_url: entry.preview.as_str().to_owned(),
                })
                .collect(),
        )
    }
}

impl fmt::Display for FileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileGrid::Empty => write!(f, "{EMPTY_GRID_MESSAGE}"),
            FileGrid::Cards(cards) => {
                for (idx, card) in cards.iter().enumerate() {
                    if idx > 0 {
                        writeln!(f)?;
                    }
                    let icon = match card.kind {
                        PreviewKind::Image => "🖼️",
                        PreviewKind::Document => "📄",
                        PreviewKind::None => "📎",
                    };
                    write!(f, "{icon} {} (uploaded: {})", card.name, card.uploaded_at)?;
                }
                Ok(())
            }
        }
    }
}

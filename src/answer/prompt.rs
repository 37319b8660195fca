//! Building the text we send to the LLM.

/// Text extracted from an upload. Never empty or whitespace-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    /// Wrap OCR output, or return `None` if it contains no visible text.
    pub fn new(text: String) -> Option<Self> {
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Combine extracted text and the user's question into a single prompt.
///
/// Both inputs are embedded verbatim. Long documents are not truncated.
pub fn compose_prompt(extracted: &ExtractedText, question: &str) -> String {
    format!(
        "Extracted text from image:\n{}\n\nUser question: {}\n\nAnswer:",
        extracted.as_str(),
        question
    )
}

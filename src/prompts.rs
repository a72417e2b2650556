//! Prompt text for AI cover generation.
//!
//! Callers can pass their own prompt to
//! [`crate::providers::ImageGenerator::generate`]; the template here is used
//! when only a book title is known.

/// Default cover prompt. `{title}` is replaced with the book title.
pub const DEFAULT_COVER_PROMPT: &str = "Design a professional, visually striking book cover for a book titled \"{title}\". The cover should have elegant typography for the title, a compelling and thematic illustration or design, and a cohesive color palette. The style should be modern and suitable for an ebook. No author name needed. Portrait orientation, high quality.";

/// Fill [`DEFAULT_COVER_PROMPT`] for `title`.
///
/// Double quotes in the title become single quotes so the quoted title stays
/// well-formed inside the prompt.
pub fn default_cover_prompt(title: &str) -> String {
    DEFAULT_COVER_PROMPT.replace("{title}", &title.trim().replace('"', "'"))
}

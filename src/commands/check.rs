use anyhow::{anyhow, Result};

use crate::clipboard::extract_media_url;

/// Report whether a piece of text would be picked up from the clipboard
pub struct CheckCommand {
    text: String,
}

impl CheckCommand {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    /// The link that would be queued
    pub fn execute(&self) -> Result<String> {
        extract_media_url(&self.text)
            .ok_or_else(|| anyhow!("No supported media link found in {:?}", self.text))
    }
}

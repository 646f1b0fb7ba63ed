//! Reading the text to analyze.

use crate::cli::Args;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

/// Where the input text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Inline(String),
    File(PathBuf),
    Stdin,
}

impl InputSource {
    /// `--text` wins over `--input`; stdin is the fallback.
    pub fn from_args(args: &Args) -> Self {
        if let Some(ref text) = args.text {
            InputSource::Inline(text.clone())
        } else if let Some(ref path) = args.input {
            InputSource::File(path.clone())
        } else {
            InputSource::Stdin
        }
    }

    /// Short label for reports.
    pub fn label(&self) -> String {
        match self {
            InputSource::Inline(_) => "inline".to_string(),
            InputSource::File(path) => path.display().to_string(),
            InputSource::Stdin => "stdin".to_string(),
        }
    }

    /// Read the full text.
    pub fn read(&self) -> Result<String> {
        let text = match self {
            InputSource::Inline(text) => text.clone(),
            InputSource::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file: {}", path.display()))?,
            InputSource::Stdin => {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read text from stdin")?;
                buffer
            }
        };

        debug!("Read {} bytes from {}", text.len(), self.label());
        Ok(strip_bom(text))
    }
}

fn strip_bom(text: String) -> String {
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

use std::path::Path;
use tracing::debug;

use crate::error::ScoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMediaType {
    Pdf,
    Doc,
    Docx,
}

impl ResumeMediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            ResumeMediaType::Pdf => "application/pdf",
            ResumeMediaType::Doc => "application/msword",
            ResumeMediaType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ResumeMediaType::Pdf => "pdf",
            ResumeMediaType::Doc => "doc",
            ResumeMediaType::Docx => "docx",
        }
    }

    pub fn from_mime(mime: &str) -> Result<Self, ScoutError> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        [ResumeMediaType::Pdf, ResumeMediaType::Doc, ResumeMediaType::Docx]
            .into_iter()
            .find(|t| t.mime() == essence)
            .ok_or_else(|| unsupported(mime))
    }

    pub fn from_path(path: &Path) -> Result<Self, ScoutError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(ResumeMediaType::Pdf),
            "doc" => Ok(ResumeMediaType::Doc),
            "docx" => Ok(ResumeMediaType::Docx),
            _ => Err(unsupported(&path.display().to_string())),
        }
    }
}

fn unsupported(what: &str) -> ScoutError {
    ScoutError::Validation(format!(
        "Only PDF and Word documents (.pdf, .doc, .docx) are supported, got {}",
        what
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeFile {
    pub media_type: ResumeMediaType,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeInput {
    Text(String),
    File(ResumeFile),
}

impl ResumeInput {
    /// Reads a resume file, taking the media type from its extension. The
    /// type is checked before the file is opened.
    pub fn from_path(path: &Path) -> Result<Self, ScoutError> {
        Self::from_file(path, ResumeMediaType::from_path(path)?)
    }

    /// Reads a resume file whose media type was declared by the caller.
    pub fn from_file(path: &Path, media_type: ResumeMediaType) -> Result<Self, ScoutError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ScoutError::Validation(format!("Failed to read resume file {}: {}", path.display(), e))
        })?;
        Ok(ResumeInput::File(ResumeFile { media_type, bytes }))
    }

    /// Rejects input that cannot possibly be analyzed.
    pub fn validate(&self) -> Result<(), ScoutError> {
        match self {
            ResumeInput::Text(text) if text.trim().is_empty() => Err(ScoutError::Validation(
                "Please paste your resume text or choose a resume file.".to_string(),
            )),
            ResumeInput::File(file) if file.bytes.is_empty() => Err(ScoutError::Validation(
                "The selected resume file is empty.".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Pulls plain text out of a PDF resume.
pub fn pdf_text(bytes: &[u8]) -> Result<String, ScoutError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ScoutError::Validation(format!("Could not read PDF resume: {}", e)))?;
    debug!("Extracted {} characters from PDF resume", text.len());
    if text.trim().is_empty() {
        return Err(ScoutError::Validation(
            "The PDF resume contains no extractable text.".to_string(),
        ));
    }
    Ok(text)
}

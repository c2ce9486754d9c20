use std::path::{Path, PathBuf};

use super::ValidationError;

pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 30;
pub const DEFAULT_ACCEPTED_FILE_TYPES: &[&str] = &[".pdf", ".md"];

/// Size limit and extension allow-list applied before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRules {
    max_file_size_mb: u64,
    accepted_file_types: Vec<String>,
}

impl Default for FileRules {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE_MB, DEFAULT_ACCEPTED_FILE_TYPES)
    }
}

impl FileRules {
    /// Allow-list entries are matched case-insensitively, with or without
    /// their leading dot.
    pub fn new<I, S>(max_file_size_mb: u64, accepted_file_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let accepted_file_types = accepted_file_types
            .into_iter()
            .map(|t| {
                let t = t.as_ref().trim().to_lowercase();
                if t.starts_with('.') {
                    t
                } else {
                    format!(".{}", t)
                }
            })
            .collect();
        Self {
            max_file_size_mb,
            accepted_file_types,
        }
    }

    /// The broader rule set of the generic upload widget: 10MB and common
    /// document formats.
    pub fn permissive() -> Self {
        Self::new(10, [".pdf", ".doc", ".docx", ".txt", ".md"])
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    pub fn accepted_file_types(&self) -> &[String] {
        &self.accepted_file_types
    }

    /// Size first, then extension.
    pub fn check(&self, file_name: &str, size: u64) -> Result<(), ValidationError> {
        if size > self.max_bytes() {
            return Err(ValidationError::TooLarge {
                limit_mb: self.max_file_size_mb,
            });
        }

        let extension = extension_of(file_name);
        if !self.accepted_file_types.contains(&extension) {
            return Err(ValidationError::UnsupportedType {
                extension,
                accepted: self.accepted_file_types.clone(),
            });
        }
        Ok(())
    }

    /// Validates a file on disk and stages it for upload. Nothing is sent.
    pub fn select_file(&self, path: &Path) -> Result<StagedFile, ValidationError> {
        let size = std::fs::metadata(path)?.len();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        self.check(&file_name, size)?;
        Ok(StagedFile {
            path: path.to_path_buf(),
            display_name: file_name.clone(),
            file_name,
            size,
            description: String::new(),
        })
    }
}

/// Lower-cased last `.` segment with its dot, or empty when the name has no
/// dot at all.
fn extension_of(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// A validated file waiting for the user to confirm name and description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    /// Sent as `fileName`; defaults to the original file name.
    pub display_name: String,
    pub description: String,
}

impl StagedFile {
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.display_name = name;
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

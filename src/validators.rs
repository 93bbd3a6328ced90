//! Client-side validation run before anything reaches the network

use crate::types::UploadFile;
use std::collections::HashSet;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_NAME_LEN: usize = 2;
pub const MAX_FILES: usize = 50;
pub const MIN_BATCH_FILES: usize = 5;
pub const MAX_IMAGE_SIZE_MB: f64 = 50.0;
pub const MAX_BATCH_TOTAL_MB: f64 = 500.0;

/// Types accepted for aerial photos
pub const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "jpeg", "jpg", "png"];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Email is required")]
    EmailRequired,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password is required")]
    PasswordRequired,

    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("Name is required")]
    NameRequired,

    #[error("Name must be at least {min} characters long")]
    NameTooShort { min: usize },

    #[error("Unsupported file format \"{name}\". Allowed: {allowed}")]
    UnsupportedFileType { name: String, allowed: String },

    #[error("File \"{name}\" is too large ({size_mb:.2}MB). Maximum: {max_mb}MB")]
    FileTooLarge { name: String, size_mb: f64, max_mb: f64 },

    #[error("File \"{name}\" is empty or corrupted")]
    EmptyFile { name: String },

    #[error("Select at least one file")]
    NoFiles,

    #[error("Maximum {max} files at a time")]
    TooManyFiles { max: usize },

    #[error("Duplicate file names: {}", .0.join(", "))]
    DuplicateFileNames(Vec<String>),

    #[error("Batch processing requires a minimum {min} images")]
    BatchTooSmall { min: usize },

    #[error("Batch processing accepts a maximum {max} images")]
    BatchTooLarge { max: usize },

    #[error("Total file size is too large ({total_mb:.2}MB). Maximum: {max_mb}MB")]
    BatchTotalTooLarge { total_mb: f64, max_mb: f64 },

    #[error("Select at least one generation type")]
    NoGenerationMode,

    #[error("Single processing takes exactly one image, got {count}")]
    SingleRequiresOneFile { count: usize },

    #[error("{count} images is not enough: select one image or at least {min} for batch processing")]
    InsufficientFiles { count: usize, min: usize },
}

pub type ValidationResult = Result<(), ValidationError>;

/// Same shape as `^[^\s@]+@[^\s@]+\.[^\s@]+$`
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    // A dot with at least one character on each side
    let chars: Vec<char> = domain.chars().collect();
    chars.len() >= 3 && chars[1..chars.len() - 1].contains(&'.')
}

pub fn validate_email(email: &str) -> ValidationResult {
    if email.is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    if !is_valid_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult {
    if password.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

pub fn validate_name(name: &str) -> ValidationResult {
    if name.is_empty() {
        return Err(ValidationError::NameRequired);
    }
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ValidationError::NameTooShort { min: MIN_NAME_LEN });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordStrength {
    /// 0 to 6
    pub score: u8,
    pub label: &'static str,
}

pub fn password_strength(password: &str) -> PasswordStrength {
    let length = password.chars().count();
    let checks = [
        length >= 8,
        length >= 12,
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ];
    let score = checks.iter().filter(|passed| **passed).count() as u8;

    let label = match score {
        0..=1 => "weak",
        2..=3 => "fair",
        4..=5 => "good",
        _ => "excellent",
    };
    PasswordStrength { score, label }
}

/// Check one file against a list of accepted types and a size limit.
///
/// A type matches when the declared content type contains it or the file
/// name ends with it as an extension.
pub fn validate_file(file: &UploadFile, allowed_types: &[&str], max_size_mb: f64) -> ValidationResult {
    let content_type = file.content_type.as_deref().unwrap_or_default().to_lowercase();
    let file_name = file.name.to_lowercase();

    let type_ok = allowed_types.iter().any(|allowed| {
        let clean = allowed.trim_start_matches("image/").replace('/', "");
        !clean.is_empty()
            && (content_type.contains(&clean) || file_name.ends_with(&format!(".{clean}")))
    });
    if !type_ok {
        let allowed = allowed_types
            .iter()
            .map(|t| t.trim_start_matches("image/"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ValidationError::UnsupportedFileType {
            name: file.name.clone(),
            allowed,
        });
    }

    let size_mb = file.size() as f64 / BYTES_PER_MB;
    if size_mb > max_size_mb {
        return Err(ValidationError::FileTooLarge {
            name: file.name.clone(),
            size_mb,
            max_mb: max_size_mb,
        });
    }

    if file.size() == 0 {
        return Err(ValidationError::EmptyFile {
            name: file.name.clone(),
        });
    }

    Ok(())
}

/// Validate a set of aerial photos
pub fn validate_image_files(files: &[UploadFile]) -> ValidationResult {
    if files.is_empty() {
        return Err(ValidationError::NoFiles);
    }
    if files.len() > MAX_FILES {
        return Err(ValidationError::TooManyFiles { max: MAX_FILES });
    }

    for file in files {
        validate_file(file, IMAGE_TYPES, MAX_IMAGE_SIZE_MB)?;
    }

    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for file in files {
        if !seen.insert(file.name.as_str()) && !duplicates.contains(&file.name) {
            duplicates.push(file.name.clone());
        }
    }
    if !duplicates.is_empty() {
        return Err(ValidationError::DuplicateFileNames(duplicates));
    }

    Ok(())
}

/// Validate a photogrammetry batch
pub fn validate_batch_files(files: &[UploadFile]) -> ValidationResult {
    if files.len() < MIN_BATCH_FILES {
        return Err(ValidationError::BatchTooSmall {
            min: MIN_BATCH_FILES,
        });
    }
    if files.len() > MAX_FILES {
        return Err(ValidationError::BatchTooLarge { max: MAX_FILES });
    }

    validate_image_files(files)?;

    let total_mb = files.iter().map(UploadFile::size).sum::<u64>() as f64 / BYTES_PER_MB;
    if total_mb > MAX_BATCH_TOTAL_MB {
        return Err(ValidationError::BatchTotalTooLarge {
            total_mb,
            max_mb: MAX_BATCH_TOTAL_MB,
        });
    }

    Ok(())
}

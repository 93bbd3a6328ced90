//! Type definitions for the dev2gis API

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Access + refresh token pair as issued by the auth endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// Cached user record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserInfo {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Body of login and registration responses
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub tokens: Option<TokenPair>,
}

/// Processing state of a heightmap or batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Completed and failed jobs never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Single-image depth-estimation job
#[derive(Debug, Clone, Deserialize)]
pub struct HeightmapJob {
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    #[serde(default)]
    pub result_url: Option<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Multi-image photogrammetry job
#[derive(Debug, Clone, Deserialize)]
pub struct BatchHeightmapJob {
    pub id: String,
    pub user_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub orthophoto_url: Option<String>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    pub image_count: i32,
    #[serde(default)]
    pub processed_count: i32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    pub merge_method: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeightmapList {
    #[serde(default)]
    pub heightmaps: Vec<HeightmapJob>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchHeightmapList {
    #[serde(default)]
    pub batch_heightmaps: Vec<BatchHeightmapJob>,
    pub limit: u32,
    pub offset: u32,
}

/// Accepted single upload
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub status: JobStatus,
}

/// Accepted batch upload
#[derive(Debug, Clone, Deserialize)]
pub struct BatchUploadResponse {
    pub id: String,
    pub status: JobStatus,
    pub image_count: u32,
    pub merge_method: String,
}

/// How the photogrammetry engine merges overlapping depth data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Low,
    #[default]
    Medium,
    Max,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Low => "low",
            MergeMethod::Medium => "medium",
            MergeMethod::Max => "max",
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which products a batch job generates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Heightmap,
    Orthophoto,
    Both,
}

impl GenerationMode {
    /// Derive the mode from the two generation toggles.
    ///
    /// Returns `None` when neither product is selected.
    pub fn from_flags(heightmap: bool, orthophoto: bool) -> Option<Self> {
        match (heightmap, orthophoto) {
            (true, true) => Some(GenerationMode::Both),
            (false, true) => Some(GenerationMode::Orthophoto),
            (true, false) => Some(GenerationMode::Heightmap),
            (false, false) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Heightmap => "heightmap",
            GenerationMode::Orthophoto => "orthophoto",
            GenerationMode::Both => "both",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a batch upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub merge_method: MergeMethod,
    pub fast_mode: bool,
    pub generate_heightmap: bool,
    pub generate_orthophoto: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            merge_method: MergeMethod::default(),
            fast_mode: false,
            generate_heightmap: true,
            generate_orthophoto: false,
        }
    }
}

impl BatchOptions {
    pub fn generation_mode(&self) -> Option<GenerationMode> {
        GenerationMode::from_flags(self.generate_heightmap, self.generate_orthophoto)
    }
}

/// Processing path implied by the number of selected files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingKind {
    None,
    Single,
    Insufficient,
    Batch,
}

impl ProcessingKind {
    pub fn for_count(count: usize) -> Self {
        match count {
            0 => ProcessingKind::None,
            1 => ProcessingKind::Single,
            2..=4 => ProcessingKind::Insufficient,
            _ => ProcessingKind::Batch,
        }
    }
}

/// Result of [`crate::ApiClient::submit_upload`]
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Single(UploadResponse),
    Batch(BatchUploadResponse),
}

impl UploadOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            UploadOutcome::Single(r) => &r.id,
            UploadOutcome::Batch(r) => &r.id,
        }
    }
}

/// A file selected for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    /// Declared MIME type, if known
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadFile {
    /// Build a file, inferring the content type from the name's extension
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let content_type = content_type_for(&name).map(str::to_string);
        Self {
            name,
            content_type,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// MIME type sent with the multipart part
    pub fn mime(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}

fn content_type_for(name: &str) -> Option<&'static str> {
    let extension = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// Pagination for list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 20, offset: 0 }
    }
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset,
        }
    }

    pub(crate) fn query(&self) -> [(&'static str, String); 2] {
        [
            ("limit", self.limit.clamp(1, Self::MAX_LIMIT).to_string()),
            ("offset", self.offset.to_string()),
        ]
    }
}

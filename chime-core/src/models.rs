use crate::errors::{ChimeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

/// Message the assembly endpoint returns once every chunk of a file is in.
pub const ASSEMBLED_MESSAGE: &str = "File assembled successfully.";

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Routing tag sent with every chunk so the server files the upload correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadType {
    Course,
    Quiz,
    LiveSession,
    Image,
}

impl UploadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadType::Course => "course",
            UploadType::Quiz => "quiz",
            UploadType::LiveSession => "live_session",
            UploadType::Image => "image",
        }
    }
}

impl fmt::Display for UploadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UploadType {
    type Err = ChimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "course" => Ok(UploadType::Course),
            "quiz" => Ok(UploadType::Quiz),
            "live_session" => Ok(UploadType::LiveSession),
            "image" => Ok(UploadType::Image),
            other => Err(ChimeError::InvalidForm(format!("unknown upload type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
enum FileSource {
    Memory(Arc<[u8]>),
    Disk { path: PathBuf, len: u64 },
}

/// A file selected for upload: a declared name plus its bytes, either held
/// in memory or read lazily from disk one chunk at a time.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    source: FileSource,
}

impl UploadFile {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(Arc::from(data.into())),
        }
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .ok_or_else(|| ChimeError::InvalidForm(format!("invalid file path {}", path.display())))?
            .to_string_lossy()
            .to_string();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(ChimeError::InvalidForm(format!("{} is not a file", path.display())));
        }

        Ok(Self {
            name,
            source: FileSource::Disk {
                path: path.to_path_buf(),
                len: metadata.len(),
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        match &self.source {
            FileSource::Memory(data) => data.len() as u64,
            FileSource::Disk { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same content under a different declared name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: self.source.clone(),
        }
    }

    pub async fn read_chunk(&self, range: Range<u64>) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(data) => Ok(data[range.start as usize..range.end as usize].to_vec()),
            FileSource::Disk { path, .. } => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(range.start)).await?;
                let mut buf = vec![0u8; (range.end - range.start) as usize];
                file.read_exact(&mut buf).await?;
                Ok(buf)
            }
        }
    }
}

/// One multipart request to the assembly endpoint.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub file_name: String,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub course_title: Option<String>,
    pub upload_type: Option<UploadType>,
    pub data: Vec<u8>,
}

/// Body the assembly endpoint answers each chunk with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "fileName", default)]
    pub file_name: Option<String>,
}

impl ChunkReceipt {
    pub fn is_assembled(&self) -> bool {
        self.message.as_deref() == Some(ASSEMBLED_MESSAGE)
    }
}

/// Handle of a file the server has finished assembling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledFile {
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionPhase {
    Idle,
    Uploading,
    Submitting,
    Succeeded,
    Failed,
}

impl SubmissionPhase {
    pub fn can_advance_to(self, next: SubmissionPhase) -> bool {
        use SubmissionPhase::*;
        matches!(
            (self, next),
            (Idle, Uploading)
                | (Uploading, Submitting)
                | (Uploading, Failed)
                | (Submitting, Succeeded)
                | (Submitting, Failed)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadEvent {
    pub status: UploadStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum UploadStatus {
    Phase(SubmissionPhase),
    FileStarted {
        file_name: String,
        upload_type: Option<UploadType>,
        total_size: u64,
        total_chunks: u64,
    },
    ChunkCompleted {
        file_name: String,
        chunk_index: u64,
        total_chunks: u64,
        bytes: u64,
    },
    FileCompleted { file_name: String, assembled_name: String },
    Created { title: String },
    Failed { error: String },
}

// ---------------------------------------------------------------------------
// Accounts and cart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Banned,
    #[serde(other)]
    Absent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: Option<AccountStatus>,
}

impl UserDetails {
    pub fn account_status(&self) -> AccountStatus {
        self.status.unwrap_or(AccountStatus::Absent)
    }

    pub fn middle_name(&self) -> &str {
        self.middle_name.as_deref().unwrap_or("")
    }

    pub fn full_name(&self) -> String {
        [self.first_name.as_str(), self.middle_name(), self.last_name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartProduct {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub products: Vec<CartProduct>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Robot {
    pub title: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub description: String,
}

/// `{ "data": ... }` wrapper used by the cart and robot endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
}

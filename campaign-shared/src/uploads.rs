/// Image uploads
///
/// Each upload module (`campaign`, `default`) has an [`UploadPolicy`] with
/// size limits, accepted image types and the multipart field it reads. File
/// types are decided from the file's leading bytes, not from the client's
/// declared content type. Accepted files are written as
/// `<upload_dir>/<module>/<user_id>/<unix-nanos>.<ext>` and exposed under
/// `base_url`; only the uploading user may remove them.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageType {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageType {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Png => "image/png",
            ImageType::Gif => "image/gif",
            ImageType::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageType::Jpeg => "jpg",
            ImageType::Png => "png",
            ImageType::Gif => "gif",
            ImageType::Webp => "webp",
        }
    }

    /// Identifies an image from its magic number
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageType::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageType::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageType::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageType::Webp)
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("unknown upload module {0:?}")]
    UnknownModule(String),

    #[error("file must be at least {min} bytes")]
    TooSmall { min: usize },

    #[error("file may not be larger than {max} bytes")]
    TooLarge { max: usize },

    #[error("file type is not allowed; accepted types: {0}")]
    UnsupportedType(String),

    #[error("URL is not a file served by this application")]
    ForeignUrl,

    #[error("file was uploaded by another user")]
    NotOwner,

    #[error("file not found")]
    NotFound,

    #[error("file storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Limits for one upload module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub module: &'static str,
    pub min_size: usize,
    pub max_size: usize,
    pub allowed_types: &'static [ImageType],
    /// Multipart field carrying the files
    pub field_name: &'static str,
}

impl UploadPolicy {
    pub const CAMPAIGN: UploadPolicy = UploadPolicy {
        module: "campaign",
        min_size: KIB,
        max_size: 5 * MIB,
        allowed_types: &[ImageType::Jpeg, ImageType::Png, ImageType::Gif],
        field_name: "images",
    };

    pub const DEFAULT: UploadPolicy = UploadPolicy {
        module: "default",
        min_size: 512,
        max_size: 10 * MIB,
        allowed_types: &[ImageType::Jpeg, ImageType::Png, ImageType::Gif, ImageType::Webp],
        field_name: "image",
    };

    pub fn for_module(module: &str) -> Result<Self, UploadError> {
        match module {
            "campaign" => Ok(Self::CAMPAIGN),
            "default" => Ok(Self::DEFAULT),
            other => Err(UploadError::UnknownModule(other.to_string())),
        }
    }

    /// Largest request body this module can legitimately need for `files` files
    pub fn body_limit(&self, files: usize) -> usize {
        self.max_size.saturating_mul(files.max(1)).saturating_add(64 * KIB)
    }

    /// Checks size and detected type
    pub fn check(&self, bytes: &[u8]) -> Result<ImageType, UploadError> {
        if bytes.len() < self.min_size {
            return Err(UploadError::TooSmall { min: self.min_size });
        }

        if bytes.len() > self.max_size {
            return Err(UploadError::TooLarge { max: self.max_size });
        }

        ImageType::sniff(bytes)
            .filter(|t| self.allowed_types.contains(t))
            .ok_or_else(|| {
                let accepted: Vec<&str> = self.allowed_types.iter().map(ImageType::mime).collect();
                UploadError::UnsupportedType(accepted.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub path: PathBuf,
    pub url: String,
}

/// File behind an upload URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// User that uploaded the file
    pub owner_id: i64,
    pub path: PathBuf,
}

/// Filesystem location of uploads and the URL prefix they are served under
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    base_url: String,
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && segment.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn url_for(&self, module: &str, owner_id: i64, file_name: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, module, owner_id, file_name)
    }

    /// Validates `bytes` against `policy` and writes them under a fresh name in the owner's folder
    pub async fn store(&self, policy: &UploadPolicy, owner_id: i64, bytes: &[u8]) -> Result<StoredFile, UploadError> {
        let image_type = policy.check(bytes)?;

        let dir = self.root.join(policy.module).join(owner_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let mut stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        loop {
            let file_name = format!("{}.{}", stamp, image_type.extension());
            let path = dir.join(&file_name);

            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match file {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;

                    debug!(path = %path.display(), size = bytes.len(), "Stored upload");
                    return Ok(StoredFile {
                        url: self.url_for(policy.module, owner_id, &file_name),
                        path,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Maps a public URL back to its owner and file, refusing anything outside the store
    pub fn resolve_url(&self, url: &str) -> Result<ResolvedFile, UploadError> {
        let relative = url
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or(UploadError::ForeignUrl)?;

        let segments: Vec<&str> = relative.split('/').collect();
        let [module, owner, file] = segments.as_slice() else {
            return Err(UploadError::ForeignUrl);
        };

        let owner_id: i64 = owner.parse().map_err(|_| UploadError::ForeignUrl)?;
        if UploadPolicy::for_module(module).is_err() || !is_safe_segment(file) {
            return Err(UploadError::ForeignUrl);
        }

        Ok(ResolvedFile {
            owner_id,
            path: self.root.join(module).join(owner).join(file),
        })
    }

    /// Deletes the file behind `url` if `owner_id` uploaded it
    pub async fn remove_by_url(&self, url: &str, owner_id: i64) -> Result<(), UploadError> {
        let ResolvedFile { owner_id: uploader, path } = self.resolve_url(url)?;
        if uploader != owner_id {
            return Err(UploadError::NotOwner);
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "Removed upload");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(UploadError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

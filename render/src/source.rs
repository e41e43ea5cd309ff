//! Profile loading
//!
//! Profiles come from a local file or an `http(s)://` URL and may be pprof
//! protobuf (optionally gzip-compressed) or the JSON form of
//! [`Profile`].

use async_trait::async_trait;
use flate2::read::GzDecoder;
use prost::Message;
use sightline_shared::Profile;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

use crate::error::SourceError;
use crate::metrics;
use crate::proto::PprofProfile;
use crate::transport::Transport;

/// Where a profile is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileDescriptor {
    Path(PathBuf),
    Url(String),
}

impl ProfileDescriptor {
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            ProfileDescriptor::Url(s.to_string())
        } else {
            ProfileDescriptor::Path(PathBuf::from(s))
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ProfileDescriptor::Path(_) => "file",
            ProfileDescriptor::Url(_) => "http",
        }
    }
}

impl fmt::Display for ProfileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileDescriptor::Path(p) => write!(f, "{}", p.display()),
            ProfileDescriptor::Url(u) => f.write_str(u),
        }
    }
}

/// Fetches profiles.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch(&self, descriptor: &ProfileDescriptor) -> Result<Profile, SourceError>;
}

/// Reads local files with `tokio::fs` and remote profiles through the
/// shared transport.
#[derive(Clone, Debug)]
pub struct DefaultSource {
    transport: Transport,
}

impl DefaultSource {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    async fn read(&self, descriptor: &ProfileDescriptor) -> Result<Vec<u8>, SourceError> {
        match descriptor {
            ProfileDescriptor::Path(path) => {
                tokio::fs::read(path).await.map_err(|source| SourceError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
            ProfileDescriptor::Url(url) => self.transport.get(url).await,
        }
    }
}

#[async_trait]
impl ProfileSource for DefaultSource {
    async fn fetch(&self, descriptor: &ProfileDescriptor) -> Result<Profile, SourceError> {
        let result = self
            .read(descriptor)
            .await
            .and_then(|data| decode_profile(&data));
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::PROFILE_LOADS
            .with_label_values(&[descriptor.kind(), status])
            .inc();
        let profile = result?;
        info!(
            "Loaded profile {}: {} samples, types {:?}",
            descriptor,
            profile.samples.len(),
            profile.sample_type_names()
        );
        Ok(profile)
    }
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decode raw profile bytes: gzip is unwrapped first, then JSON or pprof
/// protobuf is chosen by the first byte.
pub fn decode_profile(data: &[u8]) -> Result<Profile, SourceError> {
    if data.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut inflated)
            .map_err(|e| SourceError::Decode(format!("gzip: {}", e)))?;
        return decode_profile(&inflated);
    }

    let first = data.iter().find(|b| !b.is_ascii_whitespace());
    if first == Some(&b'{') {
        return serde_json::from_slice(data)
            .map_err(|e| SourceError::Decode(format!("json: {}", e)));
    }

    let message =
        PprofProfile::decode(data).map_err(|e| SourceError::Decode(format!("protobuf: {}", e)))?;
    let profile = message.into_profile()?;
    if profile.sample_types.is_empty() {
        return Err(SourceError::Decode("profile has no sample types".to_string()));
    }
    Ok(profile)
}

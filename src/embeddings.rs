use crate::config::{EmbedderKind, StoreConfig};
use crate::error::{MemoryError, Result};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Embedding dimension for lite embedder
pub const LITE_DIM: usize = 384;

const READ_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RESPONSE_BYTES: u64 = 1024 * 1024;

/// Turns text into embedding vectors of a fixed dimension
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Short name shown in status output
    fn name(&self) -> &str;
}

// =============================================================================
// LiteEmbedder - hashed n-grams, no external service
// =============================================================================

/// Lightweight embedder using character n-gram hashing
pub struct LiteEmbedder {
    dim: usize,
}

impl Default for LiteEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl LiteEmbedder {
    pub fn new() -> Self {
        Self { dim: LITE_DIM }
    }

    pub fn with_dim(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Embedder for LiteEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_lowercase();
        let text = text.trim();
        let mut vector = vec![0.0f32; self.dim];

        let chars: Vec<char> = text.chars().collect();
        for window in chars.windows(3) {
            let trigram: String = window.iter().collect();
            vector[self.bucket(&trigram)] += 1.0;
        }

        // Whole words count double
        for word in text.split_whitespace() {
            vector[self.bucket(word)] += 2.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn name(&self) -> &str {
        "lite"
    }
}

impl LiteEmbedder {
    fn bucket(&self, token: &str) -> usize {
        let mut hasher = Md5::new();
        hasher.update(token.as_bytes());
        let hash = u128::from_be_bytes(hasher.finalize().into());
        (hash % self.dim as u128) as usize
    }
}

// =============================================================================
// ServerEmbedder - Unix socket client for an external embedding daemon
// =============================================================================

#[derive(Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum EmbedRequest<'a> {
    Ping,
    Embed { text: &'a str },
}

#[derive(Deserialize)]
struct EmbedResponse {
    ok: bool,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    error: Option<String>,
}

impl EmbedResponse {
    fn into_ok(self) -> Result<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(MemoryError::Embedding(
                self.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}

/// Embedder that delegates to an embedding daemon listening on a Unix socket
pub struct ServerEmbedder {
    socket_path: PathBuf,
}

impl ServerEmbedder {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Check if the daemon answers a ping
    pub fn is_running(&self) -> bool {
        self.socket_path.exists() && self.ping().is_ok()
    }

    /// Ping the daemon and get its model name
    pub fn ping(&self) -> Result<String> {
        let response = send_request(&self.socket_path, &EmbedRequest::Ping)?.into_ok()?;
        Ok(response.model.unwrap_or_default())
    }
}

impl Embedder for ServerEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        send_request(&self.socket_path, &EmbedRequest::Embed { text })?
            .into_ok()?
            .embedding
            .ok_or_else(|| MemoryError::Embedding("No embedding in response".to_string()))
    }

    fn name(&self) -> &str {
        "server"
    }
}

/// Send one JSON request and read the JSON response
fn send_request(socket_path: &Path, request: &EmbedRequest) -> Result<EmbedResponse> {
    let embedding_err = |what: &str, e: std::io::Error| MemoryError::Embedding(format!("{}: {}", what, e));

    let mut stream = UnixStream::connect(socket_path)
        .map_err(|e| embedding_err("Failed to connect to embedding server", e))?;
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|e| embedding_err("Failed to set timeout", e))?;

    let json = serde_json::to_vec(request)?;
    stream
        .write_all(&json)
        .map_err(|e| embedding_err("Failed to send", e))?;

    // Closing our write side marks the end of the request
    stream
        .shutdown(std::net::Shutdown::Write)
        .map_err(|e| embedding_err("Failed to shutdown write", e))?;

    let mut buffer = Vec::new();
    stream
        .take(MAX_RESPONSE_BYTES)
        .read_to_end(&mut buffer)
        .map_err(|e| embedding_err("Failed to read response", e))?;

    Ok(serde_json::from_slice(&buffer)?)
}

// =============================================================================
// Embedder factory
// =============================================================================

/// Pick the configured embedder, falling back to lite when the daemon is unreachable.
///
/// The fallback is only safe on a store that has no embeddings yet.
/// `AvatarMemory` rejects an embedder that does not match the one the store
/// was written with.
pub fn get_embedder(config: &StoreConfig) -> Box<dyn Embedder> {
    match config.embedder {
        EmbedderKind::Lite => Box::new(LiteEmbedder::new()),
        EmbedderKind::Server => {
            let server = ServerEmbedder::new(&config.socket_path);
            if server.is_running() {
                return Box::new(server);
            }

            tracing::warn!(
                socket = %config.socket_path.display(),
                "embedding server not running, using lite embedder"
            );
            Box::new(LiteEmbedder::new())
        }
    }
}

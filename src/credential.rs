//! Loading the API key from a local file.

use log::debug;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// File looked up in the working directory when no key file is given.
pub const DEFAULT_CREDENTIAL_FILE: &str = "api_key";

/// Opaque API key. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for use in request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Masked form suitable for logs: first and last four characters at most.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}*********{}", head, tail)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

/// Errors raised while loading the credential. Both are fatal at startup.
#[derive(Debug)]
pub enum CredentialError {
    /// The key file does not exist or cannot be read
    Unavailable { path: PathBuf, reason: String },
    /// The first line of the key file is blank
    Empty { path: PathBuf },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Unavailable { path, reason } => {
                write!(
                    f,
                    "API key file '{}' is unavailable: {}. Put your API key on the first line of that file.",
                    path.display(),
                    reason
                )
            }
            CredentialError::Empty { path } => {
                write!(
                    f,
                    "API key file '{}' is empty. Put your API key on its first line.",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for CredentialError {}

/// Reads the first line of `path` and returns it, trimmed, as the credential.
#[tracing::instrument(skip(runtime))]
pub fn load_credential<R: Runtime + ?Sized>(
    runtime: &R,
    path: &Path,
) -> Result<Credential, CredentialError> {
    let contents = runtime
        .read_to_string(path)
        .map_err(|e| CredentialError::Unavailable {
            path: path.to_path_buf(),
            reason: format!("{:#}", e),
        })?;

    let token = contents.lines().next().unwrap_or_default().trim();
    if token.is_empty() {
        return Err(CredentialError::Empty {
            path: path.to_path_buf(),
        });
    }

    let credential = Credential::new(token);
    debug!(
        "Loaded API key {} from {}",
        credential.masked(),
        path.display()
    );
    Ok(credential)
}

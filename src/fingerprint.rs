//! SHA-256 content fingerprints

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{CatalogError, Result};

/// Length of a rendered fingerprint
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Fingerprint an in-memory buffer
pub fn fingerprint_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Fingerprint the full contents of a file
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| CatalogError::io_error(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| CatalogError::io_error(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

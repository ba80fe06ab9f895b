#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use media_catalog::{
    AudioProperties, CatalogConfig, CatalogDatabase, CatalogError, Library, MetadataProbe, Result,
};

/// Probe whose answers are derived from file size, so tests can predict them
#[derive(Clone, Default)]
pub struct StubProbe {
    pub fail_audio: Arc<AtomicBool>,
}

impl StubProbe {
    pub fn fail_audio(&self, fail: bool) {
        self.fail_audio.store(fail, Ordering::SeqCst);
    }
}

impl MetadataProbe for StubProbe {
    fn audio_properties(&self, path: &Path) -> Result<AudioProperties> {
        if self.fail_audio.load(Ordering::SeqCst) {
            return Err(CatalogError::metadata_error(path, "unreadable tags"));
        }
        let size = fs::metadata(path).map_err(|e| CatalogError::io_error(path, e))?.len();
        Ok(AudioProperties {
            duration_ms: size * 10,
            bitrate_kbps: 320,
            sample_rate_hz: 44_100,
            channels_n: 2,
        })
    }

    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        let size = fs::metadata(path).map_err(|e| CatalogError::io_error(path, e))?.len();
        Ok((size as u32, 100))
    }
}

pub fn library() -> (Library<StubProbe>, StubProbe) {
    let probe = StubProbe::default();
    let config = CatalogConfig::builder().num_threads(2).build();
    let db = CatalogDatabase::open_memory().unwrap();
    (Library::with_probe(db, probe.clone(), config).unwrap(), probe)
}

/// Audio file recognised by its ID3 header
pub fn write_mp3(path: &Path, payload: &[u8]) {
    let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
    bytes.extend_from_slice(payload);
    fs::write(path, bytes).unwrap();
}

/// Image file recognised by its PNG signature
pub fn write_png(path: &Path, payload: &[u8]) {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(payload);
    fs::write(path, bytes).unwrap();
}

//! Audio property and image dimension extraction
//!
//! The scanner only needs a handful of numbers per file, so extraction sits
//! behind [`MetadataProbe`]. [`FileProbe`] reads them with `lofty` and `image`.

use image::ImageReader;
use log::debug;
use lofty::config::ParseOptions;
use lofty::file::AudioFile;
use lofty::probe::Probe;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{CatalogError, Result};

/// Technical properties of an audio file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioProperties {
    pub duration_ms: u64,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub channels_n: u8,
}

/// Source of per-file metadata used during content reconciliation
pub trait MetadataProbe: Sync {
    /// Read duration, bitrate, sample rate and channel count
    fn audio_properties(&self, path: &Path) -> Result<AudioProperties>;

    /// Read pixel dimensions as (width, height)
    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32)>;
}

/// Probe backed by `lofty` and `image`
#[derive(Debug, Clone, Copy)]
pub struct FileProbe {
    parse_options: ParseOptions,
}

impl FileProbe {
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new().read_properties(true),
        }
    }
}

impl Default for FileProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataProbe for FileProbe {
    fn audio_properties(&self, path: &Path) -> Result<AudioProperties> {
        let file = File::open(path).map_err(|e| CatalogError::io_error(path, e))?;
        let probe = Probe::new(BufReader::new(file))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| CatalogError::io_error(path, e))?;

        // WMA, RealAudio, AMR and MIDI are recognised by the classifier but
        // have no lofty reader; they are catalogued without properties.
        if probe.file_type().is_none() {
            debug!("No audio reader for {}, storing without properties", path.display());
            return Ok(AudioProperties::default());
        }

        let tagged_file = probe
            .read()
            .map_err(|e| CatalogError::metadata_error(path, format!("Failed to parse file: {}", e)))?;

        let properties = tagged_file.properties();
        Ok(AudioProperties {
            duration_ms: properties.duration().as_millis() as u64,
            bitrate_kbps: properties.audio_bitrate().unwrap_or(0),
            sample_rate_hz: properties.sample_rate().unwrap_or(0),
            channels_n: properties.channels().unwrap_or(0),
        })
    }

    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        ImageReader::open(path)
            .map_err(|e| CatalogError::io_error(path, e))?
            .with_guessed_format()
            .map_err(|e| CatalogError::io_error(path, e))?
            .into_dimensions()
            .map_err(|e| {
                CatalogError::metadata_error(path, format!("Failed to read dimensions: {}", e))
            })
    }
}

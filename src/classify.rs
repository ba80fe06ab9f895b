//! Content classification by header bytes
//!
//! File extensions are never consulted: a file is audio or image only if its
//! leading bytes match one of the known container signatures.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{CatalogError, Result};
use crate::models::{AudioFormat, ImageFormat, MediaType};

const ASF_GUID: [u8; 16] = [
    0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

impl MediaType {
    /// Match a file header against known audio and image signatures
    pub fn from_header(header: &[u8]) -> Self {
        if let Some(format) = audio_format(header) {
            return MediaType::Audio(format);
        }
        if let Some(format) = image_format(header) {
            return MediaType::Image(format);
        }
        MediaType::Unknown
    }
}

fn audio_format(h: &[u8]) -> Option<AudioFormat> {
    if h.starts_with(b"ID3") {
        return Some(AudioFormat::Mp3);
    }
    if h.len() >= 2 && h[0] == 0xFF {
        // ADTS uses layer bits 00, MPEG audio frames use 01..11
        if h[1] & 0xF6 == 0xF0 {
            return Some(AudioFormat::Aac);
        }
        if h[1] & 0xE0 == 0xE0 && h[1] & 0x06 != 0 {
            return Some(AudioFormat::Mp3);
        }
    }
    if h.len() >= 12 && &h[0..4] == b"RIFF" && &h[8..12] == b"WAVE" {
        return Some(AudioFormat::Wav);
    }
    if h.starts_with(b"fLaC") {
        return Some(AudioFormat::Flac);
    }
    if h.starts_with(b"OggS") {
        return Some(AudioFormat::Ogg);
    }
    if h.starts_with(&ASF_GUID) {
        return Some(AudioFormat::Wma);
    }
    if h.starts_with(b".ra\xfd") || h.starts_with(b".RMF") {
        return Some(AudioFormat::RealAudio);
    }
    if h.starts_with(b"#!AMR") {
        return Some(AudioFormat::Amr);
    }
    if h.len() >= 12 && &h[4..8] == b"ftyp" && matches!(&h[8..12], b"M4A " | b"M4B " | b"M4P ") {
        return Some(AudioFormat::Mp4);
    }
    if h.starts_with(b"MThd") {
        return Some(AudioFormat::Midi);
    }
    None
}

fn image_format(h: &[u8]) -> Option<ImageFormat> {
    if h.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ImageFormat::Jpeg)
    } else if h.starts_with(&PNG_MAGIC) {
        Some(ImageFormat::Png)
    } else if h.starts_with(b"GIF87a") || h.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else {
        None
    }
}

/// Read up to `header_len` bytes from the start of a file
pub fn read_header(path: &Path, header_len: usize) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| CatalogError::io_error(path, e))?;
    let mut header = Vec::with_capacity(header_len);
    file.take(header_len as u64)
        .read_to_end(&mut header)
        .map_err(|e| CatalogError::io_error(path, e))?;
    Ok(header)
}

/// Classify a file by its header bytes
pub fn classify_file(path: &Path, header_len: usize) -> Result<MediaType> {
    let header = read_header(path, header_len)?;
    Ok(MediaType::from_header(&header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MIN_HEADER_LEN;
    use crate::error::CatalogErrorKind;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn padded(prefix: &[u8]) -> Vec<u8> {
        let mut bytes = prefix.to_vec();
        bytes.resize(300, 0);
        bytes
    }

    #[test]
    fn test_audio_signatures() {
        let cases: Vec<(Vec<u8>, AudioFormat)> = vec![
            (padded(b"ID3\x04\x00"), AudioFormat::Mp3),
            (padded(&[0xFF, 0xFB, 0x90, 0x64]), AudioFormat::Mp3),
            (padded(&[0xFF, 0xF3, 0x40]), AudioFormat::Mp3),
            (padded(&[0xFF, 0xF1, 0x50, 0x80]), AudioFormat::Aac),
            (padded(b"RIFF\x24\x00\x00\x00WAVEfmt "), AudioFormat::Wav),
            (padded(b"fLaC\x00\x00\x00\x22"), AudioFormat::Flac),
            (padded(b"OggS\x00\x02"), AudioFormat::Ogg),
            (padded(&ASF_GUID), AudioFormat::Wma),
            (padded(b".ra\xfd\x00\x04"), AudioFormat::RealAudio),
            (padded(b".RMF\x00\x00"), AudioFormat::RealAudio),
            (padded(b"#!AMR\n"), AudioFormat::Amr),
            (padded(b"\x00\x00\x00\x20ftypM4A \x00\x00\x00\x00"), AudioFormat::Mp4),
            (padded(b"MThd\x00\x00\x00\x06"), AudioFormat::Midi),
        ];
        for (header, expected) in cases {
            assert_eq!(
                MediaType::from_header(&header),
                MediaType::Audio(expected),
                "header {:02x?}",
                &header[..12]
            );
        }
    }

    #[test]
    fn test_image_signatures() {
        assert_eq!(
            MediaType::from_header(&padded(&[0xFF, 0xD8, 0xFF, 0xE0])),
            MediaType::Image(ImageFormat::Jpeg)
        );
        assert_eq!(
            MediaType::from_header(&padded(&PNG_MAGIC)),
            MediaType::Image(ImageFormat::Png)
        );
        assert_eq!(
            MediaType::from_header(&padded(b"GIF89a")),
            MediaType::Image(ImageFormat::Gif)
        );
    }

    #[test]
    fn test_unknown_headers() {
        assert_eq!(MediaType::from_header(b""), MediaType::Unknown);
        assert_eq!(MediaType::from_header(b"hello world"), MediaType::Unknown);
        assert_eq!(MediaType::from_header(b"RIFF\x00\x00\x00\x00AVI "), MediaType::Unknown);
        // Video MP4 brand is not audio
        assert_eq!(
            MediaType::from_header(b"\x00\x00\x00\x20ftypisom"),
            MediaType::Unknown
        );
    }

    #[test]
    fn test_classify_ignores_extension() {
        let dir = TempDir::new().unwrap();
        let fake = dir.path().join("song.mp3");
        std::fs::write(&fake, "just some text, not audio").unwrap();
        let real = dir.path().join("notes.txt");
        std::fs::write(&real, padded(b"fLaC")).unwrap();

        assert_eq!(classify_file(&fake, MIN_HEADER_LEN).unwrap(), MediaType::Unknown);
        assert_eq!(
            classify_file(&real, MIN_HEADER_LEN).unwrap(),
            MediaType::Audio(AudioFormat::Flac)
        );
    }

    #[test]
    fn test_short_file_is_read_whole() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny");
        std::fs::write(&path, b"OggS").unwrap();
        assert_eq!(read_header(&path, MIN_HEADER_LEN).unwrap().len(), 4);
        assert_eq!(
            classify_file(&path, MIN_HEADER_LEN).unwrap(),
            MediaType::Audio(AudioFormat::Ogg)
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = classify_file(&dir.path().join("absent"), MIN_HEADER_LEN).unwrap_err();
        assert_eq!(err.kind, CatalogErrorKind::Io);
        assert!(err.path.is_some());
    }

    proptest! {
        #[test]
        fn prop_lowercase_text_is_unknown(text in "[a-z0-9 ,.\n]{0,400}") {
            prop_assert_eq!(MediaType::from_header(text.as_bytes()), MediaType::Unknown);
        }

        #[test]
        fn prop_header_prefix_decides(bytes in proptest::collection::vec(any::<u8>(), 0..600)) {
            let cut = bytes.len().min(MIN_HEADER_LEN);
            prop_assert_eq!(
                MediaType::from_header(&bytes),
                MediaType::from_header(&bytes[..cut])
            );
        }
    }
}

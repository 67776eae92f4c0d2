//! Codec registry.
//!
//! Maps file extensions to [`Decoder`]s and [`Encoder`]s. Pipelines receive a
//! shared registry at construction; there is no process-wide instance.
//!
//! # Example
//!
//! ```rust
//! use seqio_io::registry::CodecRegistry;
//!
//! let registry = CodecRegistry::with_builtin();
//! assert!(registry.supports_extension("exr"));
//! assert!(registry.supports_extension("PNG"));
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use crate::codec::{Decoder, Encoder};
use crate::{IoError, IoResult};

/// Extension-keyed codec table.
#[derive(Default)]
pub struct CodecRegistry {
    decoders: HashMap<String, Arc<dyn Decoder>>,
    encoders: HashMap<String, Arc<dyn Encoder>>,
}

impl CodecRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the OpenEXR and PNG codecs.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_decoder(Arc::new(crate::exr::ExrCodec));
        registry.register_encoder(Arc::new(crate::exr::ExrCodec));
        registry.register_decoder(Arc::new(crate::png::PngCodec));
        registry.register_encoder(Arc::new(crate::png::PngCodec));
        registry
    }

    /// Registers a decoder for all its extensions, replacing earlier ones.
    pub fn register_decoder(&mut self, decoder: Arc<dyn Decoder>) {
        for ext in decoder.extensions() {
            trace!(format = decoder.format_name(), ext, "register decoder");
            self.decoders.insert(ext.to_ascii_lowercase(), Arc::clone(&decoder));
        }
    }

    /// Registers an encoder for all its extensions, replacing earlier ones.
    pub fn register_encoder(&mut self, encoder: Arc<dyn Encoder>) {
        for ext in encoder.extensions() {
            trace!(format = encoder.format_name(), ext, "register encoder");
            self.encoders.insert(ext.to_ascii_lowercase(), Arc::clone(&encoder));
        }
    }

    /// True if files with `ext` can be read.
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.decoders.contains_key(&ext.to_ascii_lowercase())
    }

    /// Decoder registered for `ext`.
    pub fn decoder_for_extension(&self, ext: &str) -> Option<Arc<dyn Decoder>> {
        self.decoders.get(&ext.to_ascii_lowercase()).cloned()
    }

    /// Encoder registered for `ext`.
    pub fn encoder_for_extension(&self, ext: &str) -> Option<Arc<dyn Encoder>> {
        self.encoders.get(&ext.to_ascii_lowercase()).cloned()
    }

    /// Decoder for `path`, chosen by extension.
    pub fn decoder_for(&self, path: &Path) -> IoResult<Arc<dyn Decoder>> {
        let ext = extension(path);
        self.decoder_for_extension(&ext)
            .ok_or_else(|| IoError::file_open(path, format!("unrecognized format '{ext}'")))
    }

    /// Encoder for `path`, chosen by extension.
    pub fn encoder_for(&self, path: &Path) -> IoResult<Arc<dyn Encoder>> {
        let ext = extension(path);
        self.encoder_for_extension(&ext)
            .ok_or_else(|| IoError::file_open(path, format!("no writer for format '{ext}'")))
    }

    /// Distinct format names, sorted.
    pub fn format_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .decoders
            .values()
            .map(|d| d.format_name())
            .chain(self.encoders.values().map(|e| e.format_name()))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

/// Lowercased extension of `path`, empty if none.
pub fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_builtin_lookup() {
        let registry = CodecRegistry::with_builtin();
        assert_eq!(registry.format_names(), vec!["OpenEXR", "PNG"]);
        assert!(registry.decoder_for(Path::new("a.0001.EXR")).is_ok());
        assert_eq!(
            registry.encoder_for(Path::new("x.png")).unwrap().format_name(),
            "PNG"
        );
    }

    #[test]
    fn test_unknown_extension_is_file_open_error() {
        let registry = CodecRegistry::with_builtin();
        let err = registry.decoder_for(&PathBuf::from("clip.xyz")).err().unwrap();
        assert!(matches!(err, IoError::FileOpen { .. }));
    }
}

//! L0: container parsing and byte-level PCM sourcing.
//!
//! A [`Container`] parses a file's header once, exposes the resulting
//! [`crate::common::AudioFormat`], and can mint fresh [`crate::decoder::Stage`]
//! base decoders on demand via [`Container::make_decoder`]. The random-access
//! byte source behind it is a [`PcmSource`]: either an in-memory blob or a
//! seekable stream, chosen once at open time.

#[cfg(feature = "flac")]
mod flac;
#[cfg(feature = "midi")]
mod midi;
#[cfg(feature = "mp3")]
mod mp3;
#[cfg(feature = "mod_tracker")]
mod tracker;
#[cfg(feature = "vorbis")]
mod vorbis;
#[cfg(feature = "wav")]
mod wav;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::common::AudioFormat;
use crate::decoder::Stage;
use crate::error::ContainerError;

/// WAV files larger than this are rejected as probably-bogus.
pub const WAV_MAX_DATA_SIZE: u64 = 15_000_000;

/// A random-access byte supplier backing a base decoder.
///
/// Implementations must tolerate being read from a single thread at a time;
/// the engine never pulls concurrently from the same [`Container`] (each
/// `Sound` owns its own container instance, and `prototype()` opens a fresh
/// one rather than sharing state).
pub trait PcmSource: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at absolute offset `pos`.
    /// Returns the number of bytes actually read (0 at end of stream).
    fn read_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Total number of bytes available from this source.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory byte blob. Immutable after load, so reads never need to
/// lock.
pub struct InMemorySource {
    bytes: Arc<[u8]>,
}

impl InMemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }
}

impl PcmSource for InMemorySource {
    fn read_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        let pos = pos as usize;
        if pos >= self.bytes.len() {
            return Ok(0);
        }
        let end = (pos + buf.len()).min(self.bytes.len());
        let n = end - pos;
        buf[..n].copy_from_slice(&self.bytes[pos..end]);
        Ok(n)
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A seekable stream kept open for the lifetime of the container. Reads are
/// serialized through a mutex since `Read + Seek` requires `&mut self`.
pub struct StreamingSource<R> {
    inner: Mutex<R>,
    len: u64,
}

impl<R: Read + Seek> StreamingSource<R> {
    pub fn new(mut inner: R, len: u64) -> std::io::Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner: Mutex::new(inner),
            len,
        })
    }
}

impl<R: Read + Seek + Send> PcmSource for StreamingSource<R> {
    fn read_at(&self, pos: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.seek(SeekFrom::Start(pos))?;
        let mut total = 0;
        while total < buf.len() {
            match guard.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// L0: a parsed header plus a `PcmSource`, capable of producing fresh base
/// decoders.
pub trait Container: Send {
    /// The fixed format of the bottom-of-stack base decoder.
    fn format(&self) -> AudioFormat;

    /// Advertised PCM data size, in bytes. May have been shrunk by
    /// `trunc_at`.
    fn data_size(&self) -> u64 {
        self.format().data_size
    }

    /// Shrinks the advertised data size. Never grows it. Used by
    /// `FadeOnStop` to make the sink believe the stream ends earlier.
    /// May leave the read cursor past the new size; downstream reads
    /// correctly treat that as end-of-stream.
    fn trunc_at(&mut self, byte_position: u64);

    /// Produces a fresh, independent base decoder reading from this
    /// container's byte source.
    fn make_decoder(&self) -> Result<Box<dyn Stage>, ContainerError>;

    /// Deep-clones this container by reopening its backing source. Used by
    /// `Sound::prototype()` to produce an independent copy sharing no
    /// mutable state.
    fn try_clone(&self) -> Result<Box<dyn Container>, ContainerError>;
}

/// Opens `path`, auto-selecting a container format by lowercased file
/// extension. Unrecognized extensions are `UnsupportedFormat`.
pub fn open(path: impl AsRef<Path>) -> Result<Box<dyn Container>, ContainerError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ContainerError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let file = File::open(path)?;

    let result = match ext.as_str() {
        #[cfg(feature = "wav")]
        "wav" => wav::WavContainer::open(file).map(|c| Box::new(c) as Box<dyn Container>),
        #[cfg(not(feature = "wav"))]
        "wav" => Err(ContainerError::UnsupportedFormat(path.to_path_buf())),
        #[cfg(feature = "vorbis")]
        "ogg" => vorbis::VorbisContainer::open(file).map(|c| Box::new(c) as Box<dyn Container>),
        #[cfg(not(feature = "vorbis"))]
        "ogg" => Err(ContainerError::UnsupportedFormat(path.to_path_buf())),
        #[cfg(feature = "mp3")]
        "mp3" => mp3::Mp3Container::open(file).map(|c| Box::new(c) as Box<dyn Container>),
        #[cfg(not(feature = "mp3"))]
        "mp3" => Err(ContainerError::UnsupportedFormat(path.to_path_buf())),
        #[cfg(feature = "flac")]
        "flac" => flac::FlacContainer::open(file).map(|c| Box::new(c) as Box<dyn Container>),
        #[cfg(not(feature = "flac"))]
        "flac" => Err(ContainerError::UnsupportedFormat(path.to_path_buf())),
        #[cfg(feature = "midi")]
        "mid" => midi::MidiContainer::open(path).map(|c| Box::new(c) as Box<dyn Container>),
        #[cfg(not(feature = "midi"))]
        "mid" => Err(ContainerError::UnsupportedFormat(path.to_path_buf())),
        #[cfg(feature = "mod_tracker")]
        "mod" => tracker::ModContainer::open(file).map(|c| Box::new(c) as Box<dyn Container>),
        #[cfg(not(feature = "mod_tracker"))]
        "mod" => Err(ContainerError::UnsupportedFormat(path.to_path_buf())),
        _ => Err(ContainerError::UnsupportedFormat(path.to_path_buf())),
    };

    if let Err(err) = &result {
        #[cfg(feature = "tracing")]
        tracing::error!("failed to open container {}: {err}", path.display());
        #[cfg(not(feature = "tracing"))]
        eprintln!("failed to open container {}: {err}", path.display());
    }
    result
}

pub(crate) fn read_whole_file(file: &mut File) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(feature = "flac")]
pub use flac::FlacContainer;
#[cfg(feature = "midi")]
pub use midi::MidiContainer;
#[cfg(feature = "mp3")]
pub use mp3::Mp3Container;
#[cfg(feature = "mod_tracker")]
pub use tracker::ModContainer;
#[cfg(feature = "vorbis")]
pub use vorbis::VorbisContainer;
#[cfg(feature = "wav")]
pub use wav::WavContainer;

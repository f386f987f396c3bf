//! The `InputStream` abstraction: a byte source a [`DecoderPlugin`] reads
//! from, which may become ready asynchronously (a URL fetch) or
//! immediately (a local file).
//!
//! [`DecoderPlugin`]: crate::plugin::DecoderPlugin

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum InputStreamError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("http request failed: {0}")]
    Http(String),
    #[error("stream is not seekable")]
    NotSeekable,
}

/// A byte source a decoder plugin reads from.
///
/// `LocalFileStream` is ready the instant it's constructed.
/// `UrlStream` becomes ready asynchronously: callers must call
/// [`InputStream::buffer`] in a loop (checking for cancellation between
/// calls) until [`InputStream::is_ready`] returns `true`.
pub trait InputStream: Send + Sync {
    /// Drains whatever bytes have arrived since the last call without
    /// blocking past a short poll interval. A no-op for streams that
    /// are already ready.
    ///
    /// # Errors
    ///
    /// * If the underlying fetch failed.
    fn buffer(&mut self) -> Result<(), InputStreamError>;

    /// Whether the stream has enough data buffered to begin reading.
    fn is_ready(&self) -> bool;

    /// Whether [`InputStream::seek`] is supported.
    fn seekable(&self) -> bool;

    /// Total size in bytes, if known.
    fn size(&self) -> Option<u64>;

    /// The `Content-Type` reported for this stream, if known. Local
    /// files never report one; it drives the MIME-based dispatch step
    /// for URL streams.
    fn mime(&self) -> Option<String> {
        None
    }

    /// Reads decoded bytes into `buf`, per [`std::io::Read::read`].
    ///
    /// # Errors
    ///
    /// * If the underlying I/O fails.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, InputStreamError>;

    /// Seeks to `pos`.
    ///
    /// # Errors
    ///
    /// * [`InputStreamError::NotSeekable`] if `seekable()` is `false`.
    /// * If the underlying I/O fails.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, InputStreamError>;
}

/// A local file, ready for reading immediately.
pub struct LocalFileStream {
    file: File,
    size: Option<u64>,
}

impl LocalFileStream {
    /// # Errors
    ///
    /// * If the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, InputStreamError> {
        let file = File::open(path)?;
        let size = file.metadata().ok().map(|m| m.len());
        Ok(Self { file, size })
    }
}

impl InputStream for LocalFileStream {
    fn buffer(&mut self) -> Result<(), InputStreamError> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn seekable(&self) -> bool {
        true
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, InputStreamError> {
        Ok(Read::read(&mut self.file, buf)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, InputStreamError> {
        Ok(Seek::seek(&mut self.file, pos)?)
    }
}

enum FetchMessage {
    Chunk(Vec<u8>),
    Done,
    Error(String),
}

/// A remote URL fetched over HTTP on a dedicated thread, becoming ready
/// as bytes arrive. Not seekable: once consumed, bytes cannot be
/// re-read.
pub struct UrlStream {
    url: Url,
    receiver: flume::Receiver<FetchMessage>,
    buffered: Vec<u8>,
    position: usize,
    ready: Arc<AtomicBool>,
    size: Arc<AtomicU64>,
    mime: Arc<Mutex<Option<String>>>,
    finished: bool,
    failed: Option<String>,
}

const NO_SIZE: u64 = u64::MAX;

impl UrlStream {
    #[must_use]
    pub fn open(url: Url) -> Self {
        let (sender, receiver) = flume::bounded(64);
        let ready = Arc::new(AtomicBool::new(false));
        let size = Arc::new(AtomicU64::new(NO_SIZE));
        let mime = Arc::new(Mutex::new(None));

        let fetch_ready = ready.clone();
        let fetch_size = size.clone();
        let fetch_mime = mime.clone();
        let fetch_url = url.clone();
        std::thread::spawn(move || {
            fetch_loop(&fetch_url, &sender, &fetch_ready, &fetch_size, &fetch_mime);
        });

        Self {
            url,
            receiver,
            buffered: Vec::new(),
            position: 0,
            ready,
            size,
            mime,
            finished: false,
            failed: None,
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn fetch_loop(
    url: &Url,
    sender: &flume::Sender<FetchMessage>,
    ready: &AtomicBool,
    size: &AtomicU64,
    mime: &Mutex<Option<String>>,
) {
    let result = switchy_async::Builder::new().build().map(|runtime| {
        runtime.block_on(async {
            let client = switchy_http::Client::new();
            let mut response = match client.get(url.as_str()).send().await {
                Ok(response) => response,
                Err(err) => {
                    let _ = sender.send(FetchMessage::Error(err.to_string()));
                    return;
                }
            };

            let headers = response.headers();
            let content_length = headers
                .get("content-length")
                .or_else(|| headers.get("Content-Length"))
                .and_then(|value| value.parse::<u64>().ok());
            if let Some(content_length) = content_length {
                size.store(content_length, Ordering::Release);
            }
            let content_type = headers
                .get("content-type")
                .or_else(|| headers.get("Content-Type"))
                .cloned();
            *mime.lock().unwrap() = content_type;
            ready.store(true, Ordering::Release);

            match response.bytes().await {
                Ok(bytes) => {
                    let _ = sender.send(FetchMessage::Chunk(bytes.to_vec()));
                    let _ = sender.send(FetchMessage::Done);
                }
                Err(err) => {
                    let _ = sender.send(FetchMessage::Error(err.to_string()));
                }
            }
        });
    });

    if let Err(err) = result {
        ready.store(true, Ordering::Release);
        let _ = sender.send(FetchMessage::Error(err.to_string()));
    }
}

impl InputStream for UrlStream {
    fn buffer(&mut self) -> Result<(), InputStreamError> {
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                FetchMessage::Chunk(mut bytes) => self.buffered.append(&mut bytes),
                FetchMessage::Done => self.finished = true,
                FetchMessage::Error(err) => self.failed = Some(err),
            }
        }
        if let Some(err) = self.failed.take() {
            return Err(InputStreamError::Http(err));
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn seekable(&self) -> bool {
        false
    }

    fn size(&self) -> Option<u64> {
        let size = self.size.load(Ordering::Acquire);
        (size != NO_SIZE).then_some(size)
    }

    fn mime(&self) -> Option<String> {
        self.mime.lock().unwrap().clone()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, InputStreamError> {
        self.buffer()?;
        let available = self.buffered.len() - self.position;
        let to_copy = std::cmp::min(available, buf.len());
        buf[..to_copy].copy_from_slice(&self.buffered[self.position..self.position + to_copy]);
        self.position += to_copy;
        Ok(to_copy)
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64, InputStreamError> {
        Err(InputStreamError::NotSeekable)
    }
}

/// Opens the appropriate [`InputStream`] for a local path or a URL.
///
/// # Errors
///
/// * If the local file cannot be opened.
pub fn open_file(path: &Path) -> Result<LocalFileStream, InputStreamError> {
    LocalFileStream::open(path)
}

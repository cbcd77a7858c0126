use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use tracing::{debug, info, warn};

use crate::catalog::CatalogClient;
use crate::domain::{Item, Progress, base_name};
use crate::error::CatalogError;
use crate::unpack::unpack;

pub const CHUNK_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn sanitize_file_name(name: &str) -> Result<String, CatalogError> {
    let base = base_name(name);
    if base.is_empty() || base == "." || base == ".." {
        return Err(CatalogError::InvalidFileName(name.to_string()));
    }
    Ok(base.to_string())
}

#[derive(Debug, Clone)]
pub struct Downloader<C: CatalogClient> {
    catalog: C,
}

impl<C: CatalogClient> Downloader<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// A cancelled or failed transfer leaves the partial file in place.
    pub fn download<F>(
        &self,
        cancel: &CancelToken,
        destination_dir: &Path,
        file_name: &str,
        url: &str,
        mut on_progress: F,
    ) -> Result<PathBuf, CatalogError>
    where
        F: FnMut(Progress),
    {
        fs::create_dir_all(destination_dir).map_err(|err| {
            CatalogError::Filesystem(format!(
                "create directory {}: {err}",
                destination_dir.display()
            ))
        })?;
        let path = destination_dir.join(sanitize_file_name(file_name)?);

        debug!(url, path = %path.display(), "starting download");
        let remote = self.catalog.open(url)?;
        let mut file = File::create(&path).map_err(|err| {
            CatalogError::Filesystem(format!("create file {}: {err}", path.display()))
        })?;

        let downloaded = copy_chunks(
            cancel,
            remote.body,
            &mut file,
            remote.total,
            &path,
            &mut on_progress,
        )?;
        file.flush().map_err(|err| {
            CatalogError::Filesystem(format!("flush file {}: {err}", path.display()))
        })?;

        info!(url, path = %path.display(), bytes = downloaded, "download finished");
        Ok(path)
    }
}

fn copy_chunks<R, W>(
    cancel: &CancelToken,
    mut reader: R,
    writer: &mut W,
    total: Option<u64>,
    path: &Path,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<u64, CatalogError>
where
    R: Read,
    W: Write,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut downloaded = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(path, downloaded));
        }
        let n = fill_chunk(&mut reader, &mut buf).map_err(|err| {
            CatalogError::Http(format!("read stream for {}: {err}", path.display()))
        })?;
        if n == 0 {
            return Ok(downloaded);
        }
        if cancel.is_cancelled() {
            return Err(cancelled(path, downloaded));
        }
        writer.write_all(&buf[..n]).map_err(|err| {
            CatalogError::Filesystem(format!("write file {}: {err}", path.display()))
        })?;
        downloaded += n as u64;
        on_progress(Progress { downloaded, total });
    }
}

/// Reads until the buffer is full or the stream ends, so every reported
/// chunk except the last one is exactly `buf.len()` bytes.
fn fill_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn cancelled(path: &Path, downloaded: u64) -> CatalogError {
    warn!(path = %path.display(), bytes = downloaded, "download cancelled");
    CatalogError::Cancelled(format!("{} after {downloaded} bytes", path.display()))
}

#[derive(Debug)]
pub enum DownloadEvent {
    Progress(Progress),
    Completed(PathBuf),
    Unpacked(PathBuf),
    Failed(CatalogError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Downloading,
    Unpacking,
    Finished,
    Failed(String),
    Cancelled,
}

#[derive(Debug)]
pub struct DownloadSession {
    item: Item,
    file_name: String,
    destination: PathBuf,
    progress: Progress,
    state: SessionState,
    cancel: CancelToken,
    events: Receiver<DownloadEvent>,
}

impl DownloadSession {
    pub fn start<C>(catalog: C, item: Item, destination_dir: PathBuf) -> Result<Self, CatalogError>
    where
        C: CatalogClient + 'static,
    {
        let file_name = sanitize_file_name(&item.name)?;
        let destination = destination_dir.join(&file_name);
        let cancel = CancelToken::new();
        let (tx, events) = mpsc::channel();

        let worker_item = item.clone();
        let worker_cancel = cancel.clone();
        thread::spawn(move || {
            let downloader = Downloader::new(catalog);
            let result = downloader.download(
                &worker_cancel,
                &destination_dir,
                &worker_item.name,
                &worker_item.url,
                |progress| {
                    let _ = tx.send(DownloadEvent::Progress(progress));
                },
            );
            let event = match result {
                Ok(path) => {
                    let _ = tx.send(DownloadEvent::Completed(path.clone()));
                    if !worker_item.unzip {
                        return;
                    }
                    match unpack(&path, &destination_dir) {
                        Ok(()) => DownloadEvent::Unpacked(destination_dir),
                        Err(err) => DownloadEvent::Failed(err),
                    }
                }
                Err(CatalogError::Cancelled(_)) => DownloadEvent::Cancelled,
                Err(err) => DownloadEvent::Failed(err),
            };
            let _ = tx.send(event);
        });

        Ok(Self {
            item,
            file_name,
            destination,
            progress: Progress {
                downloaded: 0,
                total: None,
            },
            state: SessionState::Downloading,
            cancel,
            events,
        })
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        !matches!(
            self.state,
            SessionState::Downloading | SessionState::Unpacking
        )
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn poll(&mut self) -> Vec<DownloadEvent> {
        let mut drained = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply(&event);
                    drained.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.worker_gone();
                    break;
                }
            }
        }
        drained
    }

    pub fn next_event(&mut self) -> Option<DownloadEvent> {
        match self.events.recv() {
            Ok(event) => {
                self.apply(&event);
                Some(event)
            }
            Err(_) => {
                self.worker_gone();
                None
            }
        }
    }

    fn apply(&mut self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Progress(progress) => self.progress = *progress,
            DownloadEvent::Completed(_) => {
                self.state = if self.item.unzip {
                    SessionState::Unpacking
                } else {
                    SessionState::Finished
                };
            }
            DownloadEvent::Unpacked(_) => self.state = SessionState::Finished,
            DownloadEvent::Failed(err) => self.state = SessionState::Failed(err.to_string()),
            DownloadEvent::Cancelled => self.state = SessionState::Cancelled,
        }
    }

    fn worker_gone(&mut self) {
        if !self.is_done() {
            self.state = SessionState::Failed("download worker stopped unexpectedly".to_string());
        }
    }
}

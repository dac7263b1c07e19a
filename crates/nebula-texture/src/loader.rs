//! Asynchronous image fetching on worker threads.
//!
//! The texture submits one [`FetchJob`] per image and collects
//! [`FetchResult`]s each frame via [`ImageLoader::drain_results`]. Fetching
//! and decoding never block the thread that owns the atlas.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use image::RgbaImage;
use tracing::{debug, trace, warn};

use crate::error::{ImageSourceError, TextureError};
use crate::queue::LoadTicket;

/// A resolved image to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRequest {
    /// Tile or sheet name as given by the caller.
    pub name: String,
    /// `texture_path + name`, with `.png` appended when the name has no extension.
    pub path: String,
    /// Cross-origin mode for sources that fetch remotely.
    pub cross_origin: String,
}

impl ImageRequest {
    pub fn new(texture_path: &str, name: &str, cross_origin: &str) -> Self {
        Self {
            name: name.to_string(),
            path: resolve_path(texture_path, name),
            cross_origin: cross_origin.to_string(),
        }
    }
}

/// Joins `texture_path` and `name`, adding `.png` if `name` has no extension.
pub fn resolve_path(texture_path: &str, name: &str) -> String {
    if name.contains('.') {
        format!("{texture_path}{name}")
    } else {
        format!("{texture_path}{name}.png")
    }
}

/// Where tile images come from.
pub trait ImageSource: Send + Sync {
    /// Fetches and decodes one image. Called on loader threads.
    fn fetch(&self, request: &ImageRequest) -> Result<RgbaImage, ImageSourceError>;
}

/// Reads images from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsImageSource;

impl ImageSource for FsImageSource {
    fn fetch(&self, request: &ImageRequest) -> Result<RgbaImage, ImageSourceError> {
        image::open(Path::new(&request.path))
            .map(|img| img.to_rgba8())
            .map_err(|source| ImageSourceError::Decode {
                path: request.path.clone(),
                source,
            })
    }
}

/// Serves images registered in memory, keyed by resolved path.
#[derive(Debug, Default)]
pub struct MemoryImageSource {
    images: RwLock<HashMap<String, RgbaImage>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `image` under `path` (e.g. `"textures/grass.png"`).
    pub fn insert(&self, path: impl Into<String>, image: RgbaImage) {
        if let Ok(mut images) = self.images.write() {
            images.insert(path.into(), image);
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, path: impl Into<String>, image: RgbaImage) -> Self {
        self.insert(path, image);
        self
    }
}

impl ImageSource for MemoryImageSource {
    fn fetch(&self, request: &ImageRequest) -> Result<RgbaImage, ImageSourceError> {
        self.images
            .read()
            .ok()
            .and_then(|images| images.get(&request.path).cloned())
            .ok_or_else(|| ImageSourceError::NotFound(request.path.clone()))
    }
}

// ---------------------------------------------------------------------------
// ImageLoader
// ---------------------------------------------------------------------------

/// What to do with a fetched image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FetchKind {
    /// Pack as a single tile.
    Tile,
    /// Slice into `tile_w × tile_h` tiles.
    Sheet { tile_w: u32, tile_h: u32 },
}

pub(crate) struct FetchJob {
    pub ticket: LoadTicket,
    pub request: ImageRequest,
    pub kind: FetchKind,
}

pub(crate) struct FetchResult {
    pub ticket: LoadTicket,
    pub request: ImageRequest,
    pub kind: FetchKind,
    pub image: Result<RgbaImage, ImageSourceError>,
}

/// Runs `source.fetch`, turning a panic into an error so the worker
/// survives and the batch still hears back.
fn fetch_guarded(source: &dyn ImageSource, request: &ImageRequest) -> Result<RgbaImage, ImageSourceError> {
    panic::catch_unwind(AssertUnwindSafe(|| source.fetch(request))).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        warn!(path = %request.path, %message, "image source panicked");
        Err(ImageSourceError::Panicked {
            path: request.path.clone(),
            message,
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Worker pool fetching images from an [`ImageSource`].
pub struct ImageLoader {
    job_sender: Option<crossbeam_channel::Sender<FetchJob>>,
    result_receiver: crossbeam_channel::Receiver<FetchResult>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl ImageLoader {
    /// Spawns `worker_count` (at least one) fetch threads.
    pub fn new(worker_count: usize, source: Arc<dyn ImageSource>) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<FetchJob>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let worker_handles = (0..worker_count.max(1))
            .map(|i| {
                let rx = job_rx.clone();
                let tx = result_tx.clone();
                let source = Arc::clone(&source);
                std::thread::Builder::new()
                    .name(format!("atlas-loader-{i}"))
                    .spawn(move || {
                        while let Ok(job) = rx.recv() {
                            trace!(path = %job.request.path, "fetching image");
                            let image = fetch_guarded(source.as_ref(), &job.request);
                            let _ = tx.send(FetchResult {
                                ticket: job.ticket,
                                request: job.request,
                                kind: job.kind,
                                image,
                            });
                        }
                    })
            })
            .filter_map(Result::ok)
            .collect();

        Self {
            job_sender: Some(job_tx),
            result_receiver: result_rx,
            worker_handles,
        }
    }

    /// Queues a fetch.
    pub(crate) fn submit(&self, job: FetchJob) -> Result<(), TextureError> {
        let sender = self.job_sender.as_ref().ok_or(TextureError::LoaderClosed)?;
        debug!(path = %job.request.path, ticket = job.ticket.0, "queued image fetch");
        sender.send(job).map_err(|_| TextureError::LoaderClosed)
    }

    /// Collects every finished fetch without blocking.
    pub(crate) fn drain_results(&self) -> Vec<FetchResult> {
        self.result_receiver.try_iter().collect()
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        self.worker_handles.len()
    }

    /// Stops accepting jobs and joins the workers.
    pub fn shutdown(&mut self) {
        self.job_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_for(loader: &ImageLoader, count: usize) -> Vec<FetchResult> {
        let start = Instant::now();
        let mut results = Vec::new();
        while results.len() < count {
            results.extend(loader.drain_results());
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "timed out waiting for fetches"
            );
            std::thread::sleep(Duration::from_millis(1));
        }
        results
    }

    #[test]
    fn test_resolve_path_adds_png_when_no_extension() {
        assert_eq!(resolve_path("/textures/", "grass"), "/textures/grass.png");
        assert_eq!(resolve_path("/textures/", "water.jpg"), "/textures/water.jpg");
        assert_eq!(resolve_path("", "dirt"), "dirt.png");
    }

    #[test]
    fn test_memory_source_hits_and_misses() {
        let source = MemoryImageSource::new().with("t/grass.png", RgbaImage::new(2, 2));
        assert!(source.fetch(&ImageRequest::new("t/", "grass", "")).is_ok());
        assert!(matches!(
            source.fetch(&ImageRequest::new("t/", "stone", "")),
            Err(ImageSourceError::NotFound(path)) if path == "t/stone.png"
        ));
    }

    #[test]
    fn test_fs_source_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(4, 2, image::Rgba([1, 2, 3, 255]))
            .save(dir.path().join("brick.png"))
            .unwrap();
        let prefix = format!("{}/", dir.path().display());

        let image = FsImageSource
            .fetch(&ImageRequest::new(&prefix, "brick", "Anonymous"))
            .unwrap();
        assert_eq!(image.dimensions(), (4, 2));

        let missing = FsImageSource.fetch(&ImageRequest::new(&prefix, "nope", "Anonymous"));
        assert!(matches!(missing, Err(ImageSourceError::Decode { .. })));
    }

    #[test]
    fn test_loader_delivers_every_job() {
        let source = Arc::new(
            MemoryImageSource::new()
                .with("a.png", RgbaImage::new(1, 1))
                .with("b.png", RgbaImage::new(2, 2)),
        );
        let loader = ImageLoader::new(2, source);
        assert_eq!(loader.worker_count(), 2);

        for name in ["a", "b", "missing"] {
            loader
                .submit(FetchJob {
                    ticket: LoadTicket(1),
                    request: ImageRequest::new("", name, ""),
                    kind: FetchKind::Tile,
                })
                .unwrap();
        }

        let results = wait_for(&loader, 3);
        assert_eq!(results.iter().filter(|r| r.image.is_ok()).count(), 2);
        assert!(results.iter().all(|r| r.ticket == LoadTicket(1)));
    }

    struct PanickingSource;

    impl ImageSource for PanickingSource {
        fn fetch(&self, request: &ImageRequest) -> Result<RgbaImage, ImageSourceError> {
            panic!("cannot decode {}", request.path);
        }
    }

    #[test]
    fn test_panicking_source_reports_error_and_worker_survives() {
        let loader = ImageLoader::new(1, Arc::new(PanickingSource));
        for name in ["a", "b"] {
            loader
                .submit(FetchJob {
                    ticket: LoadTicket(3),
                    request: ImageRequest::new("", name, ""),
                    kind: FetchKind::Tile,
                })
                .unwrap();
        }

        let results = wait_for(&loader, 2);
        for result in &results {
            match &result.image {
                Err(ImageSourceError::Panicked { path, message }) => {
                    assert_eq!(path, &result.request.path);
                    assert!(message.starts_with("cannot decode"), "{message}");
                }
                other => panic!("expected a panic error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut loader = ImageLoader::new(1, Arc::new(MemoryImageSource::new()));
        loader.shutdown();
        let result = loader.submit(FetchJob {
            ticket: LoadTicket(0),
            request: ImageRequest::new("", "a", ""),
            kind: FetchKind::Tile,
        });
        assert!(matches!(result, Err(TextureError::LoaderClosed)));
    }
}

//! The runtime atlas: loading, packing, UV indexing and painting.
//!
//! A [`Texture`] is owned by one thread. Image fetches run on the
//! [`ImageLoader`] workers; everything else (packing, canvas writes, registry
//! updates, painting) happens inside [`Texture::pump`] and [`Texture::paint`]
//! on the owner's thread.
//!
//! While any load batch is open (`loading() > 0`) the UV index may be stale,
//! so paint calls are queued and replayed in order once the last batch has
//! rebuilt the atlas.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use nebula_config::TextureConfig;
use tracing::{debug, error, info, warn};

use crate::blend::ColorBlender;
use crate::canvas::AtlasCanvas;
use crate::color::{HexColor, is_color_ref};
use crate::error::{ImageSourceError, TextureError};
use crate::expand::{ExpandedMaterial, MaterialSpec, expand};
use crate::loader::{FetchJob, FetchKind, FetchResult, FsImageSource, ImageLoader, ImageRequest, ImageSource};
use crate::material::{MaterialHandle, TextureHandle};
use crate::mesh::SharedMesh;
use crate::packer::{AtlasPacker, GuillotinePacker};
use crate::paint::{MaterialSource, PaintContext, PaintOutcome, PaintStats, paint_faces};
use crate::queue::{BatchJoin, LoadTicket, PaintQueue, PaintRequest};
use crate::scheduler::{IntervalId, Scheduler};
use crate::sprite::{DEFAULT_TILE_SIZE, slice_sheet};
use crate::uv::{UvIndex, UvRect};

/// Mixed into the configured seed to derive the height noise seed.
const HEIGHT_SEED_SALT: u32 = 0x9e37_79b9;

/// Frame delay used by [`Texture::animate`] when none is given.
pub const DEFAULT_ANIMATION_DELAY_MS: f64 = 1000.0;

/// Something that happened during [`Texture::pump`].
#[derive(Debug)]
pub enum TextureEvent {
    /// A batch finished and the atlas was rebuilt. `materials` are the
    /// registry entries the batch added, in order.
    BatchReady {
        ticket: LoadTicket,
        materials: Vec<ExpandedMaterial>,
    },
    /// One image of a batch could not be loaded. The batch still completes.
    ImageFailed {
        ticket: LoadTicket,
        path: String,
        error: ImageSourceError,
    },
    /// A deferred paint failed when replayed.
    PaintFailed { error: TextureError },
}

/// Returned by [`Texture::animate`].
#[derive(Clone, Debug)]
pub struct AnimationHandle {
    /// Pass to [`Texture::cancel_animation`] to stop the animation.
    pub id: IntervalId,
    /// A fresh material bound to the atlas, for the animated mesh.
    pub material: MaterialHandle,
}

struct Animation {
    mesh: SharedMesh,
    frames: Vec<String>,
    next: usize,
}

type TextureParamsHook = Box<dyn FnOnce(&mut TextureHandle)>;

/// Builds a [`Texture`] with optional custom collaborators.
pub struct TextureBuilder {
    config: TextureConfig,
    source: Option<Arc<dyn ImageSource>>,
    packer: Option<Box<dyn AtlasPacker>>,
    texture_params: Option<TextureParamsHook>,
}

impl TextureBuilder {
    pub fn new(config: TextureConfig) -> Self {
        Self {
            config,
            source: None,
            packer: None,
            texture_params: None,
        }
    }

    /// Image source for tile fetches. Defaults to [`FsImageSource`].
    pub fn source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Packing strategy. Defaults to [`GuillotinePacker`].
    pub fn packer(mut self, packer: Box<dyn AtlasPacker>) -> Self {
        self.packer = Some(packer);
        self
    }

    /// Adjusts the texture's sampling state after the configured filters
    /// are applied.
    pub fn texture_params(mut self, hook: impl FnOnce(&mut TextureHandle) + 'static) -> Self {
        self.texture_params = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Result<Texture, TextureError> {
        let config = self.config;
        config.validate()?;

        let mut canvas = AtlasCanvas::new(config.atlas_width, config.atlas_height);
        let packer = match self.packer {
            Some(packer) => {
                let (w, h) = packer.size();
                canvas.ensure_size(w, h);
                packer
            }
            None => {
                let side = canvas.normalize_pow2();
                Box::new(GuillotinePacker::new(side, side)) as Box<dyn AtlasPacker>
            }
        };
        canvas.normalize_pow2();

        let (color_seed, height_seed) = match config.noise_seed {
            Some(seed) => (seed, seed ^ HEIGHT_SEED_SALT),
            None => (rand::random(), rand::random()),
        };

        let mut texture = TextureHandle::from_config(&config);
        if let Some(hook) = self.texture_params {
            hook(&mut texture);
        }

        let source = self.source.unwrap_or_else(|| Arc::new(FsImageSource));
        let loader = ImageLoader::new(config.loader_threads, source);

        info!(
            width = canvas.width(),
            height = canvas.height(),
            texture_path = %config.texture_path,
            workers = loader.worker_count(),
            "texture atlas created"
        );

        Ok(Texture {
            loader,
            canvas,
            packer,
            uv_index: UvIndex::default(),
            materials: Vec::new(),
            loading: 0,
            known_tiles: HashSet::new(),
            in_flight: HashSet::new(),
            batches: BTreeMap::new(),
            next_ticket: 0,
            paint_queue: PaintQueue::default(),
            blender: ColorBlender::new(color_seed, height_seed, config.light_dark_cache_capacity),
            animations: Scheduler::new(),
            material: MaterialHandle::from_config(&config),
            texture,
            options: config,
        })
    }
}

/// A growable texture atlas with a material registry.
pub struct Texture {
    options: TextureConfig,
    loader: ImageLoader,
    canvas: AtlasCanvas,
    packer: Box<dyn AtlasPacker>,
    uv_index: UvIndex,
    /// Append-only; voxel faces store a 1-based index into it.
    materials: Vec<ExpandedMaterial>,
    /// Open batches.
    loading: usize,
    /// Tiles already packed.
    known_tiles: HashSet<String>,
    /// Resolved paths of tile fetches not yet returned. Later batches wait
    /// on these instead of fetching again.
    in_flight: HashSet<String>,
    batches: BTreeMap<LoadTicket, BatchJoin>,
    next_ticket: u64,
    paint_queue: PaintQueue,
    blender: ColorBlender,
    animations: Scheduler<Animation>,
    texture: TextureHandle,
    material: MaterialHandle,
}

impl Texture {
    /// Atlas with the default packer, fetching tiles from `source`.
    pub fn new(config: TextureConfig, source: Arc<dyn ImageSource>) -> Result<Self, TextureError> {
        TextureBuilder::new(config).source(source).build()
    }

    pub fn builder(config: TextureConfig) -> TextureBuilder {
        TextureBuilder::new(config)
    }

    // -- loading ------------------------------------------------------------

    /// Registers materials and starts fetching every tile not seen before.
    ///
    /// Each item becomes one registry entry. Nothing is registered if any
    /// spec is malformed or the loader is closed. The returned ticket is
    /// reported by a [`TextureEvent::BatchReady`] once the atlas includes
    /// every tile of the batch, including tiles an earlier batch is still
    /// fetching.
    pub fn load<I, S>(&mut self, specs: I) -> Result<LoadTicket, TextureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<MaterialSpec>,
    {
        let expanded = specs
            .into_iter()
            .map(|spec| expand(&spec.into()))
            .collect::<Result<Vec<_>, _>>()?;

        let ticket = self.open_ticket();
        let mut batch = BatchJoin::new(expanded.clone());
        let mut jobs = Vec::new();
        for name in expanded.iter().flat_map(ExpandedMaterial::names) {
            if name.is_empty() || is_color_ref(name) || self.known_tiles.contains(name) {
                continue;
            }
            let request = ImageRequest::new(&self.options.texture_path, name, &self.options.cross_origin);
            batch.wait_for(request.path.clone());
            if !self.in_flight.insert(request.path.clone()) {
                continue;
            }
            jobs.push(FetchJob {
                ticket,
                request,
                kind: FetchKind::Tile,
            });
        }

        debug!(
            ticket = ticket.0,
            materials = expanded.len(),
            fetches = jobs.len(),
            "load batch opened"
        );
        let registry_len = self.materials.len();
        self.materials.extend(expanded);
        self.open_batch(ticket, batch, jobs).inspect_err(|_| {
            self.materials.truncate(registry_len);
        })
    }

    /// Fetches a sprite sheet and registers each `tile_w × tile_h` cell as
    /// a material named `{name}_{x}_{y}`, where `x` and `y` are the cell's
    /// pixel offsets in the sheet.
    ///
    /// `tile_w` defaults to 16 and `tile_h` to `tile_w`.
    pub fn sprite(
        &mut self,
        name: &str,
        tile_w: Option<u32>,
        tile_h: Option<u32>,
    ) -> Result<LoadTicket, TextureError> {
        let tile_w = tile_w.unwrap_or(DEFAULT_TILE_SIZE);
        let tile_h = tile_h.unwrap_or(tile_w);
        if tile_w == 0 || tile_h == 0 {
            return Err(TextureError::InvalidTileSize {
                width: tile_w,
                height: tile_h,
            });
        }

        let ticket = self.open_ticket();
        let request = ImageRequest::new(&self.options.texture_path, name, &self.options.cross_origin);
        let mut batch = BatchJoin::new(Vec::new());
        batch.wait_for(request.path.clone());
        debug!(ticket = ticket.0, sheet = %request.path, tile_w, tile_h, "sprite batch opened");

        let job = FetchJob {
            ticket,
            request,
            kind: FetchKind::Sheet { tile_w, tile_h },
        };
        self.open_batch(ticket, batch, vec![job])
    }

    fn open_ticket(&mut self) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    /// Opens the batch and queues its fetches. If the loader refuses a job
    /// the batch is withdrawn and its fresh tile paths are released.
    fn open_batch(
        &mut self,
        ticket: LoadTicket,
        batch: BatchJoin,
        jobs: Vec<FetchJob>,
    ) -> Result<LoadTicket, TextureError> {
        let fresh: Vec<String> = jobs
            .iter()
            .filter(|job| job.kind == FetchKind::Tile)
            .map(|job| job.request.path.clone())
            .collect();

        self.loading += 1;
        self.batches.insert(ticket, batch);
        for job in jobs {
            if let Err(err) = self.loader.submit(job) {
                error!(ticket = ticket.0, %err, "could not queue fetch, batch withdrawn");
                self.batches.remove(&ticket);
                self.loading = self.loading.saturating_sub(1);
                for path in &fresh {
                    self.in_flight.remove(path);
                }
                return Err(err);
            }
        }
        Ok(ticket)
    }

    /// Processes finished fetches and completes settled batches.
    ///
    /// Call once per frame.
    pub fn pump(&mut self) -> Vec<TextureEvent> {
        self.pump_at(Instant::now())
    }

    /// [`pump`](Self::pump) with an explicit clock, for deterministic settling.
    pub fn pump_at(&mut self, now: Instant) -> Vec<TextureEvent> {
        let mut events = Vec::new();
        for result in self.loader.drain_results() {
            self.handle_fetch(result, &mut events);
        }

        let settle = Duration::from_millis(self.options.settle_delay_ms);
        let ready: Vec<LoadTicket> = self
            .batches
            .iter_mut()
            .filter_map(|(ticket, batch)| {
                batch.arm(now, settle);
                batch.is_ready(now).then_some(*ticket)
            })
            .collect();

        for ticket in ready {
            if let Some(batch) = self.batches.remove(&ticket) {
                self.finish_batch(ticket, batch, &mut events);
            }
        }
        events
    }

    /// Pumps until no batch is open or `timeout` elapses, returning every
    /// event produced. Check [`is_loading`](Self::is_loading) afterwards to
    /// tell a timeout from completion.
    pub fn wait_idle(&mut self, timeout: Duration) -> Vec<TextureEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        loop {
            events.extend(self.pump());
            if self.loading == 0 {
                break;
            }
            if Instant::now() >= deadline {
                warn!(loading = self.loading, "timed out waiting for atlas batches");
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        events
    }

    fn handle_fetch(&mut self, result: FetchResult, events: &mut Vec<TextureEvent>) {
        let FetchResult {
            ticket,
            request,
            kind,
            image,
        } = result;

        if kind == FetchKind::Tile {
            self.in_flight.remove(&request.path);
        }

        match image {
            Ok(image) => match kind {
                FetchKind::Tile => {
                    if self.pack_tile(&request.name, &image) {
                        self.known_tiles.insert(request.name.clone());
                    }
                }
                FetchKind::Sheet { tile_w, tile_h } => {
                    let tiles = slice_sheet(&image, &request.name, tile_w, tile_h);
                    let mut added = Vec::with_capacity(tiles.len());
                    for (name, tile) in tiles {
                        if self.pack_tile(&name, &tile) {
                            self.known_tiles.insert(name.clone());
                        }
                        added.push(ExpandedMaterial::uniform(&name));
                    }
                    debug!(sheet = %request.name, tiles = added.len(), "sprite sheet sliced");
                    self.materials.extend(added.iter().cloned());
                    if let Some(batch) = self.batches.get_mut(&ticket) {
                        batch.materials.extend(added);
                    }
                }
            },
            Err(err) => {
                error!(path = %request.path, ticket = ticket.0, %err, "image load failed");
                events.push(TextureEvent::ImageFailed {
                    ticket,
                    path: request.path.clone(),
                    error: err,
                });
            }
        }

        match kind {
            // Any open batch may be waiting on a shared tile.
            FetchKind::Tile => {
                for batch in self.batches.values_mut() {
                    batch.complete(&request.path);
                }
            }
            FetchKind::Sheet { .. } => {
                if let Some(batch) = self.batches.get_mut(&ticket) {
                    batch.complete(&request.path);
                }
            }
        }
    }

    /// Packs `image` under `name`, growing packer and canvas when full.
    /// Returns `false` if the tile could not be placed.
    fn pack_tile(&mut self, name: &str, image: &RgbaImage) -> bool {
        let (w, h) = image.dimensions();
        let rect = match self.packer.pack(name, w, h) {
            Some(rect) => rect,
            None => {
                self.packer.expand(w, h);
                let (pw, ph) = self.packer.size();
                self.canvas.ensure_size(pw, ph);
                debug!(name, width = pw, height = ph, "atlas grown");
                match self.packer.pack(name, w, h) {
                    Some(rect) => rect,
                    None => {
                        warn!(name, w, h, "tile does not fit after growing the atlas");
                        return false;
                    }
                }
            }
        };
        debug!(name, x = rect.x, y = rect.y, w, h, "packed tile");
        self.canvas.blit(image, rect);
        true
    }

    fn finish_batch(&mut self, ticket: LoadTicket, batch: BatchJoin, events: &mut Vec<TextureEvent>) {
        let side = self.canvas.normalize_pow2();
        self.uv_index.rebuild(self.packer.as_ref(), side, side);
        self.texture.touch();
        self.material.needs_update = true;
        self.loading = self.loading.saturating_sub(1);

        info!(
            ticket = ticket.0,
            size = side,
            tiles = self.uv_index.len(),
            loading = self.loading,
            "atlas rebuilt"
        );
        events.push(TextureEvent::BatchReady {
            ticket,
            materials: batch.materials,
        });

        if self.loading == 0 {
            self.flush_paints(events);
        }
    }

    fn flush_paints(&mut self, events: &mut Vec<TextureEvent>) {
        let requests = self.paint_queue.drain();
        if !requests.is_empty() {
            debug!(count = requests.len(), "replaying deferred paints");
        }
        for request in requests {
            let result = request
                .spec
                .as_ref()
                .map(expand)
                .transpose()
                .and_then(|material| self.paint_now(&request.mesh, material.as_ref()));
            if let Err(error) = result {
                warn!(%error, "deferred paint failed");
                events.push(TextureEvent::PaintFailed { error });
            }
        }
    }

    // -- painting -----------------------------------------------------------

    /// Paints `mesh` from the atlas.
    ///
    /// With `spec`, every face uses that material. Without one the mesh is a
    /// voxel mesh and each face's color encodes its registry index. While a
    /// batch is loading the call is queued and the mesh is not touched.
    pub fn paint(
        &mut self,
        mesh: &SharedMesh,
        spec: Option<MaterialSpec>,
    ) -> Result<PaintOutcome, TextureError> {
        let material = spec.as_ref().map(expand).transpose()?;
        if self.loading > 0 {
            self.paint_queue.push(PaintRequest {
                mesh: Rc::clone(mesh),
                spec,
            });
            debug!(queued = self.paint_queue.len(), "atlas loading, paint deferred");
            return Ok(PaintOutcome::Deferred);
        }
        self.paint_now(mesh, material.as_ref()).map(PaintOutcome::Painted)
    }

    fn paint_now(
        &self,
        mesh: &SharedMesh,
        material: Option<&ExpandedMaterial>,
    ) -> Result<PaintStats, TextureError> {
        let mut surface = mesh.try_borrow_mut().map_err(|_| TextureError::MeshBorrowed)?;
        let ctx = PaintContext {
            materials: match material {
                Some(material) => MaterialSource::Simple(material),
                None => MaterialSource::Voxel(&self.materials),
            },
            uv_index: &self.uv_index,
            blender: &self.blender,
            selection: self.options.face_selection,
        };
        let stats = paint_faces(&mut *surface, &ctx);
        if stats.skipped > 0 {
            warn!(skipped = stats.skipped, painted = stats.uv_faces + stats.color_faces, "faces left unpainted");
        }
        Ok(stats)
    }

    /// Writes `#rrggbb` to one face of `mesh`.
    pub fn set_color(&self, mesh: &SharedMesh, face: usize, color: &str) -> Result<(), TextureError> {
        let mut surface = mesh.try_borrow_mut().map_err(|_| TextureError::MeshBorrowed)?;
        crate::paint::set_color(&mut *surface, face, color)
    }

    /// Returns `(light, dark)` shades of `color`.
    pub fn light_dark(&mut self, color: &str) -> Result<(HexColor, HexColor), TextureError> {
        Ok(self.blender.light_dark(HexColor::parse(color)?))
    }

    /// 1-based registry index of the first material using `name` on any
    /// face, or 0 if none does.
    pub fn find(&self, name: &str) -> usize {
        self.materials
            .iter()
            .position(|m| m.contains(name))
            .map_or(0, |i| i + 1)
    }

    // -- animation ----------------------------------------------------------

    /// Repaints `mesh` with the next of `names` every `delay_ms`
    /// (default one second) of [`tick`](Self::tick) time.
    ///
    /// Returns `None` when fewer than two frames are given.
    pub fn animate<I, S>(&mut self, mesh: &SharedMesh, names: I, delay_ms: Option<f64>) -> Option<AnimationHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let frames: Vec<String> = names.into_iter().map(Into::into).collect();
        if frames.len() < 2 {
            return None;
        }

        let mut material = MaterialHandle::textured(self.options.material_type, self.options.material_params.clone());
        material.needs_update = true;

        let delay = delay_ms.unwrap_or(DEFAULT_ANIMATION_DELAY_MS);
        debug!(frames = frames.len(), delay, "animation registered");
        let id = self.animations.interval(
            delay,
            Animation {
                mesh: Rc::clone(mesh),
                frames,
                next: 0,
            },
        );
        Some(AnimationHandle { id, material })
    }

    /// Stops an animation. Returns `false` if it was not running.
    pub fn cancel_animation(&mut self, id: IntervalId) -> bool {
        self.animations.cancel(id).is_some()
    }

    /// Advances animations by `dt_ms` and paints every frame that came due.
    ///
    /// Returns the number of frames painted or deferred.
    pub fn tick(&mut self, dt_ms: f64) -> usize {
        let mut due = Vec::new();
        self.animations.tick(dt_ms, |_, animation| {
            let frame = animation.frames[animation.next % animation.frames.len()].clone();
            animation.next += 1;
            due.push((Rc::clone(&animation.mesh), frame));
        });

        let fired = due.len();
        for (mesh, frame) in due {
            if let Err(err) = self.paint(&mesh, Some(MaterialSpec::Name(frame))) {
                warn!(%err, "animation frame failed");
            }
        }
        fired
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &TextureConfig {
        &self.options
    }

    pub fn canvas(&self) -> &AtlasCanvas {
        &self.canvas
    }

    pub fn packer(&self) -> &dyn AtlasPacker {
        self.packer.as_ref()
    }

    /// UV rectangle of a tile as of the last rebuild.
    pub fn uv(&self, name: &str) -> Option<&UvRect> {
        self.uv_index.get(name)
    }

    pub fn uv_index(&self) -> &UvIndex {
        &self.uv_index
    }

    /// The material registry.
    pub fn materials(&self) -> &[ExpandedMaterial] {
        &self.materials
    }

    /// Number of open batches.
    pub fn loading(&self) -> usize {
        self.loading
    }

    pub fn is_loading(&self) -> bool {
        self.loading > 0
    }

    /// Paint calls waiting for the current batches.
    pub fn queued_paints(&self) -> usize {
        self.paint_queue.len()
    }

    pub fn material(&self) -> &MaterialHandle {
        &self.material
    }

    /// Mutable access, e.g. for a renderer clearing `needs_update`.
    pub fn material_mut(&mut self) -> &mut MaterialHandle {
        &mut self.material
    }

    pub fn texture_handle(&self) -> &TextureHandle {
        &self.texture
    }

    pub fn texture_handle_mut(&mut self) -> &mut TextureHandle {
        &mut self.texture
    }

    pub fn blender(&self) -> &ColorBlender {
        &self.blender
    }

    /// Writes the canvas as a PNG.
    pub fn save_atlas(&self, path: &Path) -> Result<(), TextureError> {
        self.canvas.save(path)?;
        info!(path = %path.display(), "atlas saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryImageSource;
    use crate::mesh::QuadMesh;
    use image::Rgba;

    fn config() -> TextureConfig {
        TextureConfig {
            texture_path: "t/".into(),
            settle_delay_ms: 0,
            noise_seed: Some(7),
            loader_threads: 1,
            ..TextureConfig::default()
        }
    }

    fn texture_with(tiles: &[&str]) -> Texture {
        let source = MemoryImageSource::new();
        for (i, name) in tiles.iter().enumerate() {
            source.insert(format!("t/{name}.png"), RgbaImage::from_pixel(16, 16, Rgba([i as u8, 0, 0, 255])));
        }
        Texture::new(config(), Arc::new(source)).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let bad = TextureConfig {
            loader_threads: 0,
            ..config()
        };
        assert!(matches!(
            Texture::new(bad, Arc::new(MemoryImageSource::new())),
            Err(TextureError::Config(_))
        ));
    }

    #[test]
    fn test_canvas_starts_pow2_square() {
        let texture = Texture::new(
            TextureConfig {
                atlas_width: 300,
                atlas_height: 100,
                ..config()
            },
            Arc::new(MemoryImageSource::new()),
        )
        .unwrap();
        assert_eq!((texture.canvas().width(), texture.canvas().height()), (512, 512));
        assert_eq!(texture.packer().size(), (512, 512));
    }

    #[test]
    fn test_invalid_spec_registers_nothing() {
        let mut texture = texture_with(&["a"]);
        let result = texture.load([MaterialSpec::from("a"), MaterialSpec::list(["1", "2", "3", "4", "5"])]);
        assert!(matches!(result, Err(TextureError::InvalidSpecLength { len: 5 })));
        assert!(texture.materials().is_empty());
        assert!(!texture.is_loading());
    }

    #[test]
    fn test_settle_window_delays_rebuild() {
        let source = MemoryImageSource::new().with("t/a.png", RgbaImage::new(4, 4));
        let mut texture = Texture::new(
            TextureConfig {
                settle_delay_ms: 100,
                ..config()
            },
            Arc::new(source),
        )
        .unwrap();
        texture.load(["a"]).unwrap();

        // Wait for the fetch to arrive without letting the window elapse.
        let start = Instant::now();
        while texture.batches.values().any(|b| !b.is_joined()) {
            texture.pump_at(start);
            std::thread::sleep(Duration::from_millis(1));
            assert!(start.elapsed() < Duration::from_secs(5));
        }
        assert!(texture.pump_at(start).is_empty());
        assert!(texture.is_loading());

        let events = texture.pump_at(start + Duration::from_millis(100));
        assert!(matches!(events.as_slice(), [TextureEvent::BatchReady { .. }]));
        assert!(!texture.is_loading());
    }

    #[test]
    fn test_known_tiles_are_fetched_once() {
        let mut texture = texture_with(&["grass"]);
        texture.load(["grass"]).unwrap();
        texture.wait_idle(Duration::from_secs(5));
        let first = *texture.uv("grass").unwrap();

        texture.load(["grass", "grass"]).unwrap();
        assert!(texture.batches.values().all(BatchJoin::is_joined));
        texture.wait_idle(Duration::from_secs(5));
        assert_eq!(texture.uv("grass"), Some(&first));
        assert_eq!(texture.materials().len(), 3);
        assert_eq!(texture.packer().index().len(), 1);
    }

    #[test]
    fn test_closed_loader_rolls_back_load() {
        let mut texture = texture_with(&["a"]);
        texture.loader.shutdown();

        let result = texture.load(["a", "b"]);
        assert!(matches!(result, Err(TextureError::LoaderClosed)));
        assert!(texture.materials().is_empty());
        assert!(!texture.is_loading());
        assert!(texture.batches.is_empty());
        assert!(texture.in_flight.is_empty());

        let mesh: SharedMesh = QuadMesh::voxel(1).into_shared();
        assert!(matches!(texture.paint(&mesh, None), Ok(PaintOutcome::Painted(_))));
    }

    struct PanickingSource;

    impl ImageSource for PanickingSource {
        fn fetch(&self, _: &ImageRequest) -> Result<RgbaImage, ImageSourceError> {
            panic!("decoder exploded");
        }
    }

    #[test]
    fn test_panicking_source_still_completes_batches() {
        let mut texture = Texture::new(config(), Arc::new(PanickingSource)).unwrap();
        texture.load(["a"]).unwrap();
        texture.load(["b"]).unwrap();
        let events = texture.wait_idle(Duration::from_secs(5));

        let failures = events
            .iter()
            .filter(|e| matches!(e, TextureEvent::ImageFailed { error: ImageSourceError::Panicked { .. }, .. }))
            .count();
        assert_eq!(failures, 2);
        assert!(!texture.is_loading());
        assert_eq!(texture.materials().len(), 2);
    }

    #[test]
    fn test_later_batch_waits_for_tile_in_flight() {
        let mut texture = texture_with(&["grass"]);
        let first = texture.load(["grass"]).unwrap();
        let second = texture.load(["grass"]).unwrap();
        assert_eq!(texture.in_flight.len(), 1);
        assert!(!texture.batches[&second].is_joined());

        let events = texture.wait_idle(Duration::from_secs(5));
        let ready: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                TextureEvent::BatchReady { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .collect();
        assert_eq!(ready, [first, second]);
        assert!(texture.uv("grass").is_some());
        assert!(texture.in_flight.is_empty());
        assert_eq!(texture.packer().index().len(), 1);
    }

    #[test]
    fn test_color_references_are_not_fetched() {
        let mut texture = texture_with(&[]);
        texture.load(["#ff0000/#00ff00"]).unwrap();
        let events = texture.wait_idle(Duration::from_secs(5));
        assert!(events.iter().all(|e| matches!(e, TextureEvent::BatchReady { .. })));
        assert!(texture.uv_index().is_empty());
    }

    #[test]
    fn test_failed_tile_can_be_retried() {
        let source = Arc::new(MemoryImageSource::new());
        let mut texture = Texture::new(config(), source.clone()).unwrap();
        texture.load(["late"]).unwrap();
        let events = texture.wait_idle(Duration::from_secs(5));
        assert!(events.iter().any(|e| matches!(e, TextureEvent::ImageFailed { path, .. } if path == "t/late.png")));
        assert!(texture.uv("late").is_none());

        source.insert("t/late.png", RgbaImage::new(8, 8));
        texture.load(["late"]).unwrap();
        texture.wait_idle(Duration::from_secs(5));
        assert!(texture.uv("late").is_some());
    }

    #[test]
    fn test_find_is_one_based() {
        let mut texture = texture_with(&["dirt", "stone"]);
        texture.load(["dirt", "stone"]).unwrap();
        assert_eq!(texture.find("dirt"), 1);
        assert_eq!(texture.find("stone"), 2);
        assert_eq!(texture.find("lava"), 0);
    }

    #[test]
    fn test_sprite_rejects_zero_tiles() {
        let mut texture = texture_with(&[]);
        assert!(matches!(
            texture.sprite("sheet", Some(0), None),
            Err(TextureError::InvalidTileSize { width: 0, height: 0 })
        ));
        assert!(!texture.is_loading());
    }

    #[test]
    fn test_texture_params_hook_runs() {
        let texture = Texture::builder(config())
            .source(Arc::new(MemoryImageSource::new()))
            .texture_params(|t| t.min_filter = nebula_config::TextureFilter::Nearest)
            .build()
            .unwrap();
        assert_eq!(texture.texture_handle().min_filter, nebula_config::TextureFilter::Nearest);
    }

    #[test]
    fn test_rebuild_sets_refresh_flags() {
        let mut texture = texture_with(&["a"]);
        assert!(!texture.texture_handle().needs_update);
        texture.load(["a"]).unwrap();
        texture.wait_idle(Duration::from_secs(5));
        assert!(texture.texture_handle().needs_update);
        assert!(texture.material().needs_update);
        assert_eq!(texture.texture_handle().version, 1);
    }

    #[test]
    fn test_set_color_and_light_dark() {
        let mut texture = texture_with(&[]);
        let mesh: SharedMesh = QuadMesh::voxel(1).into_shared();
        texture.set_color(&mesh, 0, "#0000ff").unwrap();
        assert!(texture.set_color(&mesh, 0, "#00f").is_err());

        let (light, dark) = texture.light_dark("#808080").unwrap();
        assert_eq!(light, HexColor(0x808080));
        assert!(dark.rgb()[0] < 0x80);
    }

    #[test]
    fn test_paint_reports_borrowed_mesh() {
        let mut texture = texture_with(&[]);
        let mesh: SharedMesh = QuadMesh::voxel(1).into_shared();
        let _guard = mesh.borrow();
        assert!(matches!(texture.paint(&mesh, None), Err(TextureError::MeshBorrowed)));
    }
}

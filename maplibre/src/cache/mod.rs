//! Cache of rendered feature contributions, shared between render threads.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    coords::TileCoordinate,
    error::RenderError,
    render::{surface::RasterImage, tile_renderer::RenderOptions, TileRenderer},
    tile::{FeatureId, TileFeature},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Number of iterations an entry survives without being used.
    pub retention_iterations: i64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            retention_iterations: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TileCacheEntry {
    pub feature_id: FeatureId,
    pub image: Arc<RasterImage>,
    pub last_used_iteration: i64,
}

/// Gate for one feature id. Holding the lock means owning the right to render the feature.
#[derive(Debug, Default)]
struct CacheSlot {
    entry: Mutex<Option<TileCacheEntry>>,
}

/// Rendered images by feature id.
///
/// At most one render per feature id runs at a time. Callers asking for a feature which is
/// being rendered wait for that render and receive its result. Callers for different ids do
/// not wait for each other.
#[derive(Debug, Default)]
pub struct FeatureRenderCache {
    settings: CacheSettings,
    slots: DashMap<FeatureId, Arc<CacheSlot>>,
    current_iteration: AtomicI64,
}

impl FeatureRenderCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            slots: DashMap::new(),
            current_iteration: AtomicI64::new(0),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn current_iteration(&self) -> i64 {
        self.current_iteration.load(Ordering::Acquire)
    }

    /// Records `iteration` as the current render pass and evicts entries which fell out of
    /// the retention window. The current iteration never moves backwards.
    pub fn update_cache(&self, iteration: i64) {
        self.current_iteration.fetch_max(iteration, Ordering::AcqRel);
        self.evict_stale();
    }

    /// Returns the image cached for `feature_id`, or renders, stores and returns it.
    ///
    /// Either way the entry is marked as used in `iteration`. Failed renders are not cached.
    pub fn get_or_add<F>(
        &self,
        feature_id: FeatureId,
        render: F,
        iteration: i64,
    ) -> Result<Arc<RasterImage>, RenderError>
    where
        F: FnOnce() -> Result<RasterImage, RenderError>,
    {
        loop {
            let slot = self.slots.entry(feature_id).or_default().value().clone();
            let mut entry = slot.entry.lock();

            // A sweep may have dropped the slot between looking it up and locking it.
            let still_current = self
                .slots
                .get(&feature_id)
                .map_or(false, |current| Arc::ptr_eq(current.value(), &slot));
            if !still_current {
                continue;
            }

            if let Some(entry) = entry.as_mut() {
                entry.last_used_iteration = iteration;
                return Ok(entry.image.clone());
            }

            let image = Arc::new(render()?);
            log::trace!("cached feature {} in iteration {}", feature_id, iteration);
            *entry = Some(TileCacheEntry {
                feature_id,
                image: image.clone(),
                last_used_iteration: iteration,
            });
            return Ok(image);
        }
    }

    /// Removes entries unused for longer than the retention window and slots left empty by
    /// failed renders. Slots which are locked are being rendered or read and are kept.
    pub fn evict_stale(&self) {
        let threshold = self.current_iteration() - self.settings.retention_iterations;
        let before = self.slots.len();

        self.slots.retain(|_, slot| match slot.entry.try_lock() {
            Some(entry) => entry
                .as_ref()
                .map_or(false, |entry| entry.last_used_iteration >= threshold),
            None => true,
        });

        let evicted = before.saturating_sub(self.slots.len());
        if evicted > 0 {
            log::debug!("evicted {} cached features", evicted);
        }
    }

    pub fn get(&self, feature_id: FeatureId) -> Option<TileCacheEntry> {
        let slot = self.slots.get(&feature_id)?.value().clone();
        let entry = slot.entry.lock();
        entry.clone()
    }

    pub fn contains(&self, feature_id: FeatureId) -> bool {
        self.get(feature_id).is_some()
    }

    /// Number of slots, including those of renders in progress.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Removes all entries. Slots of renders in progress are kept, so that callers waiting for
    /// them still receive their result.
    pub fn clear(&self) {
        self.slots.retain(|_, slot| slot.entry.try_lock().is_none());
    }
}

/// Renders single features through a [`FeatureRenderCache`].
pub struct CachedFeatureRenderer {
    renderer: TileRenderer,
    cache: FeatureRenderCache,
}

impl CachedFeatureRenderer {
    pub fn new(renderer: TileRenderer, settings: CacheSettings) -> Self {
        Self {
            renderer,
            cache: FeatureRenderCache::new(settings),
        }
    }

    pub fn renderer(&self) -> &TileRenderer {
        &self.renderer
    }

    pub fn cache(&self) -> &FeatureRenderCache {
        &self.cache
    }

    pub fn update_cache(&self, iteration: i64) {
        self.cache.update_cache(iteration);
    }

    /// The image of `feature`, rendered at most once while it stays cached. Render failures
    /// are logged and yield `None`.
    pub fn render_feature(
        &self,
        feature: &TileFeature,
        source_layer: &str,
        coords: &TileCoordinate,
        options: &RenderOptions,
        iteration: i64,
    ) -> Option<Arc<RasterImage>> {
        let result = self.cache.get_or_add(
            feature.id,
            || {
                self.renderer
                    .render_feature(feature, source_layer, coords, options)
            },
            iteration,
        );

        match result {
            Ok(image) => Some(image),
            Err(e) => {
                log::error!("rendering feature {} of {} failed: {}", feature.id, coords, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{atomic::AtomicUsize, Barrier},
        thread,
        time::Duration,
    };

    use geo_types::Coord;
    use tiny_skia::Pixmap;

    use super::*;
    use crate::{
        render::{settings::RendererSettings, text::FontCache},
        style::StyleSheet,
        tile::TileGeometry,
    };

    fn image() -> Result<RasterImage, RenderError> {
        Pixmap::new(4, 4)
            .map(RasterImage::from_pixmap)
            .ok_or(RenderError::InvalidSurfaceSize {
                width: 4,
                height: 4,
            })
    }

    #[test]
    fn test_get_or_add_renders_once() {
        let cache = FeatureRenderCache::new(CacheSettings::default());
        let calls = AtomicUsize::new(0);
        let render = || {
            calls.fetch_add(1, Ordering::SeqCst);
            image()
        };

        let first = cache.get_or_add(7, render, 1).unwrap();
        let second = cache.get_or_add(7, render, 2).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(7).unwrap().last_used_iteration, 2);
    }

    #[test]
    fn test_concurrent_get_or_add_renders_once() {
        let cache = Arc::new(FeatureRenderCache::new(CacheSettings::default()));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_add(
                            42,
                            || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(20));
                                image()
                            },
                            1,
                        )
                        .unwrap()
                })
            })
            .collect();

        let images: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(images.iter().all(|image| Arc::ptr_eq(image, &images[0])));
    }

    #[test]
    fn test_different_keys_do_not_block() {
        let cache = Arc::new(FeatureRenderCache::new(CacheSettings::default()));
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let slow = {
            let cache = cache.clone();
            thread::spawn(move || {
                cache
                    .get_or_add(
                        1,
                        || {
                            started_tx.send(()).unwrap();
                            release_rx.recv().unwrap();
                            image()
                        },
                        1,
                    )
                    .unwrap();
            })
        };

        started_rx.recv().unwrap();
        // Feature 1 is still being rendered.
        assert!(cache.get_or_add(2, image, 1).is_ok());
        assert!(cache.contains(2));
        assert_eq!(cache.len(), 2);

        release_tx.send(()).unwrap();
        slow.join().unwrap();
        assert!(cache.contains(1));
    }

    #[test]
    fn test_clear_keeps_renders_in_progress() {
        let cache = Arc::new(FeatureRenderCache::new(CacheSettings::default()));
        cache.get_or_add(8, image, 1).unwrap();

        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let first = {
            let cache = cache.clone();
            thread::spawn(move || {
                cache
                    .get_or_add(
                        9,
                        || {
                            started_tx.send(()).unwrap();
                            release_rx.recv().unwrap();
                            image()
                        },
                        1,
                    )
                    .unwrap()
            })
        };

        started_rx.recv().unwrap();
        cache.clear();
        assert_eq!(cache.len(), 1);
        assert!(!cache.contains(8));

        let calls = Arc::new(AtomicUsize::new(0));
        let second = {
            let cache = cache.clone();
            let calls = calls.clone();
            thread::spawn(move || {
                cache
                    .get_or_add(
                        9,
                        || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            image()
                        },
                        1,
                    )
                    .unwrap()
            })
        };

        release_tx.send(()).unwrap();
        let first = first.join().unwrap();
        let second = second.join().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_render_is_not_cached() {
        let cache = FeatureRenderCache::new(CacheSettings::default());

        let result = cache.get_or_add(
            3,
            || Err(RenderError::InvalidSurfaceSize { width: 0, height: 0 }),
            1,
        );
        assert!(result.is_err());
        assert!(!cache.contains(3));

        cache.update_cache(1);
        assert!(cache.is_empty());

        assert!(cache.get_or_add(3, image, 1).is_ok());
        assert!(cache.contains(3));
    }

    #[test]
    fn test_eviction() {
        let cache = FeatureRenderCache::new(CacheSettings {
            retention_iterations: 2,
        });

        cache.get_or_add(1, image, 1).unwrap();
        cache.get_or_add(2, image, 1).unwrap();
        cache.update_cache(3);
        assert_eq!(cache.len(), 2);

        cache.get_or_add(2, image, 3).unwrap();
        cache.update_cache(4);
        assert!(!cache.contains(1));
        assert!(cache.contains(2));

        // The current iteration does not move backwards.
        cache.update_cache(2);
        assert_eq!(cache.current_iteration(), 4);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cached_feature_renderer() {
        let renderer = TileRenderer::new(
            Arc::new(StyleSheet::default()),
            Arc::new(FontCache::new()),
            RendererSettings::default(),
        );
        let cached = CachedFeatureRenderer::new(renderer, CacheSettings::default());
        let coords = TileCoordinate::new(0, 0, 14.0, 256, 256, 1.0).unwrap();
        let feature = TileFeature::new(
            11,
            TileGeometry::Polygon(vec![vec![
                Coord { x: 10.0, y: 10.0 },
                Coord { x: 100.0, y: 10.0 },
                Coord { x: 100.0, y: 100.0 },
                Coord { x: 10.0, y: 100.0 },
            ]]),
        );

        let first = cached
            .render_feature(&feature, "water", &coords, &RenderOptions::default(), 1)
            .unwrap();
        let second = cached
            .render_feature(&feature, "water", &coords, &RenderOptions::default(), 1)
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((first.width(), first.height()), (256, 256));
        assert!(cached.cache().contains(11));
    }
}

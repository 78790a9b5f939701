//! Background prefetch of rendered session images

use crate::error::{PulseError, PulseResult};
use crate::image::{ImageCache, ImageKey};
use crate::prefetch::renderer::Renderer;
use crate::session::Session;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, warn};

/// Protocol tag used by [`Prefetcher::prefetch`]
pub const DEFAULT_PROTOCOL: &str = "default";

/// Outcome of one prefetch request
#[derive(Debug)]
pub struct PrefetchResult {
    /// Rendered payload or the render failure
    pub rendered: PulseResult<Vec<u8>>,

    /// Served from the image cache without rendering
    pub from_cache: bool,

    /// Render time; zero for cache hits
    pub duration: Duration,
}

impl PrefetchResult {
    fn cached(rendered: Vec<u8>) -> Self {
        Self {
            rendered: Ok(rendered),
            from_cache: true,
            duration: Duration::ZERO,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.rendered.is_ok()
    }

    /// Take the payload, surfacing the render error
    pub fn into_rendered(self) -> PulseResult<Vec<u8>> {
        self.rendered
    }
}

/// Counts running workers and wakes waiters when the count drops to zero
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(Arc::clone(self))
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a worker finishing in between
            // still wakes us
            notified.as_mut().enable();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the in-flight count on drop, including on panic
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Renders session images in the background and stores them in the
/// [`ImageCache`]
///
/// Each miss spawns one worker. [`Prefetcher::close`] flips a cancellation
/// flag that workers check before rendering, then waits for every worker to
/// finish. A render already in progress runs to completion.
pub struct Prefetcher {
    cache: Arc<ImageCache>,
    renderer: Arc<dyn Renderer>,
    cancelled: Arc<AtomicBool>,
    in_flight: Arc<InFlight>,
}

impl Prefetcher {
    pub fn new(cache: Arc<ImageCache>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            cache,
            renderer,
            cancelled: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Prefetch with the default protocol tag
    pub async fn prefetch(
        &self,
        session: &Session,
        width: u32,
        height: u32,
    ) -> oneshot::Receiver<PrefetchResult> {
        self.prefetch_with_protocol(session, DEFAULT_PROTOCOL, width, height)
            .await
    }

    /// Start rendering the session image; the receiver yields exactly one
    /// result
    ///
    /// A cache hit is answered before returning, without spawning a worker.
    pub async fn prefetch_with_protocol(
        &self,
        session: &Session,
        protocol: &str,
        width: u32,
        height: u32,
    ) -> oneshot::Receiver<PrefetchResult> {
        let (tx, rx) = oneshot::channel();
        let key = ImageKey::new(&session.content_hash, protocol, width, height);

        if let Some(rendered) = self.cache.get(&key).await {
            debug!(key = %key, "prefetch served from cache");
            let _ = tx.send(PrefetchResult::cached(rendered));
            return rx;
        }

        let guard = self.in_flight.enter();
        let cache = Arc::clone(&self.cache);
        let renderer = Arc::clone(&self.renderer);
        let cancelled = Arc::clone(&self.cancelled);
        let image_path = session.image_path.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let start = Instant::now();

            let rendered = if cancelled.load(Ordering::SeqCst) {
                Err(PulseError::Cancelled)
            } else {
                renderer
                    .render_file(&image_path, width, height)
                    .await
                    .map_err(|e| match e {
                        PulseError::RenderFailed { .. } => e,
                        other => PulseError::render_failed(&image_path, other.to_string()),
                    })
            };

            if let Ok(bytes) = &rendered {
                if let Err(e) = cache.put(&key, bytes).await {
                    warn!(key = %key, error = %e, "failed to cache rendered image");
                }
            }

            let duration = start.elapsed();
            match &rendered {
                Ok(bytes) => debug!(key = %key, bytes = bytes.len(), ?duration, "prefetch rendered"),
                Err(e) => debug!(key = %key, error = %e, "prefetch failed"),
            }

            // The caller may have dropped the receiver
            let _ = tx.send(PrefetchResult {
                rendered,
                from_cache: false,
                duration,
            });
        });

        rx
    }

    /// Number of workers still running
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until every started worker has finished
    pub async fn wait(&self) {
        self.in_flight.wait_idle().await;
    }

    /// Cancel workers that have not started rendering and wait for all of
    /// them; safe to call repeatedly
    pub async fn close(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wait().await;
    }

    pub fn is_closed(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

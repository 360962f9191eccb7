use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// A host the adapter may present on (a window, activity or view controller).
#[derive(Debug, PartialEq, Eq)]
pub struct Surface {
    pub name: String,
}

impl Surface {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { name: name.into() })
    }
}

pub type SurfaceHandle = Arc<Surface>;

/// Answers whether a valid presentation surface exists right now.
///
/// The engine asks on every load and never keeps the handle past that call.
pub trait DisplaySurfaceProvider: Send + Sync {
    fn current_surface(&self) -> Option<SurfaceHandle>;
}

impl<F> DisplaySurfaceProvider for F
where
    F: Fn() -> Option<SurfaceHandle> + Send + Sync,
{
    fn current_surface(&self) -> Option<SurfaceHandle> {
        (self)()
    }
}

/// Tracks the host through a weak reference; the host owns itself.
#[derive(Debug, Default)]
pub struct WeakSurface {
    inner: RwLock<Weak<Surface>>,
}

impl WeakSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracking(surface: &SurfaceHandle) -> Self {
        Self {
            inner: RwLock::new(Arc::downgrade(surface)),
        }
    }

    /// Points the provider at a new host.
    pub fn update(&self, surface: &SurfaceHandle) {
        *self.inner.write() = Arc::downgrade(surface);
    }
}

impl DisplaySurfaceProvider for WeakSurface {
    fn current_surface(&self) -> Option<SurfaceHandle> {
        self.inner.read().upgrade()
    }
}

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

/// Opaque, locally resolvable handle to the image bytes a scan attempt
/// shows on screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewRef {
    id: u64,
}

impl fmt::Display for PreviewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preview://{}", self.id)
    }
}

/// Owns every live preview. A reference is released only by an explicit
/// supersede or reset, never by a screen being torn down, so the image
/// stays resolvable through the processing→result transition of its
/// attempt.
#[derive(Default)]
pub struct PreviewRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    previews: HashMap<u64, Arc<Vec<u8>>>,
    next_id: u64,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, bytes: Vec<u8>) -> PreviewRef {
        let mut inner = self.inner.lock().expect("preview registry poisoned");
        inner.next_id += 1;
        let id = inner.next_id;
        inner.previews.insert(id, Arc::new(bytes));
        PreviewRef { id }
    }

    pub fn resolve(&self, preview: &PreviewRef) -> Option<Arc<Vec<u8>>> {
        let inner = self.inner.lock().expect("preview registry poisoned");
        inner.previews.get(&preview.id).cloned()
    }

    /// Releasing an already-released reference is a no-op.
    pub fn release(&self, preview: &PreviewRef) {
        let mut inner = self.inner.lock().expect("preview registry poisoned");
        inner.previews.remove(&preview.id);
    }

    pub fn live_count(&self) -> usize {
        let inner = self.inner.lock().expect("preview registry poisoned");
        inner.previews.len()
    }
}

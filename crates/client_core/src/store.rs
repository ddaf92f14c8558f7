use std::sync::{Arc, Mutex};

use shared::domain::Classification;

use crate::preview::PreviewRef;

/// Lifecycle of one scan attempt. Exactly one value exists per store and
/// every transition replaces it atomically.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    Idle,
    Camera,
    Processing {
        image: PreviewRef,
    },
    Result {
        image: PreviewRef,
        classification: Classification,
    },
    Error {
        image: Option<PreviewRef>,
        message: String,
        details: Option<String>,
    },
}

type Observer = Arc<dyn Fn(&ScanState) + Send + Sync>;

/// Handle returned by [`ScanStore::subscribe`]; pass it back to
/// [`ScanStore::unsubscribe`] to stop delivery.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
}

/// Single source of truth for scan progress, observable by any number of
/// independent viewers.
///
/// Observers are notified synchronously, in subscription order, and a new
/// observer receives the current state immediately. The store deliberately
/// does not police transition order; any transition is accepted from any
/// state, and legality lives with the callers driving it.
///
/// Observers must not subscribe or unsubscribe from inside a notification;
/// delivery holds the registration lock.
pub struct ScanStore {
    state: Mutex<ScanState>,
    observers: Mutex<ObserverSet>,
}

#[derive(Default)]
struct ObserverSet {
    entries: Vec<(u64, Observer)>,
    next_id: u64,
}

impl Default for ScanStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScanState::Idle),
            observers: Mutex::new(ObserverSet::default()),
        }
    }

    pub fn snapshot(&self) -> ScanState {
        self.state.lock().expect("scan state poisoned").clone()
    }

    pub fn subscribe(&self, observer: impl Fn(&ScanState) + Send + Sync + 'static) -> Subscription {
        let observer: Observer = Arc::new(observer);
        let mut set = self.observers.lock().expect("observer set poisoned");
        observer(&self.snapshot());
        set.next_id += 1;
        let id = set.next_id;
        set.entries.push((id, observer));
        Subscription { id }
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        let mut set = self.observers.lock().expect("observer set poisoned");
        set.entries.retain(|(id, _)| *id != subscription.id);
    }

    pub fn reset(&self) {
        self.publish(ScanState::Idle);
    }

    pub fn reset_to_camera(&self) {
        self.publish(ScanState::Camera);
    }

    pub fn processing(&self, image: PreviewRef) {
        self.publish(ScanState::Processing { image });
    }

    pub fn done(&self, image: PreviewRef, classification: Classification) {
        self.publish(ScanState::Result {
            image,
            classification,
        });
    }

    pub fn error(
        &self,
        message: impl Into<String>,
        details: Option<String>,
        image: Option<PreviewRef>,
    ) {
        self.publish(ScanState::Error {
            image,
            message: message.into(),
            details,
        });
    }

    fn publish(&self, next: ScanState) {
        // The registration lock is taken first so concurrent transitions
        // deliver in a consistent order and subscribe() can't interleave.
        let set = self.observers.lock().expect("observer set poisoned");
        *self.state.lock().expect("scan state poisoned") = next.clone();
        for (_, observer) in &set.entries {
            observer(&next);
        }
    }
}

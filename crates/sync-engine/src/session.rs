//! Per-interface session state.

use std::sync::Arc;

use mapsync_core_types::{Key, Locator, SessionId};
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::SyncError;
use crate::policy::SyncPolicy;
use crate::ports::InterfaceHandle;

/// Disclosure the session last opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenDisclosure {
    pub id: String,
    pub sentinel: Locator,
}

/// One live interface plus the bookkeeping the controllers share.
///
/// The session remembers which disclosure it opened last so that a second request to open
/// the same disclosure can be answered without touching the page.
pub struct Session {
    id: SessionId,
    handle: Arc<dyn InterfaceHandle>,
    policy: SyncPolicy,
    open: Mutex<Option<OpenDisclosure>>,
}

impl Session {
    pub fn new(handle: Arc<dyn InterfaceHandle>, policy: SyncPolicy) -> Self {
        Self {
            id: SessionId::new(),
            handle,
            policy,
            open: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn handle(&self) -> &dyn InterfaceHandle {
        self.handle.as_ref()
    }

    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    pub fn open_disclosure(&self) -> Option<OpenDisclosure> {
        self.open.lock().clone()
    }

    pub(crate) fn mark_open(&self, entry: OpenDisclosure) {
        *self.open.lock() = Some(entry);
    }

    pub(crate) fn take_open(&self) -> Option<OpenDisclosure> {
        self.open.lock().take()
    }

    /// Forget the tracked disclosure, e.g. after navigating away.
    pub fn reset(&self) {
        if let Some(previous) = self.open.lock().take() {
            debug!(session = %self.id, disclosure = %previous.id, "disclosure tracker reset");
        }
    }

    /// Press Escape and forget the tracked disclosure.
    pub async fn dismiss(&self) -> Result<(), SyncError> {
        self.reset();
        self.handle.press_key(Key::Escape).await?;
        Ok(())
    }
}

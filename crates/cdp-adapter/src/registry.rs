//! Page registry: maps adapter page ids to CDP targets and sessions.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ids::PageId;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TargetContext {
    pub target_id: Option<String>,
    pub cdp_session: Option<String>,
    pub recent_url: Option<String>,
    /// Whether `Fetch` interception is currently enabled for the page.
    pub intercepting: bool,
}

#[derive(Default)]
pub struct Registry {
    pages: DashMap<PageId, TargetContext>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_page(&self, page: PageId, target_id: Option<String>, cdp_session: Option<String>) {
        self.pages.insert(
            page,
            TargetContext {
                target_id,
                cdp_session,
                ..TargetContext::default()
            },
        );
    }

    pub fn remove_page(&self, page: &PageId) -> Option<TargetContext> {
        self.pages.remove(page).map(|(_, ctx)| ctx)
    }

    pub fn get(&self, page: &PageId) -> Option<TargetContext> {
        self.pages.get(page).map(|entry| entry.value().clone())
    }

    pub fn pages(&self) -> Vec<PageId> {
        self.pages.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page_for_session(&self, cdp_session: &str) -> Option<PageId> {
        self.pages
            .iter()
            .find(|entry| entry.cdp_session.as_deref() == Some(cdp_session))
            .map(|entry| *entry.key())
    }

    pub fn page_for_target(&self, target_id: &str) -> Option<PageId> {
        self.pages
            .iter()
            .find(|entry| entry.target_id.as_deref() == Some(target_id))
            .map(|entry| *entry.key())
    }

    pub fn set_recent_url(&self, page: &PageId, url: String) {
        if let Some(mut entry) = self.pages.get_mut(page) {
            entry.recent_url = Some(url);
        }
    }

    pub fn set_cdp_session(&self, page: &PageId, session: String) {
        if let Some(mut entry) = self.pages.get_mut(page) {
            entry.cdp_session = Some(session);
        }
    }

    pub fn set_intercepting(&self, page: &PageId, on: bool) {
        if let Some(mut entry) = self.pages.get_mut(page) {
            entry.intercepting = on;
        }
    }

    pub fn cdp_session(&self, page: &PageId) -> Option<String> {
        self.pages
            .get(page)
            .and_then(|entry| entry.cdp_session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_pages_by_session_and_target() {
        let registry = Registry::new();
        let page = PageId::new();
        registry.insert_page(page, Some("target-1".into()), None);
        assert_eq!(registry.page_for_session("sess-1"), None);

        registry.set_cdp_session(&page, "sess-1".into());
        assert_eq!(registry.page_for_session("sess-1"), Some(page));
        assert_eq!(registry.page_for_target("target-1"), Some(page));

        let removed = registry.remove_page(&page).expect("page registered");
        assert_eq!(removed.cdp_session.as_deref(), Some("sess-1"));
        assert!(registry.is_empty());
    }
}

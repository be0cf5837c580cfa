//! Scripted in-memory interface.
//!
//! [`FakeInterface`] keeps a tiny element table keyed by locator, reacts to clicks and keys
//! through registered closures, emits request events on demand and logs every action so tests
//! can assert on ordering and click counts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mapsync_core_types::{Key, Locator, Point};
use parking_lot::Mutex;
use request_tap::{PageId, RequestSubscription, RequestTap, ResponseRewrite, RewriteTable, UrlPattern};

use crate::errors::PortError;
use crate::policy::SyncPolicy;
use crate::ports::{ElementPort, InputPort, NavigationPort, NetworkPort};
use crate::session::Session;

pub type Reaction = Arc<dyn Fn(&mut FakeDom) + Send + Sync>;
pub type PointerReaction = Arc<dyn Fn(&mut FakeDom, Point) + Send + Sync>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FakeElement {
    pub visible: bool,
    pub text: Option<String>,
    pub attributes: HashMap<String, String>,
    pub count: usize,
}

impl FakeElement {
    pub fn visible() -> Self {
        Self {
            visible: true,
            count: 1,
            ..Self::default()
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            count: 1,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.attributes.insert("class".to_string(), class.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FakeAction {
    Click(String),
    Hover(String),
    Key(Key),
    PointerMove(Point),
    Goto(String),
    /// A visibility query and its answer.
    Visible { target: String, visible: bool },
}

/// Mutable page model handed to reactions.
#[derive(Default)]
pub struct FakeDom {
    elements: HashMap<String, FakeElement>,
    url: String,
    clicks: HashMap<String, Reaction>,
    hovers: HashMap<String, Reaction>,
    keys: HashMap<Key, Vec<Reaction>>,
    pointer: Option<PointerReaction>,
    log: Vec<FakeAction>,
}

impl FakeDom {
    pub fn insert(&mut self, target: &Locator, element: FakeElement) {
        self.elements.insert(target.to_string(), element);
    }

    pub fn remove(&mut self, target: &Locator) {
        self.elements.remove(&target.to_string());
    }

    pub fn element(&self, target: &Locator) -> Option<&FakeElement> {
        self.elements.get(&target.to_string())
    }

    fn element_mut(&mut self, target: &Locator) -> &mut FakeElement {
        self.elements
            .entry(target.to_string())
            .or_insert_with(FakeElement::hidden)
    }

    pub fn set_visible(&mut self, target: &Locator, visible: bool) {
        self.element_mut(target).visible = visible;
    }

    pub fn set_text(&mut self, target: &Locator, text: impl Into<String>) {
        self.element_mut(target).text = Some(text.into());
    }

    pub fn set_count(&mut self, target: &Locator, count: usize) {
        self.element_mut(target).count = count;
    }

    pub fn set_attribute(&mut self, target: &Locator, name: &str, value: impl Into<String>) {
        self.element_mut(target)
            .attributes
            .insert(name.to_string(), value.into());
    }

    /// Add a whitespace-separated token to the `class` attribute.
    pub fn add_class(&mut self, target: &Locator, token: &str) {
        let element = self.element_mut(target);
        let class = element.attributes.entry("class".to_string()).or_default();
        if !class.split_whitespace().any(|part| part == token) {
            if !class.is_empty() {
                class.push(' ');
            }
            class.push_str(token);
        }
    }

    pub fn remove_class(&mut self, target: &Locator, token: &str) {
        let element = self.element_mut(target);
        if let Some(class) = element.attributes.get_mut("class") {
            *class = class
                .split_whitespace()
                .filter(|part| *part != token)
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    pub fn has_class(&self, target: &Locator, token: &str) -> bool {
        self.element(target)
            .and_then(|element| element.attributes.get("class"))
            .map(|class| class.split_whitespace().any(|part| part == token))
            .unwrap_or(false)
    }

    pub fn text(&self, target: &Locator) -> Option<String> {
        self.element(target).and_then(|element| element.text.clone())
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    fn is_visible(&self, target: &Locator) -> bool {
        self.element(target)
            .map(|element| element.visible && element.count > 0)
            .unwrap_or(false)
    }

    fn require_visible(&self, target: &Locator) -> Result<(), PortError> {
        if self.is_visible(target) {
            Ok(())
        } else {
            Err(PortError::ElementNotFound(target.to_string()))
        }
    }
}

/// In-memory [`InterfaceHandle`](crate::InterfaceHandle).
#[derive(Clone)]
pub struct FakeInterface {
    dom: Arc<Mutex<FakeDom>>,
    tap: Arc<RequestTap>,
    page: PageId,
    rewrites: Arc<RewriteTable>,
}

impl Default for FakeInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeInterface {
    pub fn new() -> Self {
        let tap = Arc::new(RequestTap::new());
        let page = PageId::new();
        tap.enable(page);
        Self {
            dom: Arc::new(Mutex::new(FakeDom::default())),
            tap,
            page,
            rewrites: Arc::new(RewriteTable::new()),
        }
    }

    /// Session over this interface with a fresh tracker.
    pub fn session(&self, policy: SyncPolicy) -> Session {
        Session::new(Arc::new(self.clone()), policy)
    }

    /// Run `f` against the page model.
    pub fn edit<R>(&self, f: impl FnOnce(&mut FakeDom) -> R) -> R {
        f(&mut *self.dom.lock())
    }

    pub fn insert(&self, target: &Locator, element: FakeElement) {
        self.dom.lock().insert(target, element);
    }

    pub fn on_click(&self, target: &Locator, reaction: impl Fn(&mut FakeDom) + Send + Sync + 'static) {
        self.dom
            .lock()
            .clicks
            .insert(target.to_string(), Arc::new(reaction));
    }

    pub fn on_hover(&self, target: &Locator, reaction: impl Fn(&mut FakeDom) + Send + Sync + 'static) {
        self.dom
            .lock()
            .hovers
            .insert(target.to_string(), Arc::new(reaction));
    }

    /// Reactions accumulate; each registered reaction runs on every press.
    pub fn on_key(&self, key: Key, reaction: impl Fn(&mut FakeDom) + Send + Sync + 'static) {
        self.dom
            .lock()
            .keys
            .entry(key)
            .or_default()
            .push(Arc::new(reaction));
    }

    pub fn on_pointer(&self, reaction: impl Fn(&mut FakeDom, Point) + Send + Sync + 'static) {
        self.dom.lock().pointer = Some(Arc::new(reaction));
    }

    /// Apply `mutation` after `delay` on the runtime's clock.
    pub fn schedule(&self, delay: Duration, mutation: impl FnOnce(&mut FakeDom) + Send + 'static) {
        let dom = self.dom.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            mutation(&mut *dom.lock());
        });
    }

    pub fn emit_request(&self, url: &str) {
        self.tap.record(self.page, url, "GET");
    }

    /// Emit `count` requests, one every `interval`, starting after the first interval.
    pub fn emit_requests(&self, url: &str, count: usize, interval: Duration) {
        let tap = self.tap.clone();
        let page = self.page;
        let url = url.to_string();
        tokio::spawn(async move {
            for _ in 0..count {
                tokio::time::sleep(interval).await;
                tap.record(page, &url, "GET");
            }
        });
    }

    pub fn tap(&self) -> &RequestTap {
        &self.tap
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn rewrites(&self) -> &RewriteTable {
        &self.rewrites
    }

    pub fn actions(&self) -> Vec<FakeAction> {
        self.dom.lock().log.clone()
    }

    pub fn clear_actions(&self) {
        self.dom.lock().log.clear();
    }

    pub fn clicks_on(&self, target: &Locator) -> usize {
        let key = target.to_string();
        self.dom
            .lock()
            .log
            .iter()
            .filter(|action| matches!(action, FakeAction::Click(clicked) if *clicked == key))
            .count()
    }

    pub fn key_presses(&self, key: Key) -> usize {
        self.dom
            .lock()
            .log
            .iter()
            .filter(|action| matches!(action, FakeAction::Key(pressed) if *pressed == key))
            .count()
    }
}

#[async_trait]
impl ElementPort for FakeInterface {
    async fn is_visible(&self, target: &Locator) -> Result<bool, PortError> {
        let mut dom = self.dom.lock();
        let visible = dom.is_visible(target);
        dom.log.push(FakeAction::Visible {
            target: target.to_string(),
            visible,
        });
        Ok(visible)
    }

    async fn text_content(&self, target: &Locator) -> Result<Option<String>, PortError> {
        Ok(self.dom.lock().text(target))
    }

    async fn attribute(&self, target: &Locator, name: &str) -> Result<Option<String>, PortError> {
        Ok(self
            .dom
            .lock()
            .element(target)
            .and_then(|element| element.attributes.get(name).cloned()))
    }

    async fn count(&self, target: &Locator) -> Result<usize, PortError> {
        Ok(self
            .dom
            .lock()
            .element(target)
            .map(|element| element.count)
            .unwrap_or(0))
    }
}

#[async_trait]
impl InputPort for FakeInterface {
    async fn click(&self, target: &Locator) -> Result<(), PortError> {
        let mut dom = self.dom.lock();
        dom.require_visible(target)?;
        let key = target.to_string();
        dom.log.push(FakeAction::Click(key.clone()));
        if let Some(reaction) = dom.clicks.get(&key).cloned() {
            reaction(&mut *dom);
        }
        Ok(())
    }

    async fn hover(&self, target: &Locator) -> Result<(), PortError> {
        let mut dom = self.dom.lock();
        dom.require_visible(target)?;
        let key = target.to_string();
        dom.log.push(FakeAction::Hover(key.clone()));
        if let Some(reaction) = dom.hovers.get(&key).cloned() {
            reaction(&mut *dom);
        }
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), PortError> {
        let mut dom = self.dom.lock();
        dom.log.push(FakeAction::Key(key));
        let reactions = dom.keys.get(&key).cloned().unwrap_or_default();
        for reaction in reactions {
            reaction(&mut *dom);
        }
        Ok(())
    }

    async fn move_pointer(&self, to: Point) -> Result<(), PortError> {
        let mut dom = self.dom.lock();
        dom.log.push(FakeAction::PointerMove(to));
        if let Some(reaction) = dom.pointer.clone() {
            reaction(&mut *dom, to);
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkPort for FakeInterface {
    fn subscribe_requests(&self, pattern: UrlPattern) -> Result<RequestSubscription, PortError> {
        self.tap
            .subscribe(self.page, pattern)
            .map_err(|err| PortError::Tap(err.to_string()))
    }

    async fn rewrite_responses(&self, rule: ResponseRewrite) -> Result<(), PortError> {
        self.rewrites.push(rule);
        Ok(())
    }

    async fn clear_rewrites(&self) -> Result<(), PortError> {
        self.rewrites.clear();
        Ok(())
    }
}

#[async_trait]
impl NavigationPort for FakeInterface {
    async fn goto(&self, url: &str) -> Result<(), PortError> {
        let mut dom = self.dom.lock();
        dom.log.push(FakeAction::Goto(url.to_string()));
        dom.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PortError> {
        Ok(self.dom.lock().url.clone())
    }
}

//! Capabilities the engine needs from the host runtime.
//!
//! The engine never talks to a browser directly. A host implements these traits (the CLI
//! bridges them onto the CDP adapter; tests use [`crate::testing::FakeInterface`]) and hands the
//! engine an `Arc<dyn InterfaceHandle>`.

use async_trait::async_trait;
use mapsync_core_types::{Key, Locator, Point};
use request_tap::{RequestSubscription, ResponseRewrite, UrlPattern};

use crate::errors::PortError;

#[async_trait]
pub trait ElementPort: Send + Sync {
    /// Whether the first match is rendered. A missing element is simply not visible.
    async fn is_visible(&self, target: &Locator) -> Result<bool, PortError>;

    /// Text content of the first match, `None` when nothing matches.
    async fn text_content(&self, target: &Locator) -> Result<Option<String>, PortError>;

    /// Attribute of the first match, `None` when the element or the attribute is missing.
    async fn attribute(&self, target: &Locator, name: &str) -> Result<Option<String>, PortError>;

    /// Number of elements matching the descriptor.
    async fn count(&self, target: &Locator) -> Result<usize, PortError>;
}

#[async_trait]
pub trait InputPort: Send + Sync {
    async fn click(&self, target: &Locator) -> Result<(), PortError>;

    async fn hover(&self, target: &Locator) -> Result<(), PortError>;

    async fn press_key(&self, key: Key) -> Result<(), PortError>;

    async fn move_pointer(&self, to: Point) -> Result<(), PortError>;
}

#[async_trait]
pub trait NetworkPort: Send + Sync {
    /// Attach to the outbound request stream. Only requests issued after this call are seen.
    fn subscribe_requests(&self, pattern: UrlPattern) -> Result<RequestSubscription, PortError>;

    /// Register a response rewrite for responses matching the rule's pattern.
    async fn rewrite_responses(&self, rule: ResponseRewrite) -> Result<(), PortError>;

    async fn clear_rewrites(&self) -> Result<(), PortError>;
}

#[async_trait]
pub trait NavigationPort: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), PortError>;

    async fn current_url(&self) -> Result<String, PortError>;
}

/// Everything a controller may need from a live interface.
pub trait InterfaceHandle: ElementPort + InputPort + NetworkPort + NavigationPort {}

impl<T> InterfaceHandle for T where T: ElementPort + InputPort + NetworkPort + NavigationPort {}

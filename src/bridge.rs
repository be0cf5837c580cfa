//! Ports of the synchronization engine implemented over the CDP adapter.
//!
//! One [`CdpInterface`] drives exactly one page. The adapter it shares may host others.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{event_bus, AdapterError, AdapterErrorKind, CdpAdapter, CdpConfig, PageId};
use mapsync_core_types::{Key, Locator, Point};
use request_tap::{RequestSubscription, ResponseRewrite, UrlPattern};
use sync_engine::{ElementPort, InputPort, NavigationPort, NetworkPort, PortError};
use tracing::{debug, info};

const ATTACH_TIMEOUT: Duration = Duration::from_secs(20);

pub(crate) fn port_error(err: AdapterError) -> PortError {
    let message = err.to_string();
    match err.kind {
        AdapterErrorKind::TargetNotFound => PortError::ElementNotFound(message),
        AdapterErrorKind::InvalidSelector => PortError::InvalidDescriptor(message),
        AdapterErrorKind::NavTimeout | AdapterErrorKind::CdpIo | AdapterErrorKind::Internal => {
            PortError::Io(message)
        }
    }
}

#[derive(Clone)]
pub struct CdpInterface {
    adapter: Arc<CdpAdapter>,
    page: PageId,
    nav_deadline: Duration,
}

impl CdpInterface {
    pub fn new(adapter: Arc<CdpAdapter>, page: PageId) -> Self {
        Self {
            adapter,
            page,
            nav_deadline: Duration::from_secs(30),
        }
    }

    pub fn with_nav_deadline(mut self, deadline: Duration) -> Self {
        self.nav_deadline = deadline;
        self
    }

    /// Launch (or attach to) Chromium and bind to its first page.
    pub async fn connect(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let deadline = Duration::from_millis(cfg.default_deadline_ms);
        let (bus, _rx) = event_bus(256);
        let adapter = Arc::new(CdpAdapter::new(cfg, bus)?);
        Arc::clone(&adapter).start().await?;
        let page = adapter.attached_page(ATTACH_TIMEOUT).await?;
        info!(mode = adapter.mode().as_str(), page = %page.0, "browser page attached");
        Ok(Self::new(adapter, page).with_nav_deadline(deadline))
    }

    pub fn adapter(&self) -> &Arc<CdpAdapter> {
        &self.adapter
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    pub async fn shutdown(&self) {
        self.adapter.shutdown().await;
    }
}

#[async_trait]
impl ElementPort for CdpInterface {
    async fn is_visible(&self, target: &Locator) -> Result<bool, PortError> {
        let snapshot = self
            .adapter
            .probe_element(self.page, target, None, false)
            .await
            .map_err(port_error)?;
        Ok(snapshot.count > 0 && snapshot.visible)
    }

    async fn text_content(&self, target: &Locator) -> Result<Option<String>, PortError> {
        let snapshot = self
            .adapter
            .probe_element(self.page, target, None, false)
            .await
            .map_err(port_error)?;
        Ok(snapshot.text)
    }

    async fn attribute(&self, target: &Locator, name: &str) -> Result<Option<String>, PortError> {
        let snapshot = self
            .adapter
            .probe_element(self.page, target, Some(name), false)
            .await
            .map_err(port_error)?;
        Ok(snapshot.attribute)
    }

    async fn count(&self, target: &Locator) -> Result<usize, PortError> {
        let snapshot = self
            .adapter
            .probe_element(self.page, target, None, false)
            .await
            .map_err(port_error)?;
        Ok(snapshot.count)
    }
}

#[async_trait]
impl InputPort for CdpInterface {
    async fn click(&self, target: &Locator) -> Result<(), PortError> {
        debug!(%target, "click");
        self.adapter.click(self.page, target).await.map_err(port_error)
    }

    async fn hover(&self, target: &Locator) -> Result<(), PortError> {
        self.adapter.hover(self.page, target).await.map_err(port_error)
    }

    async fn press_key(&self, key: Key) -> Result<(), PortError> {
        self.adapter.press_key(self.page, key).await.map_err(port_error)
    }

    async fn move_pointer(&self, to: Point) -> Result<(), PortError> {
        self.adapter.move_pointer(self.page, to).await.map_err(port_error)
    }
}

#[async_trait]
impl NetworkPort for CdpInterface {
    fn subscribe_requests(&self, pattern: UrlPattern) -> Result<RequestSubscription, PortError> {
        self.adapter
            .subscribe_requests(self.page, pattern)
            .map_err(|err| PortError::Tap(err.to_string()))
    }

    async fn rewrite_responses(&self, rule: ResponseRewrite) -> Result<(), PortError> {
        self.adapter.add_rewrite(self.page, rule).await.map_err(port_error)
    }

    async fn clear_rewrites(&self) -> Result<(), PortError> {
        self.adapter.clear_rewrites(self.page).await.map_err(port_error)
    }
}

#[async_trait]
impl NavigationPort for CdpInterface {
    async fn goto(&self, url: &str) -> Result<(), PortError> {
        self.adapter
            .navigate(self.page, url, self.nav_deadline)
            .await
            .map_err(port_error)
    }

    async fn current_url(&self) -> Result<String, PortError> {
        self.adapter.current_url(self.page).await.map_err(port_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::{CdpTransport, CommandTarget, TransportEvent};
    use serde_json::{json, Value};
    use std::collections::{HashMap, VecDeque};
    use tokio::sync::Mutex;

    /// Answers commands from per-method queues and never emits events.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<HashMap<String, VecDeque<Value>>>,
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        async fn respond(&self, method: &str, value: Value) {
            self.responses
                .lock()
                .await
                .entry(method.to_string())
                .or_default()
                .push_back(value);
        }

        async fn sent(&self, method: &str) -> Vec<Value> {
            self.sent
                .lock()
                .await
                .iter()
                .filter(|(name, _)| name == method)
                .map(|(_, params)| params.clone())
                .collect()
        }
    }

    #[async_trait]
    impl CdpTransport for ScriptedTransport {
        async fn start(&self) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn next_event(&self) -> Option<TransportEvent> {
            std::future::pending().await
        }

        async fn send_command(
            &self,
            _target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, AdapterError> {
            self.sent.lock().await.push((method.to_string(), params));
            Ok(self
                .responses
                .lock()
                .await
                .get_mut(method)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Value::Null))
        }
    }

    fn interface() -> (CdpInterface, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::default());
        let (bus, _rx) = event_bus(8);
        let adapter = Arc::new(CdpAdapter::with_transport(
            CdpConfig::default(),
            bus,
            transport.clone() as Arc<dyn CdpTransport>,
        ));
        let page = PageId::new();
        adapter.register_page(page, Some("T1".into()), Some("S1".into()));
        (CdpInterface::new(adapter, page), transport)
    }

    fn snapshot(value: Value) -> Value {
        json!({ "result": { "type": "object", "value": value } })
    }

    #[test]
    fn adapter_errors_map_onto_port_errors() {
        let missing = AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint("#x");
        assert!(matches!(port_error(missing), PortError::ElementNotFound(_)));
        let bad = AdapterError::new(AdapterErrorKind::InvalidSelector);
        assert!(matches!(port_error(bad), PortError::InvalidDescriptor(_)));
        let io = AdapterError::new(AdapterErrorKind::CdpIo).retriable(true);
        assert!(matches!(port_error(io), PortError::Io(_)));
    }

    #[tokio::test]
    async fn element_queries_read_the_snapshot() {
        let (iface, transport) = interface();
        transport
            .respond(
                "Runtime.evaluate",
                snapshot(json!({"count": 2, "visible": true, "text": "12 selected", "attribute": null})),
            )
            .await;
        transport
            .respond(
                "Runtime.evaluate",
                snapshot(json!({"count": 0, "visible": false, "text": null, "attribute": null})),
            )
            .await;
        transport
            .respond(
                "Runtime.evaluate",
                snapshot(json!({"count": 1, "visible": true, "text": null, "attribute": "MuiTab-root Mui-selected"})),
            )
            .await;

        let caption = Locator::css("span.MuiTypography-caption");
        assert_eq!(iface.text_content(&caption).await.unwrap().as_deref(), Some("12 selected"));
        assert!(!iface.is_visible(&Locator::css("#gone")).await.unwrap());
        assert_eq!(
            iface.attribute(&Locator::css("a[role=tab]"), "class").await.unwrap().as_deref(),
            Some("MuiTab-root Mui-selected")
        );
        let evaluated = transport.sent("Runtime.evaluate").await;
        assert_eq!(evaluated.len(), 3);
        assert!(evaluated[2]["expression"].as_str().unwrap().contains(r#""attribute":"class""#));
    }

    #[tokio::test]
    async fn resolver_errors_are_invalid_descriptors() {
        let (iface, transport) = interface();
        transport
            .respond(
                "Runtime.evaluate",
                snapshot(json!({"count": 0, "visible": false, "error": "not a valid selector"})),
            )
            .await;
        let err = iface.count(&Locator::css("div[")).await.unwrap_err();
        assert!(matches!(err, PortError::InvalidDescriptor(_)));
    }

    #[tokio::test]
    async fn clicking_a_hidden_element_is_not_found() {
        let (iface, transport) = interface();
        transport
            .respond(
                "Runtime.evaluate",
                snapshot(json!({"count": 1, "visible": false, "x": 5.0, "y": 5.0})),
            )
            .await;
        let err = iface.click(&Locator::css("#hidden")).await.unwrap_err();
        assert!(matches!(err, PortError::ElementNotFound(_)));
        assert!(transport.sent("Input.dispatchMouseEvent").await.is_empty());
    }

    #[tokio::test]
    async fn recorded_requests_reach_subscribers() {
        let (iface, _transport) = interface();
        let mut subscription = iface
            .subscribe_requests(UrlPattern::glob("**/geoserver/**").unwrap())
            .unwrap();
        let tap = iface.adapter().request_tap();
        tap.record(iface.page().into(), "https://maps.example.org/api/health", "GET");
        tap.record(iface.page().into(), "https://maps.example.org/geoserver/wms?x=1", "GET");

        let event = subscription.try_next().expect("matching request buffered");
        assert!(event.url.contains("geoserver"));
        assert!(subscription.try_next().is_none());
    }
}

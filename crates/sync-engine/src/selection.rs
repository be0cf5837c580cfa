//! Multi-item selection widgets confirmed through a caption such as "3 selected".

use std::fmt;
use std::time::Duration;

use mapsync_core_types::Locator;
use tracing::{debug, info};

use crate::disclosure::{ensure_open, Disclosure};
use crate::errors::SyncError;
use crate::metrics;
use crate::probe::StateProbe;
use crate::readback::parse_count;
use crate::session::Session;
use crate::wait::{poll_until, Polled};

/// Number of selected items as reported by the widget's caption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionCount(pub u64);

impl fmt::Display for SelectionCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} selected", self.0)
    }
}

/// "Unselect all" style control; disabled once nothing is selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearAll {
    pub control: Locator,
    pub disabled: StateProbe,
}

impl ClearAll {
    pub fn new(control: Locator) -> Self {
        Self {
            disabled: StateProbe::class_token(control.clone(), "Mui-disabled"),
            control,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionWidget {
    pub id: String,
    pub owner: Option<Disclosure>,
    pub clear_all: Option<ClearAll>,
    pub caption: Locator,
    pub items: Vec<Locator>,
}

impl SelectionWidget {
    pub fn new(id: impl Into<String>, caption: Locator) -> Self {
        Self {
            id: id.into(),
            owner: None,
            clear_all: None,
            caption,
            items: Vec::new(),
        }
    }

    pub fn within(mut self, owner: Disclosure) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_clear_all(mut self, clear_all: ClearAll) -> Self {
        self.clear_all = Some(clear_all);
        self
    }

    pub fn with_items(mut self, items: Vec<Locator>) -> Self {
        self.items = items;
        self
    }
}

async fn open_owner(session: &Session, widget: &SelectionWidget) -> Result<(), SyncError> {
    if let Some(owner) = &widget.owner {
        ensure_open(session, owner).await?;
    }
    Ok(())
}

/// Count shown by the caption, `None` when the caption is missing or has no number.
pub async fn read_selection(
    session: &Session,
    widget: &SelectionWidget,
) -> Result<Option<SelectionCount>, SyncError> {
    let text = session.handle().text_content(&widget.caption).await?;
    Ok(caption_count(text.as_deref()))
}

fn caption_count(text: Option<&str>) -> Option<SelectionCount> {
    text.and_then(parse_count)
        .and_then(|value| u64::try_from(value).ok())
        .map(SelectionCount)
}

/// Empty the selection. Succeeds only when the clear-all control reads disabled AND the
/// caption reports zero.
pub async fn clear_selection(
    session: &Session,
    widget: &SelectionWidget,
) -> Result<SelectionCount, SyncError> {
    metrics::observe("selection", clear_inner(session, widget).await)
}

async fn clear_inner(
    session: &Session,
    widget: &SelectionWidget,
) -> Result<SelectionCount, SyncError> {
    let clear_all = widget.clear_all.as_ref().ok_or_else(|| {
        SyncError::Misconfigured(format!("selection '{}' has no clear-all control", widget.id))
    })?;
    open_owner(session, widget).await?;

    let handle = session.handle();
    if clear_all.disabled.read(handle).await? {
        debug!(widget = %widget.id, "clear-all disabled, selection already empty");
    } else {
        handle.click(&clear_all.control).await?;
    }

    let policy = session.policy();
    let caption = &widget.caption;
    let probe = &clear_all.disabled;
    let polled = poll_until(
        policy.poll_interval(),
        Duration::from_millis(policy.selection_confirm_ms),
        || async move {
            let disabled = probe.read(handle).await?;
            let text = handle.text_content(caption).await?;
            Ok::<_, SyncError>((disabled, text))
        },
        |(disabled, text)| *disabled && caption_count(text.as_deref()) == Some(SelectionCount(0)),
    )
    .await?;
    match polled {
        Polled::Satisfied(_) => {
            info!(widget = %widget.id, "selection cleared");
            Ok(SelectionCount(0))
        }
        Polled::Expired((disabled, text)) => Err(SyncError::Selection {
            widget: widget.id.clone(),
            expected: 0,
            disabled,
            caption: text,
        }),
    }
}

/// Click item `index` once and wait for the caption to report `expected`.
pub async fn select_item(
    session: &Session,
    widget: &SelectionWidget,
    index: usize,
    expected: SelectionCount,
) -> Result<SelectionCount, SyncError> {
    metrics::observe("selection", select_inner(session, widget, index, expected).await)
}

async fn select_inner(
    session: &Session,
    widget: &SelectionWidget,
    index: usize,
    expected: SelectionCount,
) -> Result<SelectionCount, SyncError> {
    let item = widget.items.get(index).ok_or_else(|| {
        SyncError::Misconfigured(format!(
            "selection '{}' has {} items, no index {}",
            widget.id,
            widget.items.len(),
            index
        ))
    })?;
    open_owner(session, widget).await?;

    let handle = session.handle();
    handle.click(item).await?;

    let policy = session.policy();
    let caption = &widget.caption;
    let polled = poll_until(
        policy.poll_interval(),
        Duration::from_millis(policy.selection_confirm_ms),
        || async move { Ok::<_, SyncError>(handle.text_content(caption).await?) },
        |text| caption_count(text.as_deref()) == Some(expected),
    )
    .await?;
    match polled {
        Polled::Satisfied(_) => {
            info!(widget = %widget.id, index, count = expected.0, "item selected");
            Ok(expected)
        }
        Polled::Expired(text) => Err(SyncError::Selection {
            widget: widget.id.clone(),
            expected: expected.0,
            disabled: false,
            caption: text,
        }),
    }
}

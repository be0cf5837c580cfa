//! Shared identifiers and element descriptors used across the mapsync crates.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Error raised when a descriptor cannot be built from user input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("empty selector")]
    EmptySelector,
    #[error("empty text filter")]
    EmptyText,
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageId(pub String);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Element descriptor understood by every element query and action.
///
/// A locator is a CSS selector, optionally narrowed to elements whose text
/// contains `has_text` (innermost match wins) and to the `nth` match.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Locator {
    pub css: String,
    pub has_text: Option<String>,
    pub nth: Option<usize>,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            css: selector.into(),
            has_text: None,
            nth: None,
        }
    }

    /// Innermost visible-or-not element anywhere in the body whose text contains `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            css: "body *".to_string(),
            has_text: Some(text.into()),
            nth: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.has_text = Some(text.into());
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    /// Descendant of this locator's selector. Text and index filters are not carried over.
    pub fn descendant(&self, selector: &str) -> Self {
        Self::css(format!("{} {}", self.css, selector))
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.css.trim().is_empty() {
            return Err(DescriptorError::EmptySelector);
        }
        if matches!(&self.has_text, Some(text) if text.trim().is_empty()) {
            return Err(DescriptorError::EmptyText);
        }
        Ok(())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "css:{}", self.css)?;
        if let Some(text) = &self.has_text {
            write!(f, "[has-text='{}']", text)?;
        }
        if let Some(nth) = self.nth {
            write!(f, ":nth({})", nth)?;
        }
        Ok(())
    }
}

/// Viewport coordinate in CSS pixels.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Keys the controllers dispatch.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
}

impl Key {
    /// DOM `KeyboardEvent.key` value.
    pub fn dom_key(&self) -> &'static str {
        match self {
            Key::Escape => "Escape",
            Key::Enter => "Enter",
            Key::Tab => "Tab",
        }
    }

    /// Windows virtual key code expected by `Input.dispatchKeyEvent`.
    pub fn key_code(&self) -> u32 {
        match self {
            Key::Escape => 27,
            Key::Enter => 13,
            Key::Tab => 9,
        }
    }
}

//! Reading widget state from element attributes.

use mapsync_core_types::Locator;

use crate::errors::{PortError, ToggleState};
use crate::ports::ElementPort;

/// Whether `value`, split on whitespace, contains `token` exactly.
pub fn has_token(value: Option<&str>, token: &str) -> bool {
    value
        .map(|value| value.split_whitespace().any(|part| part == token))
        .unwrap_or(false)
}

/// Reads a boolean state as the presence of a token in an attribute, e.g. `Mui-checked` in
/// `class`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateProbe {
    pub target: Locator,
    pub attribute: String,
    pub token: String,
}

impl StateProbe {
    pub fn new(target: Locator, attribute: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            target,
            attribute: attribute.into(),
            token: token.into(),
        }
    }

    /// Token in the element's `class` attribute.
    pub fn class_token(target: Locator, token: impl Into<String>) -> Self {
        Self::new(target, "class", token)
    }

    pub async fn read<P: ElementPort + ?Sized>(&self, port: &P) -> Result<bool, PortError> {
        let value = port.attribute(&self.target, &self.attribute).await?;
        Ok(has_token(value.as_deref(), &self.token))
    }

    pub async fn read_state<P: ElementPort + ?Sized>(
        &self,
        port: &P,
    ) -> Result<ToggleState, PortError> {
        self.read(port).await.map(ToggleState::from_flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_match_is_whole_word() {
        let classes = Some("MuiButtonBase-root Mui-checked PrivateSwitchBase-root");
        assert!(has_token(classes, "Mui-checked"));
        assert!(!has_token(classes, "checked"));
        assert!(!has_token(Some("Mui-checkedish"), "Mui-checked"));
        assert!(!has_token(None, "Mui-checked"));
    }
}

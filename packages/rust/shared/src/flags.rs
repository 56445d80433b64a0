//! Capability flags.
//!
//! Each platform capability can be switched off through an environment
//! variable. Flags fail open: unset or unrecognised values mean "enabled".

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Values that switch a capability off (trimmed, case-insensitive).
const FALSEY_VALUES: &[&str] = &["false", "0", "no", "off"];

/// A platform capability that marketing content may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// AI chat companion.
    Chat,
    /// Therapist directory.
    Directory,
    /// Peer community / forum.
    Community,
}

impl Capability {
    /// Every known capability, in a fixed order.
    pub const ALL: [Capability; 3] = [Self::Chat, Self::Directory, Self::Community];

    /// Lowercase capability name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Directory => "directory",
            Self::Community => "community",
        }
    }

    /// Environment variable controlling this capability.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Chat => "FEATURE_CHAT_ENABLED",
            Self::Directory => "FEATURE_DIRECTORY_ENABLED",
            Self::Community => "FEATURE_COMMUNITY_ENABLED",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown capability '{s}'"))
    }
}

/// Deserialize an optional capability tag, reading unknown names as no tag.
///
/// Use with `#[serde(default, deserialize_with = "lenient_capability")]` so a
/// fragment tagged with a capability this build does not know stays visible.
pub fn lenient_capability<'de, D>(deserializer: D) -> std::result::Result<Option<Capability>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|name| match name.parse() {
        Ok(capability) => Some(capability),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unknown capability tag");
            None
        }
    }))
}

/// Parse a raw flag value. Only an explicit falsey string disables.
pub fn parse_flag_value(raw: &str) -> bool {
    let value = raw.trim();
    !FALSEY_VALUES.iter().any(|f| f.eq_ignore_ascii_case(value))
}

/// Capability name → enabled. Capabilities without an entry are enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureFlagSet {
    flags: BTreeMap<Capability, bool>,
}

impl FeatureFlagSet {
    /// A flag set with every capability enabled.
    pub fn all_enabled() -> Self {
        Self::default()
    }

    /// Read flags from the process environment. Call once at start-up and
    /// pass the result down explicitly.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build flags from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flags = Capability::ALL
            .into_iter()
            .map(|cap| {
                let enabled = lookup(cap.env_var())
                    .map(|raw| parse_flag_value(&raw))
                    .unwrap_or(true);
                (cap, enabled)
            })
            .collect();
        let set = Self { flags };
        tracing::debug!(disabled = ?set.disabled().collect::<Vec<_>>(), "capability flags resolved");
        set
    }

    /// Return a copy with `capability` set to `enabled`.
    pub fn with(mut self, capability: Capability, enabled: bool) -> Self {
        self.flags.insert(capability, enabled);
        self
    }

    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.flags.get(&capability).copied().unwrap_or(true)
    }

    /// Capabilities currently switched off.
    pub fn disabled(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(|c| !self.is_enabled(*c))
    }
}

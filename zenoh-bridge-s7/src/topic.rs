//! Topic layout.
//!
//! ```text
//! <base>/<device>/<attribute>          state
//! <base>/<device>/<attribute>/set      inbound writes
//! <base>/<device>/availability         online / offline
//! ```
//!
//! The base may itself contain `/`.

/// Builds and splits topics below a base prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicLayout {
    base: String,
}

/// Device and attribute named by a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicParts<'a> {
    pub device: &'a str,
    pub attribute: &'a str,
}

impl TopicLayout {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `<base>/<device>`.
    pub fn device_prefix(&self, device: &str) -> String {
        format!("{}/{}", self.base, device)
    }

    pub fn state_topic(&self, device: &str, attribute: &str) -> String {
        format!("{}/{}/{}", self.base, device, attribute)
    }

    pub fn set_topic(&self, device: &str, attribute: &str) -> String {
        format!("{}/{}/{}/set", self.base, device, attribute)
    }

    pub fn availability_topic(&self, device: &str) -> String {
        format!("{}/{}/availability", self.base, device)
    }

    /// Split a state topic into device and attribute.
    pub fn parse_state<'a>(&self, topic: &'a str) -> Option<TopicParts<'a>> {
        let rest = self.strip_base(topic)?;
        let (device, attribute) = rest.split_once('/')?;
        if device.is_empty() || attribute.is_empty() || attribute.contains('/') {
            return None;
        }
        Some(TopicParts { device, attribute })
    }

    /// Split a set topic into device and attribute.
    pub fn parse_set<'a>(&self, topic: &'a str) -> Option<TopicParts<'a>> {
        let state = topic.strip_suffix("/set")?;
        self.parse_state(state)
    }

    fn strip_base<'a>(&self, topic: &'a str) -> Option<&'a str> {
        if self.base.is_empty() {
            return Some(topic);
        }
        topic.strip_prefix(self.base.as_str())?.strip_prefix('/')
    }
}

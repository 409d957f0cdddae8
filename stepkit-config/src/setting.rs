//! Name-indexed, insertion-ordered settings collection.

use serde::{Deserialize, Serialize};

/// One configuration setting. Names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSetting {
    name: String,
    value: String,
}

impl ConfigSetting {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    fn matches(&self, name: &str) -> bool {
        names_equal(&self.name, name)
    }
}

/// Ordered settings for one handler instance.
///
/// `set` on an existing name (any case) replaces that entry in place and
/// adopts the new spelling of the name; it never appends a second entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    settings: Vec<ConfigSetting>,
}

impl HandlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value most recently set for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.settings
            .iter()
            .find(|setting| setting.matches(name))
            .map(ConfigSetting::value)
    }

    pub fn get_setting(&self, name: &str) -> Option<&ConfigSetting> {
        self.settings.iter().find(|setting| setting.matches(name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let setting = ConfigSetting::new(name, value);
        match self.settings.iter_mut().find(|existing| existing.matches(&setting.name)) {
            Some(existing) => *existing = setting,
            None => self.settings.push(setting),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Removes the setting named `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.settings.iter().position(|setting| setting.matches(name))?;
        Some(self.settings.remove(index).value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_setting(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigSetting> {
        self.settings.iter()
    }

    pub fn settings(&self) -> &[ConfigSetting] {
        &self.settings
    }

    /// Order-insensitive comparison of the (name, value) sets.
    pub fn same_settings(&self, other: &HandlerConfig) -> bool {
        self.len() == other.len()
            && self
                .settings
                .iter()
                .all(|setting| other.get(&setting.name) == Some(setting.value()))
    }
}

impl<'a> IntoIterator for &'a HandlerConfig {
    type Item = &'a ConfigSetting;
    type IntoIter = std::slice::Iter<'a, ConfigSetting>;

    fn into_iter(self) -> Self::IntoIter {
        self.settings.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HandlerConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = HandlerConfig::new();
        for (name, value) in iter {
            config.set(name, value);
        }
        config
    }
}

fn names_equal(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

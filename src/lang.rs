use std::collections::HashMap;

/// Localized UI and mail strings, keyed by label name.
///
/// Deserialized as part of [`crate::config::Settings`]; a missing key resolves
/// to the empty string rather than an error.
#[derive(Clone, Default, serde::Deserialize)]
pub struct Labels(HashMap<String, String>);

impl Labels {
    pub fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or_default()
    }
}

impl<const N: usize> From<[(String, String); N]> for Labels {
    fn from(entries: [(String, String); N]) -> Self {
        Self(HashMap::from(entries))
    }
}

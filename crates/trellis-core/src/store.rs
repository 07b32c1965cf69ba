use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request-scoped key/value bag. Lookup is exact-match with no coercion;
/// values are arbitrary JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    pub state: Map<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// Replaces the whole mapping.
    pub fn set(&mut self, state: Map<String, Value>) {
        self.state = state;
    }
}

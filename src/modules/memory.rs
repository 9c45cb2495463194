//! Host variable store (`memory_*`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::CompanionClient;

/// Lifetime of a host variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryScope {
    /// Cleared when the host restarts.
    #[default]
    Short,
    /// Persisted by the host.
    Long,
}

/// Memory commands and events.
#[derive(Debug, Clone, Copy)]
pub struct Memory<'a> {
    client: &'a CompanionClient,
}

impl<'a> Memory<'a> {
    pub(crate) fn new(client: &'a CompanionClient) -> Self {
        Self { client }
    }

    /// Ask the host for the value of `variable`. The answer arrives as
    /// `memory_update`.
    pub fn query(&self, variable: &str) -> bool {
        self.client
            .send("memory_query", json!({ "variable": variable }))
    }

    /// Set `variable` to `value`.
    pub fn set(&self, variable: &str, value: Value) -> bool {
        self.client
            .send("memory_set", json!({ "variable": variable, "value": value }))
    }

    /// Delete `variable` from `scope`.
    pub fn delete(&self, variable: &str, scope: MemoryScope) -> bool {
        self.client
            .send("memory_delete", json!({ "variable": variable, "scope": scope }))
    }

    listener_methods! {
        on_update => "memory_update";
        on_delete => "memory_delete";
    }
}

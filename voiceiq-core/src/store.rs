//! Durable client-side storage.
//!
//! Everything that survives a restart goes through [`KeyValueStore`], so
//! callers can plug in the on-disk store or the in-memory one for tests.
//! Every slot is a single global value with last-writer-wins semantics.

use crate::{assertion::IdentityAssertion, session::PrimarySession};
use anyhow::Result;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use std::{collections::HashMap, sync::Arc};
use validator::Validate;

/// Slot holding the serialized [`IdentityAssertion`]
pub const IDENTITY_SLOT: &str = "mauthNUserData";

/// Slot holding the serialized [`PrimarySession`]
pub const PRIMARY_SESSION_SLOT: &str = "session";

/// get/set/remove on named string slots
pub trait KeyValueStore: Send + Sync {
    /// Read a slot, `None` if it was never set or got removed
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Overwrite a slot
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Clear a slot. Removing a missing slot is fine.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// Store that lives as long as the process does
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slots: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.slots.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots.write().remove(key);
        Ok(())
    }
}

/// Persist an assertion, replacing whatever was there
pub fn save_assertion(store: &impl KeyValueStore, assertion: &IdentityAssertion) -> Result<()> {
    store.set(IDENTITY_SLOT, &serde_json::to_string(assertion)?)
}

/// Read the persisted assertion.
///
/// A slot that doesn't hold a valid assertion counts as not authenticated.
pub fn load_assertion(store: &impl KeyValueStore) -> Result<Option<IdentityAssertion>> {
    let assertion = load_slot::<IdentityAssertion>(store, IDENTITY_SLOT)?;
    Ok(assertion.filter(|assertion| match assertion.validate() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(%e, "Ignoring persisted identity assertion");
            false
        }
    }))
}

/// Read the primary session, if any
pub fn load_primary_session(store: &impl KeyValueStore) -> Result<Option<PrimarySession>> {
    load_slot(store, PRIMARY_SESSION_SLOT)
}

fn load_slot<T: DeserializeOwned>(store: &impl KeyValueStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, %e, "Slot doesn't hold valid data, ignoring it");
            Ok(None)
        }
    }
}

/// Serialize any value into a slot
pub fn save_slot<T: Serialize>(store: &impl KeyValueStore, key: &str, value: &T) -> Result<()> {
    store.set(key, &serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    fn ada() -> IdentityAssertion {
        IdentityAssertion {
            name: "Ada".to_string(),
            email: "ada@example.test".to_string(),
            claimant: "Country Code: GB".to_string(),
        }
    }

    #[test_log::test]
    fn test_memory_store_slots() -> TestResult {
        let store = MemoryStore::new();
        assert_eq!(store.get("a")?, None);

        store.set("a", "1")?;
        store.set("a", "2")?;
        assert_eq!(store.get("a")?.as_deref(), Some("2"));

        store.remove("a")?;
        store.remove("a")?;
        assert_eq!(store.get("a")?, None);

        Ok(())
    }

    #[test_log::test]
    fn test_assertion_roundtrip_keeps_claimant() -> TestResult {
        let store = MemoryStore::new();
        save_assertion(&store, &ada())?;

        assert_eq!(load_assertion(&store)?, Some(ada()));
        assert!(store
            .get(IDENTITY_SLOT)?
            .unwrap_or_default()
            .contains("Country Code: GB"));

        Ok(())
    }

    #[test_log::test]
    fn test_garbage_slot_is_absent() -> TestResult {
        let store = MemoryStore::new();

        store.set(IDENTITY_SLOT, "{not json")?;
        assert_eq!(load_assertion(&store)?, None);

        store.set(
            IDENTITY_SLOT,
            r#"{"name":"Ada","email":"no-at-sign","claimant":"x"}"#,
        )?;
        assert_eq!(load_assertion(&store)?, None);

        store.set(PRIMARY_SESSION_SLOT, "[]")?;
        assert_eq!(load_primary_session(&store)?, None);

        Ok(())
    }
}

/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Durable preference seam used to persist the client identifier.
//!
//! Stores hold named dictionary prefs of string values. Writes are always
//! single-key updates so several senders can share one dictionary.

use crate::error::PrefStoreError;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/// Dictionary pref holding one cached client id per sender id.
pub const INVALIDATION_CLIENT_ID_CACHE: &str = "invalidation-client-id-cache";

pub trait PrefStore: Send + Sync {
    /// Declares a dictionary pref. Registering twice is harmless.
    fn register_dictionary_pref(&self, pref: &str) -> Result<(), PrefStoreError>;

    /// `true` once the dictionary holds a written value.
    fn has_pref_path(&self, pref: &str) -> bool;

    fn get_dict_string(&self, pref: &str, key: &str) -> Option<String>;

    fn set_dict_string(&self, pref: &str, key: &str, value: &str) -> Result<(), PrefStoreError>;

    /// Removes one key and reports whether it was present.
    fn remove_dict_key(&self, pref: &str, key: &str) -> Result<bool, PrefStoreError>;
}

#[derive(Default)]
struct InMemoryPrefs {
    registered: HashSet<String>,
    dictionaries: HashMap<String, BTreeMap<String, String>>,
}

/// Process-local store, used by tests and by hosts without durable storage.
#[derive(Default)]
pub struct InMemoryPrefStore {
    prefs: Mutex<InMemoryPrefs>,
}

impl InMemoryPrefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one dictionary pref.
    pub fn dictionary(&self, pref: &str) -> BTreeMap<String, String> {
        self.prefs
            .lock()
            .map(|prefs| prefs.dictionaries.get(pref).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn with_registered<T>(
        &self,
        pref: &str,
        update: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> Result<T, PrefStoreError> {
        let mut prefs = self
            .prefs
            .lock()
            .map_err(|_| PrefStoreError::Serialization("pref store lock poisoned".to_string()))?;
        if !prefs.registered.contains(pref) {
            return Err(PrefStoreError::UnregisteredPref(pref.to_string()));
        }
        let dictionary = prefs.dictionaries.entry(pref.to_string()).or_default();
        Ok(update(dictionary))
    }
}

impl PrefStore for InMemoryPrefStore {
    fn register_dictionary_pref(&self, pref: &str) -> Result<(), PrefStoreError> {
        let mut prefs = self
            .prefs
            .lock()
            .map_err(|_| PrefStoreError::Serialization("pref store lock poisoned".to_string()))?;
        prefs.registered.insert(pref.to_string());
        Ok(())
    }

    fn has_pref_path(&self, pref: &str) -> bool {
        self.prefs
            .lock()
            .map(|prefs| prefs.dictionaries.contains_key(pref))
            .unwrap_or(false)
    }

    fn get_dict_string(&self, pref: &str, key: &str) -> Option<String> {
        let prefs = self.prefs.lock().ok()?;
        prefs.dictionaries.get(pref)?.get(key).cloned()
    }

    fn set_dict_string(&self, pref: &str, key: &str, value: &str) -> Result<(), PrefStoreError> {
        self.with_registered(pref, |dictionary| {
            dictionary.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_dict_key(&self, pref: &str, key: &str) -> Result<bool, PrefStoreError> {
        self.with_registered(pref, |dictionary| dictionary.remove(key).is_some())
    }
}

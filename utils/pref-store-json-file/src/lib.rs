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

//! Durable [`PrefStore`] keeping every dictionary pref in one JSON document.
//!
//! The document is a JSON object mapping pref names to objects of string
//! values. Every write rewrites the file through a sibling temp file and a
//! rename, so a crash leaves either the old or the new document.

use invalidation_service::{PrefStore, PrefStoreError};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

struct JsonPrefs {
    registered: HashSet<String>,
    document: Map<String, Value>,
}

pub struct PrefStoreJsonFile {
    path: PathBuf,
    prefs: Mutex<JsonPrefs>,
}

impl PrefStoreJsonFile {
    /// Opens `path`, starting from an empty document if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PrefStoreError> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            Self::read_document(&path)?
        } else {
            debug!("pref file {path:?} does not exist yet, starting empty");
            Map::new()
        };

        Ok(Self {
            path,
            prefs: Mutex::new(JsonPrefs {
                registered: HashSet::new(),
                document,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(path: &Path) -> Result<Map<String, Value>, PrefStoreError> {
        let data = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&data)
            .map_err(|error| PrefStoreError::Serialization(format!("{error:?}")))?;

        match value {
            Value::Object(document) => Ok(document),
            _ => Err(PrefStoreError::Serialization(
                "Pref file must be a JSON object mapping pref names to dictionaries".to_string(),
            )),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), PrefStoreError> {
        let serialized = serde_json::to_string_pretty(document)
            .map_err(|error| PrefStoreError::Serialization(format!("{error:?}")))?;

        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, serialized)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, JsonPrefs>, PrefStoreError> {
        self.prefs
            .lock()
            .map_err(|_| PrefStoreError::Serialization("pref store lock poisoned".to_string()))
    }

    /// Applies `update` to a copy of the document and adopts the copy only
    /// once it is on disk.
    fn update_dictionary<T>(
        &self,
        pref: &str,
        update: impl FnOnce(&mut Map<String, Value>) -> T,
    ) -> Result<T, PrefStoreError> {
        let mut prefs = self.lock()?;
        if !prefs.registered.contains(pref) {
            return Err(PrefStoreError::UnregisteredPref(pref.to_string()));
        }

        let mut document = prefs.document.clone();
        let entry = document
            .entry(pref.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            warn!("pref '{pref}' held a non-dictionary value, replacing it");
            *entry = Value::Object(Map::new());
        }
        let dictionary = entry.as_object_mut().ok_or_else(|| {
            PrefStoreError::Serialization(format!("pref '{pref}' is not a dictionary"))
        })?;

        let result = update(dictionary);
        self.write_document(&document)?;
        prefs.document = document;
        Ok(result)
    }
}

impl PrefStore for PrefStoreJsonFile {
    fn register_dictionary_pref(&self, pref: &str) -> Result<(), PrefStoreError> {
        self.lock()?.registered.insert(pref.to_string());
        Ok(())
    }

    fn has_pref_path(&self, pref: &str) -> bool {
        self.lock()
            .map(|prefs| prefs.document.contains_key(pref))
            .unwrap_or(false)
    }

    fn get_dict_string(&self, pref: &str, key: &str) -> Option<String> {
        let prefs = self.lock().ok()?;
        prefs
            .document
            .get(pref)?
            .get(key)?
            .as_str()
            .map(str::to_string)
    }

    fn set_dict_string(&self, pref: &str, key: &str, value: &str) -> Result<(), PrefStoreError> {
        self.update_dictionary(pref, |dictionary| {
            dictionary.insert(key.to_string(), Value::String(value.to_string()));
        })
    }

    fn remove_dict_key(&self, pref: &str, key: &str) -> Result<bool, PrefStoreError> {
        self.update_dictionary(pref, |dictionary| dictionary.remove(key).is_some())
    }
}

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

//! Service configuration, loadable from JSON5.

use crate::error::InvalidationError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Prefix of the identity-provider application name.
pub const DEFAULT_APPLICATION_NAME_PREFIX: &str = "com.google.chrome.fcm.invalidations";

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ServiceConfig {
    pub sender_id: String,
    #[serde(default = "default_application_name_prefix")]
    pub application_name_prefix: String,
}

fn default_application_name_prefix() -> String {
    DEFAULT_APPLICATION_NAME_PREFIX.to_string()
}

impl ServiceConfig {
    pub fn new(sender_id: &str) -> Result<Self, InvalidationError> {
        let config = Self {
            sender_id: sender_id.to_string(),
            application_name_prefix: default_application_name_prefix(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json5_str(contents: &str) -> Result<Self, InvalidationError> {
        let config: Self = json5::from_str(contents)
            .map_err(|err| InvalidationError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json5_file(path: impl AsRef<Path>) -> Result<Self, InvalidationError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            InvalidationError::InvalidConfig(format!("unable to read {}: {err}", path.display()))
        })?;
        Self::from_json5_str(&contents)
    }

    pub fn validate(&self) -> Result<(), InvalidationError> {
        if self.sender_id.is_empty() {
            return Err(InvalidationError::EmptySenderId);
        }
        if self.application_name_prefix.is_empty() {
            return Err(InvalidationError::InvalidConfig(
                "application_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Name under which the client id is requested: `<prefix>-<sender_id>`.
    pub fn application_name(&self) -> String {
        format!("{}-{}", self.application_name_prefix, self.sender_id)
    }
}

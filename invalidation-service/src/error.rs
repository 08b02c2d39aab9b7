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

//! Error types surfaced by the invalidation service and its persistence seam.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("sender id must not be empty")]
    EmptySenderId,
    #[error("topic name must not be empty")]
    EmptyTopic,
    #[error("owner '{0}' is already registered with a different handler")]
    AlreadyRegistered(String),
    #[error("invalidation service is already started")]
    AlreadyStarted,
    #[error("invalidation service is not started")]
    NotStarted,
    #[error("listener has already been started once")]
    ListenerAlreadyUsed,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum PrefStoreError {
    #[error("pref '{0}' is not registered")]
    UnregisteredPref(String),
    #[error("unable to access pref storage: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to (de)serialize pref storage: {0}")]
    Serialization(String),
}

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

//! Point-in-time diagnostics of a running service.

use crate::topic::InvalidatorState;
use crate::transport::DeleteIdResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Timeline of client-id requests, owned by the identity manager.
#[derive(Clone, Debug, Default, Serialize)]
pub struct InstanceIdDiagnostics {
    pub instance_id_requested: Option<DateTime<Utc>>,
    pub instance_id_received: Option<DateTime<Utc>>,
    pub instance_id_cleared: Option<DateTime<Utc>>,
    pub last_delete_result: Option<DeleteIdResult>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct DiagnosticInfo {
    pub sender_id: String,
    pub is_started: bool,
    pub invalidator_state: InvalidatorState,
    pub registered_handlers: usize,
    pub service_was_started: Option<DateTime<Utc>>,
    pub service_was_stopped: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub instance_id: InstanceIdDiagnostics,
}

impl DiagnosticInfo {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"_ser": "error"}))
    }
}

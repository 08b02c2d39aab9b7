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

//! Structured logging vocabulary shared by every layer of the crate.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the embedding process (or to tests).

pub mod events {
    pub const HANDLER_REGISTERED: &str = "handler_registered";
    pub const HANDLER_REGISTER_REJECTED: &str = "handler_register_rejected";
    pub const HANDLER_UNREGISTERED: &str = "handler_unregistered";
    pub const TOPICS_UPDATED: &str = "topics_updated";
    pub const TOPICS_UPDATE_UNKNOWN_HANDLER: &str = "topics_update_unknown_handler";
    pub const STATE_CHANGED: &str = "invalidator_state_changed";
    pub const STATE_RESET: &str = "invalidator_state_reset";
    pub const INVALIDATION_DISPATCHED: &str = "invalidation_dispatched";
    pub const INVALIDATION_DROPPED_NO_HANDLER: &str = "invalidation_dropped_no_handler";

    pub const CLIENT_ID_REQUESTED: &str = "client_id_requested";
    pub const CLIENT_ID_RECEIVED: &str = "client_id_received";
    pub const CLIENT_ID_STALE_REPLY_DROPPED: &str = "client_id_stale_reply_dropped";
    pub const CLIENT_ID_RESET: &str = "client_id_reset";
    pub const CLIENT_ID_DELETE_COMPLETED: &str = "client_id_delete_completed";
    pub const PREF_WRITE_FAILED: &str = "pref_write_failed";

    pub const LISTENER_STARTED: &str = "listener_started";
    pub const LISTENER_STOPPED: &str = "listener_stopped";
    pub const LISTENER_TOPICS_FORWARDED: &str = "listener_topics_forwarded";
    pub const LISTENER_TOKEN_RECEIVED: &str = "listener_token_received";
    pub const LISTENER_TOKEN_CLEARED: &str = "listener_token_cleared";
    pub const LISTENER_CALL_IGNORED: &str = "listener_call_ignored";

    pub const SERVICE_STARTED: &str = "service_started";
    pub const SERVICE_STOPPED: &str = "service_stopped";
    pub const SERVICE_START_IGNORED: &str = "service_start_ignored";
    pub const SERVICE_EVENT_DISCARDED: &str = "service_event_discarded";
}

pub mod fields {
    use crate::topic::TopicSet;

    /// Comma separated topic names, for log fields.
    pub fn format_topics(topics: &TopicSet) -> String {
        topics
            .iter()
            .map(|topic| topic.name())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Never log a full client id; the prefix is enough to correlate.
    pub fn redact_client_id(client_id: &str) -> String {
        if client_id.is_empty() {
            return "<empty>".to_string();
        }
        let prefix: String = client_id.chars().take(4).collect();
        format!("{prefix}…")
    }
}

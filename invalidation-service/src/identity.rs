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

//! Persisted client identifier: acquire, cache and revoke.

use crate::diagnostics::InstanceIdDiagnostics;
use crate::observability::{events, fields};
use crate::prefs::{PrefStore, INVALIDATION_CLIENT_ID_CACHE};
use crate::transport::{DeleteIdResult, InstanceIdProvider, RequestId, ServiceEvent};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

const COMPONENT: &str = "identity";

/// Owns the in-memory client id and its entry in the client-id cache pref.
///
/// Provider calls run as spawned tasks and report back through the service
/// mailbox, so every method returns without waiting on the network. This
/// requires a running tokio runtime.
pub struct ClientIdentityManager {
    sender_id: String,
    application_name: String,
    client_id: String,
    provider: Arc<dyn InstanceIdProvider>,
    pref_store: Arc<dyn PrefStore>,
    mailbox: UnboundedSender<ServiceEvent>,
    outstanding_requests: HashSet<RequestId>,
    diagnostics: InstanceIdDiagnostics,
}

impl ClientIdentityManager {
    pub(crate) fn new(
        sender_id: &str,
        application_name: &str,
        provider: Arc<dyn InstanceIdProvider>,
        pref_store: Arc<dyn PrefStore>,
        mailbox: UnboundedSender<ServiceEvent>,
    ) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            application_name: application_name.to_string(),
            client_id: String::new(),
            provider,
            pref_store,
            mailbox,
            outstanding_requests: HashSet::new(),
            diagnostics: InstanceIdDiagnostics::default(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn diagnostics(&self) -> &InstanceIdDiagnostics {
        &self.diagnostics
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.outstanding_requests.is_empty()
    }

    /// Loads the cached id for this sender, then asks the provider for a fresh
    /// or validated one. The reply lands in [`Self::on_instance_id_received`].
    pub fn populate_client_id(&mut self) -> RequestId {
        self.diagnostics.instance_id_requested = Some(Utc::now());

        self.client_id = self
            .pref_store
            .get_dict_string(INVALIDATION_CLIENT_ID_CACHE, &self.sender_id)
            .unwrap_or_default();

        let request = RequestId::new();
        self.outstanding_requests.insert(request);
        debug!(
            event = events::CLIENT_ID_REQUESTED,
            component = COMPONENT,
            sender_id = self.sender_id.as_str(),
            request_id = %request,
            cached = %fields::redact_client_id(&self.client_id),
            "requesting client id"
        );

        let provider = self.provider.clone();
        let application_name = self.application_name.clone();
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let instance_id = provider.get_id(&application_name).await;
            // The service may have been dropped meanwhile; nothing to deliver to.
            let _ = mailbox.send(ServiceEvent::InstanceIdReceived {
                request,
                instance_id,
            });
        });
        request
    }

    /// Applies a provider reply. Last write wins between replies, but replies
    /// to requests issued before the latest reset are discarded.
    ///
    /// Returns `true` if the reply was applied.
    pub fn on_instance_id_received(&mut self, request: RequestId, instance_id: &str) -> bool {
        if !self.outstanding_requests.remove(&request) {
            debug!(
                event = events::CLIENT_ID_STALE_REPLY_DROPPED,
                component = COMPONENT,
                sender_id = self.sender_id.as_str(),
                request_id = %request,
                "dropping reply to a request superseded by a reset"
            );
            return false;
        }

        self.diagnostics.instance_id_received = Some(Utc::now());
        if self.client_id == instance_id {
            return true;
        }

        info!(
            event = events::CLIENT_ID_RECEIVED,
            component = COMPONENT,
            sender_id = self.sender_id.as_str(),
            request_id = %request,
            client_id = %fields::redact_client_id(instance_id),
            "client id changed"
        );
        self.client_id = instance_id.to_string();
        if let Err(err) = self.pref_store.set_dict_string(
            INVALIDATION_CLIENT_ID_CACHE,
            &self.sender_id,
            instance_id,
        ) {
            warn!(
                event = events::PREF_WRITE_FAILED,
                component = COMPONENT,
                sender_id = self.sender_id.as_str(),
                err = %err,
                "unable to persist client id"
            );
        }
        true
    }

    /// Forgets the client id locally, then asks the provider to revoke it.
    ///
    /// Local state is cleared before the delete request goes out and does not
    /// wait for its outcome. Pending get requests are abandoned.
    pub fn reset_client_id(&mut self) -> RequestId {
        self.outstanding_requests.clear();
        self.client_id.clear();
        if let Err(err) = self
            .pref_store
            .remove_dict_key(INVALIDATION_CLIENT_ID_CACHE, &self.sender_id)
        {
            warn!(
                event = events::PREF_WRITE_FAILED,
                component = COMPONENT,
                sender_id = self.sender_id.as_str(),
                err = %err,
                "unable to remove cached client id"
            );
        }

        let request = RequestId::new();
        info!(
            event = events::CLIENT_ID_RESET,
            component = COMPONENT,
            sender_id = self.sender_id.as_str(),
            request_id = %request,
            "client id cleared, requesting deletion"
        );

        let provider = self.provider.clone();
        let application_name = self.application_name.clone();
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = provider.delete_id(&application_name).await;
            let _ = mailbox.send(ServiceEvent::DeleteInstanceIdCompleted { request, result });
        });
        request
    }

    /// Records the outcome of a deletion. Local state was already cleared, so
    /// a failure is only logged.
    pub fn on_delete_instance_id_completed(&mut self, request: RequestId, result: DeleteIdResult) {
        self.diagnostics.instance_id_cleared = Some(Utc::now());
        self.diagnostics.last_delete_result = Some(result);
        if result == DeleteIdResult::Success {
            debug!(
                event = events::CLIENT_ID_DELETE_COMPLETED,
                component = COMPONENT,
                sender_id = self.sender_id.as_str(),
                request_id = %request,
                "client id deleted"
            );
        } else {
            warn!(
                event = events::CLIENT_ID_DELETE_COMPLETED,
                component = COMPONENT,
                sender_id = self.sender_id.as_str(),
                request_id = %request,
                result = ?result,
                "client id deletion failed"
            );
        }
    }
}

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

//! Public facade tying the registrar, the identity manager and the listener
//! together.

use crate::config::ServiceConfig;
use crate::diagnostics::DiagnosticInfo;
use crate::error::{InvalidationError, PrefStoreError};
use crate::handler::InvalidationHandler;
use crate::identity::ClientIdentityManager;
use crate::listener::{InvalidationListener, ListenerDelegate, ListenerLifecycle};
use crate::observability::events;
use crate::prefs::{PrefStore, INVALIDATION_CLIENT_ID_CACHE};
use crate::registrar::InvalidatorRegistrar;
use crate::sequence::{dcheck_called_on_valid_sequence, SequenceChecker};
use crate::topic::{Invalidation, InvalidatorState, Topic, TopicSet};
use crate::transport::{
    InstanceIdProvider, ListenerSessionId, NetworkChannelFactory, ServiceEvent,
    SubscriptionManager, SubscriptionManagerFactory, TransportEventSink,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

const COMPONENT: &str = "service";

/// Sender id whose cached client id is no longer used and gets cleaned up.
pub const DEPRECATED_SENDER_ID: &str = "8181035976";

/// Collaborators injected at construction.
pub struct ServiceDependencies {
    pub network_channel_factory: NetworkChannelFactory,
    pub subscription_manager_factory: SubscriptionManagerFactory,
    pub instance_id_provider: Arc<dyn InstanceIdProvider>,
    pub pref_store: Arc<dyn PrefStore>,
}

/// Client-side invalidation delivery service for one sender id.
///
/// All methods must be called from the thread that constructed the service.
/// Asynchronous completions are queued on an internal mailbox and applied by
/// [`Self::process_pending_events`] or [`Self::handle_next_event`].
///
/// The service is started exactly while it owns a listener.
pub struct InvalidationService {
    config: ServiceConfig,
    registrar: InvalidatorRegistrar,
    identity: ClientIdentityManager,
    listener: Option<InvalidationListener>,
    network_channel_factory: NetworkChannelFactory,
    subscription_manager_factory: SubscriptionManagerFactory,
    mailbox_tx: UnboundedSender<ServiceEvent>,
    mailbox_rx: UnboundedReceiver<ServiceEvent>,
    update_was_requested: bool,
    service_was_started: Option<DateTime<Utc>>,
    service_was_stopped: Option<DateTime<Utc>>,
    sequence_checker: SequenceChecker,
}

struct RegistrarDelegate<'a> {
    registrar: &'a mut InvalidatorRegistrar,
}

impl ListenerDelegate for RegistrarDelegate<'_> {
    fn on_invalidate(&mut self, invalidation: &Invalidation) {
        self.registrar.dispatch_invalidation_to_handlers(invalidation);
    }

    fn on_invalidator_state_change(&mut self, state: InvalidatorState) {
        self.registrar.update_invalidator_state(state);
    }
}

impl InvalidationService {
    pub fn new(
        config: ServiceConfig,
        dependencies: ServiceDependencies,
    ) -> Result<Self, InvalidationError> {
        config.validate()?;

        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let identity = ClientIdentityManager::new(
            &config.sender_id,
            &config.application_name(),
            dependencies.instance_id_provider,
            dependencies.pref_store,
            mailbox_tx.clone(),
        );

        debug!(
            component = COMPONENT,
            sender_id = config.sender_id.as_str(),
            "invalidation service created"
        );

        Ok(Self {
            config,
            registrar: InvalidatorRegistrar::new(),
            identity,
            listener: None,
            network_channel_factory: dependencies.network_channel_factory,
            subscription_manager_factory: dependencies.subscription_manager_factory,
            mailbox_tx,
            mailbox_rx,
            update_was_requested: false,
            service_was_started: None,
            service_was_stopped: None,
            sequence_checker: SequenceChecker::new(),
        })
    }

    /// Declares the prefs this service persists into.
    pub fn register_prefs(store: &dyn PrefStore) -> Result<(), PrefStoreError> {
        store.register_dictionary_pref(INVALIDATION_CLIENT_ID_CACHE)
    }

    /// Drops the cached client id of the retired sender, leaving other senders
    /// untouched.
    pub fn clear_deprecated_prefs(store: &dyn PrefStore) -> Result<(), PrefStoreError> {
        if !store.has_pref_path(INVALIDATION_CLIENT_ID_CACHE) {
            return Ok(());
        }
        store
            .remove_dict_key(INVALIDATION_CLIENT_ID_CACHE, DEPRECATED_SENDER_ID)
            .map(|_| ())
    }

    pub fn sender_id(&self) -> &str {
        &self.config.sender_id
    }

    pub fn application_name(&self) -> String {
        self.config.application_name()
    }

    pub fn register_invalidation_handler(
        &mut self,
        handler: Arc<dyn InvalidationHandler>,
    ) -> Result<(), InvalidationError> {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        self.registrar.register_handler(handler)
    }

    /// Replaces the handler's interest with `topic_names`; each name is
    /// classified public or private by the handler itself.
    ///
    /// Returns `false` if the handler is not registered. When stopped, the
    /// subscription update is deferred to the next start.
    pub fn update_interested_topics<I, S>(
        &mut self,
        handler: &Arc<dyn InvalidationHandler>,
        topic_names: I,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        let mut topics = TopicSet::new();
        for name in topic_names {
            let name = name.into();
            let is_public = handler.is_public_topic(&name);
            match Topic::new(name, is_public) {
                Ok(topic) => {
                    topics.insert(topic);
                }
                Err(err) => {
                    warn!(
                        component = COMPONENT,
                        handler = handler.owner_name().as_str(),
                        err = %err,
                        "skipping invalid topic"
                    );
                }
            }
        }

        if !self.registrar.update_registered_topics(handler, topics) {
            return false;
        }
        self.update_was_requested = true;
        self.do_update_subscribed_topics_if_needed();
        true
    }

    /// Registers `handler` and declares its interest in one step.
    pub fn add_handler_and_topics<I, S>(
        &mut self,
        handler: Arc<dyn InvalidationHandler>,
        topic_names: I,
    ) -> Result<bool, InvalidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register_invalidation_handler(handler.clone())?;
        Ok(self.update_interested_topics(&handler, topic_names))
    }

    pub fn unregister_invalidation_handler(&mut self, handler: &Arc<dyn InvalidationHandler>) {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        self.registrar.unregister_handler(handler);
    }

    /// Unregisters `handler` and withdraws its topics from the subscription.
    pub fn remove_handler(&mut self, handler: &Arc<dyn InvalidationHandler>) {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        if !self.registrar.is_registered(handler) {
            return;
        }
        self.registrar.unregister_handler(handler);
        self.update_was_requested = true;
        self.do_update_subscribed_topics_if_needed();
    }

    pub fn is_started(&self) -> bool {
        self.listener.is_some()
    }

    /// Current overall state; always `Stopped` while no listener exists.
    pub fn invalidator_state(&self) -> InvalidatorState {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        if self.listener.is_some() {
            return self.registrar.invalidator_state();
        }
        InvalidatorState::Stopped
    }

    pub fn client_id(&self) -> &str {
        self.identity.client_id()
    }

    pub fn registered_handler_count(&self) -> usize {
        self.registrar.handler_count()
    }

    /// Union of every handler's interest.
    pub fn subscribed_topics(&self) -> TopicSet {
        self.registrar.get_all_subscribed_topics()
    }

    pub fn diagnostic_info(&self) -> DiagnosticInfo {
        DiagnosticInfo {
            sender_id: self.config.sender_id.clone(),
            is_started: self.is_started(),
            invalidator_state: self.invalidator_state(),
            registered_handlers: self.registrar.handler_count(),
            service_was_started: self.service_was_started,
            service_was_stopped: self.service_was_stopped,
            instance_id: self.identity.diagnostics().clone(),
        }
    }

    /// Creates and starts a listener, then acquires the client id and flushes
    /// any topic update requested while stopped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since the client id request
    /// is spawned onto it.
    pub fn start(&mut self) -> Result<(), InvalidationError> {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        if self.is_started() {
            warn!(
                event = events::SERVICE_START_IGNORED,
                component = COMPONENT,
                sender_id = self.config.sender_id.as_str(),
                "start() while already started"
            );
            return Err(InvalidationError::AlreadyStarted);
        }

        let application_name = self.config.application_name();
        let network_channel =
            (self.network_channel_factory)(&self.config.sender_id, &application_name);
        let subscription_manager = (self.subscription_manager_factory)(&self.config.sender_id);
        self.start_listener(InvalidationListener::new(network_channel), subscription_manager)
    }

    /// Same as [`Self::start`] but with a listener built by the caller.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start_with_listener(
        &mut self,
        listener: InvalidationListener,
        subscription_manager: Box<dyn SubscriptionManager>,
    ) -> Result<(), InvalidationError> {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        if self.is_started() {
            return Err(InvalidationError::AlreadyStarted);
        }
        self.start_listener(listener, subscription_manager)
    }

    fn start_listener(
        &mut self,
        mut listener: InvalidationListener,
        subscription_manager: Box<dyn SubscriptionManager>,
    ) -> Result<(), InvalidationError> {
        if listener.lifecycle() != ListenerLifecycle::NotStarted {
            warn!(
                event = events::SERVICE_START_IGNORED,
                component = COMPONENT,
                sender_id = self.config.sender_id.as_str(),
                lifecycle = %listener.lifecycle(),
                "listener was started before"
            );
            return Err(InvalidationError::ListenerAlreadyUsed);
        }

        // The listener must be receiving before the client id is requested:
        // some transports only mint a valid id once a receiver exists, and
        // cached messages may be waiting at startup.
        let session = ListenerSessionId::new();
        let sink = TransportEventSink::new(session, self.mailbox_tx.clone());
        listener.start(sink, subscription_manager);
        self.listener = Some(listener);
        self.service_was_started = Some(Utc::now());

        info!(
            event = events::SERVICE_STARTED,
            component = COMPONENT,
            sender_id = self.config.sender_id.as_str(),
            session = %session,
            "invalidation service started"
        );

        self.identity.populate_client_id();
        self.do_update_subscribed_topics_if_needed();
        Ok(())
    }

    /// Tears down the listener. Handlers keep their registrations.
    pub fn stop(&mut self) -> Result<(), InvalidationError> {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        let Some(listener) = self.listener.take() else {
            return Err(InvalidationError::NotStarted);
        };
        self.service_was_stopped = Some(Utc::now());
        drop(listener);
        // The next listener reports its own state.
        self.registrar.reset_invalidator_state();
        info!(
            event = events::SERVICE_STOPPED,
            component = COMPONENT,
            sender_id = self.config.sender_id.as_str(),
            "invalidation service stopped"
        );
        Ok(())
    }

    /// Revokes the client id and then stops, so the listener still sees the
    /// token being cleared. A client id request still in flight is revoked as
    /// well, so its reply cannot repopulate the cache afterwards.
    ///
    /// # Panics
    ///
    /// Panics if a revocation is needed outside a tokio runtime.
    pub fn stop_permanently(&mut self) -> Result<(), InvalidationError> {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        if !self.is_started() {
            return Err(InvalidationError::NotStarted);
        }
        if !self.identity.client_id().is_empty() || self.identity.has_pending_requests() {
            self.reset_client_id();
        }
        self.stop()
    }

    /// Clears the client id locally and in prefs, requests its deletion, and
    /// drops the listener's cached token.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since the deletion is
    /// spawned onto it.
    pub fn reset_client_id(&mut self) {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        self.identity.reset_client_id();
        if let Some(listener) = self.listener.as_mut() {
            listener.clear_instance_id_token();
        }
    }

    /// Delivers an invalidation to the handlers interested in its topic.
    pub fn on_invalidate(&mut self, invalidation: &Invalidation) {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        self.registrar.dispatch_invalidation_to_handlers(invalidation);
    }

    pub fn on_invalidator_state_change(&mut self, state: InvalidatorState) {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        self.registrar.update_invalidator_state(state);
    }

    /// Applies every queued completion without waiting. Returns how many were
    /// applied.
    pub fn process_pending_events(&mut self) -> usize {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        let mut applied = 0;
        loop {
            match self.mailbox_rx.try_recv() {
                Ok(event) => {
                    self.apply_event(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return applied,
            }
        }
    }

    /// Waits for the next completion and applies it.
    pub async fn handle_next_event(&mut self) -> bool {
        dcheck_called_on_valid_sequence!(self.sequence_checker);
        match self.mailbox_rx.recv().await {
            Some(event) => {
                self.apply_event(event);
                true
            }
            None => false,
        }
    }

    /// Unbinds the owner thread; the next call rebinds it.
    pub fn detach_from_sequence(&self) {
        self.sequence_checker.detach();
    }

    fn apply_event(&mut self, event: ServiceEvent) {
        match event {
            ServiceEvent::Transport { session, event } => {
                let Some(listener) = self
                    .listener
                    .as_mut()
                    .filter(|listener| listener.session() == Some(session))
                else {
                    debug!(
                        event = events::SERVICE_EVENT_DISCARDED,
                        component = COMPONENT,
                        session = %session,
                        "transport event from a listener that is gone"
                    );
                    return;
                };
                let mut delegate = RegistrarDelegate {
                    registrar: &mut self.registrar,
                };
                listener.handle_transport_event(event, &mut delegate);
            }
            ServiceEvent::InstanceIdReceived {
                request,
                instance_id,
            } => {
                self.identity.on_instance_id_received(request, &instance_id);
            }
            ServiceEvent::DeleteInstanceIdCompleted { request, result } => {
                self.identity.on_delete_instance_id_completed(request, result);
            }
        }
    }

    fn do_update_subscribed_topics_if_needed(&mut self) {
        let Some(listener) = self.listener.as_mut() else {
            return;
        };
        if !self.update_was_requested {
            return;
        }
        listener.update_interested_topics(self.registrar.get_all_subscribed_topics());
        self.update_was_requested = false;
    }
}

impl Drop for InvalidationService {
    fn drop(&mut self) {
        self.registrar
            .update_invalidator_state(InvalidatorState::ShuttingDown);
        if let Some(listener) = self.listener.take() {
            self.service_was_stopped = Some(Utc::now());
            drop(listener);
        }
    }
}

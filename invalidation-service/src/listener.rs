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

//! Lifecycle of the live transport connection.
//!
//! A listener is single-use: `NotStarted -> Started -> Stopped`. Restarting the
//! service builds a fresh one.

use crate::observability::{events, fields};
use crate::topic::{Invalidation, InvalidatorState, TopicSet};
use crate::transport::{
    ListenerSessionId, NetworkChannel, SubscriptionManager, TransportEvent, TransportEventSink,
    TransportState,
};
use std::fmt::{Display, Formatter};
use tracing::{debug, info, warn};

const COMPONENT: &str = "listener";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerLifecycle {
    NotStarted,
    Started,
    Stopped,
}

impl Display for ListenerLifecycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerLifecycle::NotStarted => f.write_str("NOT_STARTED"),
            ListenerLifecycle::Started => f.write_str("STARTED"),
            ListenerLifecycle::Stopped => f.write_str("STOPPED"),
        }
    }
}

/// Receiver of what the listener learns from the transport.
pub trait ListenerDelegate {
    fn on_invalidate(&mut self, invalidation: &Invalidation);
    fn on_invalidator_state_change(&mut self, state: InvalidatorState);
}

pub struct InvalidationListener {
    lifecycle: ListenerLifecycle,
    session: Option<ListenerSessionId>,
    network_channel: Box<dyn NetworkChannel>,
    subscription_manager: Option<Box<dyn SubscriptionManager>>,
    instance_id_token: Option<String>,
    interested_topics: TopicSet,
    transport_state: TransportState,
    reported_state: Option<InvalidatorState>,
}

impl InvalidationListener {
    pub fn new(network_channel: Box<dyn NetworkChannel>) -> Self {
        Self {
            lifecycle: ListenerLifecycle::NotStarted,
            session: None,
            network_channel,
            subscription_manager: None,
            instance_id_token: None,
            interested_topics: TopicSet::new(),
            transport_state: TransportState::NotConnected,
            reported_state: None,
        }
    }

    pub fn lifecycle(&self) -> ListenerLifecycle {
        self.lifecycle
    }

    pub fn session(&self) -> Option<ListenerSessionId> {
        self.session
    }

    pub fn instance_id_token(&self) -> Option<&str> {
        self.instance_id_token.as_deref()
    }

    pub fn interested_topics(&self) -> &TopicSet {
        &self.interested_topics
    }

    /// Wires the transport receive path and takes the subscription manager.
    ///
    /// Must run before the client id is requested: some transports only mint a
    /// valid id once a receiver for the application exists.
    pub fn start(
        &mut self,
        sink: TransportEventSink,
        subscription_manager: Box<dyn SubscriptionManager>,
    ) -> bool {
        debug_assert_eq!(
            self.lifecycle,
            ListenerLifecycle::NotStarted,
            "a listener can only be started once"
        );
        if self.lifecycle != ListenerLifecycle::NotStarted {
            warn!(
                event = events::LISTENER_CALL_IGNORED,
                component = COMPONENT,
                lifecycle = %self.lifecycle,
                "start() on a listener that is not fresh"
            );
            return false;
        }

        let session = sink.session();
        self.session = Some(session);
        self.subscription_manager = Some(subscription_manager);
        self.network_channel.start_listening(sink);
        self.lifecycle = ListenerLifecycle::Started;

        info!(
            event = events::LISTENER_STARTED,
            component = COMPONENT,
            session = %session,
            "listener started"
        );
        true
    }

    /// Forwards the aggregate interest set to the subscription manager.
    pub fn update_interested_topics(&mut self, topics: TopicSet) {
        if self.lifecycle != ListenerLifecycle::Started {
            debug!(
                event = events::LISTENER_CALL_IGNORED,
                component = COMPONENT,
                lifecycle = %self.lifecycle,
                "topic update while not started"
            );
            return;
        }
        self.interested_topics = topics;
        self.request_subscription_update();
    }

    /// Drops the cached transport token. Valid in any lifecycle state.
    pub fn clear_instance_id_token(&mut self) {
        if self.instance_id_token.take().is_none() && self.subscription_manager.is_none() {
            return;
        }
        if let Some(subscription_manager) = self.subscription_manager.as_mut() {
            subscription_manager.clear_instance_id_token();
        }
        debug!(
            event = events::LISTENER_TOKEN_CLEARED,
            component = COMPONENT,
            "cleared instance id token"
        );
    }

    /// Applies one transport callback. Events reaching a listener that is not
    /// started are dropped.
    pub fn handle_transport_event(
        &mut self,
        event: TransportEvent,
        delegate: &mut dyn ListenerDelegate,
    ) {
        if self.lifecycle != ListenerLifecycle::Started {
            debug!(
                event = events::LISTENER_CALL_IGNORED,
                component = COMPONENT,
                lifecycle = %self.lifecycle,
                "transport event while not started"
            );
            return;
        }

        match event {
            TransportEvent::StateChanged(state) => {
                self.transport_state = state;
                self.emit_state_change(delegate);
            }
            TransportEvent::InvalidationReceived(invalidation) => {
                delegate.on_invalidate(&invalidation);
            }
            TransportEvent::TokenReceived(token) if token.is_empty() => {
                self.clear_instance_id_token();
            }
            TransportEvent::TokenReceived(token) => {
                if self.instance_id_token.as_deref() == Some(token.as_str()) {
                    return;
                }
                debug!(
                    event = events::LISTENER_TOKEN_RECEIVED,
                    component = COMPONENT,
                    "received new instance id token"
                );
                self.instance_id_token = Some(token);
                self.request_subscription_update();
            }
        }
    }

    /// Tears down the transport. Idempotent.
    pub fn stop(&mut self) {
        if self.lifecycle != ListenerLifecycle::Started {
            self.lifecycle = ListenerLifecycle::Stopped;
            return;
        }
        self.network_channel.stop_listening();
        self.lifecycle = ListenerLifecycle::Stopped;
        info!(
            event = events::LISTENER_STOPPED,
            component = COMPONENT,
            session = ?self.session.map(|session| session.to_string()),
            "listener stopped"
        );
    }

    fn request_subscription_update(&mut self) {
        let Some(subscription_manager) = self.subscription_manager.as_mut() else {
            return;
        };
        debug!(
            event = events::LISTENER_TOPICS_FORWARDED,
            component = COMPONENT,
            topics = %fields::format_topics(&self.interested_topics),
            has_token = self.instance_id_token.is_some(),
            "forwarding interested topics"
        );
        subscription_manager
            .update_subscribed_topics(&self.interested_topics, self.instance_id_token.as_deref());
    }

    fn emit_state_change(&mut self, delegate: &mut dyn ListenerDelegate) {
        let state = match self.transport_state {
            TransportState::Enabled => InvalidatorState::Enabled,
            TransportState::NotConnected | TransportState::TransientError => {
                InvalidatorState::TransientError
            }
        };
        if self.reported_state == Some(state) {
            return;
        }
        self.reported_state = Some(state);
        delegate.on_invalidator_state_change(state);
    }
}

impl Drop for InvalidationListener {
    fn drop(&mut self) {
        self.stop();
    }
}

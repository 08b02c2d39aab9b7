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

//! Contracts of the external collaborators and the mailbox that carries their
//! asynchronous completions back to the owning task.
//!
//! The push-messaging transport, the subscription RPC layer and the identity
//! provider are injected as trait objects. Whatever thread they complete on,
//! results are posted as [`ServiceEvent`]s and applied by the owner.

use crate::topic::{Invalidation, TopicSet};
use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Correlates an identity-provider request with its reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Identifies one listener lifetime. Transport events carry it so that
/// callbacks from a torn-down listener can be recognised and dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerSessionId(Uuid);

impl ListenerSessionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ListenerSessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Connectivity as reported by the push-messaging channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Enabled,
    NotConnected,
    TransientError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    StateChanged(TransportState),
    InvalidationReceived(Invalidation),
    /// A fresh messaging token; an empty string means the token was revoked.
    TokenReceived(String),
}

/// Outcome of an identity deletion request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum DeleteIdResult {
    Success,
    InvalidParameter,
    Disabled,
    AsyncOperationPending,
    ServerError,
    NetworkError,
    UnknownError,
}

/// Everything that completes asynchronously and must be applied on the owner.
#[derive(Debug)]
pub(crate) enum ServiceEvent {
    Transport {
        session: ListenerSessionId,
        event: TransportEvent,
    },
    InstanceIdReceived {
        request: RequestId,
        instance_id: String,
    },
    DeleteInstanceIdCompleted {
        request: RequestId,
        result: DeleteIdResult,
    },
}

/// Receive path handed to a [`NetworkChannel`] when it starts listening.
///
/// Cloneable and `Send`; safe to call from any thread. Calls after the owning
/// service has gone away are dropped and reported as `false`.
#[derive(Clone, Debug)]
pub struct TransportEventSink {
    session: ListenerSessionId,
    mailbox: UnboundedSender<ServiceEvent>,
}

impl TransportEventSink {
    pub(crate) fn new(session: ListenerSessionId, mailbox: UnboundedSender<ServiceEvent>) -> Self {
        Self { session, mailbox }
    }

    pub fn session(&self) -> ListenerSessionId {
        self.session
    }

    pub fn deliver(&self, event: TransportEvent) -> bool {
        self.mailbox
            .send(ServiceEvent::Transport {
                session: self.session,
                event,
            })
            .is_ok()
    }

    pub fn state_changed(&self, state: TransportState) -> bool {
        self.deliver(TransportEvent::StateChanged(state))
    }

    pub fn invalidation_received(&self, invalidation: Invalidation) -> bool {
        self.deliver(TransportEvent::InvalidationReceived(invalidation))
    }

    pub fn token_received(&self, token: impl Into<String>) -> bool {
        self.deliver(TransportEvent::TokenReceived(token.into()))
    }
}

/// Live push-messaging channel for one sender.
pub trait NetworkChannel: Send {
    /// Wires the receive path. Everything the channel observes from now on is
    /// reported through `sink`.
    fn start_listening(&mut self, sink: TransportEventSink);

    /// Detaches the receive path; no further events may be delivered.
    fn stop_listening(&mut self);
}

/// Client of the remote per-user subscription RPC layer.
pub trait SubscriptionManager: Send {
    /// Requests server-side subscriptions for exactly `topics`.
    fn update_subscribed_topics(&mut self, topics: &TopicSet, instance_id_token: Option<&str>);

    /// Forgets any token previously handed over.
    fn clear_instance_id_token(&mut self);
}

/// Provider of the per-application client identifier.
#[async_trait]
pub trait InstanceIdProvider: Send + Sync {
    /// Returns the current identifier, creating one if none exists yet.
    async fn get_id(&self, application_name: &str) -> String;

    /// Revokes the identifier and every token derived from it.
    async fn delete_id(&self, application_name: &str) -> DeleteIdResult;
}

/// Builds the transport for `(sender_id, application_name)`.
pub type NetworkChannelFactory =
    Box<dyn FnMut(&str, &str) -> Box<dyn NetworkChannel> + Send>;

/// Builds the subscription manager for `sender_id`.
pub type SubscriptionManagerFactory = Box<dyn FnMut(&str) -> Box<dyn SubscriptionManager> + Send>;

#[cfg(test)]
mod tests {
    use super::{ListenerSessionId, ServiceEvent, TransportEvent, TransportEventSink, TransportState};
    use crate::topic::Invalidation;
    use tokio::sync::mpsc;

    #[test]
    fn sink_tags_events_with_its_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = ListenerSessionId::new();
        let sink = TransportEventSink::new(session, tx);

        assert!(sink.state_changed(TransportState::Enabled));
        assert!(sink.invalidation_received(Invalidation::new("a", 1, "p")));

        match rx.try_recv().expect("state event") {
            ServiceEvent::Transport {
                session: tagged,
                event: TransportEvent::StateChanged(TransportState::Enabled),
            } => assert_eq!(tagged, session),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            rx.try_recv().expect("invalidation event"),
            ServiceEvent::Transport {
                event: TransportEvent::InvalidationReceived(_),
                ..
            }
        ));
    }

    #[test]
    fn sink_reports_closed_mailbox() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = TransportEventSink::new(ListenerSessionId::new(), tx);
        drop(rx);

        assert!(!sink.token_received("token"));
    }
}

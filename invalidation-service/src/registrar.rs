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

//! Handler registrations, aggregate topic interest and the invalidator state.

use crate::error::InvalidationError;
use crate::handler::{HandlerIdentityKey, InvalidationHandler};
use crate::observability::{events, fields};
use crate::topic::{Invalidation, InvalidatorState, TopicSet};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

const COMPONENT: &str = "registrar";

struct Registration {
    identity: HandlerIdentityKey,
    topics: TopicSet,
}

/// Owns every handler registration keyed by owner name, in registration order.
///
/// The subscribed-topics view is always derived from the registrations; it is
/// never stored on its own.
pub struct InvalidatorRegistrar {
    registrations: IndexMap<String, Registration>,
    state: InvalidatorState,
}

impl Default for InvalidatorRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidatorRegistrar {
    pub fn new() -> Self {
        Self {
            registrations: IndexMap::new(),
            state: InvalidatorState::Stopped,
        }
    }

    /// Registers `handler` with an empty interest set.
    ///
    /// Registering the same object twice is a no-op. A different object under
    /// an owner name that is already taken is rejected.
    pub fn register_handler(
        &mut self,
        handler: Arc<dyn InvalidationHandler>,
    ) -> Result<(), InvalidationError> {
        let owner = handler.owner_name();

        if let Some(existing) = self.registrations.get(&owner) {
            if existing.identity.is_same(&handler) {
                debug!(
                    event = events::HANDLER_REGISTERED,
                    component = COMPONENT,
                    handler = owner.as_str(),
                    "handler already registered, nothing to do"
                );
                return Ok(());
            }
            error!(
                event = events::HANDLER_REGISTER_REJECTED,
                component = COMPONENT,
                handler = owner.as_str(),
                "owner name already bound to a different handler"
            );
            return Err(InvalidationError::AlreadyRegistered(owner));
        }

        debug!(
            event = events::HANDLER_REGISTERED,
            component = COMPONENT,
            handler = owner.as_str(),
            "registered handler"
        );
        self.registrations.insert(
            owner,
            Registration {
                identity: HandlerIdentityKey::new(handler),
                topics: TopicSet::new(),
            },
        );
        Ok(())
    }

    /// Replaces the interest set of a registered handler.
    ///
    /// Returns `false` and leaves everything untouched if `handler` is unknown.
    pub fn update_registered_topics(
        &mut self,
        handler: &Arc<dyn InvalidationHandler>,
        topics: TopicSet,
    ) -> bool {
        let owner = handler.owner_name();
        let Some(registration) = self
            .registrations
            .get_mut(&owner)
            .filter(|registration| registration.identity.is_same(handler))
        else {
            warn!(
                event = events::TOPICS_UPDATE_UNKNOWN_HANDLER,
                component = COMPONENT,
                handler = owner.as_str(),
                "topic update for a handler that is not registered"
            );
            return false;
        };

        debug!(
            event = events::TOPICS_UPDATED,
            component = COMPONENT,
            handler = owner.as_str(),
            topics = %fields::format_topics(&topics),
            "updated interested topics"
        );
        registration.topics = topics;
        true
    }

    /// Removes `handler`. Unknown handlers are ignored.
    pub fn unregister_handler(&mut self, handler: &Arc<dyn InvalidationHandler>) {
        let owner = handler.owner_name();
        match self.registrations.get(&owner) {
            Some(registration) if registration.identity.is_same(handler) => {
                self.registrations.shift_remove(&owner);
                debug!(
                    event = events::HANDLER_UNREGISTERED,
                    component = COMPONENT,
                    handler = owner.as_str(),
                    "unregistered handler"
                );
            }
            Some(_) => {
                warn!(
                    event = events::HANDLER_UNREGISTERED,
                    component = COMPONENT,
                    handler = owner.as_str(),
                    "owner name is bound to a different handler, not unregistering"
                );
            }
            None => {
                debug!(
                    event = events::HANDLER_UNREGISTERED,
                    component = COMPONENT,
                    handler = owner.as_str(),
                    "handler was not registered"
                );
            }
        }
    }

    pub fn is_registered(&self, handler: &Arc<dyn InvalidationHandler>) -> bool {
        self.registrations
            .get(&handler.owner_name())
            .is_some_and(|registration| registration.identity.is_same(handler))
    }

    pub fn handler_count(&self) -> usize {
        self.registrations.len()
    }

    /// Interest set of one handler, if registered.
    pub fn registered_topics(&self, handler: &Arc<dyn InvalidationHandler>) -> Option<&TopicSet> {
        self.registrations
            .get(&handler.owner_name())
            .filter(|registration| registration.identity.is_same(handler))
            .map(|registration| &registration.topics)
    }

    /// Union of every registered handler's topics, recomputed on each call.
    pub fn get_all_subscribed_topics(&self) -> TopicSet {
        self.registrations
            .values()
            .flat_map(|registration| registration.topics.iter().cloned())
            .collect()
    }

    pub fn invalidator_state(&self) -> InvalidatorState {
        self.state
    }

    /// Records `state` and notifies every handler, in registration order,
    /// before returning.
    pub fn update_invalidator_state(&mut self, state: InvalidatorState) {
        debug!(
            event = events::STATE_CHANGED,
            component = COMPONENT,
            from = %self.state,
            to = %state,
            handlers = self.registrations.len(),
            "invalidator state changed"
        );
        self.state = state;
        for registration in self.registrations.values() {
            registration
                .identity
                .handler()
                .on_invalidator_state_change(state);
        }
    }

    /// Forgets the recorded state without notifying handlers. Used when the
    /// transport that reported it goes away.
    pub fn reset_invalidator_state(&mut self) {
        debug!(
            event = events::STATE_RESET,
            component = COMPONENT,
            from = %self.state,
            "invalidator state reset"
        );
        self.state = InvalidatorState::Stopped;
    }

    /// Delivers `invalidation` once to every handler interested in its topic
    /// and returns how many handlers received it.
    pub fn dispatch_invalidation_to_handlers(&self, invalidation: &Invalidation) -> usize {
        let mut delivered = 0;
        for (owner, registration) in &self.registrations {
            if !registration.topics.contains(invalidation.topic.as_str()) {
                continue;
            }
            registration
                .identity
                .handler()
                .on_incoming_invalidation(invalidation);
            delivered += 1;
            debug!(
                event = events::INVALIDATION_DISPATCHED,
                component = COMPONENT,
                handler = owner.as_str(),
                topic = invalidation.topic.as_str(),
                version = invalidation.version,
                "dispatched invalidation"
            );
        }

        if delivered == 0 {
            debug!(
                event = events::INVALIDATION_DROPPED_NO_HANDLER,
                component = COMPONENT,
                topic = invalidation.topic.as_str(),
                "no handler interested in topic, dropping"
            );
        }
        delivered
    }
}

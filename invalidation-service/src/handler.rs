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

//! Consumer-facing handler contract.

use crate::topic::{Invalidation, InvalidatorState};
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A consumer of invalidations.
///
/// Callbacks run synchronously on the owning thread and must not block. They
/// receive no handle to the service, so a handler cannot alter registrations
/// while a fan-out is in progress.
pub trait InvalidationHandler: Send + Sync {
    /// Called once per state change with the new overall state.
    fn on_invalidator_state_change(&self, state: InvalidatorState);

    /// Called once per invalidation whose topic this handler is interested in.
    fn on_incoming_invalidation(&self, invalidation: &Invalidation);

    /// Stable registration key. Two live handlers may not share one.
    fn owner_name(&self) -> String;

    /// Whether `topic` is server-broadcast rather than user scoped.
    fn is_public_topic(&self, _topic: &str) -> bool {
        false
    }
}

/// Pointer identity of a registered handler object.
#[derive(Clone)]
pub(crate) struct HandlerIdentityKey {
    handler: Arc<dyn InvalidationHandler>,
}

impl HandlerIdentityKey {
    pub(crate) fn new(handler: Arc<dyn InvalidationHandler>) -> Self {
        Self { handler }
    }

    pub(crate) fn handler(&self) -> &Arc<dyn InvalidationHandler> {
        &self.handler
    }

    fn address(&self) -> *const () {
        Arc::as_ptr(&self.handler) as *const ()
    }

    pub(crate) fn is_same(&self, handler: &Arc<dyn InvalidationHandler>) -> bool {
        self.address() == Arc::as_ptr(handler) as *const ()
    }
}

impl Hash for HandlerIdentityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl PartialEq for HandlerIdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for HandlerIdentityKey {}

impl Debug for HandlerIdentityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerIdentityKey")
            .field("owner", &self.handler.owner_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{HandlerIdentityKey, InvalidationHandler};
    use crate::topic::{Invalidation, InvalidatorState};
    use std::sync::Arc;

    struct NoopHandler;

    impl InvalidationHandler for NoopHandler {
        fn on_invalidator_state_change(&self, _state: InvalidatorState) {}

        fn on_incoming_invalidation(&self, _invalidation: &Invalidation) {}

        fn owner_name(&self) -> String {
            "noop".to_string()
        }
    }

    #[test]
    fn identity_key_compares_by_object_not_owner_name() {
        let first: Arc<dyn InvalidationHandler> = Arc::new(NoopHandler);
        let second: Arc<dyn InvalidationHandler> = Arc::new(NoopHandler);

        let key_a = HandlerIdentityKey::new(first.clone());
        let key_b = HandlerIdentityKey::new(first.clone());
        let key_c = HandlerIdentityKey::new(second.clone());

        assert_eq!(key_a, key_b);
        assert_ne!(key_a, key_c);
        assert!(key_a.is_same(&first));
        assert!(!key_a.is_same(&second));
    }
}

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

//! # invalidation-service
//!
//! Client-side invalidation delivery: handlers declare interest in topics, the
//! push-messaging transport delivers invalidations, and the service fans each
//! one out to the handlers interested in its topic. It also tracks a single
//! overall [`InvalidatorState`] and a persisted client identifier used to
//! authenticate with the transport.
//!
//! The transport, the subscription RPC layer, the identity provider and the
//! preference store are injected collaborators (see [`transport`] and
//! [`prefs`]).
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use async_trait::async_trait;
//! use invalidation_service::{
//!     DeleteIdResult, InMemoryPrefStore, InstanceIdProvider, Invalidation,
//!     InvalidationHandler, InvalidationService, InvalidatorState, NetworkChannel,
//!     ServiceConfig, ServiceDependencies, SubscriptionManager, TopicSet, TransportEventSink,
//! };
//!
//! # struct Channel;
//! # impl NetworkChannel for Channel {
//! #     fn start_listening(&mut self, _sink: TransportEventSink) {}
//! #     fn stop_listening(&mut self) {}
//! # }
//! # struct Subscriptions;
//! # impl SubscriptionManager for Subscriptions {
//! #     fn update_subscribed_topics(&mut self, _topics: &TopicSet, _token: Option<&str>) {}
//! #     fn clear_instance_id_token(&mut self) {}
//! # }
//! # struct Provider;
//! # #[async_trait]
//! # impl InstanceIdProvider for Provider {
//! #     async fn get_id(&self, _application_name: &str) -> String { "client-1".to_string() }
//! #     async fn delete_id(&self, _application_name: &str) -> DeleteIdResult { DeleteIdResult::Success }
//! # }
//! #[derive(Default)]
//! struct Cache {
//!     invalidated: Mutex<Vec<String>>,
//! }
//!
//! impl InvalidationHandler for Cache {
//!     fn on_invalidator_state_change(&self, _state: InvalidatorState) {}
//!     fn on_incoming_invalidation(&self, invalidation: &Invalidation) {
//!         self.invalidated.lock().unwrap().push(invalidation.topic.clone());
//!     }
//!     fn owner_name(&self) -> String {
//!         "cache".to_string()
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let prefs = Arc::new(InMemoryPrefStore::new());
//! InvalidationService::register_prefs(prefs.as_ref()).unwrap();
//!
//! let mut service = InvalidationService::new(
//!     ServiceConfig::new("S1").unwrap(),
//!     ServiceDependencies {
//!         network_channel_factory: Box::new(|_: &str, _: &str| {
//!             Box::new(Channel) as Box<dyn NetworkChannel>
//!         }),
//!         subscription_manager_factory: Box::new(|_: &str| {
//!             Box::new(Subscriptions) as Box<dyn SubscriptionManager>
//!         }),
//!         instance_id_provider: Arc::new(Provider),
//!         pref_store: prefs,
//!     },
//! )
//! .unwrap();
//!
//! let cache = Arc::new(Cache::default());
//! service.add_handler_and_topics(cache.clone(), ["topicA"]).unwrap();
//! service.start().unwrap();
//!
//! // Apply the client id reply once it arrives.
//! service.handle_next_event().await;
//! assert_eq!(service.client_id(), "client-1");
//!
//! service.on_invalidate(&Invalidation::new("topicA", 1, ""));
//! assert_eq!(*cache.invalidated.lock().unwrap(), vec!["topicA".to_string()]);
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - [`registrar`]: handler registrations, aggregate interest, invalidator state
//! - [`identity`]: cached and persisted client identifier
//! - [`listener`]: lifecycle of the live transport connection
//! - [`service`]: public facade and orchestration
//!
//! ## Observability model
//!
//! Library code emits `tracing` events named in [`observability::events`] and
//! never installs a global subscriber. Hosts and tests initialize
//! `tracing_subscriber` themselves.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod handler;
pub mod identity;
pub mod listener;
#[doc(hidden)]
pub mod observability;
pub mod prefs;
pub mod registrar;
mod sequence;
pub mod service;
pub mod topic;
pub mod transport;

pub use config::ServiceConfig;
pub use diagnostics::DiagnosticInfo;
pub use error::{InvalidationError, PrefStoreError};
pub use handler::InvalidationHandler;
pub use identity::ClientIdentityManager;
pub use listener::{InvalidationListener, ListenerDelegate, ListenerLifecycle};
pub use prefs::{InMemoryPrefStore, PrefStore, INVALIDATION_CLIENT_ID_CACHE};
pub use registrar::InvalidatorRegistrar;
pub use service::{InvalidationService, ServiceDependencies};
pub use topic::{Invalidation, InvalidatorState, Topic, TopicSet};
pub use transport::{
    DeleteIdResult, InstanceIdProvider, ListenerSessionId, NetworkChannel,
    NetworkChannelFactory, RequestId, SubscriptionManager, SubscriptionManagerFactory,
    TransportEvent, TransportEventSink, TransportState,
};

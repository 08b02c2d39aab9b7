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

#![allow(dead_code)]

use async_trait::async_trait;
use invalidation_service::{
    DeleteIdResult, InMemoryPrefStore, InstanceIdProvider, Invalidation, InvalidationHandler,
    InvalidationService, InvalidatorState, NetworkChannel, ServiceConfig, ServiceDependencies,
    SubscriptionManager, TopicSet, TransportEventSink,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use tokio::sync::oneshot;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Ordered record of collaborator calls, shared across all doubles.
pub type Journal = Arc<Mutex<Vec<String>>>;

fn note(journal: &Journal, entry: impl Into<String>) {
    journal.lock().expect("lock journal").push(entry.into());
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().expect("lock journal").clone()
}

/// Gives tests the receive path of the most recently started channel.
#[derive(Clone, Default)]
pub struct TransportHandle {
    sinks: Arc<Mutex<Vec<TransportEventSink>>>,
}

impl TransportHandle {
    pub fn latest_sink(&self) -> TransportEventSink {
        self.sinks
            .lock()
            .expect("lock sinks")
            .last()
            .cloned()
            .expect("a started channel")
    }

    pub fn started_channels(&self) -> usize {
        self.sinks.lock().expect("lock sinks").len()
    }
}

pub struct RecordingNetworkChannel {
    journal: Journal,
    handle: TransportHandle,
}

impl NetworkChannel for RecordingNetworkChannel {
    fn start_listening(&mut self, sink: TransportEventSink) {
        note(&self.journal, "channel:start");
        self.handle.sinks.lock().expect("lock sinks").push(sink);
    }

    fn stop_listening(&mut self) {
        note(&self.journal, "channel:stop");
    }
}

pub struct RecordingSubscriptionManager {
    journal: Journal,
    updates: Arc<Mutex<Vec<(Vec<String>, Option<String>)>>>,
}

impl SubscriptionManager for RecordingSubscriptionManager {
    fn update_subscribed_topics(&mut self, topics: &TopicSet, instance_id_token: Option<&str>) {
        note(&self.journal, "subscriptions:update");
        self.updates.lock().expect("lock updates").push((
            topics.iter().map(|topic| topic.name().to_string()).collect(),
            instance_id_token.map(str::to_string),
        ));
    }

    fn clear_instance_id_token(&mut self) {
        note(&self.journal, "subscriptions:clear_token");
    }
}

/// Identity provider whose get replies are released by the test.
pub struct ManualInstanceIdProvider {
    journal: Journal,
    pending_gets: Mutex<VecDeque<oneshot::Sender<String>>>,
    delete_result: DeleteIdResult,
}

impl ManualInstanceIdProvider {
    pub async fn wait_for_gets(&self, count: usize) {
        for _ in 0..100 {
            if self.pending_gets.lock().expect("lock pending_gets").len() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("provider never saw {count} get requests");
    }

    pub fn resolve_oldest(&self, instance_id: &str) {
        let sender = self
            .pending_gets
            .lock()
            .expect("lock pending_gets")
            .pop_front()
            .expect("a pending get request");
        sender.send(instance_id.to_string()).expect("requester alive");
    }
}

#[async_trait]
impl InstanceIdProvider for ManualInstanceIdProvider {
    async fn get_id(&self, application_name: &str) -> String {
        note(&self.journal, format!("identity:get:{application_name}"));
        let (tx, rx) = oneshot::channel();
        self.pending_gets
            .lock()
            .expect("lock pending_gets")
            .push_back(tx);
        rx.await.unwrap_or_default()
    }

    async fn delete_id(&self, application_name: &str) -> DeleteIdResult {
        note(&self.journal, format!("identity:delete:{application_name}"));
        self.delete_result
    }
}

pub struct RecordingHandler {
    owner: String,
    states: Mutex<Vec<InvalidatorState>>,
    invalidations: Mutex<Vec<Invalidation>>,
}

impl RecordingHandler {
    pub fn new(owner: &str) -> Arc<Self> {
        Arc::new(Self {
            owner: owner.to_string(),
            states: Mutex::new(Vec::new()),
            invalidations: Mutex::new(Vec::new()),
        })
    }

    pub fn states(&self) -> Vec<InvalidatorState> {
        self.states.lock().expect("lock states").clone()
    }

    pub fn invalidations(&self) -> Vec<Invalidation> {
        self.invalidations.lock().expect("lock invalidations").clone()
    }
}

impl InvalidationHandler for RecordingHandler {
    fn on_invalidator_state_change(&self, state: InvalidatorState) {
        self.states.lock().expect("lock states").push(state);
    }

    fn on_incoming_invalidation(&self, invalidation: &Invalidation) {
        self.invalidations
            .lock()
            .expect("lock invalidations")
            .push(invalidation.clone());
    }

    fn owner_name(&self) -> String {
        self.owner.clone()
    }
}

pub fn as_handler(handler: &Arc<RecordingHandler>) -> Arc<dyn InvalidationHandler> {
    handler.clone()
}

pub struct Harness {
    pub service: InvalidationService,
    pub journal: Journal,
    pub transport: TransportHandle,
    pub provider: Arc<ManualInstanceIdProvider>,
    pub prefs: Arc<InMemoryPrefStore>,
    pub subscription_updates: Arc<Mutex<Vec<(Vec<String>, Option<String>)>>>,
}

impl Harness {
    pub fn new(sender_id: &str) -> Self {
        Self::with_prefs(sender_id, Arc::new(InMemoryPrefStore::new()))
    }

    pub fn with_prefs(sender_id: &str, prefs: Arc<InMemoryPrefStore>) -> Self {
        init_tracing();
        InvalidationService::register_prefs(prefs.as_ref()).expect("register prefs");

        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let transport = TransportHandle::default();
        let provider = Arc::new(ManualInstanceIdProvider {
            journal: journal.clone(),
            pending_gets: Mutex::new(VecDeque::new()),
            delete_result: DeleteIdResult::Success,
        });
        let subscription_updates = Arc::new(Mutex::new(Vec::new()));

        let channel_journal = journal.clone();
        let channel_handle = transport.clone();
        let subscriptions_journal = journal.clone();
        let subscriptions_updates = subscription_updates.clone();

        let service = InvalidationService::new(
            ServiceConfig::new(sender_id).expect("valid config"),
            ServiceDependencies {
                network_channel_factory: Box::new(move |_sender_id: &str, _app: &str| {
                    Box::new(RecordingNetworkChannel {
                        journal: channel_journal.clone(),
                        handle: channel_handle.clone(),
                    }) as Box<dyn NetworkChannel>
                }),
                subscription_manager_factory: Box::new(move |_sender_id: &str| {
                    Box::new(RecordingSubscriptionManager {
                        journal: subscriptions_journal.clone(),
                        updates: subscriptions_updates.clone(),
                    }) as Box<dyn SubscriptionManager>
                }),
                instance_id_provider: provider.clone(),
                pref_store: prefs.clone(),
            },
        )
        .expect("valid service");

        Self {
            service,
            journal,
            transport,
            provider,
            prefs,
            subscription_updates,
        }
    }

    pub fn subscription_updates(&self) -> Vec<(Vec<String>, Option<String>)> {
        self.subscription_updates
            .lock()
            .expect("lock subscription updates")
            .clone()
    }

    /// Releases the oldest pending get request and applies the reply.
    pub async fn resolve_client_id(&mut self, instance_id: &str) {
        self.provider.wait_for_gets(1).await;
        self.provider.resolve_oldest(instance_id);
        assert!(self.service.handle_next_event().await);
    }
}

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

mod common;

use common::{entries, Harness};
use invalidation_service::{
    DeleteIdResult, InMemoryPrefStore, PrefStore, INVALIDATION_CLIENT_ID_CACHE,
};
use std::sync::Arc;

fn persisted(prefs: &InMemoryPrefStore, sender_id: &str) -> Option<String> {
    prefs.get_dict_string(INVALIDATION_CLIENT_ID_CACHE, sender_id)
}

#[tokio::test]
async fn populated_client_id_is_persisted_under_sender() {
    let mut harness = Harness::new("S1");

    harness.service.start().expect("start");
    harness.resolve_client_id("client-1").await;

    assert_eq!(harness.service.client_id(), "client-1");
    assert_eq!(persisted(&harness.prefs, "S1").as_deref(), Some("client-1"));
    assert!(entries(&harness.journal)
        .contains(&"identity:get:com.google.chrome.fcm.invalidations-S1".to_string()));
}

#[tokio::test]
async fn listener_is_receiving_before_client_id_is_requested() {
    let mut harness = Harness::new("S1");

    harness.service.start().expect("start");
    harness.provider.wait_for_gets(1).await;

    let journal = entries(&harness.journal);
    let started = journal
        .iter()
        .position(|entry| entry == "channel:start")
        .expect("channel started");
    let requested = journal
        .iter()
        .position(|entry| entry.starts_with("identity:get:"))
        .expect("client id requested");
    assert!(started < requested);
}

#[tokio::test]
async fn cached_client_id_is_available_before_provider_replies() {
    let prefs = Arc::new(InMemoryPrefStore::new());
    let mut harness = Harness::with_prefs("S1", prefs.clone());
    prefs
        .set_dict_string(INVALIDATION_CLIENT_ID_CACHE, "S1", "cached")
        .expect("seed cache");

    harness.service.start().expect("start");
    assert_eq!(harness.service.client_id(), "cached");

    harness.resolve_client_id("cached").await;
    assert_eq!(harness.service.client_id(), "cached");
    assert_eq!(persisted(&prefs, "S1").as_deref(), Some("cached"));
}

#[tokio::test]
async fn stop_permanently_clears_identity_before_listener_goes_away() {
    let mut harness = Harness::new("S1");
    harness.service.start().expect("start");
    harness.resolve_client_id("client-1").await;
    assert!(harness.transport.latest_sink().token_received("token-1"));
    harness.service.process_pending_events();

    harness.service.stop_permanently().expect("stop permanently");

    assert_eq!(harness.service.client_id(), "");
    assert_eq!(persisted(&harness.prefs, "S1"), None);
    assert!(!harness.service.is_started());

    let journal = entries(&harness.journal);
    let token_cleared = journal
        .iter()
        .position(|entry| entry == "subscriptions:clear_token")
        .expect("token cleared");
    let channel_stopped = journal
        .iter()
        .position(|entry| entry == "channel:stop")
        .expect("channel stopped");
    assert!(token_cleared < channel_stopped);

    assert!(harness.service.handle_next_event().await);
    let info = harness.service.diagnostic_info();
    assert_eq!(info.instance_id.last_delete_result, Some(DeleteIdResult::Success));
    assert!(info.instance_id.instance_id_cleared.is_some());
}

#[tokio::test]
async fn stop_permanently_without_client_id_skips_deletion() {
    let mut harness = Harness::new("S1");
    harness.service.start().expect("start");
    harness.resolve_client_id("").await;

    harness.service.stop_permanently().expect("stop permanently");
    tokio::task::yield_now().await;

    assert!(!entries(&harness.journal)
        .iter()
        .any(|entry| entry.starts_with("identity:delete:")));
}

#[tokio::test]
async fn reply_landing_after_stop_permanently_is_not_persisted() {
    let mut harness = Harness::new("S1");
    harness.service.start().expect("start");
    harness.provider.wait_for_gets(1).await;
    assert_eq!(harness.service.client_id(), "");

    harness.service.stop_permanently().expect("stop permanently");
    harness.provider.resolve_oldest("late-id");
    // The stale get reply and the delete completion.
    assert!(harness.service.handle_next_event().await);
    assert!(harness.service.handle_next_event().await);

    assert_eq!(harness.service.client_id(), "");
    assert_eq!(persisted(&harness.prefs, "S1"), None);
    assert!(entries(&harness.journal)
        .iter()
        .any(|entry| entry.starts_with("identity:delete:")));
}

#[tokio::test]
async fn reply_to_request_issued_before_reset_does_not_resurrect_client_id() {
    let prefs = Arc::new(InMemoryPrefStore::new());
    let mut harness = Harness::with_prefs("S1", prefs.clone());
    prefs
        .set_dict_string(INVALIDATION_CLIENT_ID_CACHE, "S1", "old-id")
        .expect("seed cache");

    harness.service.start().expect("start");
    assert_eq!(harness.service.client_id(), "old-id");
    harness.provider.wait_for_gets(1).await;

    harness.service.reset_client_id();
    assert_eq!(harness.service.client_id(), "");
    assert_eq!(persisted(&prefs, "S1"), None);

    harness.provider.resolve_oldest("old-id");
    // The stale get reply and the delete completion.
    assert!(harness.service.handle_next_event().await);
    assert!(harness.service.handle_next_event().await);

    assert_eq!(harness.service.client_id(), "");
    assert_eq!(persisted(&prefs, "S1"), None);

    // A request issued after the reset is honoured.
    harness.service.stop().expect("stop");
    harness.service.start().expect("restart");
    harness.resolve_client_id("new-id").await;
    assert_eq!(harness.service.client_id(), "new-id");
    assert_eq!(persisted(&prefs, "S1").as_deref(), Some("new-id"));
}

#[tokio::test]
async fn senders_sharing_a_store_keep_their_own_entries() {
    let prefs = Arc::new(InMemoryPrefStore::new());
    let mut first = Harness::with_prefs("S1", prefs.clone());
    let mut second = Harness::with_prefs("S2", prefs.clone());

    first.service.start().expect("start S1");
    first.resolve_client_id("client-s1").await;
    second.service.start().expect("start S2");
    second.resolve_client_id("client-s2").await;

    first.service.stop_permanently().expect("stop S1 permanently");

    assert_eq!(persisted(&prefs, "S1"), None);
    assert_eq!(persisted(&prefs, "S2").as_deref(), Some("client-s2"));
    assert_eq!(second.service.client_id(), "client-s2");
}

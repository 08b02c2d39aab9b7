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

//! Topic, invalidation and invalidator-state value types.

use crate::error::InvalidationError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// A named subject handlers can declare interest in.
///
/// Identity, ordering and hashing use the name only. `is_public` marks topics
/// broadcast by the server to every client rather than scoped to this user.
#[derive(Clone, Debug, Serialize)]
pub struct Topic {
    name: String,
    is_public: bool,
}

impl Topic {
    /// Builds a topic, rejecting an empty name.
    pub fn new(name: impl Into<String>, is_public: bool) -> Result<Self, InvalidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidationError::EmptyTopic);
        }
        Ok(Self { name, is_public })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Topic {}

impl PartialOrd for Topic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Topic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Hash for Topic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_public {
            write!(f, "{} (public)", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

pub type TopicSet = BTreeSet<Topic>;

/// One invalidation delivered by the push-messaging transport.
///
/// Routed by `topic`; `version` and `payload` are passed through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    pub topic: String,
    pub version: i64,
    pub payload: String,
}

impl Invalidation {
    pub fn new(topic: impl Into<String>, version: i64, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            version,
            payload: payload.into(),
        }
    }
}

/// Overall connectivity state of the invalidation pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidatorState {
    #[default]
    Stopped,
    Starting,
    Enabled,
    TransientError,
    ShuttingDown,
}

impl InvalidatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidatorState::Stopped => "STOPPED",
            InvalidatorState::Starting => "STARTING",
            InvalidatorState::Enabled => "ENABLED",
            InvalidatorState::TransientError => "TRANSIENT_ERROR",
            InvalidatorState::ShuttingDown => "SHUTTING_DOWN",
        }
    }
}

impl Display for InvalidatorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{InvalidatorState, Topic, TopicSet};
    use crate::error::InvalidationError;

    #[test]
    fn topic_identity_ignores_public_flag() {
        let private = Topic::new("topic-a", false).expect("valid topic");
        let public = Topic::new("topic-a", true).expect("valid topic");

        assert_eq!(private, public);

        let mut topics = TopicSet::new();
        topics.insert(private);
        assert!(!topics.insert(public));
        assert_eq!(topics.len(), 1);
    }

    #[test]
    fn topic_set_lookup_by_name() {
        let topics: TopicSet = [Topic::new("topic-a", true).expect("valid topic")]
            .into_iter()
            .collect();

        assert!(topics.contains("topic-a"));
        assert!(!topics.contains("topic-b"));
    }

    #[test]
    fn empty_topic_name_is_rejected() {
        assert!(matches!(
            Topic::new("", false),
            Err(InvalidationError::EmptyTopic)
        ));
    }

    #[test]
    fn invalidator_state_renders_wire_names() {
        assert_eq!(InvalidatorState::TransientError.to_string(), "TRANSIENT_ERROR");
        assert_eq!(InvalidatorState::default(), InvalidatorState::Stopped);
    }
}

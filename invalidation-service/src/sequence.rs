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

//! Owner-thread affinity checks.
//!
//! Service state is only ever mutated from the thread that built it. The
//! checker binds to that thread and every public entry point validates it.

use std::sync::Mutex;
use std::thread::{self, ThreadId};

#[derive(Debug)]
pub(crate) struct SequenceChecker {
    owner: Mutex<Option<ThreadId>>,
}

impl SequenceChecker {
    /// Binds to the calling thread.
    pub(crate) fn new() -> Self {
        Self {
            owner: Mutex::new(Some(thread::current().id())),
        }
    }

    /// Returns `true` when called on the owning thread. A detached checker
    /// rebinds to whichever thread calls it first.
    pub(crate) fn called_on_valid_sequence(&self) -> bool {
        let current = thread::current().id();
        let Ok(mut owner) = self.owner.lock() else {
            return false;
        };
        match *owner {
            Some(bound) => bound == current,
            None => {
                *owner = Some(current);
                true
            }
        }
    }

    /// Forgets the bound thread, e.g. before handing the owner to another task.
    pub(crate) fn detach(&self) {
        if let Ok(mut owner) = self.owner.lock() {
            *owner = None;
        }
    }
}

/// Asserts owner-thread affinity in debug builds.
macro_rules! dcheck_called_on_valid_sequence {
    ($checker:expr) => {
        debug_assert!(
            $checker.called_on_valid_sequence(),
            "called from a thread other than the owning one"
        )
    };
}

pub(crate) use dcheck_called_on_valid_sequence;

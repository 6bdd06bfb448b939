//! Integration test suite for stakd-sync.
//!
//! Mounts views against a stateful fake REST backend and checks that
//! mutations, change events and pagination flow through the cache the way a
//! UI would observe them.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;
mod integration;

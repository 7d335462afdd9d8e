// Copyright 2026 Pricestream Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pricestream library — resilient extraction of live terminal quotes,
//! republished over Redis pub/sub.
//!
//! This library crate exposes the core modules for integration testing.

pub mod backoff;
pub mod config;
pub mod error;
pub mod extract;
pub mod publisher;
pub mod session;
pub mod snapshot;
pub mod stream;

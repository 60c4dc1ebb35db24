// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Session Core - session tokens and single-flight caching
//!
//! Client-side plumbing shared by Relational wallet services that call the
//! backend on behalf of a signed-in user.
//!
//! ## Modules
//!
//! - `cache` - Keyed single-flight cache with pluggable refresh policies
//! - `auth` - Session-token store and authenticated-call executor
//! - `lifecycle` - Login/logout/transaction event hub
//! - `config` - Environment configuration
//! - `telemetry` - Tracing subscriber setup

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod telemetry;

pub use auth::{AuthenticationExecutor, AuthenticationTokenStore};
pub use cache::{CacheConfiguration, KeyedCache};
pub use config::SessionConfig;
pub use error::{CacheError, SessionError};
pub use lifecycle::{LifecycleEvent, LifecycleEvents};

//! `attune_core` is the platform-independent runtime shared by the Attune per-platform SDKs.
//! If you're embedding Attune in an app, you probably want one of the platform SDKs; this crate
//! is the resolution-and-delivery machinery they all share.
//!
//! # Overview
//!
//! `attune_core` is organized as a set of building blocks. Different platforms have different
//! constraints; some hosts use every block and others replace a piece with a native
//! implementation (e.g., the visibility plumbing feeding
//! [`ViewTrackingEngine`](view_tracking::ViewTrackingEngine)).
//!
//! [`personalization::resolve`] is the heart of the SDK: a pure function mapping a baseline CMS
//! entry plus the visitor's server-computed selection set to the entry to render. It never
//! fails — every fallback path returns the unmodified baseline.
//!
//! [`ProfileStateStore`](state_store::ProfileStateStore) persists the visitor's profile,
//! selected personalizations, consent, and pending changes under fixed keys in a host-provided
//! [`KeyValueStorage`](storage::KeyValueStorage), which makes the SDK stateless-safe across page
//! loads. State is replaced wholesale per server response and corrupted cache entries degrade to
//! a cold start.
//!
//! [`Transport`](transport::Transport) wraps every HTTP call with a timeout boundary and a
//! bounded retry loop, so both profile mutations and event delivery survive flaky networks.
//!
//! [`events`] contains the analytics event model, the
//! [`EventBuilder`](events::EventBuilder) that stamps shared contextual metadata, and the
//! queued [`EventDispatcher`](events::EventDispatcher). Events pass through an
//! [`InterceptorPipeline`](interceptor::InterceptorPipeline) before they are shipped, so hosts
//! can enrich or scrub payloads.
//!
//! [`ViewTrackingEngine`](view_tracking::ViewTrackingEngine) decides exactly when a rendered
//! component counts as "viewed", with de-duplication and stickiness rules, and emits
//! component-view events through the builder → pipeline → dispatcher chain.
//!
//! [`Client`](client::Client) ties the blocks together and is the only surface UI-framework
//! adapters are permitted to call.
//!
//! # Versioning
//!
//! This library follows semver. However, it is considered an internal library, so expect
//! frequent breaking changes and major version bumps.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod client;
pub mod events;
pub mod interceptor;
pub mod overrides;
pub mod personalization;
pub mod state_store;
pub mod storage;
pub mod transport;
pub mod view_tracking;

mod error;
mod profile;
mod sdk_metadata;
mod timestamp;

pub use client::{Client, ClientConfig};
pub use error::{Error, Result, TransportError};
pub use profile::{Consent, Location, Profile, ProfileChange, SelectedPersonalization, Session};
pub use sdk_metadata::SdkMetadata;
pub use timestamp::Timestamp;

//! Location lookup coordination: tokens, the completion sink, and the
//! resolver boundary.
//!
//! The geo field is the one genuinely concurrent element of a form: the
//! lookup collaborator may complete after further keystrokes have occurred.
//! Last-write-wins is enforced **by request, not by completion order**:
//! every issued request carries a monotonic per-field token, and a result
//! is applied only while its token is still current. Stale results are
//! discarded, never surfaced as field errors.
//!
//! Completions cross the thread boundary through a shared queue
//! (`LookupSink`); the single-threaded engine drains it between UI events,
//! so applying a resolution is as atomic as any other edit.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::FormEngine;
use crate::schema::FieldKind;
use crate::validate::validate_field;
use crate::value::{FieldValue, GeoLocation};

// ---------------------------------------------------------------------------
// LookupToken
// ---------------------------------------------------------------------------

/// A monotonically increasing token identifying one lookup request for one
/// field.
///
/// # Invariants
///
/// - Tokens for a field are strictly monotonic: a newer request always
///   carries a greater token.
/// - Token 0 is reserved for "no lookup issued".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LookupToken(u64);

impl LookupToken {
    /// The null token: no lookup has been issued.
    pub const NONE: Self = Self(0);

    /// Create a token from a raw value (for tests).
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// The raw token value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is the null token.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for LookupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Engine-side token operations
// ---------------------------------------------------------------------------

impl FormEngine {
    /// Issue the next lookup token for a geo field, superseding any
    /// in-flight request. Returns [`LookupToken::NONE`] for keys that are
    /// not geo fields.
    pub fn begin_lookup(&mut self, key: &str) -> LookupToken {
        let is_geo = self
            .schema()
            .field(key)
            .is_some_and(|f| f.kind == FieldKind::GeoPoint);
        if !is_geo {
            debug!(key, "begin_lookup on a non-geo field");
            return LookupToken::NONE;
        }
        let generation = self.lookup_generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        LookupToken(*generation)
    }

    /// The current token for a field's lookups.
    #[must_use]
    pub fn current_lookup_token(&self, key: &str) -> LookupToken {
        self.lookup_generations
            .get(key)
            .map_or(LookupToken::NONE, |g| LookupToken(*g))
    }

    /// Apply a resolved location iff `token` is still the field's current
    /// request. The structured record replaces the prior value atomically
    /// and the field is revalidated. Returns `false` when the result is
    /// stale (a newer request was issued since) and was discarded.
    pub fn try_apply_location(
        &mut self,
        key: &str,
        token: LookupToken,
        location: GeoLocation,
    ) -> bool {
        let current = self.current_lookup_token(key);
        if token.is_none() || token < current {
            debug!(key, %token, %current, "stale lookup result discarded");
            return false;
        }
        let Some(field) = self.schema().field(key) else {
            debug!(key, "lookup resolution for unknown field key");
            return false;
        };
        let value = FieldValue::Location(location);
        let error = validate_field(field, &value);
        let Some(state) = self.state_mut(key) else {
            return false;
        };
        state.value = value;
        state.error = error;
        true
    }
}

// ---------------------------------------------------------------------------
// LookupSink
// ---------------------------------------------------------------------------

/// A completed lookup waiting to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResolution {
    /// The geo field the lookup was issued for.
    pub key: String,
    /// The token the result was computed for.
    pub token: LookupToken,
    /// The resolved location record.
    pub location: GeoLocation,
}

/// The shared completion queue between the resolver (any thread) and the
/// engine (the event thread).
#[derive(Debug, Clone, Default)]
pub struct LookupSink {
    inner: Arc<Mutex<VecDeque<LookupResolution>>>,
}

impl LookupSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a resolution. Called from the resolver's completion context.
    pub fn push(&self, resolution: LookupResolution) {
        self.inner.lock().unwrap().push_back(resolution);
    }

    /// Number of queued resolutions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Drain queued resolutions into the engine, in arrival order. Returns
    /// the keys whose value was actually applied (stale results are
    /// dropped silently).
    pub fn drain_into(&self, engine: &mut FormEngine) -> Vec<String> {
        let resolutions: Vec<LookupResolution> =
            self.inner.lock().unwrap().drain(..).collect();
        let mut applied = Vec::new();
        for resolution in resolutions {
            if engine.try_apply_location(&resolution.key, resolution.token, resolution.location) {
                applied.push(resolution.key);
            }
        }
        applied
    }
}

// ---------------------------------------------------------------------------
// LookupReply / LocationResolver
// ---------------------------------------------------------------------------

/// The completion handle passed to a resolver alongside the query text.
///
/// Dropping the reply without fulfilling it is the "no match confirmed"
/// outcome: the field simply keeps its previous value.
#[derive(Debug, Clone)]
pub struct LookupReply {
    key: String,
    token: LookupToken,
    sink: LookupSink,
}

impl LookupReply {
    /// Create a reply handle for one issued request.
    #[must_use]
    pub fn new(key: impl Into<String>, token: LookupToken, sink: LookupSink) -> Self {
        Self {
            key: key.into(),
            token,
            sink,
        }
    }

    /// The field the lookup was issued for.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The token the result will carry.
    #[must_use]
    pub fn token(&self) -> LookupToken {
        self.token
    }

    /// Deliver the resolved location into the sink.
    pub fn fulfill(self, location: GeoLocation) {
        self.sink.push(LookupResolution {
            key: self.key,
            token: self.token,
            location,
        });
    }
}

/// The location-lookup collaborator: the one external capability the form
/// engine depends on.
///
/// Given user keystrokes, asynchronously yield a structured address record
/// by fulfilling the reply — or never fulfill it if no match is confirmed.
/// Failures (network errors, rejections) are swallowed the same way: do
/// not fulfill, and the field keeps its previous value.
pub trait LocationResolver {
    /// Start resolving `query`. May complete on any thread, at any later
    /// time.
    fn resolve(&mut self, query: &str, reply: LookupReply);
}

// ---------------------------------------------------------------------------
// LookupConfig
// ---------------------------------------------------------------------------

/// What kind of results the lookup collaborator should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupKinds {
    /// Street-level addresses.
    #[default]
    Address,
    /// Cities only.
    Cities,
}

/// Configuration for the geo field's lookup behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupConfig {
    /// Restrict results to one country (ISO 3166-1 alpha-2), if set.
    pub country: Option<String>,
    /// Result type restriction.
    pub kinds: LookupKinds,
    /// Idle ticks after the last keystroke before a lookup is issued.
    pub debounce_ticks: u32,
    /// Keep the visible query text after a successful resolution instead
    /// of clearing it.
    pub keep_query: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            country: None,
            kinds: LookupKinds::default(),
            debounce_ticks: 3,
            keep_query: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

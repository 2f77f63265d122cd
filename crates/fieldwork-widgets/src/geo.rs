//! The geo field's debounced, cancellable lookup driver.
//!
//! Keystrokes edit a local query string (the engine's geo value changes
//! only when a lookup resolves). Each edit restarts a tick-counted debounce
//! window; once the window elapses the widget issues a fresh engine token
//! and forwards the query to the resolver. The engine discards any result
//! whose token has been superseded, so rapid typing can never apply a stale
//! match.

use std::collections::HashMap;

use fieldwork_engine::engine::FormEngine;
use fieldwork_engine::lookup::{LocationResolver, LookupConfig, LookupReply, LookupSink};

#[derive(Debug, Clone, Default)]
struct GeoQuery {
    text: String,
    idle_ticks: u32,
    pending: bool,
}

/// Per-field query editing state for every geo field in a form.
#[derive(Debug, Clone)]
pub struct GeoQueryState {
    config: LookupConfig,
    sink: LookupSink,
    queries: HashMap<String, GeoQuery>,
}

impl Default for GeoQueryState {
    fn default() -> Self {
        Self::new(LookupConfig::default(), LookupSink::new())
    }
}

impl GeoQueryState {
    /// Create with a lookup configuration and the completion sink shared
    /// with the application's event loop.
    #[must_use]
    pub fn new(config: LookupConfig, sink: LookupSink) -> Self {
        Self {
            config,
            sink,
            queries: HashMap::new(),
        }
    }

    /// The lookup configuration.
    #[must_use]
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// The completion sink lookups resolve into.
    #[must_use]
    pub fn sink(&self) -> &LookupSink {
        &self.sink
    }

    /// The visible query text for a geo field.
    #[must_use]
    pub fn text(&self, key: &str) -> &str {
        self.queries.get(key).map_or("", |q| q.text.as_str())
    }

    /// Replace a field's query text, restarting its debounce window.
    pub fn set_text(&mut self, key: &str, text: String) {
        let query = self.queries.entry(key.to_string()).or_default();
        query.text = text;
        query.idle_ticks = 0;
        query.pending = true;
    }

    /// Drop a field's query text and cancel its pending lookup.
    pub fn clear(&mut self, key: &str) {
        self.queries.remove(key);
    }

    /// Advance every debounce window by one tick, issuing lookups whose
    /// window has elapsed. Returns the number of lookups issued.
    pub fn tick(&mut self, engine: &mut FormEngine, resolver: &mut dyn LocationResolver) -> usize {
        let mut due: Vec<(String, String)> = Vec::new();
        for (key, query) in &mut self.queries {
            if !query.pending {
                continue;
            }
            query.idle_ticks = query.idle_ticks.saturating_add(1);
            if query.idle_ticks >= self.config.debounce_ticks {
                query.pending = false;
                if !query.text.is_empty() {
                    due.push((key.clone(), query.text.clone()));
                }
            }
        }
        self.issue(engine, resolver, due)
    }

    /// Bypass the debounce window and issue a field's lookup immediately,
    /// if it has a non-empty query.
    pub fn flush(
        &mut self,
        key: &str,
        engine: &mut FormEngine,
        resolver: &mut dyn LocationResolver,
    ) -> bool {
        let Some(query) = self.queries.get_mut(key) else {
            return false;
        };
        query.pending = false;
        if query.text.is_empty() {
            return false;
        }
        let text = query.text.clone();
        self.issue(engine, resolver, vec![(key.to_string(), text)]) > 0
    }

    /// A lookup resolved and was applied: clear the visible query unless
    /// configured to retain it.
    pub fn notify_applied(&mut self, keys: &[String]) {
        if self.config.keep_query {
            return;
        }
        for key in keys {
            if let Some(query) = self.queries.get_mut(key) {
                query.text.clear();
                query.pending = false;
            }
        }
    }

    fn issue(
        &mut self,
        engine: &mut FormEngine,
        resolver: &mut dyn LocationResolver,
        due: Vec<(String, String)>,
    ) -> usize {
        let mut issued = 0;
        for (key, text) in due {
            let token = engine.begin_lookup(&key);
            if token.is_none() {
                continue;
            }
            resolver.resolve(&text, LookupReply::new(key, token, self.sink.clone()));
            issued += 1;
        }
        issued
    }
}

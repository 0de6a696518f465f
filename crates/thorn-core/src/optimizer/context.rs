use std::any::Any;
use std::marker::PhantomData;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::OptimizationLevel;

/// Typed handle into the analysis cache. The string is the storage key; the
/// phantom parameter pins the cached value's type so lookups can downcast
/// without the caller naming the type twice.
pub struct AnalysisKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AnalysisKey<T> {
    pub const fn new(name: &'static str) -> Self {
        AnalysisKey {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Shared state for a single optimizer run. Analysis passes publish results
/// here; transformation passes read them. A context is never reused across
/// runs, so cached analyses cannot go stale.
pub struct OptimizationContext {
    level: OptimizationLevel,
    debug_mode: bool,
    validation_enabled: bool,
    analysis_cache: FxHashMap<&'static str, Box<dyn Any>>,
    enabled_passes: FxHashSet<String>,
    disabled_passes: FxHashSet<String>,
    pass_settings: FxHashMap<(String, String), String>,
}

impl OptimizationContext {
    pub fn new(level: OptimizationLevel) -> Self {
        OptimizationContext {
            level,
            debug_mode: false,
            validation_enabled: false,
            analysis_cache: FxHashMap::default(),
            enabled_passes: FxHashSet::default(),
            disabled_passes: FxHashSet::default(),
            pass_settings: FxHashMap::default(),
        }
    }

    pub fn level(&self) -> OptimizationLevel {
        self.level
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.debug_mode = enabled;
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    pub fn set_validation_enabled(&mut self, enabled: bool) {
        self.validation_enabled = enabled;
    }

    /// Store an analysis result under a typed key, replacing any previous
    /// value for that key.
    pub fn cache_analysis<T: 'static>(&mut self, key: &AnalysisKey<T>, value: T) {
        self.analysis_cache.insert(key.name, Box::new(value));
    }

    /// Fetch a cached analysis. Returns `None` when nothing is stored under
    /// the key or when the stored value has a different type; it never
    /// panics, so a dependent pass can degrade to a no-op.
    pub fn cached_analysis<T: 'static>(&self, key: &AnalysisKey<T>) -> Option<&T> {
        self.analysis_cache
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn has_analysis<T: 'static>(&self, key: &AnalysisKey<T>) -> bool {
        self.cached_analysis(key).is_some()
    }

    pub fn enable_pass(&mut self, name: &str) {
        self.disabled_passes.remove(name);
        self.enabled_passes.insert(name.to_string());
    }

    pub fn disable_pass(&mut self, name: &str) {
        self.enabled_passes.remove(name);
        self.disabled_passes.insert(name.to_string());
    }

    pub fn is_pass_disabled(&self, name: &str) -> bool {
        self.disabled_passes.contains(name)
    }

    pub fn is_pass_enabled(&self, name: &str) -> bool {
        self.enabled_passes.contains(name)
    }

    pub fn set_pass_setting(&mut self, pass: &str, key: &str, value: &str) {
        self.pass_settings
            .insert((pass.to_string(), key.to_string()), value.to_string());
    }

    pub fn pass_setting(&self, pass: &str, key: &str) -> Option<&str> {
        self.pass_settings
            .get(&(pass.to_string(), key.to_string()))
            .map(String::as_str)
    }

    pub fn pass_setting_or<'a>(&'a self, pass: &str, key: &str, default: &'a str) -> &'a str {
        self.pass_setting(pass, key).unwrap_or(default)
    }

    /// Integer setting lookup; unparsable or missing values fall back to the
    /// default instead of failing the run.
    pub fn pass_setting_int(&self, pass: &str, key: &str, default: i64) -> i64 {
        self.pass_setting(pass, key)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }
}

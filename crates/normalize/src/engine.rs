use crate::builtin::{self, builtin_presets};
use crate::error::NormalizeError;
use crate::options::HighlightOptions;
use crate::transform::{NormalizerSpec, NormalizerStep, Transform, TransformChain};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Preset registry plus memoized application of transform chains.
///
/// Cloning yields another handle to the same registry and cache. The cache is
/// unbounded; long-lived owners call [`clear_cache`](Self::clear_cache).
#[derive(Clone, Debug)]
pub struct NormalizationEngine {
    presets: Rc<RefCell<HashMap<Arc<str>, Vec<Transform>>>>,
    cache: Rc<RefCell<HashMap<String, String>>>,
}

impl NormalizationEngine {
    pub fn new() -> Self {
        let presets = builtin_presets()
            .into_iter()
            .map(|(name, steps)| (Arc::from(name), steps))
            .collect();
        Self {
            presets: Rc::new(RefCell::new(presets)),
            cache: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn has_preset(&self, name: &str) -> bool {
        self.presets.borrow().contains_key(name)
    }

    /// Registers `steps` under `name`. Preset names inside `steps` are expanded
    /// now, so later changes to those presets do not affect this one. Unknown
    /// names are dropped; nothing left to run is an error.
    ///
    /// Overwriting an existing preset is allowed and logged.
    pub fn register_preset(
        &self,
        name: &str,
        steps: Vec<NormalizerStep>,
    ) -> Result<(), NormalizeError> {
        let invalid = |reason: String| NormalizeError::InvalidPreset {
            name: name.to_string(),
            reason,
        };
        if steps.is_empty() {
            return Err(invalid("steps must not be empty".to_string()));
        }
        let mut transforms = Vec::new();
        {
            let presets = self.presets.borrow();
            for step in steps {
                match step {
                    NormalizerStep::Transform(t) => transforms.push(t),
                    NormalizerStep::Preset(preset) => match presets.get(&preset) {
                        Some(existing) => transforms.extend(existing.iter().cloned()),
                        None => log::warn!(
                            target: "normalize",
                            "preset '{name}': unknown preset '{preset}' dropped"
                        ),
                    },
                }
            }
        }
        if transforms.is_empty() {
            return Err(invalid("no registered preset or transform in steps".to_string()));
        }
        let replaced = self
            .presets
            .borrow_mut()
            .insert(Arc::from(name), transforms)
            .is_some();
        if replaced {
            log::warn!(target: "normalize", "preset '{name}' overwritten");
        }
        Ok(())
    }

    /// Resolves `spec` into an ordered chain. Unknown preset names are dropped.
    pub fn resolve(&self, spec: &NormalizerSpec) -> TransformChain {
        let presets = self.presets.borrow();
        let push_preset = |name: &str, transforms: &mut Vec<Transform>| match presets.get(name) {
            Some(steps) => transforms.extend(steps.iter().cloned()),
            None => log::debug!(target: "normalize", "unknown preset '{name}' ignored"),
        };
        let mut transforms = Vec::new();
        match spec {
            NormalizerSpec::Default => push_preset(builtin::DEFAULT, &mut transforms),
            NormalizerSpec::Preset(name) => push_preset(name, &mut transforms),
            NormalizerSpec::Transform(t) => transforms.push(t.clone()),
            NormalizerSpec::List(steps) => {
                for step in steps {
                    match step {
                        NormalizerStep::Preset(name) => push_preset(name, &mut transforms),
                        NormalizerStep::Transform(t) => transforms.push(t.clone()),
                    }
                }
            }
        }
        TransformChain::new(transforms)
    }

    /// Runs `chain` over `text`, memoized by `chain.key() + "::" + text`.
    pub fn apply(&self, text: &str, chain: &TransformChain) -> String {
        if chain.is_empty() {
            return text.to_string();
        }
        let key = format!("{}::{}", chain.key(), text);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return hit.clone();
        }
        let out = chain.run(text);
        self.cache.borrow_mut().insert(key, out.clone());
        out
    }

    pub fn normalize(&self, text: &str, spec: &NormalizerSpec) -> String {
        let chain = self.resolve(spec);
        self.apply(text, &chain)
    }

    /// Normalized, non-empty, de-duplicated query terms in query order.
    pub fn terms(&self, query: &str, options: &HighlightOptions) -> Vec<String> {
        let chain = self.resolve(&options.normalizers);
        let raw: Vec<&str> = if options.split_words {
            query.split_whitespace().collect()
        } else {
            vec![query.trim()]
        };
        let mut terms: Vec<String> = Vec::with_capacity(raw.len());
        for term in raw {
            let normalized = self.apply(term, &chain);
            if !normalized.is_empty() && !terms.contains(&normalized) {
                terms.push(normalized);
            }
        }
        terms
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl Default for NormalizationEngine {
    fn default() -> Self {
        Self::new()
    }
}

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type TransformFn = dyn Fn(&str) -> String + Send + Sync;

/// A named, pure `&str -> String` function.
///
/// The name takes part in memoization keys, so two transforms with different
/// behavior must not share a name.
#[derive(Clone)]
pub struct Transform {
    name: Arc<str>,
    func: Arc<TransformFn>,
}

static ANONYMOUS_IDS: AtomicU64 = AtomicU64::new(1);

impl Transform {
    pub fn new(name: &str, func: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// A transform with a generated, process-unique name.
    pub fn anonymous(func: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        let id = ANONYMOUS_IDS.fetch_add(1, Ordering::Relaxed);
        Self::new(&format!("anonymous#{id}"), func)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, text: &str) -> String {
        (self.func)(text)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transform").field(&self.name).finish()
    }
}

/// One entry of a normalizer list: a registered preset name or a transform.
#[derive(Clone, Debug)]
pub enum NormalizerStep {
    Preset(Arc<str>),
    Transform(Transform),
}

impl From<&str> for NormalizerStep {
    fn from(name: &str) -> Self {
        NormalizerStep::Preset(Arc::from(name))
    }
}

impl From<Transform> for NormalizerStep {
    fn from(transform: Transform) -> Self {
        NormalizerStep::Transform(transform)
    }
}

/// What a caller asks the engine to normalize with.
#[derive(Clone, Debug, Default)]
pub enum NormalizerSpec {
    /// The `default` preset.
    #[default]
    Default,
    Preset(Arc<str>),
    Transform(Transform),
    List(Vec<NormalizerStep>),
}

impl From<&str> for NormalizerSpec {
    fn from(name: &str) -> Self {
        NormalizerSpec::Preset(Arc::from(name))
    }
}

impl From<Transform> for NormalizerSpec {
    fn from(transform: Transform) -> Self {
        NormalizerSpec::Transform(transform)
    }
}

impl From<Vec<NormalizerStep>> for NormalizerSpec {
    fn from(steps: Vec<NormalizerStep>) -> Self {
        NormalizerSpec::List(steps)
    }
}

/// Ordered transforms resolved from a [`NormalizerSpec`].
#[derive(Clone, Debug, Default)]
pub struct TransformChain {
    transforms: Vec<Transform>,
    key: Arc<str>,
}

impl TransformChain {
    pub(crate) fn new(transforms: Vec<Transform>) -> Self {
        let key = transforms
            .iter()
            .map(Transform::name)
            .collect::<Vec<_>>()
            .join("|");
        Self {
            transforms,
            key: Arc::from(key),
        }
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Transform names joined; the prefix of memoization keys.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Runs every transform in order, bypassing the engine cache.
    pub fn run(&self, text: &str) -> String {
        let mut current = text.to_string();
        for transform in &self.transforms {
            current = transform.apply(&current);
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_transforms_get_distinct_names() {
        let a = Transform::anonymous(|s| s.to_string());
        let b = Transform::anonymous(|s| s.to_string());
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn chain_key_joins_names_in_order() {
        let chain = TransformChain::new(vec![
            Transform::new("a", |s| format!("{s}a")),
            Transform::new("b", |s| format!("{s}b")),
        ]);
        assert_eq!(chain.key(), "a|b");
        assert_eq!(chain.run("x"), "xab");
    }
}

// src/ops/mod.rs

//! Built-in operations and the registry mapping kind strings to them.
//!
//! Pipeline files name operations by kind (`op = "image.gaussian_blur"`);
//! the registry turns a kind into a fresh boxed [`Operation`].

pub mod geometry;
pub mod image;
pub mod pgm;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::ConfigurationError;
use crate::exec::Operation;

type Factory = Arc<dyn Fn() -> Box<dyn Operation> + Send + Sync>;

#[derive(Clone, Default)]
pub struct OperationRegistry {
    factories: BTreeMap<String, Factory>,
}

impl OperationRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in operation.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("image.synthetic", || Box::new(image::Synthetic));
        registry.register("image.load_pgm", || Box::new(image::LoadPgm));
        registry.register("image.gaussian_blur", || Box::new(image::GaussianBlur));
        registry.register("image.threshold", || Box::new(image::Threshold));
        registry.register("image.crop", || Box::new(image::Crop));
        registry.register("image.mean", || Box::new(image::Mean));
        registry.register("geometry.point", || Box::new(geometry::MakePoint));
        registry.register("geometry.line", || Box::new(geometry::MakeLine));
        registry.register("geometry.circle", || Box::new(geometry::MakeCircle));
        registry.register("geometry.intersect_lines", || {
            Box::new(geometry::IntersectLines)
        });
        registry.register("geometry.point_in_rect", || Box::new(geometry::PointInRect));
        registry.register("geometry.point_in_circle", || {
            Box::new(geometry::PointInCircle)
        });
        registry
    }

    /// Add or replace the factory for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Operation> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn create(&self, kind: &str) -> Result<Box<dyn Operation>, ConfigurationError> {
        self.factories
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| ConfigurationError::UnknownOperation(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_kinds_match_operation_names() {
        let registry = OperationRegistry::builtin();
        assert_eq!(registry.kinds().count(), 12);
        for kind in registry.kinds() {
            assert_eq!(registry.create(kind).unwrap().name(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_a_configuration_error() {
        let registry = OperationRegistry::builtin();
        assert!(matches!(
            registry.create("image.sharpen"),
            Err(ConfigurationError::UnknownOperation(kind)) if kind == "image.sharpen"
        ));
    }
}

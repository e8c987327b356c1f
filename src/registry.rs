use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{MetricError, Result};
use crate::exposition::{Sample, SampleSource};
use crate::family::{ChildMetric, FamilyCollector, ShardedFamily};

/// Backend state shared by every meter of one provider: the registry that
/// collectors register with, the sanitized series names already in use,
/// and the sources feeding the merged sample sequence.
pub(crate) struct SharedRegistry {
    registry: prometheus::Registry,
    default_buckets: Vec<f64>,
    reserved_names: Mutex<HashSet<String>>,
    sources: Mutex<Vec<Arc<dyn SampleSource>>>,
}

impl SharedRegistry {
    pub(crate) fn new(registry: prometheus::Registry, default_buckets: Vec<f64>) -> Self {
        SharedRegistry {
            registry,
            default_buckets,
            reserved_names: Mutex::new(HashSet::new()),
            sources: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn registry(&self) -> &prometheus::Registry {
        &self.registry
    }

    pub(crate) fn default_buckets(&self) -> &[f64] {
        &self.default_buckets
    }

    /// Claims every series name a family will occupy, atomically: either
    /// all names were free and are now reserved, or nothing changed and
    /// the first name already taken is reported. Distinct raw instrument
    /// names can sanitize to the same series name, and a suffixed name
    /// (`_total`, `_bucket`, ...) of one kind can collide with the plain
    /// name of another; both fail here instead of silently sharing or
    /// shadowing storage.
    pub(crate) fn reserve(&self, names: &[String]) -> Result<()> {
        let mut reserved = self.reserved_names.lock()?;
        for name in names {
            if reserved.contains(name) {
                return Err(MetricError::NameConflict(name.clone()));
            }
        }
        for name in names {
            reserved.insert(name.clone());
        }
        Ok(())
    }

    /// Returns previously reserved names to the pool, used when a family
    /// fails backend registration after its names were claimed.
    pub(crate) fn release(&self, names: &[String]) {
        if let Ok(mut reserved) = self.reserved_names.lock() {
            for name in names {
                reserved.remove(name);
            }
        }
    }

    /// Installs a family as a registry collector and as a source for the
    /// merged sample sequence.
    pub(crate) fn install<C: ChildMetric>(&self, family: Arc<ShardedFamily<C>>) -> Result<()> {
        self.registry
            .register(Box::new(FamilyCollector(family.clone())))?;
        self.sources.lock()?.push(family);
        Ok(())
    }

    /// Merged samples across every installed family, one family at a time
    /// in installation order.
    pub(crate) fn samples(&self) -> impl Iterator<Item = Sample> + Send {
        let sources: Vec<Arc<dyn SampleSource>> = match self.sources.lock() {
            Ok(sources) => sources.clone(),
            Err(_) => {
                tracing::error!(
                    name: "SampleSourcesPoisoned",
                    "sample source list lock poisoned, returning an empty sequence"
                );
                Vec::new()
            }
        };
        sources.into_iter().flat_map(|source| source.samples())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn second_reservation_of_a_name_conflicts() {
        let shared = SharedRegistry::new(prometheus::Registry::new(), Vec::new());
        shared.reserve(&names(&["a_b"])).unwrap();
        let err = shared.reserve(&names(&["a_b"])).unwrap_err();
        assert!(matches!(err, MetricError::NameConflict(name) if name == "a_b"));
        shared.reserve(&names(&["a_c"])).unwrap();
    }

    #[test]
    fn reservation_is_all_or_nothing() {
        let shared = SharedRegistry::new(prometheus::Registry::new(), Vec::new());
        shared.reserve(&names(&["foo", "foo_total"])).unwrap();

        // a partial overlap claims nothing
        let err = shared.reserve(&names(&["bar", "foo_total"])).unwrap_err();
        assert!(matches!(err, MetricError::NameConflict(name) if name == "foo_total"));
        shared.reserve(&names(&["bar"])).unwrap();

        // released names become claimable again
        shared.release(&names(&["foo", "foo_total"]));
        shared.reserve(&names(&["foo_total"])).unwrap();
    }
}

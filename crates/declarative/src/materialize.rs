//! Materialization: catalog resources to concrete provider instances

use crate::error::{Error, Result};
use crate::registry::{ProviderRegistry, ResourceSpec};
use crate::resource::BoxedResource;
use catalog::{Catalog, EdgeKind, ResourceKey};
use log::{debug, warn};
use std::collections::HashMap;

/// One leaf resource of the catalog, ready for ordering
#[derive(Debug)]
pub struct MaterializedResource {
    pub key: ResourceKey,
    /// Position in declaration order; also the tie-breaker when ordering
    pub index: usize,
    /// The provider instance, or why it could not be built
    pub instance: std::result::Result<BoxedResource, String>,
    pub noop: bool,
    /// Indices of resources that must be evaluated first
    pub prerequisites: Vec<usize>,
    /// Indices of resources to refresh when this one changes
    pub notify: Vec<usize>,
}

/// Build provider instances for every leaf resource of `catalog`.
///
/// A missing provider or parameters the provider rejects are fatal. A resource
/// that still holds a deferred value is materialized with an error instance and
/// reported as failed during enforcement.
pub fn materialize(catalog: &Catalog, registry: &ProviderRegistry) -> Result<Vec<MaterializedResource>> {
    let mut table = Vec::new();
    let mut positions: HashMap<&ResourceKey, usize> = HashMap::new();

    for resource in catalog.resources().iter().filter(|r| !r.is_container()) {
        let key = &resource.key;
        let provider = registry
            .get(&key.type_name)
            .ok_or_else(|| Error::UnknownResourceType {
                type_name: key.type_name.clone(),
                resource: key.to_string(),
            })?;

        let deferred = resource
            .parameters
            .iter()
            .find(|(_, value)| value.contains_deferred())
            .map(|(name, _)| name);

        let instance = match deferred {
            Some(name) => {
                let message = format!("parameter '{name}' could not be resolved");
                warn!("{key}: {message}");
                Err(message)
            }
            None => {
                let spec = ResourceSpec::new(&key.title, resource.parameters.clone());
                let instance = provider
                    .instantiate(&spec)
                    .map_err(|e| Error::InvalidParameter {
                        resource: key.to_string(),
                        message: format!("{e:#}"),
                    })?;
                Ok(instance)
            }
        };

        positions.insert(key, table.len());
        table.push(MaterializedResource {
            key: key.clone(),
            index: table.len(),
            instance,
            noop: resource.noop,
            prerequisites: Vec::new(),
            notify: Vec::new(),
        });
    }

    for edge in catalog.edges() {
        if edge.kind == EdgeKind::Contains {
            continue;
        }
        let sources = catalog.leaves_of(&edge.source);
        let targets = catalog.leaves_of(&edge.target);
        if sources.is_empty() || targets.is_empty() {
            debug!(
                "Dropping relationship {} -> {}: no resources on one side",
                edge.source, edge.target
            );
            continue;
        }
        for source in &sources {
            for target in &targets {
                let (Some(&from), Some(&to)) = (positions.get(source), positions.get(target)) else {
                    continue;
                };
                push_unique(&mut table[to].prerequisites, from);
                if edge.kind == EdgeKind::Notify {
                    push_unique(&mut table[from].notify, to);
                }
            }
        }
    }

    debug!("Materialized {} resource(s)", table.len());
    Ok(table)
}

fn push_unique(list: &mut Vec<usize>, index: usize) {
    if !list.contains(&index) {
        list.push(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::registry::Provider;
    use crate::resource::Resource;
    use crate::types::{ApplyResult, ResourceState};
    use catalog::{AbstractResource, Deferred, Edge, Value};
    use std::collections::BTreeMap;

    #[derive(Debug)]
    struct Stub(String);

    impl Resource for Stub {
        fn id(&self) -> String {
            self.0.clone()
        }
        fn description(&self) -> String {
            format!("stub {}", self.0)
        }
        fn resource_type(&self) -> &'static str {
            "stub"
        }
        fn current_state(&self) -> anyhow::Result<ResourceState> {
            Ok(ResourceState::Absent)
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Absent
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> anyhow::Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }
    }

    struct StubProvider;

    impl Provider for StubProvider {
        fn resource_type(&self) -> &'static str {
            "stub"
        }
        fn instantiate(&self, spec: &ResourceSpec) -> anyhow::Result<BoxedResource> {
            spec.check_known(&["value"])?;
            Ok(Box::new(Stub(spec.title.clone())))
        }
    }

    fn key(title: &str) -> ResourceKey {
        ResourceKey::new("stub", title)
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(StubProvider);
        registry
    }

    fn add(catalog: &mut Catalog, k: ResourceKey, parameters: BTreeMap<String, Value>) {
        catalog
            .add_resource(AbstractResource::new(k.clone(), parameters))
            .unwrap();
        catalog.add_edge(Edge::new(ResourceKey::new("class", "main"), k, EdgeKind::Contains));
    }

    fn base() -> Catalog {
        let mut catalog = Catalog::new("n");
        catalog
            .add_resource(AbstractResource::new(ResourceKey::new("class", "main"), BTreeMap::new()))
            .unwrap();
        catalog
    }

    #[test]
    fn test_unknown_type_is_fatal() {
        let mut catalog = base();
        add(&mut catalog, ResourceKey::new("package", "vim"), BTreeMap::new());
        let err = materialize(&catalog, &registry()).unwrap_err();
        assert!(matches!(err, Error::UnknownResourceType { ref type_name, .. } if type_name == "package"));
    }

    #[test]
    fn test_rejected_parameters_are_fatal() {
        let mut catalog = base();
        add(&mut catalog, key("good"), BTreeMap::new());
        add(
            &mut catalog,
            key("bad"),
            BTreeMap::from([("nope".to_string(), Value::from("x"))]),
        );
        let err = materialize(&catalog, &registry()).unwrap_err();
        match err {
            Error::InvalidParameter { resource, message } => {
                assert_eq!(resource, "Stub[bad]");
                assert!(message.contains("nope"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unresolved_deferred_values_are_captured_per_resource() {
        let mut catalog = base();
        add(&mut catalog, key("good"), BTreeMap::new());
        add(
            &mut catalog,
            key("deferred"),
            BTreeMap::from([(
                "value".to_string(),
                Value::Deferred(Deferred {
                    function: "fact".into(),
                    arguments: vec![],
                }),
            )]),
        );

        let table = materialize(&catalog, &registry()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table[0].instance.is_ok());
        assert!(table[1].instance.as_ref().unwrap_err().contains("value"));
        assert_eq!(table[1].index, 1);
    }

    #[test]
    fn test_edges_expand_through_containers() {
        let mut catalog = base();
        add(&mut catalog, key("first"), BTreeMap::new());
        let class = ResourceKey::new("class", "app");
        catalog
            .add_resource(AbstractResource::new(class.clone(), BTreeMap::new()))
            .unwrap();
        for title in ["a", "b"] {
            catalog
                .add_resource(AbstractResource::new(key(title), BTreeMap::new()))
                .unwrap();
            catalog.add_edge(Edge::new(class.clone(), key(title), EdgeKind::Contains));
        }
        let empty = ResourceKey::new("class", "empty");
        catalog
            .add_resource(AbstractResource::new(empty.clone(), BTreeMap::new()))
            .unwrap();

        catalog.add_edge(Edge::new(key("first"), class.clone(), EdgeKind::Notify));
        catalog.add_edge(Edge::new(empty, key("first"), EdgeKind::Before));

        let table = materialize(&catalog, &registry()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].key, key("first"));
        assert_eq!(table[0].notify, vec![1, 2]);
        assert!(table[0].prerequisites.is_empty());
        assert_eq!(table[1].prerequisites, vec![0]);
        assert_eq!(table[2].prerequisites, vec![0]);
    }
}

use crate::graph::{tarjan_scc, DependencyGraph};
use model::{DeferredFieldSpec, Schema, TierPlan};
use tracing::debug;

/// Computes a [`TierPlan`] for `entity_order` against `schema`, per spec
/// §4.6: build the dependency graph, collapse cycles into defer clusters,
/// topologically order the condensation graph, and mark every
/// intra-cluster lookup as deferred.
pub fn plan_tiers(schema: &Schema, entity_order: &[String]) -> TierPlan {
    let graph = DependencyGraph::from_schema(schema, entity_order);
    let components = tarjan_scc(&graph);

    let mut tiers = Vec::with_capacity(components.len());
    let mut deferred_fields = Vec::new();

    for component in &components {
        tiers.push(restore_original_case(schema, component));

        let is_defer_cluster = component.len() > 1 || graph.has_self_loop(&component[0]);
        if !is_defer_cluster {
            continue;
        }

        for member in component {
            let Some(entity) = schema.get(member) else {
                continue;
            };
            for field in entity.lookup_fields() {
                let targets_cluster = field
                    .lookup_targets
                    .iter()
                    .any(|t| component.contains(&t.to_ascii_lowercase()));
                if targets_cluster {
                    deferred_fields.push(DeferredFieldSpec {
                        entity: entity.logical_name.clone(),
                        field_name: field.name.clone(),
                    });
                }
            }
        }
    }

    debug!(tier_count = tiers.len(), deferred_count = deferred_fields.len(), "computed tier plan");
    TierPlan { tiers, deferred_fields }
}

fn restore_original_case(schema: &Schema, lowercased: &[String]) -> Vec<String> {
    lowercased
        .iter()
        .filter_map(|name| schema.get(name).map(|e| e.logical_name.clone()))
        .collect()
}

//! Dependency graph construction and Tarjan's strongly-connected-components
//! algorithm (spec §4.6 steps 1–2). No corpus file implements graph SCC
//! analysis, so this module is textbook Tarjan rather than adapted from an
//! example — see `DESIGN.md`.

use model::Schema;
use std::collections::HashMap;

/// Adjacency list keyed by entity logical name (lower-cased for
/// case-insensitive lookups, per [`Schema`]'s own uniqueness rule).
pub struct DependencyGraph {
    /// Preserves the caller's input order; `tarjan_scc` tie-breaks by it.
    pub nodes: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Builds `A -> B` for every lookup field on `A` whose target `B` is
    /// also in the schema. Lookups targeting entities outside the schema
    /// set are ignored (spec §4.6 step 1: treated as external references).
    pub fn from_schema(schema: &Schema, entity_order: &[String]) -> Self {
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut nodes = Vec::new();

        for name in entity_order {
            let Some(entity) = schema.get(name) else {
                continue;
            };
            let key = entity.logical_name.to_ascii_lowercase();
            nodes.push(key.clone());

            let mut targets = Vec::new();
            for field in entity.lookup_fields() {
                for target in &field.lookup_targets {
                    if schema.contains(target) {
                        let target_key = target.to_ascii_lowercase();
                        if !targets.contains(&target_key) {
                            targets.push(target_key);
                        }
                    }
                }
            }
            edges.insert(key, targets);
        }

        Self { nodes, edges }
    }

    pub fn neighbors(&self, node: &str) -> &[String] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_self_loop(&self, node: &str) -> bool {
        self.neighbors(node).iter().any(|n| n == node)
    }
}

struct TarjanState<'a> {
    graph: &'a DependencyGraph,
    index_counter: usize,
    stack: Vec<String>,
    on_stack: HashMap<String, bool>,
    indices: HashMap<String, usize>,
    low_links: HashMap<String, usize>,
    components: Vec<Vec<String>>,
}

/// Returns strongly connected components in reverse-topological order (the
/// order Tarjan naturally produces them: a component is only finished
/// after everything it depends on), each internally ordered by
/// `graph.nodes` for a stable tie-break (spec §4.6 "Tie-break").
pub fn tarjan_scc(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut state = TarjanState {
        graph,
        index_counter: 0,
        stack: Vec::new(),
        on_stack: HashMap::new(),
        indices: HashMap::new(),
        low_links: HashMap::new(),
        components: Vec::new(),
    };

    for node in &graph.nodes {
        if !state.indices.contains_key(node) {
            strongconnect(&mut state, node);
        }
    }

    for component in state.components.iter_mut() {
        component.sort_by_key(|n| graph.nodes.iter().position(|x| x == n).unwrap_or(usize::MAX));
    }
    state.components
}

fn strongconnect(state: &mut TarjanState, v: &str) {
    state.indices.insert(v.to_string(), state.index_counter);
    state.low_links.insert(v.to_string(), state.index_counter);
    state.index_counter += 1;
    state.stack.push(v.to_string());
    state.on_stack.insert(v.to_string(), true);

    let neighbors = state.graph.neighbors(v).to_vec();
    for w in &neighbors {
        if !state.indices.contains_key(w) {
            strongconnect(state, w);
            let w_low = state.low_links[w];
            let v_low = state.low_links[v];
            state.low_links.insert(v.to_string(), v_low.min(w_low));
        } else if *state.on_stack.get(w).unwrap_or(&false) {
            let w_index = state.indices[w];
            let v_low = state.low_links[v];
            state.low_links.insert(v.to_string(), v_low.min(w_index));
        }
    }

    if state.low_links[v] == state.indices[v] {
        let mut component = Vec::new();
        loop {
            let w = state.stack.pop().expect("tarjan stack underflow");
            state.on_stack.insert(w.clone(), false);
            let is_v = w == v;
            component.push(w);
            if is_v {
                break;
            }
        }
        state.components.push(component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{DataType, EntitySchema, FieldSchema};

    fn schema_with_self_reference() -> Schema {
        let mut schema = Schema::new();
        let mut account = EntitySchema::new("account");
        account.fields.push(FieldSchema::new("accountid", DataType::Id));
        let mut parent = FieldSchema::new("parentaccountid", DataType::Lookup);
        parent.lookup_targets = vec!["account".to_string()];
        account.fields.push(parent);
        schema.insert(account).unwrap();
        schema
    }

    #[test]
    fn self_reference_is_its_own_component() {
        let order = vec!["account".to_string()];
        let schema = schema_with_self_reference();
        let graph = DependencyGraph::from_schema(&schema, &order);
        assert!(graph.has_self_loop("account"));
        let sccs = tarjan_scc(&graph);
        assert_eq!(sccs, vec![vec!["account".to_string()]]);
    }

    #[test]
    fn mutual_cycle_collapses_into_one_component() {
        let mut schema = Schema::new();
        let mut a = EntitySchema::new("a");
        a.fields.push(FieldSchema::new("aid", DataType::Id));
        let mut a_to_b = FieldSchema::new("bid", DataType::Lookup);
        a_to_b.lookup_targets = vec!["b".to_string()];
        a.fields.push(a_to_b);
        schema.insert(a).unwrap();

        let mut b = EntitySchema::new("b");
        b.fields.push(FieldSchema::new("bid", DataType::Id));
        let mut b_to_a = FieldSchema::new("aid", DataType::Lookup);
        b_to_a.lookup_targets = vec!["a".to_string()];
        b.fields.push(b_to_a);
        schema.insert(b).unwrap();

        let order = vec!["a".to_string(), "b".to_string()];
        let graph = DependencyGraph::from_schema(&schema, &order);
        let sccs = tarjan_scc(&graph);
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].len(), 2);
    }

    #[test]
    fn linear_chain_yields_three_components() {
        let mut schema = Schema::new();
        for (name, target) in [("a", Some("b")), ("b", Some("c")), ("c", None)] {
            let mut entity = EntitySchema::new(name);
            entity.fields.push(FieldSchema::new(format!("{name}id"), DataType::Id));
            if let Some(target) = target {
                let mut lookup = FieldSchema::new("targetid", DataType::Lookup);
                lookup.lookup_targets = vec![target.to_string()];
                entity.fields.push(lookup);
            }
            schema.insert(entity).unwrap();
        }
        let order = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let graph = DependencyGraph::from_schema(&schema, &order);
        let sccs = tarjan_scc(&graph);
        assert_eq!(sccs.len(), 3);
    }
}

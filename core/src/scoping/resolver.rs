//! One-time scope resolution and the request-time learning path.

use crate::dependencies::{Dependency, SupplierRef};
use crate::errors::{Result, ScopeError};
use crate::scoping::node::{ContextDefinition, ContextEntry, NodeId};
use crate::scoping::tree::ScopeProviderTree;
use parking_lot::MutexGuard;
use std::collections::{HashMap, HashSet};

/// Summary of a [`ScopeProviderTree::resolve_data_scopes`] pass.
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    /// Entries kept after pruning, across all nodes.
    pub resolved: usize,
    /// Entries removed because an ancestor already resolves them.
    pub pruned: usize,
    /// Claimed dependencies no supplier could satisfy.
    pub unresolved: Vec<(NodeId, Dependency)>,
    /// Consumer dependencies no declared scope claims.
    pub unclaimed: Vec<(NodeId, Dependency)>,
    /// Supplies declared before a supply they must run after.
    pub ordering_warnings: Vec<String>,
}

#[derive(Default)]
struct Claims {
    declared: Vec<Dependency>,
    learned: Vec<Dependency>,
}

impl Claims {
    fn claim(&mut self, dependency: &Dependency) {
        if !self.declared.contains(dependency) {
            self.declared.push(dependency.clone());
        }
    }
}

impl ScopeProviderTree {
    /// **RESOLVE DATA SCOPES**
    ///
    /// **STEP 1**: Route each node's supplies and consumers to the node responsible for them.
    /// **STEP 2**: Resolve each claimed dependency to a supplier, parent before children.
    /// **STEP 3**: Prune entries an ancestor already resolves.
    /// **STEP 4**: Publish every definition.
    ///
    /// Definitions are staged and only written once every node resolved, so a failed pass
    /// leaves the previous definitions in place. Re-running over an unchanged tree yields
    /// the same definitions. Entries learned by the missing-dependency path are kept and
    /// re-resolved after the declared ones.
    pub fn resolve_data_scopes(&self) -> Result<ResolutionReport> {
        let timeout = self.config().lock_timeout();
        let _learning = self.lock_learning()?;
        let order = self.pre_order();
        let mut report = ResolutionReport::default();
        let mut claims: HashMap<NodeId, Claims> = HashMap::new();

        for &id in &order {
            let node = self.node(id)?;
            let learned: Vec<Dependency> = node
                .read_definition(timeout)?
                .entries()
                .iter()
                .filter(|entry| entry.learned)
                .map(|entry| entry.dependency.clone())
                .collect();
            let own = claims.entry(id).or_default();
            own.learned = learned;
            for dependency in node.rules().supplies() {
                own.claim(dependency);
            }
            for dependency in node.rules().consumers() {
                match self.claiming_node(id, dependency) {
                    Some(owner) => claims.entry(owner).or_default().claim(dependency),
                    None => {
                        log::warn!(
                            "No scope claims {} consumed by {} ({})",
                            dependency,
                            id,
                            node.name()
                        );
                        report.unclaimed.push((id, dependency.clone()));
                    }
                }
            }
        }

        let mut staged: HashMap<NodeId, ContextDefinition> = HashMap::new();
        for &id in &order {
            let node_claims = claims.remove(&id).unwrap_or_default();
            let mut definition = ContextDefinition::default();
            let declared = node_claims.declared.into_iter().map(|dep| (dep, false));
            let learned = node_claims.learned.into_iter().map(|dep| (dep, true));
            for (dependency, was_learned) in declared.chain(learned) {
                if definition.contains(&dependency) {
                    continue;
                }
                let Some(supplier) = self.find_supplier_for(id, &dependency) else {
                    if self.config().strict_resolution {
                        return Err(ScopeError::UnresolvedDependency {
                            node: id.value(),
                            dependency: dependency.to_string(),
                        });
                    }
                    log::warn!("No supplier for {} claimed by {}", dependency, id);
                    report.unresolved.push((id, dependency));
                    continue;
                };
                let entry = build_entry(supplier, dependency, &definition, was_learned)?;
                definition.push(entry);
            }
            report
                .ordering_warnings
                .extend(check_declaration_order(id, &definition));
            staged.insert(id, definition);
        }

        // Parents precede children in `order`, so ancestors are already pruned.
        for &id in &order {
            let inherited: HashSet<Dependency> = self
                .ancestors(id)
                .iter()
                .filter_map(|ancestor| staged.get(ancestor))
                .flat_map(ContextDefinition::dependencies)
                .collect();
            if let Some(definition) = staged.get_mut(&id) {
                report.pruned += definition.remove_where(|dep| inherited.contains(dep));
                report.resolved += definition.len();
            }
        }

        let mut guards = Vec::with_capacity(order.len());
        for &id in &order {
            guards.push((id, self.node(id)?.write_definition(timeout)?));
        }
        for (id, mut guard) in guards {
            if let Some(definition) = staged.remove(&id) {
                *guard = definition;
            }
        }

        self.mark_resolved();
        log::debug!(
            "Resolved scope tree: {} entries, {} pruned, {} unresolved",
            report.resolved,
            report.pruned,
            report.unresolved.len()
        );
        Ok(report)
    }

    fn lock_learning(&self) -> Result<MutexGuard<'_, ()>> {
        self.learning
            .try_lock_for(self.config().lock_timeout())
            .ok_or_else(|| ScopeError::LockTimeout {
                resource: "scope tree learning lock".to_string(),
                timeout_ms: self.config().lock_timeout_ms,
            })
    }

    /// Append `dependency` to `id`'s definition unless it or an ancestor already resolves
    /// it. Returns the node holding the entry and the entry itself.
    ///
    /// Learning is serialized tree-wide by the learning lock, which also excludes a
    /// concurrent resolution pass. Concurrent callers for the same dependency all get the
    /// single stored entry. Matching entries in descendants are removed afterwards.
    pub(crate) fn learn(
        &self,
        id: NodeId,
        supplier: SupplierRef,
        dependency: &Dependency,
    ) -> Result<(NodeId, ContextEntry)> {
        let timeout = self.config().lock_timeout();
        let _learning = self.lock_learning()?;

        for holder in std::iter::once(id).chain(self.ancestors(id)) {
            let definition = self.node(holder)?.read_definition(timeout)?;
            if let Some(entry) = definition.find(dependency) {
                return Ok((holder, entry.clone()));
            }
        }

        // Only learning appends, so the snapshot stays current until the push below.
        let snapshot = self.node(id)?.read_definition(timeout)?.clone();
        let entry = build_entry(supplier, dependency.clone(), &snapshot, true)?;
        self.node(id)?.write_definition(timeout)?.push(entry.clone());
        log::info!(
            "Learned {} on {} from supplier {}",
            dependency,
            id,
            entry.supplier.name()
        );

        for descendant in self.descendants(id) {
            let removed = self
                .node(descendant)?
                .write_definition(timeout)?
                .remove_where(|dep| dep == dependency);
            if removed > 0 {
                log::debug!("Pruned {} from {} after learning", dependency, descendant);
            }
        }
        Ok((id, entry))
    }
}

fn build_entry(
    supplier: SupplierRef,
    dependency: Dependency,
    definition: &ContextDefinition,
    learned: bool,
) -> Result<ContextEntry> {
    let prior = definition.supplies();
    let supply = supplier.get_supply(&dependency, &prior)?;
    Ok(ContextEntry {
        supplier,
        dependency,
        supply,
        learned,
    })
}

fn check_declaration_order(id: NodeId, definition: &ContextDefinition) -> Vec<String> {
    let mut warnings = Vec::new();
    for (index, entry) in definition.entries().iter().enumerate() {
        for required in entry.supply.run_after() {
            if let Some(position) = definition.position(required) {
                if position > index {
                    let warning = format!(
                        "{}: {} is declared before {} but must run after it",
                        id, entry.dependency, required
                    );
                    log::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }
    }
    warnings
}

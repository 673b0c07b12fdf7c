// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Admission-time conflict detection.
//!
//! A changing fragment is checked against every node its selector matches.
//! For each such node, the sibling fragments that also match it are collected
//! and handed, together with the changing fragment, to the semantic validator.

use std::sync::Arc;

use k8s_intf::RoutingConfiguration;
use kube::ResourceExt;
use selector::{Matcher, SelectorCache};
use tracing::{debug, info, warn};

use crate::errors::ValidationError;
use crate::inventory::Inventory;
use crate::semantic::SemanticValidator;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// The fragments that apply to one node: matching siblings ordered by
/// (namespace, name), followed by the fragment under validation.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeFragmentSet {
    pub node: String,
    pub fragments: Vec<RoutingConfiguration>,
}

fn identity(fragment: &RoutingConfiguration) -> (String, String) {
    (fragment.namespace().unwrap_or_default(), fragment.name_any())
}

fn display_id(fragment: &RoutingConfiguration) -> String {
    let (namespace, name) = identity(fragment);
    format!("{namespace}/{name}")
}

pub struct ConflictValidator<I, S> {
    inventory: I,
    semantic: S,
    cache: Arc<SelectorCache>,
}

impl<I: Inventory, S: SemanticValidator> ConflictValidator<I, S> {
    pub fn new(inventory: I, semantic: S, cache: Arc<SelectorCache>) -> Self {
        Self {
            inventory,
            semantic,
            cache,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &SelectorCache {
        &self.cache
    }

    /// Compute, for every node matched by `fragment`, the set of fragments
    /// that would apply to it. Nodes are returned in name order.
    pub async fn affected_nodes(
        &self,
        fragment: &RoutingConfiguration,
    ) -> Result<Vec<NodeFragmentSet>, ValidationError> {
        let matcher = self
            .cache
            .get_or_parse(fragment.spec.node_selector.as_ref())
            .map_err(|source| ValidationError::InvalidSelector {
                fragment: display_id(fragment),
                source,
            })?;

        let mut nodes = self.inventory.nodes().await?;
        let mut fragments = self.inventory.fragments().await?;

        nodes.sort_by(|a, b| a.name.cmp(&b.name));

        let own = identity(fragment);
        fragments.retain(|f| identity(f) != own);
        fragments.sort_by_cached_key(identity);

        let siblings: Vec<(RoutingConfiguration, Arc<Matcher>)> = fragments
            .into_iter()
            .filter_map(
                |sibling| match self.cache.get_or_parse(sibling.spec.node_selector.as_ref()) {
                    Ok(m) => Some((sibling, m)),
                    Err(e) => {
                        warn!(
                            "Ignoring {}: invalid node selector: {e}",
                            display_id(&sibling)
                        );
                        None
                    }
                },
            )
            .collect();

        let sets = nodes
            .iter()
            .filter(|node| matcher.matches(&node.labels))
            .map(|node| {
                let mut set: Vec<RoutingConfiguration> = siblings
                    .iter()
                    .filter(|(_, m)| m.matches(&node.labels))
                    .map(|(sibling, _)| sibling.clone())
                    .collect();
                set.push(fragment.clone());
                NodeFragmentSet {
                    node: node.name.clone(),
                    fragments: set,
                }
            })
            .collect();
        Ok(sets)
    }

    /// Validate a change to `fragment`. Deletions are always accepted.
    pub async fn validate(
        &self,
        fragment: &RoutingConfiguration,
        operation: Operation,
    ) -> Result<(), ValidationError> {
        let id = display_id(fragment);
        if operation == Operation::Delete {
            debug!("Accepting deletion of {id}");
            return Ok(());
        }

        let sets = self.affected_nodes(fragment).await?;
        debug!("{id} ({operation:?}) applies to {} nodes", sets.len());

        for set in &sets {
            self.semantic.validate(&set.fragments).map_err(|source| {
                info!("Rejecting {id}: conflict on node {}: {source}", set.node);
                ValidationError::SemanticConflict {
                    node: set.node.clone(),
                    source,
                }
            })?;
        }
        Ok(())
    }
}

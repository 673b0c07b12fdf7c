// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::sync::Arc;

use k8s_intf::RoutingConfiguration;

use crate::errors::SemanticError;

/// Checks that a set of fragments applicable to the same node can be combined.
pub trait SemanticValidator: Send + Sync {
    fn validate(&self, fragments: &[RoutingConfiguration]) -> Result<(), SemanticError>;
}

impl<T: SemanticValidator + ?Sized> SemanticValidator for Arc<T> {
    fn validate(&self, fragments: &[RoutingConfiguration]) -> Result<(), SemanticError> {
        (**self).validate(fragments)
    }
}

/// Validates fragments by composing them into a node routing config
#[derive(Clone, Copy, Debug, Default)]
pub struct RouterConfigValidator;

impl SemanticValidator for RouterConfigValidator {
    fn validate(&self, fragments: &[RoutingConfiguration]) -> Result<(), SemanticError> {
        config::compose(fragments)?;
        Ok(())
    }
}

//! Replica topology checks.
//!
//! Decides whether a database host is a read replica of the master host by
//! asking the instance inventory. Anything short of a positive answer is
//! treated as "not a replica".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Failure to query the instance inventory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("inventory lookup failed: {reason}")]
pub struct InventoryError {
    /// Why the lookup failed.
    pub reason: String,
}

/// What the inventory knows about one database instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    /// Instance identifier, the first label of its endpoint host.
    pub identifier: String,
    /// Identifier of the instance this one replicates from, if it is a replica.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_replica_source: Option<String>,
}

/// Looks up database instances by identifier.
pub trait InstanceInventory {
    /// Describes an instance, or `None` if no such instance exists.
    fn describe_instance(
        &self,
        identifier: &str,
    ) -> Result<Option<InstanceDescription>, InventoryError>;
}

impl<T: InstanceInventory + ?Sized> InstanceInventory for &T {
    fn describe_instance(
        &self,
        identifier: &str,
    ) -> Result<Option<InstanceDescription>, InventoryError> {
        (**self).describe_instance(identifier)
    }
}

/// Instance identifier of an endpoint host: everything before the first `.`.
#[must_use]
pub fn instance_identifier(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

/// Answers "is this host a read replica of that one?".
#[derive(Debug, Clone)]
pub struct ReplicaTopologyChecker<I> {
    inventory: I,
}

impl<I: InstanceInventory> ReplicaTopologyChecker<I> {
    /// Creates a checker over an inventory.
    pub fn new(inventory: I) -> Self {
        Self { inventory }
    }

    /// Whether `candidate_host` replicates from `master_host`.
    ///
    /// Fails closed: a lookup error or a missing instance yields `false`.
    pub fn is_replica_of(&self, candidate_host: &str, master_host: &str) -> bool {
        let candidate_id = instance_identifier(candidate_host);
        let master_id = instance_identifier(master_host);

        let instance = match self.inventory.describe_instance(candidate_id) {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                info!(
                    instance = candidate_id,
                    "cannot verify replica status: no instance found"
                );
                return false;
            }
            Err(e) => {
                warn!(
                    instance = candidate_id,
                    error = %e,
                    "error while verifying replica status"
                );
                return false;
            }
        };

        instance.read_replica_source.as_deref() == Some(master_id)
    }
}

/// A fixed inventory, optionally forced to fail every lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticInventory {
    /// Known instances keyed by identifier.
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceDescription>,
    /// When set, every lookup fails with this reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl StaticInventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instance, optionally as a replica of `source`.
    #[must_use]
    pub fn with_instance(mut self, identifier: &str, source: Option<&str>) -> Self {
        self.instances.insert(
            identifier.to_string(),
            InstanceDescription {
                identifier: identifier.to_string(),
                read_replica_source: source.map(ToString::to_string),
            },
        );
        self
    }

    /// Makes every lookup fail.
    #[must_use]
    pub fn failing(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_string());
        self
    }
}

impl InstanceInventory for StaticInventory {
    fn describe_instance(
        &self,
        identifier: &str,
    ) -> Result<Option<InstanceDescription>, InventoryError> {
        if let Some(reason) = &self.failure {
            return Err(InventoryError {
                reason: reason.clone(),
            });
        }
        Ok(self.instances.get(identifier).cloned())
    }
}

//! Run report: events per resource type and per resource

use crate::diff::ResourceDiff;
use crate::types::{EventStatus, Mode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of resources of one type that recorded one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub resource_type: String,
    pub status: EventStatus,
    pub count: usize,
}

/// What happened to a single resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// Display form of the resource key, `File[/etc/motd]`
    pub resource: String,
    pub resource_type: String,
    pub events: Vec<EventStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<ResourceDiff>,
}

impl ResourceStatus {
    pub fn new(resource: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            resource_type: resource_type.into(),
            events: Vec::new(),
            message: None,
            diff: None,
        }
    }

    pub fn has(&self, status: EventStatus) -> bool {
        self.events.contains(&status)
    }

    pub fn failed(&self) -> bool {
        self.events.iter().any(|e| e.is_failure())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub node: String,
    pub mode: Mode,
    pub time: DateTime<Utc>,
    /// Resource type to its non-zero events
    pub metrics: BTreeMap<String, Vec<ResourceEvent>>,
    pub resource_statuses: Vec<ResourceStatus>,
}

impl Report {
    pub fn new(node: impl Into<String>, mode: Mode) -> Self {
        Self {
            node: node.into(),
            mode,
            time: Utc::now(),
            metrics: BTreeMap::new(),
            resource_statuses: Vec::new(),
        }
    }

    /// Count one occurrence of `status` for `resource_type`
    pub fn record(&mut self, resource_type: &str, status: EventStatus) {
        let events = self.metrics.entry(resource_type.to_string()).or_default();
        match events.iter_mut().find(|e| e.status == status) {
            Some(event) => event.count += 1,
            None => events.push(ResourceEvent {
                resource_type: resource_type.to_string(),
                status,
                count: 1,
            }),
        }
    }

    /// Record every event of `status` and keep it in the report
    pub fn push_status(&mut self, status: ResourceStatus) {
        for event in &status.events {
            self.record(&status.resource_type, *event);
        }
        self.resource_statuses.push(status);
    }

    /// All events across resource types
    pub fn events(&self) -> impl Iterator<Item = &ResourceEvent> {
        self.metrics.values().flatten()
    }

    /// Total count of `status` across resource types
    pub fn count(&self, status: EventStatus) -> usize {
        self.events()
            .filter(|e| e.status == status)
            .map(|e| e.count)
            .sum()
    }

    /// Compare two reports ignoring when they were produced
    pub fn same_results(&self, other: &Report) -> bool {
        self.node == other.node
            && self.mode == other.mode
            && self.metrics == other.metrics
            && self.resource_statuses == other.resource_statuses
    }
}

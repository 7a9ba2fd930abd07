//! Replica-set configuration documents
//!
//! The live `ReplicaSetConfig` is the authority. It is created once by
//! initiate and afterwards only replaced by a successor whose version is
//! exactly one higher. Member ids are never handed to a different host.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::node::{sort_by_name, ClusterNode};

/// Version carried by a freshly initiated configuration.
pub const INITIAL_VERSION: u64 = 1;

fn initial_version() -> u64 {
    INITIAL_VERSION
}

/// One entry of a replica-set configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaSetMember {
    #[serde(rename = "_id")]
    pub member_id: u32,
    pub host: String,
}

impl ReplicaSetMember {
    pub fn new(member_id: u32, host: impl Into<String>) -> Self {
        Self {
            member_id,
            host: host.into(),
        }
    }
}

/// Replica-set configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSetConfig {
    /// Replica-set name
    #[serde(rename = "_id")]
    pub id: String,

    /// Configuration version
    #[serde(default = "initial_version")]
    pub version: u64,

    /// Ordered member list
    pub members: Vec<ReplicaSetMember>,
}

/// Member set comparison, order-independent, by id and host.
pub fn same_members(a: &[ReplicaSetMember], b: &[ReplicaSetMember]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left = a.to_vec();
    let mut right = b.to_vec();
    left.sort();
    right.sort();
    left == right
}

/// Hosts removed from and added to a replica set by a reconfiguration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberDiff {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl MemberDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

impl ReplicaSetConfig {
    /// Configuration submitted with initiate.
    pub fn initial(id: impl Into<String>, members: Vec<ReplicaSetMember>) -> Self {
        Self {
            id: id.into(),
            version: INITIAL_VERSION,
            members,
        }
    }

    /// Member hosts in configuration order.
    pub fn member_hosts(&self) -> Vec<String> {
        self.members.iter().map(|m| m.host.clone()).collect()
    }

    /// Highest member id in use.
    pub fn max_member_id(&self) -> Option<u32> {
        self.members.iter().map(|m| m.member_id).max()
    }

    /// Whether `self` is a legal successor of `previous`.
    pub fn is_successor_of(&self, previous: &ReplicaSetConfig) -> bool {
        self.id == previous.id && self.version == previous.version + 1
    }

    /// Whether `self`, as read back from the cluster, reflects `expected`.
    ///
    /// A higher version with the same members counts: a sibling run may
    /// have applied the same change first.
    pub fn reflects(&self, expected: &ReplicaSetConfig) -> bool {
        self.id == expected.id
            && self.version >= expected.version
            && same_members(&self.members, &expected.members)
    }

    /// Rewrite every member host through `mapping`, keeping ids.
    ///
    /// Fails with the first host that has no mapping.
    pub fn with_hostnames(&self, mapping: &BTreeMap<String, String>) -> Result<Self, String> {
        let mut members = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let host = mapping
                .get(&member.host)
                .ok_or_else(|| format!("no hostname known for member '{}'", member.host))?;
            members.push(ReplicaSetMember::new(member.member_id, host.clone()));
        }
        Ok(Self {
            id: self.id.clone(),
            version: self.version + 1,
            members,
        })
    }

    /// Build the successor whose hosts are exactly `desired_hosts`.
    ///
    /// Kept members retain their ids. New hosts get ids counting up from
    /// the highest id in the live configuration, in the order given, so an
    /// id that belonged to a removed member is never reassigned.
    pub fn with_member_diff(&self, desired_hosts: &[String]) -> (Self, MemberDiff) {
        let desired: BTreeSet<&str> = desired_hosts.iter().map(String::as_str).collect();
        let live: BTreeSet<&str> = self.members.iter().map(|m| m.host.as_str()).collect();

        let mut diff = MemberDiff::default();
        let mut members = Vec::with_capacity(desired_hosts.len());
        for member in &self.members {
            if desired.contains(member.host.as_str()) {
                members.push(member.clone());
            } else {
                diff.removed.push(member.host.clone());
            }
        }

        let mut next_id = self.max_member_id().map_or(0, |id| id + 1);
        for host in desired_hosts {
            if live.contains(host.as_str()) || diff.added.contains(host) {
                continue;
            }
            members.push(ReplicaSetMember::new(next_id, host.clone()));
            diff.added.push(host.clone());
            next_id += 1;
        }

        let next = Self {
            id: self.id.clone(),
            version: self.version + 1,
            members,
        };
        (next, diff)
    }
}

/// How a live configuration relates to the desired membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveComparison {
    /// Live members equal the desired hostname members
    Current,
    /// Live members equal the desired members addressed by IP
    IpProjection,
    /// Anything else
    Drift,
}

/// Desired membership computed from candidate nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredMembers {
    /// `{i, "fqdn:port"}` in name order
    pub by_host: Vec<ReplicaSetMember>,
    /// `{i, "ip:port"}` in name order, only used to detect migration
    pub by_ip: Vec<ReplicaSetMember>,
    /// `ip:port` → `fqdn:port`
    pub ip_to_host: BTreeMap<String, String>,
}

impl DesiredMembers {
    /// Derive desired membership, ordinals assigned by sorted node name.
    pub fn from_candidates(candidates: &[ClusterNode]) -> Self {
        let mut nodes = candidates.to_vec();
        sort_by_name(&mut nodes);

        let mut by_host = Vec::with_capacity(nodes.len());
        let mut by_ip = Vec::with_capacity(nodes.len());
        let mut ip_to_host = BTreeMap::new();
        for (ordinal, node) in nodes.iter().enumerate() {
            let ordinal = ordinal as u32;
            by_host.push(ReplicaSetMember::new(ordinal, node.host_address()));
            by_ip.push(ReplicaSetMember::new(ordinal, node.ip_host_address()));
            ip_to_host.insert(node.ip_host_address(), node.host_address());
        }

        Self {
            by_host,
            by_ip,
            ip_to_host,
        }
    }

    /// Desired hosts in ordinal order.
    pub fn hosts(&self) -> Vec<String> {
        self.by_host.iter().map(|m| m.host.clone()).collect()
    }

    pub fn compare(&self, live: &ReplicaSetConfig) -> LiveComparison {
        if same_members(&live.members, &self.by_host) {
            LiveComparison::Current
        } else if same_members(&live.members, &self.by_ip) {
            LiveComparison::IpProjection
        } else {
            LiveComparison::Drift
        }
    }
}

//! Administrative commands and replies
//!
//! One command per request, one reply per response. A reply with `ok: 0`
//! is a command error, not a connector error: the command reached the
//! cluster and was answered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::topology::ReplicaSetConfig;

/// Error text returned by initiate on an initialized replica set.
pub const ALREADY_INITIALIZED: &str = "already initialized";

/// Error text returned by addShard for a registered shard.
pub const ALREADY_EXISTS: &str = "already exists";

/// Error text returned by enablesharding for a sharded database.
pub const ALREADY_ENABLED: &str = "already enabled";

/// Error text returned by shardcollection for a sharded collection.
pub const ALREADY_SHARDED: &str = "already sharded";

/// Administrative command surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum AdminCommand {
    /// Ask a member for its role and the current primary
    #[serde(rename = "hello")]
    Hello,

    #[serde(rename = "replSetInitiate")]
    ReplSetInitiate { config: ReplicaSetConfig },

    /// Read the live replica-set configuration
    #[serde(rename = "replSetGetConfig")]
    ReplSetGetConfig { name: String },

    #[serde(rename = "replSetReconfig")]
    ReplSetReconfig { config: ReplicaSetConfig },

    #[serde(rename = "addShard")]
    AddShard { shard: String },

    #[serde(rename = "enablesharding")]
    EnableSharding { database: String },

    #[serde(rename = "shardcollection")]
    ShardCollection {
        namespace: String,
        key: BTreeMap<String, i32>,
    },
}

impl AdminCommand {
    /// Command name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            AdminCommand::Hello => "hello",
            AdminCommand::ReplSetInitiate { .. } => "replSetInitiate",
            AdminCommand::ReplSetGetConfig { .. } => "replSetGetConfig",
            AdminCommand::ReplSetReconfig { .. } => "replSetReconfig",
            AdminCommand::AddShard { .. } => "addShard",
            AdminCommand::EnableSharding { .. } => "enablesharding",
            AdminCommand::ShardCollection { .. } => "shardcollection",
        }
    }

    /// Whether the command changes cluster state.
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            AdminCommand::Hello | AdminCommand::ReplSetGetConfig { .. }
        )
    }
}

/// Reply to an administrative command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    /// 1 on success, 0 on command error
    #[serde(default)]
    pub ok: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errmsg: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,

    /// Live configuration, for `replSetGetConfig`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ReplicaSetConfig>,

    #[serde(rename = "shardAdded", default, skip_serializing_if = "Option::is_none")]
    pub shard_added: Option<String>,

    #[serde(rename = "collectionsharded", default, skip_serializing_if = "Option::is_none")]
    pub collection_sharded: Option<String>,

    #[serde(rename = "isWritablePrimary", default, skip_serializing_if = "Option::is_none")]
    pub is_writable_primary: Option<bool>,

    /// Current primary as seen by the answering member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
}

impl CommandReply {
    /// A bare success reply.
    pub fn success() -> Self {
        Self {
            ok: 1.0,
            ..Self::default()
        }
    }

    /// A command error reply.
    pub fn failure(errmsg: impl Into<String>) -> Self {
        Self {
            ok: 0.0,
            errmsg: Some(errmsg.into()),
            ..Self::default()
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_config(mut self, config: ReplicaSetConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.ok >= 1.0
    }

    pub fn error_message(&self) -> &str {
        self.errmsg.as_deref().unwrap_or("unknown error")
    }

    /// Whether this is an error reply whose message contains `marker`.
    pub fn reports(&self, marker: &str) -> bool {
        !self.is_ok()
            && self
                .errmsg
                .as_deref()
                .is_some_and(|msg| msg.to_ascii_lowercase().contains(marker))
    }

    /// Whether an `addShard` error reply means the shard is already there.
    ///
    /// Other conflicts ("host ... is already a member of shard ...") are
    /// real failures.
    pub fn reports_existing_shard(&self) -> bool {
        self.reports(ALREADY_EXISTS)
    }

    /// Compact JSON rendering for log fields.
    pub fn summary(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

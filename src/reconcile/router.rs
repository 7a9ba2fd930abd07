//! Routing-layer session shared by shard registration and collection sharding
//!
//! Opened lazily on the first command. A timed-out session may still
//! deliver the late reply, so it is discarded and the next command opens a
//! fresh one. Once the routing layer is unreachable every further command
//! is reported unreachable without another attempt.

use crate::connector::{AdminCommand, AdminSession, ClusterConnector, CommandReply, ConnectTarget};
use crate::observability::{log_event_with_fields, Event};

/// What happened to one routed command.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Routed {
    /// The routing layer answered, successfully or not
    Reply(CommandReply),
    /// The command timed out; it may still complete
    Timeout(String),
    /// No session could be opened, or it was lost mid-command
    Unreachable(String),
}

pub(crate) struct RouterSession<'a> {
    connector: &'a dyn ClusterConnector,
    target: ConnectTarget,
    session: Option<Box<dyn AdminSession>>,
    unreachable: Option<String>,
}

impl<'a> RouterSession<'a> {
    pub(crate) fn new(connector: &'a dyn ClusterConnector, target: ConnectTarget) -> Self {
        Self {
            connector,
            target,
            session: None,
            unreachable: None,
        }
    }

    pub(crate) fn run(&mut self, command: &AdminCommand) -> Routed {
        if let Some(reason) = &self.unreachable {
            return Routed::Unreachable(reason.clone());
        }

        let mut session = match self.session.take() {
            Some(session) => session,
            None => match self.connector.connect(&self.target) {
                Ok(session) => session,
                Err(e) => return self.abandon(e.message),
            },
        };

        match session.run_command(command) {
            Ok(reply) => {
                self.session = Some(session);
                Routed::Reply(reply)
            }
            Err(e) if e.is_timeout() => Routed::Timeout(e.message),
            Err(e) => self.abandon(e.message),
        }
    }

    fn abandon(&mut self, reason: String) -> Routed {
        let target = self.target.to_string();
        log_event_with_fields(
            Event::ConnectionFailed,
            &[("target", target.as_str()), ("reason", reason.as_str())],
        );
        self.session = None;
        self.unreachable = Some(reason.clone());
        Routed::Unreachable(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{Fault, SimulatedCluster};

    fn add_shard(spec: &str) -> AdminCommand {
        AdminCommand::AddShard { shard: spec.to_string() }
    }

    #[test]
    fn test_session_reused_across_commands() {
        let cluster = SimulatedCluster::new();
        let mut router = RouterSession::new(&cluster, ConnectTarget::localhost(27017));

        assert!(matches!(router.run(&add_shard("a:1")), Routed::Reply(r) if r.is_ok()));
        assert!(matches!(router.run(&add_shard("b:1")), Routed::Reply(r) if r.is_ok()));
        assert_eq!(cluster.connections().len(), 1);
    }

    #[test]
    fn test_timeout_discards_session() {
        let cluster = SimulatedCluster::new();
        cluster.inject("addShard", Fault::Timeout);
        let mut router = RouterSession::new(&cluster, ConnectTarget::localhost(27017));

        assert!(matches!(router.run(&add_shard("a:1")), Routed::Timeout(_)));
        assert!(matches!(router.run(&add_shard("b:1")), Routed::Reply(_)));
        assert_eq!(cluster.connections().len(), 2);
    }

    #[test]
    fn test_unreachable_is_sticky() {
        let cluster = SimulatedCluster::new();
        cluster.mark_unreachable("localhost:27017");
        let mut router = RouterSession::new(&cluster, ConnectTarget::localhost(27017));

        assert!(matches!(router.run(&add_shard("a:1")), Routed::Unreachable(_)));
        cluster.mark_reachable("localhost:27017");
        assert!(matches!(router.run(&add_shard("b:1")), Routed::Unreachable(_)));
        assert_eq!(cluster.count("addShard"), 0);
    }
}

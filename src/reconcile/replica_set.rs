//! Replica-set reconciliation
//!
//! Converges the live replica-set configuration toward the membership
//! computed from candidate nodes:
//!
//! 1. Initiate with the desired hostname members against the local daemon.
//! 2. If already initialized, fetch the live configuration and classify it:
//!    current, IP-address projection (hostname migration), or drift
//!    (member diff).
//! 3. Reconfigure through the live member list with `version + 1`.
//!
//! A reconfig is sent at most once per run. If the connection is lost while
//! it is in flight, the live configuration is re-read from the local daemon
//! and the outcome decided from what the cluster reports.

use crate::connector::{
    AdminCommand, AdminSession, ClusterConnector, CommandReply, ConnectTarget, ConnectorError,
    ALREADY_INITIALIZED,
};
use crate::observability::{log_event_with_fields, Event};
use crate::topology::{ClusterNode, DesiredMembers, LiveComparison, ReplicaSetConfig};

use super::errors::{ReconcileError, ReconcileResult};
use super::outcome::{ReplicaSetAction, ReplicaSetOutcome};

/// Reconciles one replica set per call.
pub struct ReplicaSetReconciler<'a> {
    connector: &'a dyn ClusterConnector,
    local_port: u16,
    solo: bool,
}

/// Either a live config or the outcome that ends the reconciliation.
type Step<T> = Result<T, ReplicaSetOutcome>;

impl<'a> ReplicaSetReconciler<'a> {
    /// Reconciler talking to the local daemon on `local_port`.
    pub fn new(connector: &'a dyn ClusterConnector, local_port: u16) -> Self {
        Self {
            connector,
            local_port,
            solo: false,
        }
    }

    /// In solo mode an empty candidate list is fatal.
    pub fn solo(mut self, solo: bool) -> Self {
        self.solo = solo;
        self
    }

    fn local(&self) -> ConnectTarget {
        ConnectTarget::localhost(self.local_port)
    }

    /// Reconcile `name` toward `candidates`.
    ///
    /// Only an empty candidate list in solo mode is an error; every other
    /// result, including failures, is an outcome.
    pub fn reconcile(
        &self,
        name: &str,
        candidates: &[ClusterNode],
    ) -> ReconcileResult<ReplicaSetOutcome> {
        if candidates.is_empty() {
            log_event_with_fields(Event::ReplicaSetNoMembers, &[("replica_set", name)]);
            if self.solo {
                return Err(ReconcileError::NoMembersFound {
                    replica_set: name.to_string(),
                });
            }
            return Ok(ReplicaSetOutcome::NoMembersFound);
        }

        let desired = DesiredMembers::from_candidates(candidates);
        let hosts = desired.hosts().join(",");
        log_event_with_fields(
            Event::ReplicaSetConfiguring,
            &[("replica_set", name), ("members", hosts.as_str())],
        );

        let outcome = match self.converge(name, &desired) {
            Ok(outcome) | Err(outcome) => outcome,
        };
        if let ReplicaSetOutcome::Failed { reason } = &outcome {
            log_event_with_fields(
                Event::ReplicaSetFailed,
                &[("replica_set", name), ("reason", reason.as_str())],
            );
        }
        Ok(outcome)
    }

    fn converge(&self, name: &str, desired: &DesiredMembers) -> Step<ReplicaSetOutcome> {
        let local = self.local();
        let mut session = self.open(&local)?;

        let initial = ReplicaSetConfig::initial(name, desired.by_host.clone());
        let reply = self.send(
            session.as_mut(),
            &AdminCommand::ReplSetInitiate { config: initial.clone() },
            name,
        )?;
        if reply.is_ok() {
            log_event_with_fields(Event::ReplicaSetInitiated, &[("replica_set", name)]);
            return Ok(ReplicaSetOutcome::ConfigCurrent {
                version: Some(initial.version),
                action: ReplicaSetAction::Initiated,
            });
        }
        if !reply.reports(ALREADY_INITIALIZED) {
            return Err(failed(format!("initiate rejected: {}", reply.error_message())));
        }

        let live = self.fetch(session.as_mut(), name)?;
        drop(session);

        let version = live.version.to_string();
        match desired.compare(&live) {
            LiveComparison::Current => {
                log_event_with_fields(
                    Event::ReplicaSetAlreadyConfigured,
                    &[("replica_set", name), ("version", version.as_str())],
                );
                Ok(ReplicaSetOutcome::ConfigCurrent {
                    version: Some(live.version),
                    action: ReplicaSetAction::Unchanged,
                })
            }
            LiveComparison::IpProjection => {
                let next = live.with_hostnames(&desired.ip_to_host).map_err(failed)?;
                log_event_with_fields(
                    Event::ReplicaSetHostnameMigration,
                    &[("replica_set", name), ("version", version.as_str())],
                );
                self.reconfigure(&live, next, ReplicaSetAction::HostnameMigration)
            }
            LiveComparison::Drift => {
                let (next, diff) = live.with_member_diff(&desired.hosts());
                if diff.is_empty() {
                    // Same hosts under different ids: ids are never reassigned.
                    log_event_with_fields(
                        Event::ReplicaSetAlreadyConfigured,
                        &[("replica_set", name), ("version", version.as_str())],
                    );
                    return Ok(ReplicaSetOutcome::ConfigCurrent {
                        version: Some(live.version),
                        action: ReplicaSetAction::Unchanged,
                    });
                }
                let removed = diff.removed.join(",");
                let added = diff.added.join(",");
                log_event_with_fields(
                    Event::ReplicaSetMemberDiff,
                    &[
                        ("added", added.as_str()),
                        ("removed", removed.as_str()),
                        ("replica_set", name),
                    ],
                );
                self.reconfigure(&live, next, diff.into())
            }
        }
    }

    /// Send `next` through the live member list; verify on connection loss.
    fn reconfigure(
        &self,
        live: &ReplicaSetConfig,
        next: ReplicaSetConfig,
        action: ReplicaSetAction,
    ) -> Step<ReplicaSetOutcome> {
        if !next.is_successor_of(live) {
            return Err(failed(format!(
                "refusing reconfig from version {} to {}",
                live.version, next.version
            )));
        }

        let members = ConnectTarget::members(live.member_hosts());
        let mut session = self.open(&members)?;
        let version = next.version.to_string();

        match session.run_command(&AdminCommand::ReplSetReconfig { config: next.clone() }) {
            Ok(reply) if reply.is_ok() => {
                log_event_with_fields(
                    Event::ReplicaSetReconfigured,
                    &[("replica_set", next.id.as_str()), ("version", version.as_str())],
                );
                Ok(ReplicaSetOutcome::ConfigCurrent {
                    version: Some(next.version),
                    action,
                })
            }
            Ok(reply) => Err(failed(format!("reconfig rejected: {}", reply.error_message()))),
            Err(e) if e.is_timeout() => {
                log_event_with_fields(
                    Event::ReplicaSetReconfigPending,
                    &[("replica_set", next.id.as_str()), ("version", version.as_str())],
                );
                Err(ReplicaSetOutcome::PendingConvergence { reason: e.message })
            }
            Err(e) => {
                drop(session);
                self.verify(&next, action, &e)
            }
        }
    }

    /// Re-read the live config after losing the connection mid-reconfig.
    fn verify(
        &self,
        expected: &ReplicaSetConfig,
        action: ReplicaSetAction,
        lost: &ConnectorError,
    ) -> Step<ReplicaSetOutcome> {
        let unverified = |detail: String| {
            failed(format!(
                "connection lost during reconfig ({}); could not verify: {}",
                lost.message, detail
            ))
        };

        let mut session = self
            .connector
            .connect(&self.local())
            .map_err(|e| unverified(e.message))?;
        let reply = session
            .run_command(&AdminCommand::ReplSetGetConfig { name: expected.id.clone() })
            .map_err(|e| unverified(e.message))?;
        let live = match reply.config {
            Some(config) if reply.is_ok() => config,
            _ => return Err(unverified(reply.error_message().to_string())),
        };

        if !live.reflects(expected) {
            return Err(failed(format!(
                "connection lost during reconfig ({}); live version {} does not reflect version {}",
                lost.message, live.version, expected.version
            )));
        }

        let version = live.version.to_string();
        log_event_with_fields(
            Event::ReplicaSetReconfigVerified,
            &[("replica_set", live.id.as_str()), ("version", version.as_str())],
        );
        Ok(ReplicaSetOutcome::ConfigCurrent {
            version: Some(live.version),
            action,
        })
    }

    fn open(&self, target: &ConnectTarget) -> Step<Box<dyn AdminSession>> {
        self.connector.connect(target).map_err(|e| {
            let target = target.to_string();
            log_event_with_fields(
                Event::ConnectionFailed,
                &[("target", target.as_str()), ("reason", e.message.as_str())],
            );
            ReplicaSetOutcome::ConnectionFailed {
                target,
                reason: e.message,
            }
        })
    }

    /// Send a command whose timeout means "started, re-check next run".
    fn send(
        &self,
        session: &mut dyn AdminSession,
        command: &AdminCommand,
        name: &str,
    ) -> Step<CommandReply> {
        session.run_command(command).map_err(|e| {
            if e.is_timeout() {
                log_event_with_fields(
                    pending_event(command),
                    &[("replica_set", name), ("reason", e.message.as_str())],
                );
                ReplicaSetOutcome::PendingConvergence { reason: e.message }
            } else {
                let target = session.address().to_string();
                log_event_with_fields(
                    Event::ConnectionFailed,
                    &[("target", target.as_str()), ("reason", e.message.as_str())],
                );
                ReplicaSetOutcome::ConnectionFailed {
                    target,
                    reason: e.message,
                }
            }
        })
    }

    fn fetch(&self, session: &mut dyn AdminSession, name: &str) -> Step<ReplicaSetConfig> {
        let reply = self.send(
            session,
            &AdminCommand::ReplSetGetConfig { name: name.to_string() },
            name,
        )?;
        if !reply.is_ok() {
            return Err(failed(format!("cannot read live config: {}", reply.error_message())));
        }
        let live = reply
            .config
            .ok_or_else(|| failed("live config missing from reply".to_string()))?;
        if live.id != name {
            return Err(failed(format!(
                "live config is for replica set '{}', expected '{}'",
                live.id, name
            )));
        }
        Ok(live)
    }

    /// Read-only view of the live configuration.
    ///
    /// `Ok(None)` when the daemon answers but has no configuration for
    /// `name`, e.g. before initiate.
    pub fn live_config(&self, name: &str) -> Result<Option<ReplicaSetConfig>, ConnectorError> {
        let mut session = self.connector.connect(&self.local())?;
        let reply = session.run_command(&AdminCommand::ReplSetGetConfig {
            name: name.to_string(),
        })?;
        Ok(if reply.is_ok() { reply.config } else { None })
    }
}

/// Event logged when `command` times out.
fn pending_event(command: &AdminCommand) -> Event {
    match command {
        AdminCommand::ReplSetInitiate { .. } => Event::ReplicaSetInitiatePending,
        AdminCommand::ReplSetReconfig { .. } => Event::ReplicaSetReconfigPending,
        _ => Event::ReplicaSetFetchPending,
    }
}

fn failed(reason: String) -> ReplicaSetOutcome {
    ReplicaSetOutcome::Failed { reason }
}

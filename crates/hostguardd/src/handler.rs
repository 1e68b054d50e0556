//! Command dispatch
//!
//! Every mutating command runs its read-modify-write on the blocking pool,
//! then asks the reconcile worker for a pass. The response never waits on
//! the hosts file; enforcement results come back as [`EnforcementReport`]s.

use chrono::{DateTime, Utc};
use hostguard_api::{
    Command, EnforcementReport, ErrorCode, ErrorInfo, Event, EventPayload, HealthStatus, Response,
    ResponsePayload,
};
use hostguard_core::{BlockEngine, CoreEvent, EngineResult, SessionScheduler};
use hostguard_util::ClientId;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A response plus the events it caused
#[derive(Debug)]
pub struct Handled {
    pub response: Response,
    pub events: Vec<Event>,
}

impl Handled {
    fn reply(response: Response) -> Self {
        Self {
            response,
            events: Vec::new(),
        }
    }
}

/// Convert an engine event into its client-facing form
pub fn event_payload(event: &CoreEvent, engine: &BlockEngine) -> EventPayload {
    match event {
        CoreEvent::SessionStarted {
            session_id,
            started_at,
            ends_at,
            ..
        } => EventPayload::SessionStarted {
            session_id: session_id.clone(),
            started_at: *started_at,
            ends_at: *ends_at,
        },
        CoreEvent::EmergencyUsed { session_id, ends_at } => EventPayload::EmergencyUsed {
            session_id: session_id.clone(),
            ends_at: *ends_at,
        },
        CoreEvent::SessionCompleted {
            session_id,
            ended_at,
        } => EventPayload::SessionCompleted {
            session_id: session_id.clone(),
            ended_at: *ended_at,
        },
        CoreEvent::PolicyChanged => EventPayload::PolicyChanged(engine.policy_view()),
    }
}

/// Event to publish for a finished reconciliation pass, if any
pub fn report_event(report: &EnforcementReport) -> Option<Event> {
    report
        .error
        .clone()
        .map(|error| Event::new(EventPayload::EnforcementFailed { error }))
}

fn response_payload(event: &CoreEvent, engine: &BlockEngine, now: DateTime<Utc>) -> ResponsePayload {
    match event {
        CoreEvent::SessionStarted {
            session_id,
            ends_at,
            ..
        } => ResponsePayload::SessionStarted {
            session_id: session_id.clone(),
            ends_at: *ends_at,
        },
        CoreEvent::EmergencyUsed { ends_at, .. } => {
            ResponsePayload::EmergencyApplied { ends_at: *ends_at }
        }
        CoreEvent::PolicyChanged => ResponsePayload::PolicyUpdated(engine.policy_view()),
        CoreEvent::SessionCompleted { .. } => ResponsePayload::Status(engine.status(now)),
    }
}

/// Dispatches IPC commands to the engine
pub struct CommandHandler {
    scheduler: Arc<SessionScheduler>,
}

impl CommandHandler {
    pub fn new(scheduler: Arc<SessionScheduler>) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Arc<SessionScheduler> {
        &self.scheduler
    }

    pub async fn handle(&self, client_id: &ClientId, request_id: u64, command: Command) -> Handled {
        let now = hostguard_util::now();

        match command {
            Command::StartSession { duration } => {
                self.mutate(request_id, now, move |engine| engine.start_session(duration, now))
                    .await
            }

            Command::EmergencyShorten => {
                self.mutate(request_id, now, move |engine| engine.emergency_shorten(now))
                    .await
            }

            Command::AddCustomDomain { domain, paths } => {
                self.mutate(request_id, now, move |engine| {
                    engine.add_custom_domain(&domain, &paths)
                })
                    .await
            }

            Command::RemoveCustomDomain { domain } => {
                self.mutate(request_id, now, move |engine| engine.remove_custom_domain(&domain))
                    .await
            }

            Command::AddAllowedDomain { domain } => {
                self.mutate(request_id, now, move |engine| engine.add_allowed_domain(&domain))
                    .await
            }

            Command::RemoveAllowedDomain { domain } => {
                self.mutate(request_id, now, move |engine| engine.remove_allowed_domain(&domain))
                    .await
            }

            Command::AddAllowedChannel { channel } => {
                self.mutate(request_id, now, move |engine| engine.add_allowed_channel(&channel))
                    .await
            }

            Command::RemoveAllowedChannel { channel } => {
                self.mutate(request_id, now, move |engine| {
                    engine.remove_allowed_channel(&channel)
                })
                    .await
            }

            Command::SetNotifications { enabled } => {
                self.mutate(request_id, now, move |engine| engine.set_notifications(enabled))
                    .await
            }

            Command::GetStatus => {
                let status = self.scheduler.engine().await.status(now);
                Handled::reply(Response::success(request_id, ResponsePayload::Status(status)))
            }

            Command::GetPolicy => {
                let policy = self.scheduler.engine().await.policy_view();
                Handled::reply(Response::success(request_id, ResponsePayload::Policy(policy)))
            }

            Command::GetHistory { limit } => {
                let result = self.scheduler.engine().await.history(limit);
                Handled::reply(match result {
                    Ok(entries) => Response::success(request_id, ResponsePayload::History(entries)),
                    Err(e) => Response::error(request_id, ErrorInfo::new(e.code(), e.to_string())),
                })
            }

            Command::GetHealth => {
                let store_ok = self.scheduler.engine().await.store_healthy();
                let health = HealthStatus {
                    live: true,
                    ready: store_ok && self.scheduler.hosts_healthy(),
                    store_ok,
                    last_enforcement: self.scheduler.last_report().await,
                };
                Handled::reply(Response::success(request_id, ResponsePayload::Health(health)))
            }

            Command::SubscribeEvents => Handled::reply(Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            )),

            Command::UnsubscribeEvents => {
                Handled::reply(Response::success(request_id, ResponsePayload::Unsubscribed))
            }

            Command::Ping => Handled::reply(Response::success(request_id, ResponsePayload::Pong)),
        }
    }

    async fn mutate<F>(&self, request_id: u64, now: DateTime<Utc>, op: F) -> Handled
    where
        F: FnOnce(&mut BlockEngine) -> EngineResult<CoreEvent> + Send + 'static,
    {
        let outcome = self
            .scheduler
            .mutate_engine(move |engine| {
                op(engine).map(|event| {
                    (
                        response_payload(&event, engine, now),
                        event_payload(&event, engine),
                    )
                })
            })
            .await;

        let (payload, event) = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                debug!(error = %e, "Command rejected");
                return Handled::reply(Response::error(
                    request_id,
                    ErrorInfo::new(e.code(), e.to_string()),
                ));
            }
            Err(e) => {
                error!(error = %e, "Engine task failed");
                return Handled::reply(Response::error(
                    request_id,
                    ErrorInfo::new(ErrorCode::InternalError, "engine task failed"),
                ));
            }
        };

        info!(event = ?event, "Command applied");
        self.scheduler.request_reconcile();

        Handled {
            response: Response::success(request_id, payload),
            events: vec![Event::new(event)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostguard_api::ResponseResult;
    use hostguard_config::SessionLimits;
    use hostguard_hosts::{managed_section_count, MockHostTable};
    use hostguard_store::MemoryStore;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn handler() -> (CommandHandler, Arc<MockHostTable>) {
        let engine = BlockEngine::load(
            Arc::new(MemoryStore::new()),
            hostguard_config::builtin_default_blocks(),
            SessionLimits::default(),
        )
        .unwrap();
        let hosts = Arc::new(MockHostTable::new());
        let scheduler = Arc::new(SessionScheduler::new(engine, hosts.clone()));
        (CommandHandler::new(scheduler), hosts)
    }

    fn start(secs: u64) -> Command {
        Command::StartSession {
            duration: Duration::from_secs(secs),
        }
    }

    #[tokio::test]
    async fn start_session_requests_a_reconcile_pass() {
        let (handler, hosts) = handler();
        let handled = handler.handle(&ClientId::new(), 1, start(3600)).await;

        assert!(matches!(
            handled.response.result,
            ResponseResult::Ok(ResponsePayload::SessionStarted { .. })
        ));
        assert!(matches!(
            handled.events.as_slice(),
            [Event {
                payload: EventPayload::SessionStarted { .. },
                ..
            }]
        ));

        // The pending request is picked up as soon as a worker runs
        let (tx, mut reports) = mpsc::unbounded_channel();
        let worker = handler.scheduler().spawn_reconciler(tx);
        assert!(reports.recv().await.is_some_and(|r| r.ok));
        assert_eq!(hosts.apply_count(), 1);
        assert_eq!(managed_section_count(&hosts.content()), 1);
        worker.abort();
    }

    #[tokio::test]
    async fn commands_are_answered_while_hosts_write_is_stuck() {
        let (handler, hosts) = handler();
        let (tx, mut reports) = mpsc::unbounded_channel();
        let worker = handler.scheduler().spawn_reconciler(tx);
        hosts.pause();

        let handled = handler.handle(&ClientId::new(), 1, start(3600)).await;
        assert!(matches!(handled.response.result, ResponseResult::Ok(_)));
        while hosts.apply_count() == 0 {
            tokio::task::yield_now().await;
        }

        let status = tokio::time::timeout(
            Duration::from_secs(1),
            handler.handle(&ClientId::new(), 2, Command::GetStatus),
        )
        .await
        .unwrap();
        match status.response.result {
            ResponseResult::Ok(ResponsePayload::Status(status)) => assert!(status.is_active()),
            other => panic!("expected status, got {:?}", other),
        }

        let emergency = tokio::time::timeout(
            Duration::from_secs(1),
            handler.handle(&ClientId::new(), 3, Command::EmergencyShorten),
        )
        .await
        .unwrap();
        match emergency.response.result {
            ResponseResult::Err(e) => assert_eq!(e.code, ErrorCode::TooEarly),
            other => panic!("expected lockout, got {:?}", other),
        }

        hosts.release();
        assert!(reports.recv().await.is_some_and(|r| r.ok));
        assert_eq!(managed_section_count(&hosts.content()), 1);
        worker.abort();
    }

    #[tokio::test]
    async fn rejected_command_has_error_code_and_no_events() {
        let (handler, hosts) = handler();
        let handled = handler
            .handle(&ClientId::new(), 7, Command::EmergencyShorten)
            .await;

        assert_eq!(handled.response.request_id, 7);
        match handled.response.result {
            ResponseResult::Err(e) => assert_eq!(e.code, ErrorCode::NoActiveSession),
            other => panic!("expected error, got {:?}", other),
        }
        assert!(handled.events.is_empty());
        assert_eq!(hosts.apply_count() + hosts.clear_count(), 0);
    }

    #[tokio::test]
    async fn failed_pass_becomes_enforcement_failed_event() {
        let (handler, hosts) = handler();
        hosts.set_fail(true);
        let (tx, mut reports) = mpsc::unbounded_channel();
        let worker = handler.scheduler().spawn_reconciler(tx);

        let handled = handler.handle(&ClientId::new(), 1, start(600)).await;

        // The session is still started; enforcement retries on the next tick
        assert!(matches!(handled.response.result, ResponseResult::Ok(_)));
        assert!(handler.scheduler().engine().await.has_active_session());

        let report = reports.recv().await.unwrap();
        assert!(!report.ok);
        assert!(matches!(
            report_event(&report).map(|e| e.payload),
            Some(EventPayload::EnforcementFailed { .. })
        ));
        worker.abort();
    }

    #[test]
    fn successful_pass_has_no_event() {
        let report = EnforcementReport {
            at: hostguard_util::now(),
            ok: true,
            entries: 3,
            error: None,
        };
        assert!(report_event(&report).is_none());
    }

    #[tokio::test]
    async fn health_reports_last_enforcement() {
        let (handler, _) = handler();
        handler.scheduler().reconcile().await;

        let handled = handler.handle(&ClientId::new(), 1, Command::GetHealth).await;
        match handled.response.result {
            ResponseResult::Ok(ResponsePayload::Health(health)) => {
                assert!(health.live);
                assert!(health.ready);
                assert!(health.last_enforcement.is_some_and(|r| r.ok));
            }
            other => panic!("expected health, got {:?}", other),
        }
    }
}

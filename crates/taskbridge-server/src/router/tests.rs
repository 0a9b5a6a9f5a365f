use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;
use taskbridge_core::engine::memory::{EngineCall, InMemoryEngine};
use taskbridge_core::engine::{EngineResult, NoopHost};
use taskbridge_core::message::{EngineMessage, SayType};
use taskbridge_core::state::{AskResponse, ChatMode, EngineState, SettingsUpdate};
use taskbridge_core::{BridgeCommand, EngineError};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::transport::connection::Flavor;

mock! {
    pub Engine {}

    #[async_trait]
    impl TaskEngine for Engine {
        async fn start_task(&self, text: String, images: Vec<String>) -> EngineResult<TaskHandle>;
        async fn resume_latest_task(&self) -> EngineResult<TaskHandle>;
        async fn cancel_task(&self, task_id: &TaskId) -> EngineResult<()>;
        async fn send_user_input(
            &self,
            task_id: &TaskId,
            text: String,
            images: Vec<String>,
        ) -> EngineResult<()>;
        async fn submit_approval(
            &self,
            task_id: &TaskId,
            response: AskResponse,
            text: Option<String>,
            images: Vec<String>,
        ) -> EngineResult<()>;
        async fn delete_task(&self, task_id: &TaskId) -> EngineResult<()>;
        async fn task_exists(&self, task_id: &TaskId) -> EngineResult<bool>;
        async fn state_snapshot(&self) -> EngineResult<EngineState>;
        async fn update_settings(&self, update: SettingsUpdate) -> EngineResult<()>;
        fn version(&self) -> String;
        fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
    }
}

/// Delegates to [`InMemoryEngine`] but takes its time starting and
/// cancelling, so concurrent commands interleave inside those calls.
struct Sluggish {
    inner: Arc<InMemoryEngine>,
    start_delay: Duration,
    cancel_delay: Duration,
}

#[async_trait]
impl TaskEngine for Sluggish {
    async fn start_task(&self, text: String, images: Vec<String>) -> EngineResult<TaskHandle> {
        tokio::time::sleep(self.start_delay).await;
        self.inner.start_task(text, images).await
    }

    async fn resume_latest_task(&self) -> EngineResult<TaskHandle> {
        self.inner.resume_latest_task().await
    }

    async fn cancel_task(&self, task_id: &TaskId) -> EngineResult<()> {
        tokio::time::sleep(self.cancel_delay).await;
        self.inner.cancel_task(task_id).await
    }

    async fn send_user_input(
        &self,
        task_id: &TaskId,
        text: String,
        images: Vec<String>,
    ) -> EngineResult<()> {
        self.inner.send_user_input(task_id, text, images).await
    }

    async fn submit_approval(
        &self,
        task_id: &TaskId,
        response: AskResponse,
        text: Option<String>,
        images: Vec<String>,
    ) -> EngineResult<()> {
        self.inner.submit_approval(task_id, response, text, images).await
    }

    async fn delete_task(&self, task_id: &TaskId) -> EngineResult<()> {
        self.inner.delete_task(task_id).await
    }

    async fn task_exists(&self, task_id: &TaskId) -> EngineResult<bool> {
        self.inner.task_exists(task_id).await
    }

    async fn state_snapshot(&self) -> EngineResult<EngineState> {
        self.inner.state_snapshot().await
    }

    async fn update_settings(&self, update: SettingsUpdate) -> EngineResult<()> {
        self.inner.update_settings(update).await
    }

    fn version(&self) -> String {
        self.inner.version()
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.subscribe()
    }
}

fn make_sluggish_service(
    start_delay: Duration,
    cancel_delay: Duration,
) -> (BridgeService, Arc<InMemoryEngine>) {
    let engine = Arc::new(InMemoryEngine::new("3.1.0"));
    let sluggish = Sluggish {
        inner: Arc::clone(&engine),
        start_delay,
        cancel_delay,
    };
    (make_service(Arc::new(sluggish)), engine)
}

struct Client {
    id: ClientId,
    connection: Arc<ClientConnection>,
    rx: mpsc::Receiver<Arc<String>>,
}

impl Client {
    /// Drain queued frames as JSON.
    fn frames(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            out.push(serde_json::from_str(&frame).unwrap());
        }
        out
    }

    fn frames_of(&mut self, frame_type: &str) -> Vec<Value> {
        self.frames()
            .into_iter()
            .filter(|f| f["type"] == frame_type)
            .collect()
    }
}

fn make_service(engine: Arc<dyn TaskEngine>) -> BridgeService {
    BridgeService::new(engine, Arc::new(NoopHost), BridgeConfig::default())
}

fn make_memory_service() -> (BridgeService, Arc<InMemoryEngine>) {
    let engine = Arc::new(InMemoryEngine::new("3.1.0"));
    (make_service(engine.clone()), engine)
}

fn make_client(service: &BridgeService, id: &str) -> Client {
    let (tx, rx) = mpsc::channel(64);
    let connection = Arc::new(ClientConnection::new(ClientId::from(id), Flavor::Socket, tx));
    service.connect(Arc::clone(&connection)).unwrap();
    Client {
        id: ClientId::from(id),
        connection,
        rx,
    }
}

fn start(text: &str) -> BridgeCommand {
    BridgeCommand::StartTask {
        text: text.into(),
        images: vec![],
    }
}

async fn started(service: &BridgeService, client: &Client, text: &str) -> TaskId {
    let reply = service.handle_command(&client.id, start(text)).await.unwrap();
    assert_matches!(reply, CommandReply::TaskStarted { task_id, .. } => task_id)
}

fn chunk(ts: i64, text: &str, partial: bool) -> EngineMessage {
    EngineMessage::say(ts, SayType::Text, text).with_partial(partial)
}

// ── Validation and binding ──────────────────────────────────────────

#[tokio::test]
async fn empty_client_id_rejected() {
    let (service, _) = make_memory_service();
    let err = service
        .handle_command(&ClientId::from(""), BridgeCommand::RequestState)
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Validation { .. });
}

#[tokio::test]
async fn unknown_client_rejected() {
    let (service, engine) = make_memory_service();
    let err = service
        .handle_command(&ClientId::from("stray"), start("x"))
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Unauthorized { .. });
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn task_commands_need_binding() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    for command in [
        BridgeCommand::CancelTask,
        BridgeCommand::ClearTask,
        BridgeCommand::SendUserInput {
            text: "hi".into(),
            images: vec![],
        },
        BridgeCommand::SubmitOptionsResponse { option: "a".into() },
        BridgeCommand::CheckpointDiff {
            message_ts: 1,
            since_last_completion: false,
        },
        BridgeCommand::CheckpointRestore {
            message_ts: 1,
            restore_type: "task".into(),
        },
        BridgeCommand::CheckLatestChanges,
    ] {
        let err = service.handle_command(&client.id, command).await.unwrap_err();
        assert_matches!(
            err,
            BridgeError::NoActiveTask { ref client_id } if client_id.as_str() == "c1"
        );
    }
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn start_task_binds_and_tracks() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let reply = service
        .handle_command(&client.id, start("build a snake game"))
        .await
        .unwrap();
    assert_eq!(
        reply,
        CommandReply::TaskStarted {
            task_id: TaskId::from("t1"),
            version: "3.1.0".into(),
        }
    );
    assert_eq!(service.bound_task(&client.id), Some(TaskId::from("t1")));
    assert_eq!(service.stats().bound_tasks, 1);
    assert_eq!(
        engine.calls(),
        vec![EngineCall::StartTask {
            text: "build a snake game".into(),
            images: vec![],
        }]
    );
}

#[tokio::test]
async fn start_task_requires_content() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let err = service.handle_command(&client.id, start("  ")).await.unwrap_err();
    assert_matches!(err, BridgeError::Validation { .. });
    assert!(engine.calls().is_empty());

    let with_image = BridgeCommand::StartTask {
        text: String::new(),
        images: vec!["data:image/png;base64,AAAA".into()],
    };
    assert_matches!(
        service.handle_command(&client.id, with_image).await,
        Ok(CommandReply::TaskStarted { .. })
    );
}

#[tokio::test]
async fn second_start_aborts_previous() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let first = started(&service, &client, "one").await;
    let second = started(&service, &client, "two").await;
    assert_ne!(first, second);
    assert_eq!(service.bound_task(&client.id), Some(second));
    assert!(engine.calls().contains(&EngineCall::CancelTask(first)));
}

#[tokio::test]
async fn forwards_input_and_approvals() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;

    let _ = service
        .handle_command(
            &client.id,
            BridgeCommand::SendUserInput {
                text: "more".into(),
                images: vec![],
            },
        )
        .await
        .unwrap();
    let _ = service
        .handle_command(
            &client.id,
            BridgeCommand::SubmitApprovalResponse {
                response: AskResponse::YesButtonClicked,
                text: None,
                images: vec![],
            },
        )
        .await
        .unwrap();
    let _ = service
        .handle_command(
            &client.id,
            BridgeCommand::SubmitOptionsResponse {
                option: "Python".into(),
            },
        )
        .await
        .unwrap();

    let calls = engine.calls();
    assert!(calls.contains(&EngineCall::SendUserInput {
        task_id: task.clone(),
        text: "more".into(),
        images: vec![],
    }));
    assert!(calls.contains(&EngineCall::SubmitApproval {
        task_id: task.clone(),
        response: AskResponse::YesButtonClicked,
        text: None,
    }));
    assert!(calls.contains(&EngineCall::SubmitApproval {
        task_id: task,
        response: AskResponse::MessageResponse,
        text: Some("Python".into()),
    }));
}

#[tokio::test(start_paused = true)]
async fn concurrent_starts_on_one_client_abort_the_loser() {
    let (service, engine) =
        make_sluggish_service(Duration::from_millis(20), Duration::from_millis(5));
    let first = make_client(&service, "c1");
    let second = make_client(&service, "c1");

    let (a, b) = tokio::join!(
        service.handle_command(&first.id, start("one")),
        service.handle_command(&second.id, start("two")),
    );
    let a = assert_matches!(a, Ok(CommandReply::TaskStarted { task_id, .. }) => task_id);
    let b = assert_matches!(b, Ok(CommandReply::TaskStarted { task_id, .. }) => task_id);
    assert_ne!(a, b);

    let bound = service.bound_task(&first.id).unwrap();
    let loser = if bound == a { b } else { a };
    assert!(engine.calls().contains(&EngineCall::CancelTask(loser.clone())));
    assert!(!engine.calls().contains(&EngineCall::CancelTask(bound)));
    assert_eq!(service.stats().bound_tasks, 1);
    assert!(service.inner.state.lock().owner(&loser).is_none());
}

#[tokio::test]
async fn cancel_and_clear_release_binding() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;
    assert_eq!(
        service.handle_command(&client.id, BridgeCommand::CancelTask).await.unwrap(),
        CommandReply::Ack
    );
    assert!(service.bound_task(&client.id).is_none());
    assert!(engine.calls().contains(&EngineCall::CancelTask(task)));

    let task = started(&service, &client, "y").await;
    let _ = service.handle_command(&client.id, BridgeCommand::ClearTask).await.unwrap();
    assert!(service.bound_task(&client.id).is_none());
    assert!(engine.calls().contains(&EngineCall::ClearTask(task)));
}

// ── Isolation ───────────────────────────────────────────────────────

#[tokio::test]
async fn cannot_delete_another_clients_task() {
    let (service, engine) = make_memory_service();
    let x = make_client(&service, "x");
    let y = make_client(&service, "y");
    let task_a = started(&service, &y, "owned by y").await;
    let _task_b = started(&service, &x, "owned by x").await;
    let before = engine.calls().len();

    let err = service
        .handle_command(&x.id, BridgeCommand::DeleteTaskById { task_id: task_a.clone() })
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Unauthorized { .. });
    assert_eq!(engine.calls().len(), before);
    assert_eq!(service.bound_task(&y.id), Some(task_a));
}

#[tokio::test]
async fn delete_historical_and_own_tasks() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let old = started(&service, &client, "old").await;
    let current = started(&service, &client, "new").await;

    // `old` was released when `new` started; nobody owns it now.
    let _ = service
        .handle_command(&client.id, BridgeCommand::DeleteTaskById { task_id: old.clone() })
        .await
        .unwrap();
    assert!(engine.calls().contains(&EngineCall::DeleteTask(old)));
    assert_eq!(service.bound_task(&client.id), Some(current.clone()));

    let _ = service
        .handle_command(&client.id, BridgeCommand::DeleteTaskById { task_id: current })
        .await
        .unwrap();
    assert!(service.bound_task(&client.id).is_none());
}

#[tokio::test]
async fn delete_unknown_task_is_not_found() {
    let (service, _) = make_memory_service();
    let client = make_client(&service, "c1");
    let _ = started(&service, &client, "x").await;
    let err = service
        .handle_command(&client.id, BridgeCommand::DeleteTaskById { task_id: TaskId::from("t404") })
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::NotFound { .. });
}

#[tokio::test]
async fn resume_of_foreign_task_is_unauthorized() {
    let (service, _) = make_memory_service();
    let owner = make_client(&service, "owner");
    let other = make_client(&service, "other");
    let _ = started(&service, &owner, "mine").await;
    let err = service
        .handle_command(&other.id, BridgeCommand::ResumeLatestTask)
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Unauthorized { .. });
    assert!(service.bound_task(&other.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn concurrent_resumes_bind_one_client_only() {
    let (service, _) = make_sluggish_service(Duration::ZERO, Duration::from_millis(50));
    let a = make_client(&service, "a");
    let b = make_client(&service, "b");
    let leaver = make_client(&service, "leaver");
    let _ = started(&service, &a, "older").await;
    let latest = started(&service, &leaver, "latest").await;
    service.disconnect(&leaver.connection).await;

    // `a` must abort its own task before binding; `b` slips in meanwhile.
    let (from_a, from_b) = tokio::join!(
        service.handle_command(&a.id, BridgeCommand::ResumeLatestTask),
        service.handle_command(&b.id, BridgeCommand::ResumeLatestTask),
    );
    assert_matches!(
        from_b,
        Ok(CommandReply::TaskResumed { ref task_id, .. }) if *task_id == latest
    );
    assert_matches!(from_a, Err(BridgeError::Unauthorized { .. }));
    assert_eq!(service.bound_task(&b.id), Some(latest.clone()));
    assert_ne!(service.bound_task(&a.id), Some(latest.clone()));
    assert_eq!(service.inner.state.lock().owner(&latest), Some(&b.id));
}

#[tokio::test]
async fn resume_binds_and_replays_history_once() {
    let (service, engine) = make_memory_service();
    let mut first = make_client(&service, "c1");
    let task = started(&service, &first, "build it").await;
    engine.emit_message(&task, chunk(1000, "hello", false));
    service.disconnect(&first.connection).await;
    let _ = first.frames();

    let mut second = make_client(&service, "c2");
    let reply = service
        .handle_command(&second.id, BridgeCommand::ResumeLatestTask)
        .await
        .unwrap();
    assert_matches!(reply, CommandReply::TaskResumed { ref task_id, .. } if *task_id == task);

    let frames = second.frames();
    assert_eq!(frames.iter().filter(|f| f["type"] == "state_update").count(), 1);
    let messages: Vec<_> = frames.iter().filter(|f| f["type"] == "message").collect();
    // The initial say:task plus the scripted message.
    assert_eq!(messages.len(), 2);

    // A second state request delivers nothing new.
    let _ = service.handle_command(&second.id, BridgeCommand::RequestState).await.unwrap();
    assert!(second.frames_of("message").is_empty());
}

// ── Reconciliation through the router ───────────────────────────────

#[tokio::test]
async fn streaming_scenario_delivers_exactly_once() {
    let (service, engine) = make_memory_service();
    let mut client = make_client(&service, "c1");
    let task = started(&service, &client, "build a snake game").await;
    assert_eq!(task.as_str(), "t1");

    let events = [
        chunk(1000, "Sure", true),
        chunk(1000, "Sure, I'll", true),
        chunk(1000, "Sure, I'll build", true),
        chunk(1000, "Sure, I'll build a snake game.", false),
    ];
    for message in events {
        service.ingest_event(EngineEvent::Message {
            task_id: task.clone(),
            message,
        });
    }

    let messages = client.frames_of("message");
    assert_eq!(messages.len(), 1);
    let wire = &messages[0]["payload"]["message"];
    assert_eq!(wire["ts"], 1000);
    assert_eq!(wire["sayType"], "SAY_TEXT");
    assert_eq!(wire["sayText"]["textContent"], "Sure, I'll build a snake game.");
    assert_eq!(wire["partial"], false);

    // The same message arriving again through a snapshot is suppressed.
    engine.emit_message(&task, chunk(1000, "Sure, I'll build a snake game.", false));
    let snapshot = engine.state_snapshot().await.unwrap();
    service.ingest_event(EngineEvent::State {
        task_id: Some(task.clone()),
        state: snapshot,
    });
    let frames = client.frames();
    assert!(frames.iter().any(|f| f["type"] == "state_update"));
    let replayed: Vec<_> = frames
        .iter()
        .filter(|f| f["type"] == "message" && f["payload"]["message"]["ts"] == 1000)
        .collect();
    assert!(replayed.is_empty());
    assert_eq!(service.stats().messages_sent, 2);
}

#[tokio::test]
async fn events_for_unbound_tasks_are_dropped() {
    let (service, _) = make_memory_service();
    let mut client = make_client(&service, "c1");
    service.ingest_event(EngineEvent::Message {
        task_id: TaskId::from("t9"),
        message: chunk(1, "nobody", false),
    });
    assert!(client.frames().is_empty());
    assert_eq!(service.stats().messages_received, 1);
}

#[tokio::test]
async fn say_error_also_emits_error_event() {
    let (service, _) = make_memory_service();
    let mut client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;
    service.ingest_event(EngineEvent::Message {
        task_id: task,
        message: EngineMessage::say(5, SayType::Error, "tool failed"),
    });
    let errors = client.frames_of("error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["payload"]["kind"], "task_error");
    assert_eq!(errors[0]["payload"]["message"], "tool failed");
}

#[tokio::test]
async fn messages_reach_only_the_owner() {
    let (service, _) = make_memory_service();
    let mut a = make_client(&service, "a");
    let mut b = make_client(&service, "b");
    let task = started(&service, &a, "x").await;
    service.ingest_event(EngineEvent::Message {
        task_id: task,
        message: chunk(1, "for a", false),
    });
    assert_eq!(a.frames_of("message").len(), 1);
    assert!(b.frames().is_empty());
}

// ── Disconnect and disposal ─────────────────────────────────────────

#[tokio::test]
async fn disconnect_releases_and_aborts() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;
    service.ingest_event(EngineEvent::Message {
        task_id: task.clone(),
        message: chunk(7, "half", true),
    });
    assert_eq!(service.stats().open_buffers, 1);

    service.disconnect(&client.connection).await;
    assert!(!service.has_session(&client.id));
    assert_eq!(service.stats().open_buffers, 0);
    assert_eq!(service.stats().bound_tasks, 0);
    assert!(engine.calls().contains(&EngineCall::CancelTask(task.clone())));

    // A fresh client id sees no residue.
    let fresh = make_client(&service, "c1-again");
    assert!(service.bound_task(&fresh.id).is_none());
    assert!(!service.is_delivered(&task, 7));
}

#[tokio::test]
async fn extra_stream_keeps_session_alive() {
    let (service, engine) = make_memory_service();
    let first = make_client(&service, "c1");
    let second = make_client(&service, "c1");
    let task = started(&service, &first, "x").await;

    service.disconnect(&first.connection).await;
    assert_eq!(service.bound_task(&second.id), Some(task.clone()));
    assert!(!engine.calls().contains(&EngineCall::CancelTask(task)));
}

#[tokio::test]
async fn engine_disposal_unbinds() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;
    engine.dispose(&task);
    for _ in 0..50 {
        if service.bound_task(&client.id).is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(service.bound_task(&client.id).is_none());
}

// ── Session-level commands ──────────────────────────────────────────

#[tokio::test]
async fn subscriptions_filter_events() {
    let (service, _) = make_memory_service();
    let mut client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;

    let err = service
        .handle_command(&client.id, BridgeCommand::Subscribe { event_types: vec![" ".into()] })
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Validation { .. });

    let _ = service
        .handle_command(&client.id, BridgeCommand::Subscribe { event_types: vec!["state".into()] })
        .await
        .unwrap();
    assert_eq!(service.subscription(&client.id), Some(vec!["state".to_owned()]));
    service.ingest_event(EngineEvent::Message {
        task_id: task.clone(),
        message: chunk(1, "filtered", false),
    });
    assert!(client.frames_of("message").is_empty());

    let _ = service.handle_command(&client.id, BridgeCommand::Unsubscribe).await.unwrap();
    service.ingest_event(EngineEvent::Message {
        task_id: task,
        message: chunk(2, "visible", false),
    });
    assert_eq!(client.frames_of("message").len(), 1);
}

#[tokio::test]
async fn resync_reaches_state_subscribers_only() {
    let (service, _) = make_memory_service();
    let mut watcher = make_client(&service, "watcher");
    let mut quiet = make_client(&service, "quiet");
    assert_eq!(service.resync().await.unwrap(), 0);

    let _ = service
        .handle_command(
            &watcher.id,
            BridgeCommand::Subscribe {
                event_types: vec!["state_update".into()],
            },
        )
        .await
        .unwrap();
    assert_eq!(service.resync().await.unwrap(), 1);
    assert_eq!(watcher.frames_of("state_update").len(), 1);
    assert!(quiet.frames().is_empty());
}

#[tokio::test]
async fn update_settings_broadcasts() {
    let (service, engine) = make_memory_service();
    let mut a = make_client(&service, "a");
    let mut b = make_client(&service, "b");
    let update = SettingsUpdate {
        chat_mode: Some(ChatMode::Act),
        ..SettingsUpdate::default()
    };
    let _ = service
        .handle_command(&a.id, BridgeCommand::UpdateSettings(update.clone()))
        .await
        .unwrap();
    assert!(engine.calls().contains(&EngineCall::UpdateSettings(update)));
    assert_eq!(a.frames_of("settings_updated").len(), 1);
    assert_eq!(b.frames_of("settings_updated").len(), 1);

    let err = service
        .handle_command(&a.id, BridgeCommand::UpdateSettings(SettingsUpdate::default()))
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Validation { .. });
}

#[tokio::test]
async fn request_state_without_task() {
    let (service, _) = make_memory_service();
    let client = make_client(&service, "c1");
    let reply = service.handle_command(&client.id, BridgeCommand::RequestState).await.unwrap();
    let state = assert_matches!(reply, CommandReply::State(s) => s);
    assert_eq!(state.version, "3.1.0");
    assert!(state.messages.is_empty());
}

#[tokio::test]
async fn open_file_requires_path() {
    let (service, _) = make_memory_service();
    let client = make_client(&service, "c1");
    assert_matches!(
        service
            .handle_command(&client.id, BridgeCommand::OpenFile { path: String::new() })
            .await,
        Err(BridgeError::Validation { .. })
    );
    assert_eq!(
        service
            .handle_command(&client.id, BridgeCommand::OpenFile { path: "src/main.rs".into() })
            .await
            .unwrap(),
        CommandReply::Ack
    );
}

#[tokio::test]
async fn whitespace_input_is_not_input() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let _ = started(&service, &client, "x").await;
    let err = service
        .handle_command(
            &client.id,
            BridgeCommand::SendUserInput {
                text: " \n\t".into(),
                images: vec![],
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Validation { .. });
    assert!(
        !engine
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::SendUserInput { .. }))
    );
}

#[tokio::test]
async fn editor_opens_are_best_effort() {
    let (service, _) = make_memory_service();
    let client = make_client(&service, "c1");
    for command in [
        BridgeCommand::OpenImage {
            path: "/tmp/shot.png".into(),
        },
        BridgeCommand::OpenMention {
            mention: "problems".into(),
        },
    ] {
        assert_eq!(
            service.handle_command(&client.id, command).await.unwrap(),
            CommandReply::Ack
        );
    }
    assert_matches!(
        service
            .handle_command(&client.id, BridgeCommand::OpenImage { path: String::new() })
            .await,
        Err(BridgeError::Validation { .. })
    );
}

// ── Checkpoints ─────────────────────────────────────────────────────

#[tokio::test]
async fn checkpoint_restore_reaches_engine() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;
    let ts = engine.messages(&task)[0].ts.unwrap();
    engine.emit_message(&task, chunk(ts + 10, "later", false));

    assert_eq!(
        service
            .handle_command(
                &client.id,
                BridgeCommand::CheckpointRestore {
                    message_ts: ts,
                    restore_type: "taskAndWorkspace".into(),
                },
            )
            .await
            .unwrap(),
        CommandReply::Ack
    );
    assert!(engine.calls().contains(&EngineCall::CheckpointRestore {
        task_id: task.clone(),
        message_ts: ts,
        restore_type: "taskAndWorkspace".into(),
    }));
    assert_eq!(engine.messages(&task).len(), 1);
    assert_eq!(service.bound_task(&client.id), Some(task));
}

#[tokio::test]
async fn checkpoint_restore_needs_type() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;
    let err = service
        .handle_command(
            &client.id,
            BridgeCommand::CheckpointRestore {
                message_ts: engine.messages(&task)[0].ts.unwrap(),
                restore_type: " ".into(),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Validation { .. });
}

#[tokio::test]
async fn checkpoint_diff_of_unknown_message_fails() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;
    let err = service
        .handle_command(
            &client.id,
            BridgeCommand::CheckpointDiff {
                message_ts: -1,
                since_last_completion: true,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Engine(EngineError::Failed(_)));
    assert!(engine.calls().contains(&EngineCall::CheckpointDiff {
        task_id: task,
        message_ts: -1,
        since_last_completion: true,
    }));
}

#[tokio::test]
async fn latest_changes_reports_engine_flag() {
    let (service, engine) = make_memory_service();
    let client = make_client(&service, "c1");
    let task = started(&service, &client, "x").await;
    assert_eq!(
        service
            .handle_command(&client.id, BridgeCommand::CheckLatestChanges)
            .await
            .unwrap(),
        CommandReply::Changes { has_changes: false }
    );
    engine.set_has_changes(&task, true);
    assert_eq!(
        service
            .handle_command(&client.id, BridgeCommand::CheckLatestChanges)
            .await
            .unwrap(),
        CommandReply::Changes { has_changes: true }
    );
}

#[tokio::test]
async fn checkpoints_unsupported_by_engine() {
    let mut engine = MockEngine::new();
    let _ = engine
        .expect_start_task()
        .returning(|_, _| Ok(TaskHandle::new(TaskId::from("m1"), CancellationToken::new())));
    let _ = engine.expect_version().returning(|| "mock".into());
    let service = make_service(Arc::new(engine));
    let client = make_client(&service, "c1");
    let _ = started(&service, &client, "x").await;
    let err = service
        .handle_command(&client.id, BridgeCommand::CheckLatestChanges)
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Engine(EngineError::Unavailable(_)));
}

// ── Engine failures (mocked) ────────────────────────────────────────

#[tokio::test]
async fn engine_failure_is_reported_not_fatal() {
    let mut engine = MockEngine::new();
    let _ = engine
        .expect_start_task()
        .returning(|_, _| Err(EngineError::Unavailable("warming up".into())));
    let service = make_service(Arc::new(engine));
    let client = make_client(&service, "c1");

    let err = service.handle_command(&client.id, start("x")).await.unwrap_err();
    assert_matches!(err, BridgeError::Engine(EngineError::Unavailable(_)));
    assert_eq!(err.kind(), "engine_error");
    assert!(service.bound_task(&client.id).is_none());
    assert_eq!(service.stats().errors, 1);
}

#[tokio::test]
async fn resume_with_nothing_to_resume() {
    let mut engine = MockEngine::new();
    let _ = engine
        .expect_resume_latest_task()
        .returning(|| Err(EngineError::NothingToResume));
    let service = make_service(Arc::new(engine));
    let client = make_client(&service, "c1");
    let err = service
        .handle_command(&client.id, BridgeCommand::ResumeLatestTask)
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Engine(EngineError::NothingToResume));
}

#[tokio::test]
async fn failed_input_keeps_binding() {
    let mut engine = MockEngine::new();
    let _ = engine
        .expect_start_task()
        .returning(|_, _| Ok(TaskHandle::new(TaskId::from("m1"), CancellationToken::new())));
    let _ = engine.expect_version().returning(|| "mock".into());
    let _ = engine
        .expect_send_user_input()
        .returning(|_, _, _| Err(EngineError::Failed("busy".into())));
    let service = make_service(Arc::new(engine));
    let client = make_client(&service, "c1");
    let _ = started(&service, &client, "x").await;

    let err = service
        .handle_command(
            &client.id,
            BridgeCommand::SendUserInput {
                text: "hello".into(),
                images: vec![],
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, BridgeError::Engine(EngineError::Failed(_)));
    assert_eq!(service.bound_task(&client.id), Some(TaskId::from("m1")));
}

#[tokio::test(start_paused = true)]
async fn slow_engine_times_out() {
    struct Stalled;

    #[async_trait]
    impl EditorHost for Stalled {
        async fn focus(&self) -> Result<(), String> {
            std::future::pending().await
        }

        async fn open_file(&self, _path: &str) -> Result<(), String> {
            std::future::pending().await
        }
    }

    let engine = Arc::new(InMemoryEngine::new("3.1.0"));
    let config = BridgeConfig {
        command_timeout: Duration::from_secs(1),
        focus_timeout: Duration::from_secs(5),
        ..BridgeConfig::default()
    };
    let service = BridgeService::new(engine, Arc::new(Stalled), config);
    let client = make_client(&service, "c1");

    // Focus is bounded by its own timeout, which here exceeds the command's.
    let err = service.handle_command(&client.id, start("x")).await.unwrap_err();
    assert_matches!(
        err,
        BridgeError::Engine(EngineError::Timeout(d)) if d == Duration::from_secs(1)
    );
}

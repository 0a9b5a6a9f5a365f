//! Command handling.

use std::time::Instant;

use metrics::{counter, histogram};
use taskbridge_core::command::has_input;
use taskbridge_core::engine::TaskHandle;
use taskbridge_core::errors::EngineError;
use taskbridge_core::state::{AskResponse, SettingsUpdate};
use taskbridge_core::{BridgeCommand, BridgeError, ClientId, TaskId};
use taskbridge_protocol::translate::state_to_wire;
use tracing::{debug, error, info, instrument, warn};

use super::state::BindOutcome;
use super::{BridgeService, CommandReply};
use crate::dispatch::{Audience, OutboundEvent};
use crate::metrics::{
    BRIDGE_COMMAND_DURATION_SECONDS, BRIDGE_COMMAND_ERRORS_TOTAL, BRIDGE_COMMANDS_TOTAL,
};

const SLOW_COMMAND_SECS: u64 = 5;

impl BridgeService {
    /// Validate and apply one command on behalf of `client_id`.
    ///
    /// The whole command, engine call included, runs under the configured
    /// command timeout. Failures are returned to the caller; the transport
    /// reports them to the originating client only.
    #[instrument(skip_all, fields(client_id = %client_id, command = command.name()))]
    pub async fn handle_command(
        &self,
        client_id: &ClientId,
        command: BridgeCommand,
    ) -> Result<CommandReply, BridgeError> {
        let name = command.name();
        counter!(BRIDGE_COMMANDS_TOTAL, "command" => name).increment(1);

        let start = Instant::now();
        let timeout = self.inner.config.command_timeout;
        let result = match tokio::time::timeout(timeout, self.execute(client_id, command)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(EngineError::Timeout(timeout).into()),
        };

        let duration = start.elapsed();
        histogram!(BRIDGE_COMMAND_DURATION_SECONDS, "command" => name)
            .record(duration.as_secs_f64());
        if duration.as_secs() >= SLOW_COMMAND_SECS {
            warn!(duration_secs = duration.as_secs_f64(), "slow command");
        }

        if let Err(err) = &result {
            let _ = self
                .inner
                .counters
                .errors
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            counter!(BRIDGE_COMMAND_ERRORS_TOTAL, "command" => name, "kind" => err.kind())
                .increment(1);
            match err {
                BridgeError::Engine(_) => error!(error = %err, "engine call failed"),
                _ => debug!(error = %err, code = err.code(), "command rejected"),
            }
        }
        result
    }

    async fn execute(
        &self,
        client_id: &ClientId,
        command: BridgeCommand,
    ) -> Result<CommandReply, BridgeError> {
        if client_id.as_str().is_empty() {
            return Err(BridgeError::validation("clientId is required"));
        }
        let bound = {
            let state = self.inner.state.lock();
            if !state.sessions.contains_key(client_id) {
                return Err(BridgeError::unauthorized(format!(
                    "client {client_id} is not connected"
                )));
            }
            state.bound_task(client_id).cloned()
        };
        let task = match (command.requires_task(), bound) {
            (true, None) => {
                return Err(BridgeError::NoActiveTask {
                    client_id: client_id.clone(),
                });
            }
            (_, bound) => bound,
        };

        match command {
            BridgeCommand::StartTask { text, images } => {
                self.start_task(client_id, text, images).await
            }
            BridgeCommand::ResumeLatestTask => self.resume_latest(client_id, task).await,
            BridgeCommand::SendUserInput { text, images } => {
                if !has_input(&text, &images) {
                    return Err(BridgeError::validation("text or images required"));
                }
                let task = bound_task(task)?;
                self.inner.engine.send_user_input(&task, text, images).await?;
                Ok(CommandReply::Ack)
            }
            BridgeCommand::SubmitApprovalResponse { response, text, images } => {
                let task = bound_task(task)?;
                self.inner
                    .engine
                    .submit_approval(&task, response, text, images)
                    .await?;
                Ok(CommandReply::Ack)
            }
            BridgeCommand::SubmitOptionsResponse { option } => {
                if option.is_empty() {
                    return Err(BridgeError::validation("selectedOption is required"));
                }
                let task = bound_task(task)?;
                self.inner
                    .engine
                    .submit_approval(&task, AskResponse::MessageResponse, Some(option), Vec::new())
                    .await?;
                Ok(CommandReply::Ack)
            }
            BridgeCommand::CancelTask => {
                let task = bound_task(task)?;
                self.inner.engine.cancel_task(&task).await?;
                let _ = self.release(client_id);
                Ok(CommandReply::Ack)
            }
            BridgeCommand::ClearTask => {
                let task = bound_task(task)?;
                self.inner.engine.clear_task(&task).await?;
                let _ = self.release(client_id);
                Ok(CommandReply::Ack)
            }
            BridgeCommand::DeleteTaskById { task_id } => {
                self.delete_task(client_id, &task_id).await
            }
            BridgeCommand::RequestState => self.request_state(task).await,
            BridgeCommand::UpdateSettings(update) => self.update_settings(update).await,
            BridgeCommand::Subscribe { event_types } => {
                let event_types: Vec<String> = event_types
                    .into_iter()
                    .filter(|t| !t.trim().is_empty())
                    .collect();
                if event_types.is_empty() {
                    return Err(BridgeError::validation("eventTypes must not be empty"));
                }
                debug!(?event_types, "subscription replaced");
                self.inner
                    .state
                    .lock()
                    .dispatcher
                    .subscriptions_mut()
                    .subscribe(client_id, event_types);
                Ok(CommandReply::Ack)
            }
            BridgeCommand::Unsubscribe => {
                let _ = self
                    .inner
                    .state
                    .lock()
                    .dispatcher
                    .subscriptions_mut()
                    .unsubscribe(client_id);
                Ok(CommandReply::Ack)
            }
            BridgeCommand::OpenFile { path } => {
                if path.is_empty() {
                    return Err(BridgeError::validation("filePath is required"));
                }
                self.open_in_host("file", &path, self.inner.host.open_file(&path)).await;
                Ok(CommandReply::Ack)
            }
            BridgeCommand::OpenImage { path } => {
                if path.is_empty() {
                    return Err(BridgeError::validation("imagePath is required"));
                }
                self.open_in_host("image", &path, self.inner.host.open_image(&path)).await;
                Ok(CommandReply::Ack)
            }
            BridgeCommand::OpenMention { mention } => {
                if mention.is_empty() {
                    return Err(BridgeError::validation("mention is required"));
                }
                self.open_in_host("mention", &mention, self.inner.host.open_mention(&mention))
                    .await;
                Ok(CommandReply::Ack)
            }
            BridgeCommand::CheckpointDiff {
                message_ts,
                since_last_completion,
            } => {
                let task = bound_task(task)?;
                self.inner
                    .engine
                    .checkpoint_diff(&task, message_ts, since_last_completion)
                    .await?;
                Ok(CommandReply::Ack)
            }
            BridgeCommand::CheckpointRestore {
                message_ts,
                restore_type,
            } => {
                if restore_type.trim().is_empty() {
                    return Err(BridgeError::validation("restoreType is required"));
                }
                let task = bound_task(task)?;
                self.inner
                    .engine
                    .checkpoint_restore(&task, message_ts, &restore_type)
                    .await?;
                info!(task_id = %task, message_ts, %restore_type, "checkpoint restored");
                Ok(CommandReply::Ack)
            }
            BridgeCommand::CheckLatestChanges => {
                let task = bound_task(task)?;
                let has_changes = self.inner.engine.latest_changes(&task).await?;
                Ok(CommandReply::Changes { has_changes })
            }
        }
    }

    /// Run an editor host request under the focus timeout. Failures are
    /// logged, never returned.
    async fn open_in_host(
        &self,
        what: &'static str,
        target: &str,
        open: impl Future<Output = Result<(), String>>,
    ) {
        let focus_timeout = self.inner.config.focus_timeout;
        match tokio::time::timeout(focus_timeout, open).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(what, target, %error, "editor host failed to open"),
            Err(_) => warn!(what, target, timeout = ?focus_timeout, "editor host open timed out"),
        }
    }

    async fn start_task(
        &self,
        client_id: &ClientId,
        text: String,
        images: Vec<String>,
    ) -> Result<CommandReply, BridgeError> {
        if !has_input(&text, &images) {
            return Err(BridgeError::validation("task text or images required"));
        }
        if let Some(old) = self.release(client_id) {
            self.abort_task(&old).await;
        }

        let handle = self.inner.engine.start_task(text, images).await?;
        self.adopt(client_id, &handle).await?;
        self.focus_host().await;

        info!(task_id = %handle.id, "task started");
        Ok(CommandReply::TaskStarted {
            task_id: handle.id,
            version: self.inner.engine.version(),
        })
    }

    async fn resume_latest(
        &self,
        client_id: &ClientId,
        previous: Option<TaskId>,
    ) -> Result<CommandReply, BridgeError> {
        let handle = self.inner.engine.resume_latest_task().await?;
        {
            let state = self.inner.state.lock();
            if state.owner(&handle.id).is_some_and(|owner| owner != client_id) {
                return Err(BridgeError::unauthorized(format!(
                    "task {} is bound to another client",
                    handle.id
                )));
            }
        }
        if previous.as_ref().is_some_and(|p| *p != handle.id) {
            let _ = self.release(client_id);
            if let Some(old) = previous {
                self.abort_task(&old).await;
            }
        }

        self.adopt(client_id, &handle).await?;
        self.focus_host().await;

        let snapshot = self.inner.engine.state_snapshot().await?;
        let _ = self.publish(
            OutboundEvent::State {
                task_id: Some(handle.id.clone()),
                state: Box::new(state_to_wire(&snapshot)),
            },
            Audience::Client(client_id.clone()),
        );
        self.replay(&handle.id, &snapshot.messages);

        info!(task_id = %handle.id, "task resumed");
        Ok(CommandReply::TaskResumed {
            task_id: handle.id,
            version: self.inner.engine.version(),
        })
    }

    /// Bind a task the engine just handed out.
    ///
    /// A task this client held before is aborted once the new binding
    /// replaces it. If the client disconnected while the engine call was in
    /// flight, the new task is aborted instead. A task another client bound
    /// in the meantime is left alone.
    async fn adopt(&self, client_id: &ClientId, handle: &TaskHandle) -> Result<(), BridgeError> {
        match self.bind(client_id, handle) {
            BindOutcome::Bound { displaced, .. } => {
                if let Some(old) = displaced {
                    warn!(
                        task_id = %old,
                        replaced_by = %handle.id,
                        "bound task replaced, aborting it"
                    );
                    self.abort_task(&old).await;
                }
                Ok(())
            }
            BindOutcome::NoSession => {
                warn!(task_id = %handle.id, "client went away before task could be bound");
                self.abort_task(&handle.id).await;
                Err(BridgeError::unauthorized(format!(
                    "client {client_id} disconnected"
                )))
            }
            BindOutcome::Owned(owner) => {
                warn!(task_id = %handle.id, %owner, "task was bound by another client meanwhile");
                Err(BridgeError::unauthorized(format!(
                    "task {} is bound to another client",
                    handle.id
                )))
            }
        }
    }

    async fn delete_task(
        &self,
        client_id: &ClientId,
        task_id: &TaskId,
    ) -> Result<CommandReply, BridgeError> {
        let owner = self.inner.state.lock().owner(task_id).cloned();
        if owner.as_ref().is_some_and(|o| o != client_id) {
            return Err(BridgeError::unauthorized(format!(
                "task {task_id} is bound to another client"
            )));
        }
        if !self.inner.engine.task_exists(task_id).await? {
            return Err(BridgeError::NotFound {
                message: format!("task {task_id} not found"),
            });
        }
        self.inner.engine.delete_task(task_id).await?;
        if owner.is_some() {
            let _ = self.release(client_id);
        }
        info!(%task_id, "task deleted");
        Ok(CommandReply::Ack)
    }

    async fn request_state(&self, bound: Option<TaskId>) -> Result<CommandReply, BridgeError> {
        let snapshot = self.inner.engine.state_snapshot().await?;
        let wire = state_to_wire(&snapshot);
        if let Some(task_id) = bound {
            if snapshot.current_task.as_ref().is_some_and(|t| t.id == task_id) {
                self.replay(&task_id, &snapshot.messages);
            }
        }
        Ok(CommandReply::State(Box::new(wire)))
    }

    async fn update_settings(&self, update: SettingsUpdate) -> Result<CommandReply, BridgeError> {
        if update.is_empty() {
            return Err(BridgeError::validation("settings update changes nothing"));
        }
        self.inner.engine.update_settings(update).await?;
        let recipients = self.publish(OutboundEvent::SettingsUpdated, Audience::All);
        debug!(recipients = recipients.len(), "settings updated");
        Ok(CommandReply::Ack)
    }
}

fn bound_task(task: Option<TaskId>) -> Result<TaskId, BridgeError> {
    task.ok_or_else(|| BridgeError::validation("command requires a bound task"))
}

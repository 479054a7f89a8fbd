// ── Live status store ──
//
// Owns the snapshot, the change-highlight window, the error and activity
// logs, and the push-stream lifecycle. Every handler (stream events, timer
// firings, connect/disconnect) runs under one runtime lock, so handlers
// never interleave. Observable state is published through `watch`
// channels.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use vpnpack_api::{StreamConnector, StreamEvent, StreamSubscription};

use super::activity_log::ActivityLog;
use super::error_log::ErrorLog;
use super::reconcile::{ChangeSet, ChangedFields, SnapshotPatch, reconcile};
use crate::config::StoreConfig;
use crate::keepalive::Keepalive;
use crate::machine::{ConnectionMachine, Effect, MachineEvent, Phase};
use crate::model::{ErrorRecord, LogLevel, LogRecord, StatusSnapshot, UpdateInfo, UpdateNotice};
use crate::stream::StoreSubscription;

/// Message logged when the push stream drops.
pub const CONNECTION_LOST_MESSAGE: &str = "Event stream connection lost, reconnecting...";

/// Named stream event carrying update notices.
pub const UPDATE_EVENT: &str = "update-available";

const STATUS_EVENT: &str = "message";

// ── StatusStore ──────────────────────────────────────────────────────

/// Process-wide mirror of the manager's live state.
///
/// Cheaply cloneable via `Arc<StoreInner>`. Construct once and share the
/// handle; every clone observes and drives the same state.
#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,
    connector: Arc<dyn StreamConnector>,
    keepalive: Option<Arc<dyn Keepalive>>,
    status: watch::Sender<StatusSnapshot>,
    changed_fields: watch::Sender<ChangedFields>,
    update_info: watch::Sender<UpdateInfo>,
    phase: watch::Sender<Phase>,
    errors: Arc<ErrorLog>,
    logs: ActivityLog,
    runtime: Mutex<Runtime>,
}

/// Mutable lifecycle state, only touched under the runtime lock.
#[derive(Default)]
struct Runtime {
    machine: ConnectionMachine,
    /// Bumped on every teardown; pumps carrying an older value are stale.
    generation: u64,
    stream: Option<StreamTask>,
    reconnect: Option<JoinHandle<()>>,
    reconnect_token: u64,
    keepalive: Option<JoinHandle<()>>,
    highlight: Option<JoinHandle<()>>,
    highlight_token: u64,
    /// Id of the outstanding connection-lost error.
    connection_lost: Option<u64>,
}

struct StreamTask {
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl Runtime {
    fn abort_tasks(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.cancel.cancel();
            stream.pump.abort();
        }
        for handle in [
            self.reconnect.take(),
            self.keepalive.take(),
            self.highlight.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl StatusStore {
    /// Create a disconnected store.
    ///
    /// `errors` is the log shared with the request gateway. `keepalive` is
    /// invoked periodically while connected when the config sets an
    /// interval.
    pub fn new(
        config: StoreConfig,
        connector: Arc<dyn StreamConnector>,
        errors: Arc<ErrorLog>,
        keepalive: Option<Arc<dyn Keepalive>>,
    ) -> Self {
        let (status, _) = watch::channel(StatusSnapshot::default());
        let (changed_fields, _) = watch::channel(ChangedFields::new());
        let (update_info, _) = watch::channel(UpdateInfo::default());
        let (phase, _) = watch::channel(Phase::Disconnected);

        Self {
            inner: Arc::new(StoreInner {
                config,
                connector,
                keepalive,
                status,
                changed_fields,
                update_info,
                phase,
                errors,
                logs: ActivityLog::new(),
                runtime: Mutex::new(Runtime::default()),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the push stream, replacing any existing one.
    ///
    /// Tears down the current stream and every pending timer first, so at
    /// most one stream and one reconnect timer exist at any time. Must be
    /// called from within a Tokio runtime.
    pub fn connect(&self) {
        debug!("connecting status stream");
        let mut rt = self.inner.lock();
        self.inner.dispatch(&mut rt, MachineEvent::Connect);
    }

    /// Close the stream and cancel every timer. Safe to call repeatedly
    /// and before any `connect()`.
    pub fn disconnect(&self) {
        debug!("disconnecting status stream");
        let mut rt = self.inner.lock();
        self.inner.dispatch(&mut rt, MachineEvent::Disconnect);
    }

    /// Apply a full status document obtained from a request/response call.
    ///
    /// Goes through the same reconciliation as pushed updates. Returns the
    /// fields that changed. A document that is not a JSON object is logged
    /// and changes nothing.
    ///
    /// Must be called from within a Tokio runtime: a change arms the
    /// highlight timer.
    pub fn apply_status(&self, status: Value) -> ChangedFields {
        match SnapshotPatch::from_json(status) {
            Ok(patch) => {
                let mut rt = self.inner.lock();
                self.inner.apply_patch(&mut rt, patch)
            }
            Err(e) => {
                warn!(error = %e, "unparseable status response");
                self.inner
                    .logs
                    .add(LogLevel::Error, format!("Failed to parse status response: {e}"));
                ChangedFields::new()
            }
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    pub fn status(&self) -> StatusSnapshot {
        self.inner.status.borrow().clone()
    }

    /// Fields changed by the most recent update; empty once the highlight
    /// window has passed.
    pub fn changed_fields(&self) -> ChangedFields {
        self.inner.changed_fields.borrow().clone()
    }

    pub fn update_info(&self) -> UpdateInfo {
        self.inner.update_info.borrow().clone()
    }

    /// Error log entries, oldest first.
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.inner.errors.entries()
    }

    /// Activity log entries, newest first.
    pub fn logs(&self) -> Vec<LogRecord> {
        self.inner.logs.entries()
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.borrow()
    }

    /// The error log shared with the request gateway.
    pub fn error_log(&self) -> &Arc<ErrorLog> {
        &self.inner.errors
    }

    // ── Mutators ─────────────────────────────────────────────────────

    /// Append to the error log (deduplicated by message within 5 s).
    /// Returns the new entry's id.
    pub fn add_error(&self, message: impl Into<String>) -> Option<u64> {
        self.inner.errors.add(message)
    }

    pub fn dismiss_error(&self, id: u64) -> bool {
        self.inner.errors.dismiss(id)
    }

    pub fn dismiss_update(&self) {
        self.inner.update_info.send_if_modified(|info| {
            let was_dismissed = info.dismissed;
            info.dismissed = true;
            !was_dismissed
        });
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_status(&self) -> StoreSubscription<StatusSnapshot> {
        StoreSubscription::new(self.inner.status.subscribe())
    }

    pub fn subscribe_changed_fields(&self) -> StoreSubscription<ChangedFields> {
        StoreSubscription::new(self.inner.changed_fields.subscribe())
    }

    pub fn subscribe_update_info(&self) -> StoreSubscription<UpdateInfo> {
        StoreSubscription::new(self.inner.update_info.subscribe())
    }

    pub fn subscribe_errors(&self) -> StoreSubscription<Vec<ErrorRecord>> {
        StoreSubscription::new(self.inner.errors.subscribe())
    }

    pub fn subscribe_logs(&self) -> StoreSubscription<VecDeque<LogRecord>> {
        StoreSubscription::new(self.inner.logs.subscribe())
    }

    pub fn subscribe_phase(&self) -> StoreSubscription<Phase> {
        StoreSubscription::new(self.inner.phase.subscribe())
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

impl StoreInner {
    fn lock(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(self: &Arc<Self>, rt: &mut Runtime, event: MachineEvent) {
        let effects = rt.machine.handle(event);
        trace!(?event, ?effects, "connection machine step");
        for effect in effects {
            self.execute(rt, effect);
        }

        let next = rt.machine.phase();
        self.phase.send_if_modified(|phase| {
            let changed = *phase != next;
            *phase = next;
            changed
        });
    }

    fn execute(self: &Arc<Self>, rt: &mut Runtime, effect: Effect) {
        match effect {
            Effect::TearDown => {
                rt.generation += 1;
                rt.abort_tasks();
                self.changed_fields.send_if_modified(|fields| {
                    let had = !fields.is_empty();
                    fields.clear();
                    had
                });
            }
            Effect::OpenStream => {
                rt.generation += 1;
                let subscription = self.connector.open();
                let cancel = subscription.cancel_token();
                let pump = tokio::spawn(pump_stream(
                    Arc::downgrade(self),
                    rt.generation,
                    subscription,
                ));
                rt.stream = Some(StreamTask { cancel, pump });
            }
            Effect::StartKeepalive => {
                let (Some(interval), Some(keepalive)) =
                    (self.config.keepalive_interval, self.keepalive.as_ref())
                else {
                    return;
                };
                if interval.is_zero() {
                    warn!("keepalive interval is zero, keepalive disabled");
                    return;
                }
                if let Some(task) = rt.keepalive.take() {
                    task.abort();
                }
                rt.keepalive = Some(tokio::spawn(keepalive_task(
                    Arc::clone(keepalive),
                    interval,
                )));
            }
            Effect::StopKeepalive => {
                if let Some(task) = rt.keepalive.take() {
                    task.abort();
                }
            }
            Effect::MarkConnected => self.set_connected(true),
            Effect::MarkDisconnected => self.set_connected(false),
            Effect::DismissConnectionLost => {
                if let Some(id) = rt.connection_lost.take() {
                    self.errors.dismiss(id);
                }
            }
            Effect::ReportConnectionLost => {
                let outstanding = rt
                    .connection_lost
                    .is_some_and(|id| self.errors.contains(id));
                if !outstanding {
                    rt.connection_lost = self
                        .errors
                        .add(CONNECTION_LOST_MESSAGE)
                        .or_else(|| self.errors.find(CONNECTION_LOST_MESSAGE));
                }
            }
            Effect::ScheduleReconnect => {
                rt.reconnect_token += 1;
                let token = rt.reconnect_token;
                let delay = self.config.reconnect_delay;
                info!(delay_ms = millis(delay), "event stream closed, reconnect scheduled");
                let store = Arc::downgrade(self);
                rt.reconnect = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(inner) = store.upgrade() {
                        inner.on_reconnect_due(token);
                    }
                }));
            }
        }
    }

    fn set_connected(&self, connected: bool) {
        self.status.send_if_modified(|status| {
            let changed = status.connected != connected;
            status.connected = connected;
            changed
        });
    }

    /// Returns `false` once the stream behind `generation` is superseded.
    fn on_stream_event(self: &Arc<Self>, generation: u64, event: StreamEvent) -> bool {
        let mut rt = self.lock();
        if rt.generation != generation {
            return false;
        }

        match event {
            StreamEvent::Open => {
                info!("event stream open");
                self.dispatch(&mut rt, MachineEvent::Opened);
            }
            StreamEvent::Error(state) => {
                warn!(?state, "event stream error");
                self.dispatch(&mut rt, MachineEvent::Failed(state));
            }
            StreamEvent::Message(message) => match message.event.as_str() {
                STATUS_EVENT => self.on_status_message(&mut rt, &message.data),
                UPDATE_EVENT => self.on_update_notice(&message.data),
                other => trace!(event = other, "ignoring unknown stream event"),
            },
        }
        true
    }

    fn on_status_message(self: &Arc<Self>, rt: &mut Runtime, data: &str) {
        match SnapshotPatch::parse(data) {
            Ok(patch) => {
                self.apply_patch(rt, patch);
            }
            Err(e) => {
                warn!(error = %e, "malformed status event");
                self.logs
                    .add(LogLevel::Error, format!("Failed to parse status event: {e}"));
            }
        }
    }

    fn on_update_notice(&self, data: &str) {
        match serde_json::from_str::<UpdateNotice>(data) {
            Ok(notice) => {
                info!(version = ?notice.version, "update notice received");
                self.update_info.send_modify(|info| info.merge(notice));
            }
            Err(e) => {
                warn!(error = %e, "malformed update event");
                self.logs
                    .add(LogLevel::Error, format!("Failed to parse update event: {e}"));
            }
        }
    }

    fn apply_patch(self: &Arc<Self>, rt: &mut Runtime, patch: SnapshotPatch) -> ChangedFields {
        let mut changes = ChangeSet::default();
        self.status.send_if_modified(|status| {
            changes = reconcile(status, patch);
            !changes.is_empty()
        });

        if let Some(transition) = &changes.backend_transition {
            info!(from = %transition.from, to = %transition.to, "backend state changed");
            self.logs.add(
                LogLevel::Info,
                format!("State changed: {} -> {}", transition.from, transition.to),
            );
        }

        if !changes.is_empty() {
            self.changed_fields.send_replace(changes.fields.clone());
            self.arm_highlight(rt);
        }
        changes.fields
    }

    /// (Re)start the highlight-clear timer, cancelling the previous one.
    fn arm_highlight(self: &Arc<Self>, rt: &mut Runtime) {
        if let Some(previous) = rt.highlight.take() {
            previous.abort();
        }
        rt.highlight_token += 1;
        let token = rt.highlight_token;
        let delay = self.config.highlight_duration;
        let store = Arc::downgrade(self);
        rt.highlight = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = store.upgrade() {
                inner.clear_highlight(token);
            }
        }));
    }

    fn clear_highlight(&self, token: u64) {
        let mut rt = self.lock();
        if rt.highlight_token != token {
            return;
        }
        rt.highlight = None;
        self.changed_fields.send_if_modified(|fields| {
            let had = !fields.is_empty();
            fields.clear();
            had
        });
    }

    fn on_reconnect_due(self: &Arc<Self>, token: u64) {
        let mut rt = self.lock();
        if rt.reconnect_token != token {
            return;
        }
        // This task is the timer; detach rather than abort it.
        rt.reconnect = None;
        debug!("reconnect timer fired");
        self.dispatch(&mut rt, MachineEvent::ReconnectDue);
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Drain one subscription in arrival order until it ends or is superseded.
async fn pump_stream(
    store: Weak<StoreInner>,
    generation: u64,
    mut subscription: StreamSubscription,
) {
    while let Some(event) = subscription.next().await {
        let Some(inner) = store.upgrade() else { break };
        if !inner.on_stream_event(generation, event) {
            break;
        }
    }
    trace!(generation, "stream pump exiting");
}

async fn keepalive_task(keepalive: Arc<dyn Keepalive>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick

    loop {
        ticker.tick().await;
        let sent = keepalive.keepalive(interval).await;
        trace!(sent, "keepalive tick");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

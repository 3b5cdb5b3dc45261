use crate::bus::{CycleDetection, MonitorEvent, SessionPhase};
use crate::session::TrackedSession;
use crate::Result;
use ascope_aggregator::{Aggregator, AggregatorSnapshot};
use ascope_providers::ProducerAdapter;
use ascope_snapshot::{SnapshotStore, StoredSnapshot};
use notify::{Event as FsEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

/// How often the worker loop wakes up to check debounce/cooldown timers and
/// drain the command channel, independent of whether an fs event arrived.
/// Small relative to [`FILE_CHANGE_DEBOUNCE_MS`] so that debounce has real
/// resolution rather than being quantized to a much coarser tick.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const IDLE_THRESHOLD: Duration = Duration::from_secs(15 * 60);
/// Bound on the recent-fs-event dedup ring: `PollWatcher` re-scans its whole
/// watch tree every tick and can report the same (path, size) pair on back
/// to back polls before the write it's reporting has actually changed
/// anything we'd read differently.
const RECENT_EVENTS_CAP: usize = 10_000;

/// Fixed engine constants from the Session Monitor's configuration table.
/// Orthogonal to [`crate::Config`]/[`crate::ProviderConfig`], which are
/// user-visible deployment settings; these govern internal timing and are
/// never read from a config file.
const FILE_CHANGE_DEBOUNCE: Duration = Duration::from_millis(100);
const NEW_SESSION_CHECK_DEBOUNCE: Duration = Duration::from_millis(500);
const SESSION_SWITCH_COOLDOWN: Duration = Duration::from_millis(5_000);
const DISCOVERY_INTERVAL: Duration = Duration::from_millis(30_000);
const FAST_DISCOVERY_INTERVAL: Duration = Duration::from_millis(5_000);
const FAST_DISCOVERY_DURATION: Duration = Duration::from_millis(120_000);
const SNAPSHOT_SAVE_INTERVAL: Duration = Duration::from_millis(30_000);
const CYCLE_THROTTLE: Duration = Duration::from_millis(60_000);

/// One provider's worth of configuration for a running monitor: where its
/// logs live and how it identifies/reads sessions there.
pub struct ProviderContext {
    pub provider: Box<dyn ProducerAdapter>,
    pub log_root: PathBuf,
    pub project_hash: String,
    pub snapshot_every_events: u32,
}

/// Requests a caller can make of a running monitor without touching the
/// worker thread's state directly.
enum Command {
    SwitchProvider(String),
    SwitchToSession(String),
    StartWithCustomPath(PathBuf),
    RefreshSession,
    TogglePin,
    Dispose,
}

/// The slice of worker-thread state a caller can read without round
/// tripping through the command channel, mirrored out after every loop
/// iteration that might have changed it.
#[derive(Debug, Clone, Default)]
struct SharedStatus {
    active_session_id: Option<String>,
    phase: Option<SessionPhase>,
    pinned: bool,
    fast_discovery_until: Option<Instant>,
}

/// Orchestrates discovery, replay, and live tailing of every session under a
/// set of provider roots, publishing [`MonitorEvent`]s for the one currently
/// *active* session as it progresses through [`SessionPhase`]. Owns a
/// background filesystem watcher thread and a worker thread that does the
/// actual reading/aggregating/snapshotting; `SessionMonitor` itself is just
/// the handle the caller holds onto.
pub struct SessionMonitor {
    _watcher: PollWatcher,
    rx: Receiver<MonitorEvent>,
    tx_cmd: Sender<Command>,
    status: Arc<Mutex<SharedStatus>>,
}

impl SessionMonitor {
    pub fn start(contexts: Vec<ProviderContext>, store: SnapshotStore) -> Result<Self> {
        let (tx_out, rx_out) = channel();
        let (tx_fs, rx_fs) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let status = Arc::new(Mutex::new(SharedStatus::default()));

        let config = notify::Config::default().with_poll_interval(POLL_INTERVAL);
        let mut watcher = PollWatcher::new(
            move |res: std::result::Result<FsEvent, notify::Error>| {
                if let Ok(event) = res {
                    let _ = tx_fs.send(event);
                }
            },
            config,
        )?;

        for context in &contexts {
            if context.log_root.exists() {
                watcher.watch(&context.log_root, RecursiveMode::Recursive)?;
            }
        }

        let worker_status = status.clone();
        std::thread::Builder::new()
            .name("session-monitor".to_string())
            .spawn(move || run_worker(contexts, store, rx_fs, rx_cmd, tx_out, worker_status))?;

        Ok(Self { _watcher: watcher, rx: rx_out, tx_cmd, status })
    }

    pub fn receiver(&self) -> &Receiver<MonitorEvent> {
        &self.rx
    }

    /// Split into a keep-alive guard (drop it to stop watching) and the
    /// event receiver, for callers that want to move the receiver onto
    /// another thread (e.g. to bridge it into an async stream) while still
    /// holding something that keeps the watcher running.
    pub fn into_parts(self) -> (WatcherGuard, Receiver<MonitorEvent>) {
        (WatcherGuard(self._watcher), self.rx)
    }

    /// Switch the active provider. The worker drops its current active
    /// session (if any) and re-attaches to that provider's most recently
    /// active session.
    pub fn switch_provider(&self, provider_id: impl Into<String>) {
        let _ = self.tx_cmd.send(Command::SwitchProvider(provider_id.into()));
    }

    /// Switch the active session to `session_ref` (a session id this
    /// monitor has already discovered).
    pub fn switch_to_session(&self, session_ref: impl Into<String>) {
        let _ = self.tx_cmd.send(Command::SwitchToSession(session_ref.into()));
    }

    /// Watch a directory outside every configured provider's log root,
    /// overriding discovery entirely until the next `switch_provider`.
    pub fn start_with_custom_path(&self, dir: impl Into<PathBuf>) {
        let _ = self.tx_cmd.send(Command::StartWithCustomPath(dir.into()));
    }

    /// Force an immediate re-poll of the active session rather than waiting
    /// for the next filesystem notification.
    pub fn refresh_session(&self) {
        let _ = self.tx_cmd.send(Command::RefreshSession);
    }

    pub fn is_active(&self) -> bool {
        self.status.lock().unwrap().active_session_id.is_some()
    }

    pub fn is_in_discovery_mode(&self) -> bool {
        self.status.lock().unwrap().active_session_id.is_none()
    }

    pub fn is_replaying(&self) -> bool {
        self.status.lock().unwrap().phase == Some(SessionPhase::Replay)
    }

    pub fn is_pinned(&self) -> bool {
        self.status.lock().unwrap().pinned
    }

    pub fn toggle_pin(&self) {
        let _ = self.tx_cmd.send(Command::TogglePin);
    }

    /// Cancel every timer, close the watcher, persist a final snapshot of
    /// the active session, and stop the worker thread.
    pub fn dispose(self) {
        let _ = self.tx_cmd.send(Command::Dispose);
    }
}

/// Keeps the underlying filesystem watcher alive for as long as it's held.
pub struct WatcherGuard(#[allow(dead_code)] PollWatcher);

fn run_worker(
    contexts: Vec<ProviderContext>,
    store: SnapshotStore,
    rx_fs: Receiver<FsEvent>,
    rx_cmd: Receiver<Command>,
    tx: Sender<MonitorEvent>,
    status: Arc<Mutex<SharedStatus>>,
) {
    let mut sessions: HashMap<String, TrackedSession> = HashMap::new();
    let mut recent_events: VecDeque<(PathBuf, u64)> = VecDeque::new();
    let mut active_session_id: Option<String> = None;
    let mut pinned = false;
    let mut last_switch_at: Option<Instant> = None;
    let mut switch_candidate: Option<(String, Instant)> = None;
    let mut custom_path: Option<PathBuf> = None;
    let mut last_discovery_scan = Instant::now() - DISCOVERY_INTERVAL;
    let mut fast_discovery_until: Option<Instant> = None;

    for context in &contexts {
        discover_sessions(context, &store, &mut sessions);
    }
    if let Some(id) = most_recently_active(&sessions) {
        switch_active(&mut active_session_id, Some(id), &mut last_switch_at, &sessions, &tx);
    }
    sync_status(&status, &active_session_id, &sessions, pinned, fast_discovery_until);

    loop {
        let mut dirty = false;

        match rx_cmd.try_recv() {
            Ok(Command::Dispose) => {
                if let Some(id) = &active_session_id
                    && let Some(tracked) = sessions.get(id)
                    && let Some(context) = contexts.iter().find(|c| c.provider.id() == tracked.provider_id)
                {
                    persist_snapshot(context, &store, id, tracked);
                }
                return;
            }
            Ok(Command::TogglePin) => {
                pinned = !pinned;
                dirty = true;
            }
            Ok(Command::SwitchToSession(session_ref)) => {
                if sessions.contains_key(&session_ref) {
                    switch_active(&mut active_session_id, Some(session_ref), &mut last_switch_at, &sessions, &tx);
                    dirty = true;
                }
            }
            Ok(Command::SwitchProvider(provider_id)) => {
                let newest = sessions
                    .iter()
                    .filter(|(_, t)| t.provider_id == provider_id)
                    .max_by_key(|(_, t)| t.last_activity)
                    .map(|(id, _)| id.clone());
                switch_active(&mut active_session_id, newest, &mut last_switch_at, &sessions, &tx);
                dirty = true;
            }
            Ok(Command::StartWithCustomPath(dir)) => {
                custom_path = Some(dir);
                dirty = true;
            }
            Ok(Command::RefreshSession) => {
                if let Some(id) = active_session_id.clone()
                    && let Some(context) = contexts.iter().find(|c| {
                        sessions.get(&id).is_some_and(|t| t.provider_id == c.provider.id())
                    })
                {
                    poll_session(context, &store, &id, &mut sessions, &tx, &active_session_id);
                }
            }
            Err(_) => {}
        }

        match rx_fs.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    for path in &event.paths {
                        if custom_path.as_ref().is_some_and(|p| !path.starts_with(p)) {
                            continue;
                        }
                        if is_duplicate_fs_event(&mut recent_events, path) {
                            continue;
                        }
                        let Some(context) = contexts.iter().find(|c| path.starts_with(&c.log_root))
                        else {
                            continue;
                        };
                        if let Some(tracked) = sessions.values_mut().find(|t| t.path == *path) {
                            tracked.pending_change_since.get_or_insert_with(Instant::now);
                        } else {
                            handle_new_path(
                                context,
                                &store,
                                path,
                                &mut sessions,
                                &tx,
                                &mut active_session_id,
                                &mut switch_candidate,
                                pinned,
                                &mut last_switch_at,
                            );
                        }
                    }
                }
            }
            Err(_) => {}
        }

        // Debounced application of coalesced file changes.
        let due: Vec<String> = sessions
            .iter()
            .filter(|(_, t)| {
                t.pending_change_since.is_some_and(|since| since.elapsed() >= FILE_CHANGE_DEBOUNCE)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in due {
            if let Some(tracked) = sessions.get_mut(&id) {
                tracked.pending_change_since = None;
            }
            let Some(context) = contexts
                .iter()
                .find(|c| sessions.get(&id).is_some_and(|t| t.provider_id == c.provider.id()))
            else {
                continue;
            };
            poll_session(context, &store, &id, &mut sessions, &tx, &active_session_id);
        }

        // Debounced newer-session auto-switch, suppressed while pinned or
        // inside the post-switch cooldown.
        if let Some((candidate, since)) = switch_candidate.clone()
            && since.elapsed() >= NEW_SESSION_CHECK_DEBOUNCE
        {
            switch_candidate = None;
            let cooldown_elapsed = last_switch_at.is_none_or(|t| t.elapsed() >= SESSION_SWITCH_COOLDOWN);
            if !pinned && cooldown_elapsed && sessions.contains_key(&candidate) {
                switch_active(&mut active_session_id, Some(candidate), &mut last_switch_at, &sessions, &tx);
                dirty = true;
            }
        }

        // Discovery rescans: normal cadence, or fast cadence for a capped
        // window after the active session ends.
        let discovery_interval = if fast_discovery_until.is_some_and(|d| Instant::now() < d) {
            FAST_DISCOVERY_INTERVAL
        } else {
            fast_discovery_until = None;
            DISCOVERY_INTERVAL
        };
        if custom_path.is_none() && last_discovery_scan.elapsed() >= discovery_interval {
            last_discovery_scan = Instant::now();
            for context in &contexts {
                discover_sessions(context, &store, &mut sessions);
            }
            if active_session_id.is_none()
                && let Some(id) = most_recently_active(&sessions)
            {
                switch_active(&mut active_session_id, Some(id), &mut last_switch_at, &sessions, &tx);
                dirty = true;
            }
        }

        sweep_idle_sessions(&contexts, &store, &mut sessions, &tx, &mut active_session_id, &mut fast_discovery_until);

        if dirty {
            sync_status(&status, &active_session_id, &sessions, pinned, fast_discovery_until);
        }
    }
}

fn sync_status(
    status: &Arc<Mutex<SharedStatus>>,
    active_session_id: &Option<String>,
    sessions: &HashMap<String, TrackedSession>,
    pinned: bool,
    fast_discovery_until: Option<Instant>,
) {
    let phase = active_session_id.as_ref().and_then(|id| sessions.get(id)).map(|t| t.phase);
    let mut status = status.lock().unwrap();
    status.active_session_id = active_session_id.clone();
    status.phase = phase;
    status.pinned = pinned;
    status.fast_discovery_until = fast_discovery_until;
}

fn most_recently_active(sessions: &HashMap<String, TrackedSession>) -> Option<String> {
    sessions.iter().max_by_key(|(_, t)| t.last_activity).map(|(id, _)| id.clone())
}

fn switch_active(
    active_session_id: &mut Option<String>,
    new_id: Option<String>,
    last_switch_at: &mut Option<Instant>,
    sessions: &HashMap<String, TrackedSession>,
    tx: &Sender<MonitorEvent>,
) {
    if *active_session_id == new_id {
        return;
    }
    *active_session_id = new_id.clone();
    *last_switch_at = Some(Instant::now());
    if let Some(id) = new_id
        && let Some(tracked) = sessions.get(&id)
    {
        let _ = tx.send(MonitorEvent::SessionDiscovered {
            session_id: id.clone(),
            provider_id: tracked.provider_id.clone(),
            path: tracked.path.clone(),
        });
        // `attach_session` replays synchronously, so a freshly attached
        // session is already `Live` by the time it can be switched to; still
        // surface the `Replay` it passed through so a subscriber sees the
        // same phase sequence it would for a session that took longer.
        if tracked.phase == SessionPhase::Live {
            let _ = tx.send(MonitorEvent::PhaseChanged { session_id: id.clone(), phase: SessionPhase::Replay });
        }
        let _ = tx.send(MonitorEvent::PhaseChanged { session_id: id, phase: tracked.phase });
    }
}

fn is_duplicate_fs_event(recent: &mut VecDeque<(PathBuf, u64)>, path: &Path) -> bool {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let key = (path.to_path_buf(), size);
    if recent.contains(&key) {
        return true;
    }
    recent.push_back(key);
    while recent.len() > RECENT_EVENTS_CAP {
        recent.pop_front();
    }
    false
}

/// Attach every session file under `context.log_root` that isn't already
/// tracked. Silent: whether any of these becomes the active session (and
/// therefore gets announced on the bus) is the caller's decision via
/// `switch_active`, since a session can be discovered long before it's the
/// one a consumer should hear about.
fn discover_sessions(
    context: &ProviderContext,
    store: &SnapshotStore,
    sessions: &mut HashMap<String, TrackedSession>,
) {
    if !context.log_root.exists() {
        return;
    }
    let Ok(paths) = context.provider.find_all_sessions(&context.log_root) else {
        return;
    };
    for path in paths {
        attach_session(context, store, &path, sessions);
    }
}

fn handle_new_path(
    context: &ProviderContext,
    store: &SnapshotStore,
    path: &Path,
    sessions: &mut HashMap<String, TrackedSession>,
    tx: &Sender<MonitorEvent>,
    active_session_id: &mut Option<String>,
    switch_candidate: &mut Option<(String, Instant)>,
    pinned: bool,
    last_switch_at: &mut Option<Instant>,
) {
    let Ok(session_id) = context.provider.get_session_id(path) else {
        return;
    };

    if let Some(tracked) = sessions.get_mut(&session_id) {
        if tracked.path.as_path() != path {
            let old_path = tracked.path.clone();
            if let Ok(mut reader) = context.provider.create_reader(path) {
                let _ = reader.seek_to(tracked.reader.get_position());
                tracked.reader = reader;
                tracked.path = path.to_path_buf();
            }
            let _ = tx.send(MonitorEvent::Rotated { old_path, new_path: path.to_path_buf() });
        }
        return;
    }

    attach_session(context, store, path, sessions);
    if active_session_id.is_none() {
        switch_active(active_session_id, Some(session_id), last_switch_at, sessions, tx);
    } else if !pinned {
        *switch_candidate = Some((session_id, Instant::now()));
    }
}

fn attach_session(
    context: &ProviderContext,
    store: &SnapshotStore,
    path: &Path,
    sessions: &mut HashMap<String, TrackedSession>,
) {
    let Ok(session_id) = context.provider.get_session_id(path) else {
        return;
    };
    if sessions.contains_key(&session_id) {
        return;
    }

    let Ok(reader) = context.provider.create_reader(path) else {
        return;
    };

    let aggregator = Aggregator::new(context.provider.id());
    let mut tracked = TrackedSession::new(context.provider.id(), path.to_path_buf(), reader, aggregator);
    tracked.phase = SessionPhase::Replay;

    restore_or_replay(context, store, &session_id, &mut tracked);

    tracked.phase = SessionPhase::Live;
    sessions.insert(session_id, tracked);
}

/// Attempt to resume from a stored, valid snapshot; fall back to reading the
/// session from the start when there is none, the schema version has moved
/// on, or the stored offset/size no longer makes sense for the file on disk
/// (`StoredSnapshot::is_valid`'s job — see §4.4's validity contract).
fn restore_or_replay(
    context: &ProviderContext,
    store: &SnapshotStore,
    session_id: &str,
    tracked: &mut TrackedSession,
) {
    let path_key = tracked.path.to_string_lossy().to_string();
    let current_size = std::fs::metadata(&tracked.path).map(|m| m.len()).unwrap_or(0);
    let current = BTreeMap::from([(path_key.clone(), current_size)]);

    if let Ok(Some(stored)) = store.load(&context.project_hash, session_id) {
        if stored.is_valid(context.provider.id(), &current) {
            let restored = serde_json::from_value::<AggregatorSnapshot>(stored.state.clone())
                .ok()
                .and_then(Aggregator::from_snapshot);

            if let Some(aggregator) = restored
                && let Some(&offset) = stored.file_offsets.get(&path_key)
                && tracked.reader.seek_to(offset).is_ok()
            {
                tracked.aggregator = aggregator;
                return;
            }
        } else {
            let _ = store.delete(&context.project_hash, session_id);
        }
    }

    if let Ok(events) = tracked.reader.read_all() {
        for event in &events {
            tracked.aggregator.process_event(event);
        }
    }
}

fn poll_session(
    context: &ProviderContext,
    store: &SnapshotStore,
    session_id: &str,
    sessions: &mut HashMap<String, TrackedSession>,
    tx: &Sender<MonitorEvent>,
    active_session_id: &Option<String>,
) {
    let Some(tracked) = sessions.get_mut(session_id) else {
        return;
    };
    let is_active = active_session_id.as_deref() == Some(session_id);
    let is_replaying = tracked.phase == SessionPhase::Replay;

    if matches!(tracked.reader.was_truncated(), Ok(true)) {
        tracked.reader.flush();
        let _ = tracked.reader.seek_to(0);
        tracked.aggregator.reset();
        if let Ok(events) = tracked.reader.read_all() {
            for event in &events {
                tracked.aggregator.process_event(event);
            }
        }
    }

    let events = match tracked.reader.read_new() {
        Ok(events) => events,
        Err(err) => {
            tracked.last_error = Some(err.to_string());
            if is_active {
                let _ = tx.send(MonitorEvent::Error { session_id: Some(session_id.to_string()), message: err.to_string() });
            }
            return;
        }
    };
    if events.is_empty() {
        return;
    }

    tracked.last_activity = SystemTime::now();
    let latency_before = tracked.aggregator.latency.records().len();
    for event in &events {
        tracked.aggregator.process_event(event);
        fold_consumer_state(tracked, event);
    }
    tracked.events_since_snapshot += events.len() as u32;

    let snapshot_due = tracked.events_since_snapshot >= context.snapshot_every_events
        && tracked.last_snapshot_at.elapsed().unwrap_or_default() >= SNAPSHOT_SAVE_INTERVAL;
    if snapshot_due {
        persist_snapshot(context, store, session_id, tracked);
        tracked.events_since_snapshot = 0;
        tracked.last_snapshot_at = SystemTime::now();
    }

    // Nothing is fired to consumers during replay, except that the
    // aggregator above has already folded compaction/truncation markers
    // into the timeline so the post-replay snapshot stays consistent.
    if is_replaying || !is_active {
        return;
    }

    let _ = tx.send(MonitorEvent::Updated { session_id: session_id.to_string(), aggregator: Box::new(tracked.aggregator.clone()) });

    if tracked.aggregator.latency.records().len() > latency_before {
        // Latency advance is already visible on the `Updated` payload above;
        // a dedicated bus row would be redundant duplication of the same
        // snapshot, so it's folded in rather than fired separately.
    }

    if let Some(window) = tracked.consumer.detect_cycle() {
        let throttled = tracked.consumer.last_cycle_notified_at.is_some_and(|t| {
            t.elapsed().unwrap_or_default() < CYCLE_THROTTLE
        });
        if !throttled {
            tracked.consumer.last_cycle_notified_at = Some(SystemTime::now());
            let _ = tx.send(MonitorEvent::CycleDetected(CycleDetection { session_id: session_id.to_string(), window }));
        }
    }

    if let Some(quota) = context.provider.quota(&tracked.path) {
        let _ = tx.send(MonitorEvent::QuotaUpdate { session_id: session_id.to_string(), quota });
    }
}

/// Feed one just-processed event into the session's consumer-local state
/// (turn attribution, context timeline, tool-call history for cycle
/// detection, assistant-text buffer). Mirrors what the aggregator already
/// derived rather than recomputing it.
fn fold_consumer_state(tracked: &mut TrackedSession, event: &ascope_types::Event) {
    use ascope_types::{Block, Content, Event};

    let timestamp = event.timestamp().unwrap_or_else(chrono::Utc::now);
    tracked.consumer.record_context_sample(timestamp, tracked.aggregator.context.total());

    match event {
        Event::User { .. } => {
            tracked.consumer.record_turn_attribution(tracked.aggregator.context.clone());
        }
        Event::Assistant { message, .. } => {
            if let Content::Text(text) = &message.content {
                tracked.consumer.record_assistant_text(text);
            }
            for block in message.content.blocks() {
                match block {
                    Block::Text { text } => tracked.consumer.record_assistant_text(text),
                    Block::ToolUse { id, name, .. } => tracked.consumer.record_tool_call(id, name),
                    Block::ToolResult { tool_use_id, .. } => tracked.consumer.resolve_tool_call(tool_use_id),
                    Block::Thinking { .. } => {}
                }
            }
        }
        Event::ToolResult { tool_use_id, .. } => tracked.consumer.resolve_tool_call(tool_use_id),
        Event::System { .. } | Event::Summary { .. } => {}
    }
}

fn persist_snapshot(context: &ProviderContext, store: &SnapshotStore, session_id: &str, tracked: &TrackedSession) {
    let Ok(state) = serde_json::to_value(tracked.aggregator.to_snapshot()) else {
        return;
    };
    let source_size = std::fs::metadata(&tracked.path).map(|m| m.len()).unwrap_or(tracked.reader.get_position());
    let snapshot = StoredSnapshot::new(session_id, &tracked.provider_id, state)
        .with_offset(tracked.path.to_string_lossy(), tracked.reader.get_position(), source_size);
    let _ = store.save(&context.project_hash, &snapshot);
}

fn sweep_idle_sessions(
    contexts: &[ProviderContext],
    store: &SnapshotStore,
    sessions: &mut HashMap<String, TrackedSession>,
    tx: &Sender<MonitorEvent>,
    active_session_id: &mut Option<String>,
    fast_discovery_until: &mut Option<Instant>,
) {
    let now = SystemTime::now();
    let mut ended_active = false;
    for (session_id, tracked) in sessions.iter_mut() {
        if tracked.phase == SessionPhase::Ended {
            continue;
        }
        let idle = now.duration_since(tracked.last_activity).unwrap_or_default();
        if idle < IDLE_THRESHOLD {
            continue;
        }
        let Some(context) = contexts.iter().find(|c| c.provider.id() == tracked.provider_id) else {
            continue;
        };
        tracked.aggregator.plan.finalize(tracked.last_error.as_deref());
        persist_snapshot(context, store, session_id, tracked);
        tracked.phase = SessionPhase::Ended;
        if active_session_id.as_deref() == Some(session_id.as_str()) {
            let _ = tx.send(MonitorEvent::PhaseChanged { session_id: session_id.clone(), phase: SessionPhase::Ended });
            ended_active = true;
        }
    }

    if ended_active {
        *active_session_id = None;
        *fast_discovery_until = Some(Instant::now() + FAST_DISCOVERY_DURATION);
    }
}

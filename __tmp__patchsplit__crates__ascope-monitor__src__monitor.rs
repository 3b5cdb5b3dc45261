use crate::bus::{MonitorEvent, SessionPhase};
use crate::session::TrackedSession;
use crate::Result;
use ascope_aggregator::{Aggregator, AggregatorSnapshot};
use ascope_providers::ProducerAdapter;
use ascope_snapshot::{SnapshotStore, StoredSnapshot};
use notify::{Event as FsEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, SystemTime};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const IDLE_THRESHOLD: Duration = Duration::from_secs(15 * 60);
/// Bound on the recent-fs-event dedup ring: `PollWatcher` re-scans its whole
/// watch tree every tick and can report the same (path, size) pair on back
/// to back polls before the write it's reporting has actually changed
/// anything we'd read differently.
const RECENT_EVENTS_CAP: usize = 10_000;

/// One provider's worth of configuration for a running monitor: where its
/// logs live and how it identifies/reads sessions there.
pub struct ProviderContext {
    pub provider: Box<dyn ProducerAdapter>,
    pub log_root: PathBuf,
    pub project_hash: String,
    pub snapshot_every_events: u32,
}

/// Orchestrates discovery, replay, and live tailing of every session under a
/// set of provider roots, publishing [`MonitorEvent`]s as sessions progress
/// through [`SessionPhase`]. Owns a background filesystem watcher thread and
/// a worker thread that does the actual reading/aggregating/snapshotting;
/// `SessionMonitor` itself is just the handle the caller holds onto.
pub struct SessionMonitor {
    _watcher: PollWatcher,
    rx: Receiver<MonitorEvent>,
}

impl SessionMonitor {
    pub fn start(contexts: Vec<ProviderContext>, store: SnapshotStore) -> Result<Self> {
        let (tx_out, rx_out) = channel();
        let (tx_fs, rx_fs) = channel();

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

        std::thread::Builder::new()
            .name("session-monitor".to_string())
            .spawn(move || run_worker(contexts, store, rx_fs, tx_out))?;

        Ok(Self { _watcher: watcher, rx: rx_out })
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
}

/// Keeps the underlying filesystem watcher alive for as long as it's held.
pub struct WatcherGuard(#[allow(dead_code)] PollWatcher);

fn run_worker(
    contexts: Vec<ProviderContext>,
    store: SnapshotStore,
    rx_fs: Receiver<FsEvent>,
    tx: Sender<MonitorEvent>,
) {
    let mut sessions: HashMap<String, TrackedSession> = HashMap::new();
    let mut recent_events: VecDeque<(PathBuf, u64)> = VecDeque::new();

    for context in &contexts {
        discover_sessions(context, &store, &mut sessions, &tx);
    }

    loop {
        match rx_fs.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                for path in &event.paths {
                    if is_duplicate_fs_event(&mut recent_events, path) {
                        continue;
                    }
                    let Some(context) = contexts.iter().find(|c| path.starts_with(&c.log_root))
                    else {
                        continue;
                    };
                    handle_path_event(context, &store, path, &mut sessions, &tx);
                }
            }
            Err(_) => {
                sweep_idle_sessions(&contexts, &store, &mut sessions, &tx);
            }
        }
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

fn discover_sessions(
    context: &ProviderContext,
    store: &SnapshotStore,
    sessions: &mut HashMap<String, TrackedSession>,
    tx: &Sender<MonitorEvent>,
) {
    if !context.log_root.exists() {
        return;
    }
    let Ok(paths) = context.provider.find_all_sessions(&context.log_root) else {
        return;
    };
    for path in paths {
        attach_session(context, store, &path, sessions, tx);
    }
}

fn handle_path_event(
    context: &ProviderContext,
    store: &SnapshotStore,
    path: &Path,
    sessions: &mut HashMap<String, TrackedSession>,
    tx: &Sender<MonitorEvent>,
) {
    let Ok(session_id) = context.provider.get_session_id(path) else {
        return;
    };

    if let Some(tracked) = sessions.get(&session_id) {
        if tracked.path.as_path() != path {
            let _ = tx.send(MonitorEvent::Rotated {
                old_path: tracked.path.clone(),
                new_path: path.to_path_buf(),
            });
        }
    }

    if !sessions.contains_key(&session_id) {
        attach_session(context, store, path, sessions, tx);
        return;
    }

    poll_session(context, store, &session_id, sessions, tx);
}

fn attach_session(
    context: &ProviderContext,
    store: &SnapshotStore,
    path: &Path,
    sessions: &mut HashMap<String, TrackedSession>,
    tx: &Sender<MonitorEvent>,
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

    let _ = tx.send(MonitorEvent::SessionDiscovered {
        session_id: session_id.clone(),
        provider_id: context.provider.id().to_string(),
        path: path.to_path_buf(),
    });
    let _ = tx.send(MonitorEvent::PhaseChanged {
        session_id: session_id.clone(),
        phase: SessionPhase::Replay,
    });

    let aggregator = Aggregator::new(context.provider.id());
    let mut tracked = TrackedSession::new(context.provider.id(), path.to_path_buf(), reader, aggregator);
    tracked.phase = SessionPhase::Replay;

    restore_or_replay(context, store, &session_id, &mut tracked);

    tracked.phase = SessionPhase::Live;
    sessions.insert(session_id.clone(), tracked);
    let _ = tx.send(MonitorEvent::PhaseChanged { session_id, phase: SessionPhase::Live });
}

/// Attempt to resume from a stored snapshot; fall back to reading the
/// session from the start when there is none, the schema version has moved
/// on, or the stored offset no longer makes sense for the file on disk.
fn restore_or_replay(
    context: &ProviderContext,
    store: &SnapshotStore,
    session_id: &str,
    tracked: &mut TrackedSession,
) {
    let path_key = tracked.path.to_string_lossy().to_string();

    if let Ok(Some(stored)) = store.load(&context.project_hash, session_id) {
        let restored = serde_json::from_value::<AggregatorSnapshot>(stored.state.clone())
            .ok()
            .and_then(Aggregator::from_snapshot);

        if let Some(aggregator) = restored {
            tracked.aggregator = aggregator;
            if let Some(offset) = stored.file_offsets.get(&path_key) {
                let _ = tracked.reader.seek_to(*offset);
                return;
            }
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
) {
    let Some(tracked) = sessions.get_mut(session_id) else {
        return;
    };

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

    let Ok(events) = tracked.reader.read_new() else {
        return;
    };
    if events.is_empty() {
        return;
    }

    tracked.last_activity = SystemTime::now();
    for event in &events {
        tracked.aggregator.process_event(event);
    }
    tracked.events_since_snapshot += events.len() as u32;

    if tracked.events_since_snapshot >= context.snapshot_every_events {
        persist_snapshot(context, store, session_id, tracked);
        tracked.events_since_snapshot = 0;
    }

    let _ = tx.send(MonitorEvent::Updated {
        session_id: session_id.to_string(),
        aggregator: Box::new(tracked.aggregator.clone()),
    });
}

fn persist_snapshot(
    context: &ProviderContext,
    store: &SnapshotStore,
    session_id: &str,
    tracked: &TrackedSession,
) {
    let Ok(state) = serde_json::to_value(tracked.aggregator.to_snapshot()) else {
        return;
    };
    let snapshot = StoredSnapshot::new(session_id, &tracked.provider_id, state)
        .with_offset(tracked.path.to_string_lossy(), tracked.reader.get_position());
    let _ = store.save(&context.project_hash, &snapshot);
}

fn sweep_idle_sessions(
    contexts: &[ProviderContext],
    store: &SnapshotStore,
    sessions: &mut HashMap<String, TrackedSession>,
    tx: &Sender<MonitorEvent>,
) {
    let now = SystemTime::now();
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
        persist_snapshot(context, store, session_id, tracked);
        tracked.phase = SessionPhase::Ended;
        let _ = tx.send(MonitorEvent::PhaseChanged {
            session_id: session_id.clone(),
            phase: SessionPhase::Ended,
        });
    }
}



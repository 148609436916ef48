//! Test doubles for the filesystem characteristic.
//!
//! [`ScriptedCharacteristic`] answers writes from a fixed script and is
//! used to exercise the channel's timing rules. [`SimulatedWatch`] keeps
//! an in-memory flash tree and answers like the firmware does, with hooks
//! for injecting faults.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;

use blefs_protocol::constants::{FLAG_DIRECTORY, STATUS_OK};
use blefs_protocol::{
    DeleteResponse, DirEntry, MkdirResponse, MoveResponse, ReadResponse, Request, WriteResponse,
    clean_path,
};

use crate::characteristic::{Characteristic, Notifications};

/// littlefs error codes as the firmware reports them (`i8` on the wire).
pub(crate) const ERR_NOENT: u8 = -2i8 as u8;
pub(crate) const ERR_EXIST: u8 = -17i8 as u8;
pub(crate) const ERR_NOTEMPTY: u8 = -39i8 as u8;

pub(crate) const FILE_TIMESTAMP: u64 = 1_700_000_000_000_000_000;

#[derive(Default)]
struct Subscribers(Mutex<Vec<mpsc::UnboundedSender<Vec<u8>>>>);

impl Subscribers {
    fn subscribe(&self) -> Notifications {
        let (tx, rx) = mpsc::unbounded_channel();
        self.0.lock().unwrap().push(tx);
        Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        }))
    }

    fn notify(&self, frame: Vec<u8>) {
        self.0
            .lock()
            .unwrap()
            .retain(|tx| tx.send(frame.clone()).is_ok());
    }

    fn count(&self) -> usize {
        let mut subs = self.0.lock().unwrap();
        subs.retain(|tx| !tx.is_closed());
        subs.len()
    }
}

enum Step {
    Respond(Vec<Vec<u8>>),
    FailWrite,
}

/// Answers each write with the next scripted step; silent once the script
/// runs out.
pub(crate) struct ScriptedCharacteristic {
    steps: Mutex<VecDeque<Step>>,
    writes: Mutex<Vec<Vec<u8>>>,
    write_calls: AtomicUsize,
    subscribers: Subscribers,
}

impl ScriptedCharacteristic {
    pub(crate) fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            writes: Mutex::new(Vec::new()),
            write_calls: AtomicUsize::new(0),
            subscribers: Subscribers::default(),
        }
    }

    /// Queues the notifications sent in answer to the next write.
    pub(crate) fn respond(&self, frames: Vec<Vec<u8>>) {
        self.steps.lock().unwrap().push_back(Step::Respond(frames));
    }

    /// Makes the next write fail.
    pub(crate) fn fail_write(&self) {
        self.steps.lock().unwrap().push_back(Step::FailWrite);
    }

    /// Pushes an unsolicited notification.
    pub(crate) fn notify(&self, frame: Vec<u8>) {
        self.subscribers.notify(frame);
    }

    /// Frames of the writes that succeeded.
    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub(crate) fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

impl Characteristic for ScriptedCharacteristic {
    async fn write(&self, frame: &[u8]) -> io::Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::FailWrite) => Err(io::Error::other("GATT write rejected")),
            Some(Step::Respond(frames)) => {
                self.writes.lock().unwrap().push(frame.to_vec());
                for f in frames {
                    self.subscribers.notify(f);
                }
                Ok(())
            }
            None => {
                self.writes.lock().unwrap().push(frame.to_vec());
                Ok(())
            }
        }
    }

    async fn subscribe(&self) -> io::Result<Notifications> {
        Ok(self.subscribers.subscribe())
    }

    fn mtu(&self) -> usize {
        23
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File { data: Vec<u8>, timestamp: u64 },
}

struct PendingWrite {
    path: String,
    data: Vec<u8>,
    total: usize,
    timestamp: u64,
}

#[derive(Default)]
struct Faults {
    swallow: u32,
    fail_writes: u32,
    corrupt_command: bool,
    forced_status: Option<u8>,
    after_list: Option<Vec<u8>>,
}

struct WatchState {
    nodes: BTreeMap<String, Node>,
    reading: Option<String>,
    writing: Option<PendingWrite>,
}

/// In-memory watch answering BLEFS requests.
pub(crate) struct SimulatedWatch {
    state: Mutex<WatchState>,
    faults: Mutex<Faults>,
    requests: Mutex<Vec<Request>>,
    subscribers: Subscribers,
    mtu: AtomicUsize,
    connected: AtomicBool,
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

fn name_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, n)| n).unwrap_or(path)
}

impl SimulatedWatch {
    pub(crate) fn new(mtu: usize) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(String::new(), Node::Dir);
        Self {
            state: Mutex::new(WatchState {
                nodes,
                reading: None,
                writing: None,
            }),
            faults: Mutex::new(Faults::default()),
            requests: Mutex::new(Vec::new()),
            subscribers: Subscribers::default(),
            mtu: AtomicUsize::new(mtu),
            connected: AtomicBool::new(true),
        }
    }

    pub(crate) fn add_dir(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .nodes
            .insert(clean_path(path), Node::Dir);
    }

    pub(crate) fn add_file(&self, path: &str, data: &[u8]) {
        self.state.lock().unwrap().nodes.insert(
            clean_path(path),
            Node::File {
                data: data.to_vec(),
                timestamp: FILE_TIMESTAMP,
            },
        );
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state.lock().unwrap().nodes.get(&clean_path(path)) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub(crate) fn is_dir(&self, path: &str) -> bool {
        matches!(
            self.state.lock().unwrap().nodes.get(&clean_path(path)),
            Some(Node::Dir)
        )
    }

    pub(crate) fn exists(&self, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .nodes
            .contains_key(&clean_path(path))
    }

    /// Every request received, decoded.
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn set_mtu(&self, mtu: usize) {
        self.mtu.store(mtu, Ordering::SeqCst);
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Drops the responses to the next `n` writes.
    pub(crate) fn swallow_responses(&self, n: u32) {
        self.faults.lock().unwrap().swallow = n;
    }

    pub(crate) fn fail_writes(&self, n: u32) {
        self.faults.lock().unwrap().fail_writes = n;
    }

    /// Rewrites the command byte of the next response.
    pub(crate) fn corrupt_next_command(&self) {
        self.faults.lock().unwrap().corrupt_command = true;
    }

    /// Replaces the status of every non-listing response.
    pub(crate) fn force_status(&self, status: u8) {
        self.faults.lock().unwrap().forced_status = Some(status);
    }

    /// Sends `frame` right after the terminal entry of the next listing.
    pub(crate) fn append_after_list(&self, frame: Vec<u8>) {
        self.faults.lock().unwrap().after_list = Some(frame);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.count()
    }

    fn handle(&self, request: &Request) -> Vec<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        match request {
            Request::ReadInit { path, offset, chunk_size } => {
                let key = clean_path(path);
                state.reading = Some(key.clone());
                vec![read_chunk(&state.nodes, &key, *offset, *chunk_size)]
            }
            Request::ReadContinue { offset, chunk_size } => {
                let key = state.reading.clone().unwrap_or_default();
                vec![read_chunk(&state.nodes, &key, *offset, *chunk_size)]
            }
            Request::WriteInit {
                path,
                timestamp,
                total_size,
                ..
            } => {
                let key = clean_path(path);
                let parent_ok = matches!(state.nodes.get(parent_of(&key)), Some(Node::Dir));
                let status = if parent_ok { STATUS_OK } else { ERR_NOENT };
                if parent_ok {
                    let pending = PendingWrite {
                        path: key,
                        data: Vec::with_capacity(*total_size as usize),
                        total: *total_size as usize,
                        timestamp: *timestamp,
                    };
                    if pending.total == 0 {
                        commit(&mut state.nodes, pending);
                    } else {
                        state.writing = Some(pending);
                    }
                }
                vec![write_ack(status, 0, *timestamp)]
            }
            Request::WriteContinue { offset, data } => {
                let Some(mut pending) = state.writing.take() else {
                    return vec![write_ack(ERR_NOENT, *offset, 0)];
                };
                if *offset as usize != pending.data.len() {
                    let ts = pending.timestamp;
                    state.writing = Some(pending);
                    return vec![write_ack(ERR_EXIST, *offset, ts)];
                }
                pending.data.extend_from_slice(data);
                let ts = pending.timestamp;
                let next = pending.data.len() as u32;
                if pending.data.len() >= pending.total {
                    commit(&mut state.nodes, pending);
                } else {
                    state.writing = Some(pending);
                }
                vec![write_ack(STATUS_OK, next, ts)]
            }
            Request::Delete { path } => {
                let key = clean_path(path);
                let status = match state.nodes.get(&key) {
                    None => ERR_NOENT,
                    Some(Node::Dir) if has_children(&state.nodes, &key) => ERR_NOTEMPTY,
                    Some(_) => {
                        state.nodes.remove(&key);
                        STATUS_OK
                    }
                };
                vec![DeleteResponse { status }.encode()]
            }
            Request::Mkdir { path, timestamp } => {
                let key = clean_path(path);
                let status = if state.nodes.contains_key(&key) {
                    ERR_EXIST
                } else if !matches!(state.nodes.get(parent_of(&key)), Some(Node::Dir)) {
                    ERR_NOENT
                } else {
                    state.nodes.insert(key, Node::Dir);
                    STATUS_OK
                };
                vec![
                    MkdirResponse {
                        status,
                        timestamp: *timestamp,
                    }
                    .encode(),
                ]
            }
            Request::List { path } => list(&state.nodes, &clean_path(path)),
            Request::Move { old_path, new_path } => {
                let old = clean_path(old_path);
                let new = clean_path(new_path);
                let status = if !state.nodes.contains_key(&old) {
                    ERR_NOENT
                } else if state.nodes.contains_key(&new) {
                    ERR_EXIST
                } else {
                    let moved: Vec<String> = state
                        .nodes
                        .keys()
                        .filter(|k| **k == old || k.starts_with(&format!("{old}/")))
                        .cloned()
                        .collect();
                    for key in moved {
                        if let Some(node) = state.nodes.remove(&key) {
                            let renamed = format!("{new}{}", &key[old.len()..]);
                            state.nodes.insert(renamed, node);
                        }
                    }
                    STATUS_OK
                };
                vec![MoveResponse { status }.encode()]
            }
        }
    }
}

fn has_children(nodes: &BTreeMap<String, Node>, dir: &str) -> bool {
    nodes.keys().any(|k| !k.is_empty() && k != dir && parent_of(k) == dir)
}

fn commit(nodes: &mut BTreeMap<String, Node>, pending: PendingWrite) {
    nodes.insert(
        pending.path,
        Node::File {
            data: pending.data,
            timestamp: pending.timestamp,
        },
    );
}

fn write_ack(status: u8, offset: u32, timestamp: u64) -> Vec<u8> {
    WriteResponse {
        status,
        offset,
        timestamp,
        free_space: 1 << 20,
    }
    .encode()
}

fn read_chunk(nodes: &BTreeMap<String, Node>, key: &str, offset: u32, chunk_size: u32) -> Vec<u8> {
    let response = match nodes.get(key) {
        Some(Node::File { data, .. }) => {
            let start = (offset as usize).min(data.len());
            let end = (start + chunk_size as usize).min(data.len());
            ReadResponse {
                status: STATUS_OK,
                offset,
                total_size: data.len() as u32,
                data: data[start..end].to_vec(),
            }
        }
        _ => ReadResponse {
            status: ERR_NOENT,
            offset,
            total_size: 0,
            data: Vec::new(),
        },
    };
    response.encode().unwrap()
}

fn list(nodes: &BTreeMap<String, Node>, dir: &str) -> Vec<Vec<u8>> {
    if !matches!(nodes.get(dir), Some(Node::Dir)) {
        let mut missing = DirEntry::terminal(0);
        missing.status = ERR_NOENT;
        return vec![missing.encode().unwrap()];
    }

    let mut entries: Vec<(String, u32, u64, u32)> = vec![
        (".".into(), FLAG_DIRECTORY, 0, 0),
        ("..".into(), FLAG_DIRECTORY, 0, 0),
    ];
    for (key, node) in nodes {
        if key.is_empty() || key == dir || parent_of(key) != dir {
            continue;
        }
        let name = name_of(key).to_string();
        match node {
            Node::Dir => entries.push((name, FLAG_DIRECTORY, 0, 0)),
            Node::File { data, timestamp } => {
                entries.push((name, 0, *timestamp, data.len() as u32))
            }
        }
    }

    let total = entries.len() as u32;
    let mut frames: Vec<Vec<u8>> = entries
        .into_iter()
        .enumerate()
        .map(|(i, (path, flags, timestamp, size))| {
            DirEntry {
                status: STATUS_OK,
                entry_number: i as u32,
                total_entries: total,
                flags,
                timestamp,
                size,
                path,
            }
            .encode()
            .unwrap()
        })
        .collect();
    frames.push(DirEntry::terminal(total).encode().unwrap());
    frames
}

impl Characteristic for SimulatedWatch {
    async fn write(&self, frame: &[u8]) -> io::Result<()> {
        {
            let mut faults = self.faults.lock().unwrap();
            if faults.fail_writes > 0 {
                faults.fail_writes -= 1;
                return Err(io::Error::other("GATT write rejected"));
            }
        }

        let request = Request::decode(frame)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.requests.lock().unwrap().push(request.clone());

        // A swallowed exchange is lost before the firmware acts on it.
        {
            let mut faults = self.faults.lock().unwrap();
            if faults.swallow > 0 {
                faults.swallow -= 1;
                return Ok(());
            }
        }

        let mut frames = self.handle(&request);
        let mut faults = self.faults.lock().unwrap();
        if let Some(status) = faults.forced_status {
            for f in frames.iter_mut() {
                if f[0] != 0x51 && f.len() > 1 {
                    f[1] = status;
                }
            }
        }
        if faults.corrupt_command {
            faults.corrupt_command = false;
            if let Some(first) = frames.first_mut() {
                first[0] = if first[0] == 0x21 { 0x11 } else { 0x21 };
            }
        }
        if matches!(request, Request::List { .. })
            && let Some(extra) = faults.after_list.take()
        {
            frames.push(extra);
        }
        drop(faults);

        for f in frames {
            self.subscribers.notify(f);
        }
        Ok(())
    }

    async fn subscribe(&self) -> io::Result<Notifications> {
        Ok(self.subscribers.subscribe())
    }

    fn mtu(&self) -> usize {
        self.mtu.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

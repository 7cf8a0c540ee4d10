//! In-memory [`Peer`] for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mmbridge_core::ids::ConnectionId;
use parking_lot::Mutex;
use serde_json::Value;

use crate::peer::{Peer, PeerHandle};

/// Records every frame sent to it.
pub(crate) struct RecordingPeer {
    id: ConnectionId,
    open: AtomicBool,
    closed_by_broker: AtomicBool,
    refuse_sends: AtomicBool,
    frames: Mutex<Vec<String>>,
}

impl RecordingPeer {
    pub(crate) fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::from(name),
            open: AtomicBool::new(true),
            closed_by_broker: AtomicBool::new(false),
            refuse_sends: AtomicBool::new(false),
            frames: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn handle(self: &Arc<Self>) -> PeerHandle {
        self.clone()
    }

    /// Simulate the remote end going away.
    pub(crate) fn drop_link(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Keep reporting open but fail every send.
    pub(crate) fn refuse_sends(&self) {
        self.refuse_sends.store(true, Ordering::SeqCst);
    }

    pub(crate) fn was_closed(&self) -> bool {
        self.closed_by_broker.load(Ordering::SeqCst)
    }

    pub(crate) fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    pub(crate) fn json_frames(&self) -> Vec<Value> {
        self.frames()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }
}

impl Peer for RecordingPeer {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, frame: Arc<String>) -> bool {
        if !self.is_open() || self.refuse_sends.load(Ordering::SeqCst) {
            return false;
        }
        self.frames.lock().push((*frame).clone());
        true
    }

    fn close(&self) {
        self.closed_by_broker.store(true, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// Copyright 2024, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::pending::{OffloadOp, PendingOffload};
use crate::session::ServerContext;
use crate::{Message, PeerAddress, ServerEvent};
use bluetooth_leaudio_hci as hci;
use log::{debug, error, warn};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Bound on the vendor command round trip. When it elapses without a
/// completion, offload establishment is abandoned and the stream stays on
/// the host-routed path.
const OFFLOAD_TIMEOUT_MS: u64 = 500;

/// Converts offload start / stop requests into correlated vendor HCI
/// command round trips with a bounded wait, folding the results back into
/// the dispatch path as regular events.
pub(crate) struct OffloadSequencer {
    addr: PeerAddress,
    tx: Sender<Message>,
    pending: PendingOffload,
    timer: Option<JoinHandle<()>>,
}

impl OffloadSequencer {
    pub(crate) fn new(addr: PeerAddress, tx: Sender<Message>) -> Self {
        Self { addr, tx, pending: PendingOffload::default(), timer: None }
    }

    /// Decode and issue an offload request. Records the operation as
    /// pending and, for a start, arms the timeout timer. A request while
    /// another is already pending is rejected. No state transition.
    pub(crate) fn request(&mut self, ctx: &mut dyn ServerContext, op: OffloadOp, data: &[u8]) {
        let Some(command) = hci::VendorCommand::from_bytes(data) else {
            error!("Malformed offload request, Peer=[{}]", self.addr);
            return;
        };

        if let Err(outstanding) = self.pending.insert(op) {
            warn!(
                "Offload request rejected, {:?} already outstanding, Peer=[{}]",
                outstanding, self.addr
            );
            return;
        }

        if op == OffloadOp::Start {
            self.arm_timer();
        }

        ctx.send_vendor_command(command.opcode, &command.payload);
    }

    /// Correlate an HCI completion against the pending operation and
    /// synthesize the event to re-run through dispatch. A completion with
    /// nothing pending is stale or duplicated and is dropped.
    pub(crate) fn correlate(&mut self, data: Vec<u8>) -> Option<ServerEvent> {
        match self.pending.take() {
            Some(OffloadOp::Start) => Some(ServerEvent::OffloadStartComplete(data)),
            Some(OffloadOp::Stop) => Some(ServerEvent::OffloadStopComplete(data)),
            None => {
                debug!("Dropped completion with no offload outstanding, Peer=[{}]", self.addr);
                None
            }
        }
    }

    /// The start round trip completed, disarm the timer.
    pub(crate) fn complete_start(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// The timer fired without a completion, release the start flag and the
    /// spent handle.
    pub(crate) fn timed_out(&mut self) {
        self.pending.remove(OffloadOp::Start);
        self.timer = None;
    }

    /// Quiesce both the pending set and the timer. Invoked when the session
    /// falls back to Closed with a round trip still in flight.
    pub(crate) fn reset(&mut self) {
        self.pending.take();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn arm_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            warn!("Found a leftover offload timer, Peer=[{}]", self.addr);
            timer.abort();
        }
        let tx = self.tx.clone();
        let addr = self.addr;
        self.timer = Some(tokio::spawn(async move {
            sleep(Duration::from_millis(OFFLOAD_TIMEOUT_MS)).await;
            let _ = tx.send(Message::SessionEvent(addr, ServerEvent::OffloadTimeout)).await;
        }));
    }

    #[cfg(test)]
    pub(crate) fn is_timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    #[cfg(test)]
    pub(crate) fn is_pending_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, op: OffloadOp) -> bool {
        self.pending.contains(op)
    }
}

impl Drop for OffloadSequencer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

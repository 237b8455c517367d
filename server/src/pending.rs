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

/// Offload operations that can be outstanding on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OffloadOp {
    Start,
    Stop,
}

/// Set of offload operations awaiting an HCI completion or timeout.
///
/// The protocol is non-overlapping: a stop is only requested for an already
/// established offload, so at most one operation is ever outstanding. The
/// representation enforces it, a second request while one is pending is
/// rejected by [`insert`](PendingOffload::insert) rather than merged.
#[derive(Debug, Default)]
pub(crate) struct PendingOffload(Option<OffloadOp>);

impl PendingOffload {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub(crate) fn contains(&self, op: OffloadOp) -> bool {
        self.0 == Some(op)
    }

    /// Record `op` as outstanding. Fails with the operation already pending
    /// when the set is not empty.
    pub(crate) fn insert(&mut self, op: OffloadOp) -> Result<(), OffloadOp> {
        match self.0 {
            None => {
                self.0 = Some(op);
                Ok(())
            }
            Some(pending) => Err(pending),
        }
    }

    /// Clear and return the outstanding operation, if any.
    pub(crate) fn take(&mut self) -> Option<OffloadOp> {
        self.0.take()
    }

    /// Clear `op` if it is the outstanding operation. Returns whether it was.
    pub(crate) fn remove(&mut self, op: OffloadOp) -> bool {
        if self.0 == Some(op) {
            self.0 = None;
            return true;
        }
        false
    }
}

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

//! LE Audio Service, server role: per-peer session lifecycle control.
//!
//! One [`Session`] exists per remote peer. Decoded stack events, application
//! offload requests, HCI completions and timer firings are delivered one at
//! a time to [`Session::dispatch`] by the owning service's serialized event
//! loop, and drive the session through its lifecycle:
//!
//! ```text
//!             Connected                QoS config
//!   Closed ------------> Opening ------------------> Opened
//!     ^                    ^  |                      |    ^
//!     |       codec config |  | releasing   enabling |    | QoS config
//!     |                    |  v                      v    |
//!      `----------------- Closing <---------------- Started
//!        Disconnected              releasing /
//!        (from any state)          disabling
//! ```
//!
//! While `offloading` is set, the Opened to Started transition is deferred
//! behind a vendor HCI round trip that hands the audio path to the
//! controller; the session and its offload sequencer hold the pending flag
//! and timeout rules.

mod address;
mod events;
mod offload;
mod pending;
mod session;

#[cfg(test)]
mod tests;

pub use address::PeerAddress;
pub use events::{AudioConfig, AudioStream, ProfileConnectionState, ServerEvent};
pub use session::{ServerContext, Session, SessionState};

/// Messages routed back into the serialized event-processing context of the
/// owning service, which forwards them to the addressed peer's session.
#[derive(Debug)]
pub enum Message {
    SessionEvent(PeerAddress, ServerEvent),
}

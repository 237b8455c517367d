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

use num_derive::{FromPrimitive, ToPrimitive};

/// Profile-level connection state of a peer, as reported by the stack and
/// forwarded to upper layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ProfileConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
}

/// One audio stream (ASE direction) negotiated with the peer, as tracked by
/// the shared stream registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStream {
    pub stream_id: u32,
    pub is_source: bool,
    pub sdu_size: u16,
    pub started: bool,
}

/// Negotiated codec configuration for one direction, resolved from the
/// codec-configuration collaborator when a stream starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub bits_per_sample: u8,
    pub channel_count: u8,
}

/// Events dispatched to a session, one variant per kind, each carrying only
/// the payload that event needs.
#[derive(Debug)]
pub enum ServerEvent {
    /// Peer connection-state change from the stack.
    ConnectionState(ProfileConnectionState),

    /// ASE sub-state changes, already decoded by the stack.
    AseCodecConfig { stream_id: u32 },
    AseQosConfig { stream_id: u32 },
    AseEnabling,
    AseStreaming,
    AseDisabling,
    AseReleasing,
    AseIdle,

    /// Stream lifecycle reported by the stack.
    StreamAdded { stream_id: u32 },
    StreamRemoved { stream_id: u32 },
    StreamStarted(AudioStream),
    StreamStopped { stream_id: u32 },
    StreamResume { stream_id: u32 },
    StreamSuspend { stream_id: u32 },

    /// Application request to start / stop hardware offload, carrying the
    /// vendor command bytes `[ogf][ocf LE][payload...]`.
    OffloadStartRequest(Vec<u8>),
    OffloadStopRequest(Vec<u8>),

    /// Completion of an outstanding vendor command, carrying the raw HCI
    /// event bytes. Correlated against the pending offload operation and
    /// re-dispatched as `OffloadStartComplete` / `OffloadStopComplete`.
    OffloadComplete(Vec<u8>),
    OffloadStartComplete(Vec<u8>),
    OffloadStopComplete(Vec<u8>),

    /// The offload command timer fired before any completion arrived.
    OffloadTimeout,
}

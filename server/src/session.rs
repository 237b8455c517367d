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

//! Per-peer session state machine of the LE Audio server role.

use crate::events::{AudioConfig, AudioStream, ProfileConnectionState, ServerEvent};
use crate::offload::OffloadSequencer;
use crate::pending::OffloadOp;
use crate::{Message, PeerAddress};
use bluetooth_leaudio_hci as hci;
use log::{debug, error, warn};
use num_derive::{FromPrimitive, ToPrimitive};
use tokio::sync::mpsc::Sender;

/// Lifecycle states of a session. The discriminants are the stable
/// identifiers reported to status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum SessionState {
    Closed = 0,
    Opening = 1,
    Opened = 2,
    Started = 3,
    Closing = 4,
}

/// Boundary to the collaborators a session calls outward: connection-state
/// fan-out, the shared stream registry, the audio sink / source modules,
/// codec configuration, and the vendor HCI command transport.
///
/// Passed `&mut` at dispatch time; a session never retains a reference to
/// the owning service.
pub trait ServerContext {
    /// Fan a profile connection-state change out to upper layers.
    fn notify_connection_state(&mut self, addr: &PeerAddress, state: ProfileConnectionState);

    /// Tell upper layers that offloaded streaming started for this peer.
    fn notify_streams_started(&mut self, addr: &PeerAddress);

    /// Associate a stream id with this peer in the shared registry.
    fn add_stream(&mut self, stream_id: u32, addr: &PeerAddress);

    /// Release a stream-id association, whoever owns it.
    fn remove_stream(&mut self, stream_id: u32);

    /// Look a stream up in the shared registry. The registry is shared
    /// across peers, absence is a valid answer at any time.
    fn find_stream(&mut self, stream_id: u32) -> Option<&mut AudioStream>;

    /// Negotiated codec configuration for one direction, if any.
    fn codec_config(&mut self, is_source: bool) -> Option<AudioConfig>;

    fn update_source_codec(&mut self, config: &AudioConfig, sdu_size: u16);
    fn update_sink_codec(&mut self, config: &AudioConfig, sdu_size: u16);

    /// Start sink playback. Source capture start is driven externally.
    fn start_sink(&mut self);

    fn stop_source(&mut self, force: bool);
    fn stop_sink(&mut self, force: bool);

    /// Issue a vendor HCI command; its completion comes back later as an
    /// [`ServerEvent::OffloadComplete`] dispatch.
    fn send_vendor_command(&mut self, opcode: hci::OpCode, payload: &[u8]);
}

/// Side effects decided by the transition function and evaluated by
/// [`Session::dispatch`] against the collaborators.
#[derive(Debug)]
enum Effect {
    NotifyConnectionState(ProfileConnectionState),
    AddStream(u32),
    RemoveStream(u32),
    StopStream(u32),
    StartStream(AudioStream),
    RequestOffload(OffloadOp, Vec<u8>),
    CompleteOffloadStart,
    OffloadTimedOut,
}

struct Reaction {
    next: Option<SessionState>,
    effects: Vec<Effect>,
}

impl Reaction {
    fn none() -> Self {
        Self { next: None, effects: vec![] }
    }

    fn go(next: SessionState) -> Self {
        Self { next: Some(next), effects: vec![] }
    }

    fn effect(effect: Effect) -> Self {
        Self { next: None, effects: vec![effect] }
    }

    fn go_with(next: SessionState, effect: Effect) -> Self {
        Self { next: Some(next), effects: vec![effect] }
    }
}

/// One session per connected-or-connecting peer, created Closed and
/// quiescent; driven exclusively through [`dispatch`](Session::dispatch) on
/// the owning service's serialized event context.
pub struct Session {
    addr: PeerAddress,
    state: SessionState,
    offloading: bool,
    offload: OffloadSequencer,
}

impl Session {
    /// New session in [`SessionState::Closed`]. `tx` feeds timer firings
    /// back into the serialized delivery loop.
    pub fn new(addr: PeerAddress, tx: Sender<Message>) -> Self {
        Self {
            addr,
            state: SessionState::Closed,
            offloading: false,
            offload: OffloadSequencer::new(addr, tx),
        }
    }

    pub fn address(&self) -> PeerAddress {
        self.addr
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Stable numeric identifier of the current state.
    pub fn state_id(&self) -> u32 {
        self.state as u32
    }

    /// Chooses between the host codec path and hardware offload on the next
    /// Opened to Started evaluation.
    pub fn set_offloading(&mut self, offloading: bool) {
        self.offloading = offloading;
    }

    /// Synchronously run one step of the state machine. Events that are
    /// meaningless in the current state are ignored.
    pub fn dispatch(&mut self, ctx: &mut dyn ServerContext, event: ServerEvent) {
        debug!(
            "ProcessEvent, State={:?}, Peer=[{}], Event={:?}",
            self.state, self.addr, event
        );

        match event {
            ServerEvent::OffloadComplete(data) => {
                // Completion correlation happens before the per-state
                // tables; an uncorrelated completion is stale and must not
                // re-enter.
                if let Some(event) = self.offload.correlate(data) {
                    self.dispatch(ctx, event);
                }
            }
            event => {
                let Reaction { next, effects } = react(self.state, self.offloading, event);
                for effect in effects {
                    self.run_effect(ctx, effect);
                }
                if let Some(next) = next {
                    self.transition_to(ctx, next);
                }
            }
        }
    }

    fn run_effect(&mut self, ctx: &mut dyn ServerContext, effect: Effect) {
        match effect {
            Effect::NotifyConnectionState(state) => {
                ctx.notify_connection_state(&self.addr, state);
            }
            Effect::AddStream(stream_id) => {
                ctx.add_stream(stream_id, &self.addr);
            }
            Effect::RemoveStream(stream_id) => {
                ctx.remove_stream(stream_id);
            }
            Effect::StopStream(stream_id) => {
                let Some(stream) = ctx.find_stream(stream_id) else {
                    error!("Failed, stream 0x{:08x} not found", stream_id);
                    return;
                };
                stream.started = false;
                let is_source = stream.is_source;
                if is_source {
                    ctx.stop_source(true);
                } else {
                    ctx.stop_sink(true);
                }
            }
            Effect::StartStream(stream) => {
                let Some(config) = ctx.codec_config(stream.is_source) else {
                    error!("No codec config for stream 0x{:08x}", stream.stream_id);
                    return;
                };
                if stream.is_source {
                    ctx.update_source_codec(&config, stream.sdu_size);
                } else {
                    ctx.update_sink_codec(&config, stream.sdu_size);
                    ctx.start_sink();
                }
            }
            Effect::RequestOffload(op, data) => {
                self.offload.request(ctx, op, &data);
            }
            Effect::CompleteOffloadStart => {
                self.offload.complete_start();
            }
            Effect::OffloadTimedOut => {
                self.offload.timed_out();
            }
        }
    }

    fn transition_to(&mut self, ctx: &mut dyn ServerContext, next: SessionState) {
        debug!("Exit State={:?}, Peer=[{}]", self.state, self.addr);
        self.state = next;
        debug!("Enter State={:?}, Peer=[{}]", self.state, self.addr);

        // Entry side effects. Construction enters Closed without passing
        // through here, so the disconnect notification fires on re-entries
        // only.
        match next {
            SessionState::Closed => {
                // A round trip still in flight is abandoned with the
                // connection.
                self.offload.reset();
                ctx.notify_connection_state(&self.addr, ProfileConnectionState::Disconnected);
            }
            SessionState::Started if self.offloading => {
                ctx.notify_streams_started(&self.addr);
            }
            _ => (),
        }
    }

    #[cfg(test)]
    pub(crate) fn offload(&self) -> &OffloadSequencer {
        &self.offload
    }
}

fn react(state: SessionState, offloading: bool, event: ServerEvent) -> Reaction {
    match state {
        SessionState::Closed => closed_react(event),
        SessionState::Opening => opening_react(event),
        SessionState::Opened => opened_react(offloading, event),
        SessionState::Started => started_react(event),
        SessionState::Closing => closing_react(event),
    }
}

/// Only `Connected` and `Disconnected` drive transitions; the transient
/// states are always ignored with a warning.
fn disconnect_or_warn(state: ProfileConnectionState) -> Reaction {
    match state {
        ProfileConnectionState::Disconnected => Reaction::go(SessionState::Closed),
        state => {
            warn!("Ignored connection state: {:?}", state);
            Reaction::none()
        }
    }
}

fn closed_react(event: ServerEvent) -> Reaction {
    match event {
        ServerEvent::ConnectionState(ProfileConnectionState::Connected) => Reaction::go_with(
            SessionState::Opening,
            Effect::NotifyConnectionState(ProfileConnectionState::Connected),
        ),
        ServerEvent::ConnectionState(state) => {
            warn!("Ignored connection state: {:?}", state);
            Reaction::none()
        }
        ServerEvent::StreamRemoved { stream_id } => Reaction::effect(Effect::RemoveStream(stream_id)),
        _ => Reaction::none(),
    }
}

fn opening_react(event: ServerEvent) -> Reaction {
    match event {
        ServerEvent::ConnectionState(state) => disconnect_or_warn(state),
        ServerEvent::StreamAdded { stream_id } => Reaction::effect(Effect::AddStream(stream_id)),
        ServerEvent::StreamRemoved { stream_id } => Reaction::effect(Effect::RemoveStream(stream_id)),
        // Codec negotiation is expected while opening, absorbed here.
        ServerEvent::AseCodecConfig { .. } => Reaction::none(),
        ServerEvent::AseQosConfig { .. } => Reaction::go(SessionState::Opened),
        ServerEvent::AseReleasing => Reaction::go(SessionState::Closing),
        _ => Reaction::none(),
    }
}

fn opened_react(offloading: bool, event: ServerEvent) -> Reaction {
    match event {
        ServerEvent::ConnectionState(state) => disconnect_or_warn(state),
        ServerEvent::AseQosConfig { .. } => Reaction::none(),
        ServerEvent::AseEnabling => {
            if offloading {
                // Deferred until the offload start round trip completes.
                Reaction::none()
            } else {
                Reaction::go(SessionState::Started)
            }
        }
        ServerEvent::OffloadStartRequest(data) => {
            Reaction::effect(Effect::RequestOffload(OffloadOp::Start, data))
        }
        ServerEvent::OffloadStartComplete(data) => offload_start_result(&data),
        ServerEvent::OffloadStopRequest(data) => {
            Reaction::effect(Effect::RequestOffload(OffloadOp::Stop, data))
        }
        ServerEvent::OffloadStopComplete(_) => Reaction::none(),
        ServerEvent::OffloadTimeout => Reaction::effect(Effect::OffloadTimedOut),
        ServerEvent::AseCodecConfig { .. } => Reaction::go(SessionState::Opening),
        ServerEvent::AseReleasing => Reaction::go(SessionState::Closing),
        ServerEvent::StreamAdded { stream_id } => Reaction::effect(Effect::AddStream(stream_id)),
        ServerEvent::StreamRemoved { stream_id } => Reaction::effect(Effect::RemoveStream(stream_id)),
        ServerEvent::StreamStopped { stream_id } => Reaction::effect(Effect::StopStream(stream_id)),
        _ => Reaction::none(),
    }
}

fn started_react(event: ServerEvent) -> Reaction {
    match event {
        ServerEvent::ConnectionState(state) => disconnect_or_warn(state),
        ServerEvent::AseStreaming => Reaction::none(),
        // Reserved for future use, must neither transition nor error.
        ServerEvent::StreamResume { .. } => Reaction::none(),
        ServerEvent::StreamSuspend { .. } => Reaction::none(),
        ServerEvent::AseQosConfig { .. } => Reaction::go(SessionState::Opened),
        ServerEvent::StreamStarted(stream) => Reaction::effect(Effect::StartStream(stream)),
        ServerEvent::StreamStopped { stream_id } => Reaction::effect(Effect::StopStream(stream_id)),
        ServerEvent::AseDisabling => Reaction::go(SessionState::Closing),
        ServerEvent::AseReleasing => Reaction::go(SessionState::Closing),
        ServerEvent::OffloadStopRequest(data) => {
            Reaction::effect(Effect::RequestOffload(OffloadOp::Stop, data))
        }
        ServerEvent::OffloadStopComplete(_) => Reaction::none(),
        ServerEvent::OffloadTimeout => Reaction::effect(Effect::OffloadTimedOut),
        ServerEvent::StreamRemoved { stream_id } => Reaction::effect(Effect::RemoveStream(stream_id)),
        _ => Reaction::none(),
    }
}

fn closing_react(event: ServerEvent) -> Reaction {
    match event {
        ServerEvent::ConnectionState(state) => disconnect_or_warn(state),
        // Re-negotiation started before teardown completed.
        ServerEvent::AseCodecConfig { .. } => Reaction::go(SessionState::Opening),
        // Idempotent self-transition, re-runs the exit / enter traces.
        ServerEvent::AseReleasing => Reaction::go(SessionState::Closing),
        ServerEvent::OffloadStopRequest(data) => {
            Reaction::effect(Effect::RequestOffload(OffloadOp::Stop, data))
        }
        ServerEvent::OffloadTimeout => Reaction::effect(Effect::OffloadTimedOut),
        ServerEvent::StreamRemoved { stream_id } => Reaction::effect(Effect::RemoveStream(stream_id)),
        ServerEvent::StreamStopped { stream_id } => Reaction::effect(Effect::StopStream(stream_id)),
        _ => Reaction::none(),
    }
}

/// Judge an offload start completion. On anything but a well-formed success
/// the session stays where it is and audio remains host-routed.
fn offload_start_result(data: &[u8]) -> Reaction {
    let status = match hci::Event::from_bytes(data) {
        Ok(hci::Event::CommandComplete(e)) => e.status(),
        _ => None,
    };
    match status {
        Some(status) if status.is_success() => {
            Reaction::go_with(SessionState::Started, Effect::CompleteOffloadStart)
        }
        status => {
            error!("Offload start failed, status: {:?}", status);
            Reaction::effect(Effect::CompleteOffloadStart)
        }
    }
}

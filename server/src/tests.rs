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

use crate::events::{AudioConfig, AudioStream, ProfileConnectionState, ServerEvent};
use crate::pending::OffloadOp;
use crate::session::{ServerContext, Session, SessionState};
use crate::{Message, PeerAddress};
use bluetooth_leaudio_hci as hci;
use tokio::sync::mpsc::{channel, Receiver};

#[derive(Default)]
struct TestContext {
    connection_states: Vec<(PeerAddress, ProfileConnectionState)>,
    streams_started: Vec<PeerAddress>,
    streams: Vec<AudioStream>,
    added: Vec<(u32, PeerAddress)>,
    removed: Vec<u32>,
    source_config: Option<AudioConfig>,
    sink_config: Option<AudioConfig>,
    source_codec_updates: Vec<(AudioConfig, u16)>,
    sink_codec_updates: Vec<(AudioConfig, u16)>,
    sink_starts: usize,
    source_stops: Vec<bool>,
    sink_stops: Vec<bool>,
    sent_commands: Vec<(hci::OpCode, Vec<u8>)>,
}

impl ServerContext for TestContext {
    fn notify_connection_state(&mut self, addr: &PeerAddress, state: ProfileConnectionState) {
        self.connection_states.push((*addr, state));
    }

    fn notify_streams_started(&mut self, addr: &PeerAddress) {
        self.streams_started.push(*addr);
    }

    fn add_stream(&mut self, stream_id: u32, addr: &PeerAddress) {
        self.added.push((stream_id, *addr));
    }

    fn remove_stream(&mut self, stream_id: u32) {
        self.removed.push(stream_id);
    }

    fn find_stream(&mut self, stream_id: u32) -> Option<&mut AudioStream> {
        self.streams.iter_mut().find(|s| s.stream_id == stream_id)
    }

    fn codec_config(&mut self, is_source: bool) -> Option<AudioConfig> {
        if is_source {
            self.source_config.clone()
        } else {
            self.sink_config.clone()
        }
    }

    fn update_source_codec(&mut self, config: &AudioConfig, sdu_size: u16) {
        self.source_codec_updates.push((config.clone(), sdu_size));
    }

    fn update_sink_codec(&mut self, config: &AudioConfig, sdu_size: u16) {
        self.sink_codec_updates.push((config.clone(), sdu_size));
    }

    fn start_sink(&mut self) {
        self.sink_starts += 1;
    }

    fn stop_source(&mut self, force: bool) {
        self.source_stops.push(force);
    }

    fn stop_sink(&mut self, force: bool) {
        self.sink_stops.push(force);
    }

    fn send_vendor_command(&mut self, opcode: hci::OpCode, payload: &[u8]) {
        self.sent_commands.push((opcode, payload.to_vec()));
    }
}

fn peer() -> PeerAddress {
    PeerAddress { address: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55] }
}

fn setup() -> (Session, TestContext, Receiver<Message>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (tx, rx) = channel(10);
    (Session::new(peer(), tx), TestContext::default(), rx)
}

fn config() -> AudioConfig {
    AudioConfig { sample_rate: 48000, bits_per_sample: 16, channel_count: 2 }
}

/// Opcode 0xfd5c: OGF 0x3f (vendor specific), OCF 0x15c.
fn start_request() -> Vec<u8> {
    vec![0x3f, 0x5c, 0x01, 0xa0, 0xa1, 0xa2]
}

fn completion(status: u8) -> Vec<u8> {
    vec![0x0e, 0x04, 0x01, 0x5c, 0xfd, status]
}

/// Drive a fresh session from Closed to Opened.
fn open(session: &mut Session, ctx: &mut TestContext) {
    session.dispatch(ctx, ServerEvent::ConnectionState(ProfileConnectionState::Connected));
    session.dispatch(ctx, ServerEvent::AseCodecConfig { stream_id: 0x0601 });
    session.dispatch(ctx, ServerEvent::AseQosConfig { stream_id: 0x0601 });
    assert_eq!(session.state(), SessionState::Opened);
}

#[test]
fn test_initial_state() {
    let (session, _, _rx) = setup();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.state_id(), 0);
    assert_eq!(session.address(), peer());
}

#[test]
fn test_state_ids_are_stable() {
    use num_traits::FromPrimitive;
    assert_eq!(SessionState::from_u32(3), Some(SessionState::Started));
    assert_eq!(SessionState::from_u32(4), Some(SessionState::Closing));
    assert_eq!(SessionState::from_u32(5), None);
}

#[test]
fn test_connect_notifies_and_opens() {
    let (mut session, mut ctx, _rx) = setup();
    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Connected));
    assert_eq!(session.state(), SessionState::Opening);
    assert_eq!(ctx.connection_states, vec![(peer(), ProfileConnectionState::Connected)]);
}

#[test]
fn test_closed_ignores_unrelated_events() {
    let (mut session, mut ctx, _rx) = setup();
    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Connecting));
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);
    session.dispatch(&mut ctx, ServerEvent::AseQosConfig { stream_id: 0x0601 });
    assert_eq!(session.state(), SessionState::Closed);
    assert!(ctx.connection_states.is_empty());
}

#[test]
fn test_stream_removal_works_in_closed() {
    let (mut session, mut ctx, _rx) = setup();
    session.dispatch(&mut ctx, ServerEvent::StreamRemoved { stream_id: 0x0601 });
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(ctx.removed, vec![0x0601]);
}

#[test]
fn test_open_sequence() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
}

#[test]
fn test_disconnect_notifies() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Disconnected));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(ctx.connection_states.last(), Some(&(peer(), ProfileConnectionState::Disconnected)));
}

#[test]
fn test_duplicate_disconnect_notifies_once() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Disconnected));
    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Disconnected));
    assert_eq!(session.state(), SessionState::Closed);
    // One Connected from opening, one Disconnected from the re-entry.
    assert_eq!(ctx.connection_states.len(), 2);
}

#[test]
fn test_disconnect_quiesces_pending_offload() {
    tokio::runtime::Runtime::new().unwrap().block_on(async {
        let (mut session, mut ctx, _rx) = setup();
        session.set_offloading(true);
        open(&mut session, &mut ctx);

        session.dispatch(&mut ctx, ServerEvent::OffloadStartRequest(start_request()));
        assert!(session.offload().is_pending(OffloadOp::Start));

        session.dispatch(
            &mut ctx,
            ServerEvent::ConnectionState(ProfileConnectionState::Disconnected),
        );
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.offload().is_pending_empty());
        assert!(!session.offload().is_timer_armed());

        // The completion arriving after teardown is stale.
        session.dispatch(&mut ctx, ServerEvent::OffloadComplete(completion(0x00)));
        assert_eq!(session.state(), SessionState::Closed);
    });
}

#[test]
fn test_transient_connection_states_ignored_while_open() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Connecting));
    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Disconnecting));
    assert_eq!(session.state(), SessionState::Opened);
}

#[test]
fn test_stream_registry_updates_while_opening() {
    let (mut session, mut ctx, _rx) = setup();
    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Connected));
    session.dispatch(&mut ctx, ServerEvent::StreamAdded { stream_id: 0x0601 });
    session.dispatch(&mut ctx, ServerEvent::StreamRemoved { stream_id: 0x0601 });
    assert_eq!(ctx.added, vec![(0x0601, peer())]);
    assert_eq!(ctx.removed, vec![0x0601]);
    assert_eq!(session.state(), SessionState::Opening);
}

#[test]
fn test_host_path_enabling_starts() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);
    assert_eq!(session.state(), SessionState::Started);
    // No offload, so no streams-started callback on entry.
    assert!(ctx.streams_started.is_empty());
}

#[test]
fn test_offloading_defers_enabling() {
    let (mut session, mut ctx, _rx) = setup();
    session.set_offloading(true);
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);
    assert_eq!(session.state(), SessionState::Opened);
}

#[test]
fn test_offload_start_round_trip() {
    tokio::runtime::Runtime::new().unwrap().block_on(async {
        let (mut session, mut ctx, _rx) = setup();
        session.set_offloading(true);
        open(&mut session, &mut ctx);

        session.dispatch(&mut ctx, ServerEvent::OffloadStartRequest(start_request()));
        assert_eq!(
            ctx.sent_commands,
            vec![(hci::OpCode::from(0x3f, 0x15c), vec![0xa0, 0xa1, 0xa2])]
        );
        assert!(session.offload().is_pending(OffloadOp::Start));
        assert!(session.offload().is_timer_armed());

        session.dispatch(&mut ctx, ServerEvent::OffloadComplete(completion(0x00)));
        assert_eq!(session.state(), SessionState::Started);
        assert_eq!(ctx.streams_started, vec![peer()]);
        assert!(session.offload().is_pending_empty());
        assert!(!session.offload().is_timer_armed());
    });
}

#[test]
fn test_offload_start_failure_stays_opened() {
    tokio::runtime::Runtime::new().unwrap().block_on(async {
        let (mut session, mut ctx, _rx) = setup();
        session.set_offloading(true);
        open(&mut session, &mut ctx);

        session.dispatch(&mut ctx, ServerEvent::OffloadStartRequest(start_request()));
        session.dispatch(&mut ctx, ServerEvent::OffloadComplete(completion(0x0c)));
        assert_eq!(session.state(), SessionState::Opened);
        assert!(ctx.streams_started.is_empty());
        assert!(session.offload().is_pending_empty());
        assert!(!session.offload().is_timer_armed());
    });
}

#[test]
fn test_second_offload_request_rejected_while_pending() {
    tokio::runtime::Runtime::new().unwrap().block_on(async {
        let (mut session, mut ctx, _rx) = setup();
        session.set_offloading(true);
        open(&mut session, &mut ctx);

        session.dispatch(&mut ctx, ServerEvent::OffloadStartRequest(start_request()));
        session.dispatch(&mut ctx, ServerEvent::OffloadStartRequest(start_request()));
        assert_eq!(ctx.sent_commands.len(), 1);
        assert!(session.offload().is_pending(OffloadOp::Start));
    });
}

#[test]
fn test_malformed_offload_request_dropped() {
    let (mut session, mut ctx, _rx) = setup();
    session.set_offloading(true);
    open(&mut session, &mut ctx);

    session.dispatch(&mut ctx, ServerEvent::OffloadStartRequest(vec![0x3f, 0x5c]));
    assert!(ctx.sent_commands.is_empty());
    assert!(session.offload().is_pending_empty());
}

#[test]
fn test_stale_completion_dropped() {
    let (mut session, mut ctx, _rx) = setup();
    session.set_offloading(true);
    open(&mut session, &mut ctx);

    session.dispatch(&mut ctx, ServerEvent::OffloadComplete(completion(0x00)));
    assert_eq!(session.state(), SessionState::Opened);
    assert!(ctx.streams_started.is_empty());
}

#[test]
fn test_offload_timeout_fires_through_channel() {
    tokio::runtime::Runtime::new().unwrap().block_on(async {
        let (mut session, mut ctx, mut rx) = setup();
        session.set_offloading(true);
        open(&mut session, &mut ctx);

        session.dispatch(&mut ctx, ServerEvent::OffloadStartRequest(start_request()));
        assert!(session.offload().is_timer_armed());

        let Some(Message::SessionEvent(addr, event)) = rx.recv().await else { panic!() };
        assert_eq!(addr, peer());
        assert!(matches!(event, ServerEvent::OffloadTimeout));

        session.dispatch(&mut ctx, event);
        assert_eq!(session.state(), SessionState::Opened);
        assert!(session.offload().is_pending_empty());
        assert!(!session.offload().is_timer_armed());

        // The completion arriving after the timeout is stale.
        session.dispatch(&mut ctx, ServerEvent::OffloadComplete(completion(0x00)));
        assert_eq!(session.state(), SessionState::Opened);
        assert!(ctx.streams_started.is_empty());
    });
}

#[test]
fn test_offload_stop_from_started() {
    let (mut session, mut ctx, _rx) = setup();
    session.set_offloading(true);
    open(&mut session, &mut ctx);
    // Host-side shortcut into Started to exercise the stop path.
    session.set_offloading(false);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);
    session.set_offloading(true);

    session.dispatch(&mut ctx, ServerEvent::OffloadStopRequest(start_request()));
    assert_eq!(ctx.sent_commands.len(), 1);
    assert!(session.offload().is_pending(OffloadOp::Stop));
    // Stop is not guarded by the timer.
    assert!(!session.offload().is_timer_armed());

    session.dispatch(&mut ctx, ServerEvent::OffloadComplete(completion(0x00)));
    assert!(session.offload().is_pending_empty());
    assert_eq!(session.state(), SessionState::Started);
}

#[test]
fn test_stream_started_sink() {
    let (mut session, mut ctx, _rx) = setup();
    ctx.sink_config = Some(config());
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);

    let stream =
        AudioStream { stream_id: 0x0601, is_source: false, sdu_size: 120, started: true };
    session.dispatch(&mut ctx, ServerEvent::StreamStarted(stream));
    assert_eq!(ctx.sink_codec_updates, vec![(config(), 120)]);
    assert_eq!(ctx.sink_starts, 1);
    assert!(ctx.source_codec_updates.is_empty());
}

#[test]
fn test_stream_started_source() {
    let (mut session, mut ctx, _rx) = setup();
    ctx.source_config = Some(config());
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);

    let stream = AudioStream { stream_id: 0x0602, is_source: true, sdu_size: 60, started: true };
    session.dispatch(&mut ctx, ServerEvent::StreamStarted(stream));
    assert_eq!(ctx.source_codec_updates, vec![(config(), 60)]);
    // Source capture start is driven externally, no sink start either.
    assert_eq!(ctx.sink_starts, 0);
}

#[test]
fn test_stream_started_without_codec_config() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);

    let stream =
        AudioStream { stream_id: 0x0601, is_source: false, sdu_size: 120, started: true };
    session.dispatch(&mut ctx, ServerEvent::StreamStarted(stream));
    assert!(ctx.sink_codec_updates.is_empty());
    assert_eq!(ctx.sink_starts, 0);
    assert_eq!(session.state(), SessionState::Started);
}

#[test]
fn test_stream_stopped() {
    let (mut session, mut ctx, _rx) = setup();
    ctx.streams.push(AudioStream {
        stream_id: 0x0601,
        is_source: false,
        sdu_size: 120,
        started: true,
    });
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);

    session.dispatch(&mut ctx, ServerEvent::StreamStopped { stream_id: 0x0601 });
    assert!(!ctx.streams[0].started);
    assert_eq!(ctx.sink_stops, vec![true]);
    assert!(ctx.source_stops.is_empty());
}

#[test]
fn test_stream_stopped_source() {
    let (mut session, mut ctx, _rx) = setup();
    ctx.streams.push(AudioStream {
        stream_id: 0x0602,
        is_source: true,
        sdu_size: 60,
        started: true,
    });
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);

    session.dispatch(&mut ctx, ServerEvent::StreamStopped { stream_id: 0x0602 });
    assert!(!ctx.streams[0].started);
    assert_eq!(ctx.source_stops, vec![true]);
    assert!(ctx.sink_stops.is_empty());
}

#[test]
fn test_stream_stopped_unknown_stream() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);

    session.dispatch(&mut ctx, ServerEvent::StreamStopped { stream_id: 0x0699 });
    assert!(ctx.sink_stops.is_empty());
    assert!(ctx.source_stops.is_empty());
}

#[test]
fn test_qos_renegotiation_returns_to_opened() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);
    assert_eq!(session.state(), SessionState::Started);

    session.dispatch(&mut ctx, ServerEvent::AseQosConfig { stream_id: 0x0601 });
    assert_eq!(session.state(), SessionState::Opened);
}

#[test]
fn test_codec_renegotiation_returns_to_opening() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseCodecConfig { stream_id: 0x0601 });
    assert_eq!(session.state(), SessionState::Opening);
}

#[test]
fn test_close_sequence() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);

    session.dispatch(&mut ctx, ServerEvent::AseDisabling);
    assert_eq!(session.state(), SessionState::Closing);

    // Releasing while already closing re-enters Closing.
    session.dispatch(&mut ctx, ServerEvent::AseReleasing);
    assert_eq!(session.state(), SessionState::Closing);

    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Disconnected));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(ctx.connection_states.last(), Some(&(peer(), ProfileConnectionState::Disconnected)));
}

#[test]
fn test_release_aborts_from_any_open_state() {
    let (mut session, mut ctx, _rx) = setup();
    session.dispatch(&mut ctx, ServerEvent::ConnectionState(ProfileConnectionState::Connected));
    session.dispatch(&mut ctx, ServerEvent::AseReleasing);
    assert_eq!(session.state(), SessionState::Closing);

    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseReleasing);
    assert_eq!(session.state(), SessionState::Closing);

    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseEnabling);
    session.dispatch(&mut ctx, ServerEvent::AseReleasing);
    assert_eq!(session.state(), SessionState::Closing);
}

#[test]
fn test_closing_codec_config_reopens() {
    let (mut session, mut ctx, _rx) = setup();
    open(&mut session, &mut ctx);
    session.dispatch(&mut ctx, ServerEvent::AseReleasing);
    session.dispatch(&mut ctx, ServerEvent::AseCodecConfig { stream_id: 0x0601 });
    assert_eq!(session.state(), SessionState::Opening);
}

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

/// Status / Error codes, as defined in Part F.
///
/// Only the codes a controller returns on vendor offload command completions
/// are named; any other value is carried through [`Status::Other`] so the
/// exact code still reaches the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    UnknownHciCommand,
    HardwareFailure,
    MemoryCapacityExceeded,
    ConnectionTimeout,
    CommandDisallowed,
    UnsupportedFeatureOrParameterValue,
    InvalidHciCommandParameters,
    UnspecifiedError,
    ControllerBusy,
    Other(u8),
}

impl Status {
    pub fn is_success(&self) -> bool {
        *self == Status::Success
    }
}

impl From<u8> for Status {
    fn from(v: u8) -> Self {
        match v {
            0x00 => Status::Success,
            0x01 => Status::UnknownHciCommand,
            0x03 => Status::HardwareFailure,
            0x07 => Status::MemoryCapacityExceeded,
            0x08 => Status::ConnectionTimeout,
            0x0c => Status::CommandDisallowed,
            0x11 => Status::UnsupportedFeatureOrParameterValue,
            0x12 => Status::InvalidHciCommandParameters,
            0x1f => Status::UnspecifiedError,
            0x3a => Status::ControllerBusy,
            v => Status::Other(v),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => 0x00,
            Status::UnknownHciCommand => 0x01,
            Status::HardwareFailure => 0x03,
            Status::MemoryCapacityExceeded => 0x07,
            Status::ConnectionTimeout => 0x08,
            Status::CommandDisallowed => 0x0c,
            Status::UnsupportedFeatureOrParameterValue => 0x11,
            Status::InvalidHciCommandParameters => 0x12,
            Status::UnspecifiedError => 0x1f,
            Status::ControllerBusy => 0x3a,
            Status::Other(v) => v,
        }
    }
}

#[test]
fn test_status_round_trip() {
    assert_eq!(Status::from(0x00), Status::Success);
    assert!(Status::from(0x00).is_success());
    assert_eq!(Status::from(0x0c), Status::CommandDisallowed);
    assert_eq!(Status::from(0x42), Status::Other(0x42));
    assert!(!Status::from(0x42).is_success());
    assert_eq!(u8::from(Status::ControllerBusy), 0x3a);
    assert_eq!(u8::from(Status::Other(0x42)), 0x42);
}

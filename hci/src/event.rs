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

use crate::command::OpCode;
use crate::reader::Reader;
use crate::status::Status;
use crate::writer::Writer;

/// HCI Event Packet, as defined in Part E - 5.4.4
#[derive(Debug)]
pub enum Event {
    /// 7.7.14 Command Complete
    CommandComplete(CommandComplete),
    /// Unknown Event
    Unknown(u8),
}

impl Event {
    /// Read an HCI Event packet
    pub fn from_bytes(data: &[u8]) -> Result<Self, Option<u8>> {
        fn parse_packet(data: &[u8]) -> Option<(u8, Reader)> {
            let mut r = Reader::new(data);
            let code = r.read_u8()?;
            let len = r.read_u8()? as usize;
            Some((code, Reader::new(r.get(len)?)))
        }

        let Some((code, mut r)) = parse_packet(data) else {
            return Err(None);
        };
        match code {
            CommandComplete::CODE => {
                CommandComplete::read(&mut r).map(Self::CommandComplete).ok_or(Some(code))
            }
            code => Ok(Self::Unknown(code)),
        }
    }
}

/// 7.7.14 Command Complete. The return parameters are kept raw, vendor
/// commands complete with opaque parameters led by the status byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandComplete {
    pub num_hci_command_packets: u8,
    pub opcode: OpCode,
    pub return_parameters: Vec<u8>,
}

impl CommandComplete {
    const CODE: u8 = 0x0e;

    fn read(r: &mut Reader) -> Option<Self> {
        Some(Self {
            num_hci_command_packets: r.read_u8()?,
            opcode: r.read_u16()?.into(),
            return_parameters: r.remaining().to_vec(),
        })
    }

    /// Status byte leading the return parameters, per the standard
    /// completion layout. `None` when the parameters are empty.
    pub fn status(&self) -> Option<Status> {
        self.return_parameters.first().map(|&v| v.into())
    }

    /// Output the HCI Event packet
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new(Vec::with_capacity(2 + 255));
        w.write_u8(Self::CODE);
        w.write_u8(0);
        w.write_u8(self.num_hci_command_packets);
        w.write_u16(self.opcode.into());
        w.put(&self.return_parameters);

        let mut vec = w.into_vec();
        vec[1] = (vec.len() - 2).try_into().unwrap();
        vec
    }
}

#[test]
fn test_command_complete() {
    let dump = [0x0e, 0x05, 0x01, 0x5c, 0xfd, 0x00, 0x7b];
    let Ok(Event::CommandComplete(e)) = Event::from_bytes(&dump) else { panic!() };
    assert_eq!(e.num_hci_command_packets, 1);
    assert_eq!(e.opcode, OpCode::from(0x3f, 0x15c));
    assert_eq!(e.status(), Some(Status::Success));
    assert_eq!(e.return_parameters, &[0x00, 0x7b]);
    assert_eq!(e.to_bytes(), &dump[..]);
}

#[test]
fn test_command_complete_failure_status() {
    let dump = [0x0e, 0x04, 0x01, 0x5c, 0xfd, 0x0c];
    let Ok(Event::CommandComplete(e)) = Event::from_bytes(&dump) else { panic!() };
    assert_eq!(e.status(), Some(Status::CommandDisallowed));
}

#[test]
fn test_command_complete_no_parameters() {
    let dump = [0x0e, 0x03, 0x01, 0x5c, 0xfd];
    let Ok(Event::CommandComplete(e)) = Event::from_bytes(&dump) else { panic!() };
    assert_eq!(e.status(), None);
}

#[test]
fn test_unknown_event() {
    let dump = [0x13, 0x05, 0x01, 0x60, 0x00, 0x01, 0x00];
    let Ok(Event::Unknown(code)) = Event::from_bytes(&dump) else { panic!() };
    assert_eq!(code, 0x13);
}

#[test]
fn test_malformed_event() {
    assert!(Event::from_bytes(&[0x0e]).is_err());
    assert!(Event::from_bytes(&[0x0e, 0x04, 0x01]).is_err());
    assert!(Event::from_bytes(&[0x0e, 0x02, 0x01, 0x5c]).is_err());
}

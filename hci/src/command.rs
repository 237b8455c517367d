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

use crate::reader::Reader;
use crate::writer::Writer;

/// OpCode of HCI Command, as defined in Part E - 5.4.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode(u16);

impl OpCode {
    /// OpCode from OpCode Group Field (OGF) and OpCode Command Field (OCF).
    pub const fn from(ogf: u8, ocf: u16) -> Self {
        Self((ocf & 0x3ff) | ((ogf as u16) << 10))
    }

    pub const fn ogf(&self) -> u8 {
        (self.0 >> 10) as u8
    }

    pub const fn ocf(&self) -> u16 {
        self.0 & 0x3ff
    }
}

impl From<u16> for OpCode {
    fn from(v: u16) -> Self {
        OpCode(v)
    }
}

impl From<OpCode> for u16 {
    fn from(opcode: OpCode) -> Self {
        opcode.0
    }
}

/// Vendor command request, as carried by offload start / stop requests:
/// `[ogf: 1 byte][ocf: 2 bytes LE][parameters...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorCommand {
    pub opcode: OpCode,
    pub payload: Vec<u8>,
}

impl VendorCommand {
    /// Read a vendor command request blob. Returns `None` when the header
    /// is truncated.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let mut r = Reader::new(data);
        let ogf = r.read_u8()?;
        let ocf = r.read_u16()?;
        Some(Self { opcode: OpCode::from(ogf, ocf), payload: r.remaining().to_vec() })
    }

    /// Output the request blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new(Vec::with_capacity(3 + self.payload.len()));
        w.write_u8(self.opcode.ogf());
        w.write_u16(self.opcode.ocf());
        w.put(&self.payload);
        w.into_vec()
    }
}

#[test]
fn test_opcode() {
    let opcode = OpCode::from(0x3f, 0x0fc);
    assert_eq!(opcode.ogf(), 0x3f);
    assert_eq!(opcode.ocf(), 0x0fc);
    assert_eq!(u16::from(opcode), 0xfcfc);
    let from_raw: OpCode = 0xfcfc_u16.into();
    assert_eq!(from_raw, opcode);
}

#[test]
fn test_vendor_command() {
    let dump = [0x3f, 0x5c, 0x01, 0xa0, 0xa1, 0xa2];
    let Some(c) = VendorCommand::from_bytes(&dump) else { panic!() };
    assert_eq!(c.opcode, OpCode::from(0x3f, 0x15c));
    assert_eq!(c.payload, &[0xa0, 0xa1, 0xa2]);
    assert_eq!(c.to_bytes(), &dump[..]);
}

#[test]
fn test_vendor_command_empty_payload() {
    let dump = [0x3f, 0x5c, 0x01];
    let Some(c) = VendorCommand::from_bytes(&dump) else { panic!() };
    assert_eq!(c.payload, &[] as &[u8]);
    assert_eq!(c.to_bytes(), &dump[..]);
}

#[test]
fn test_vendor_command_truncated() {
    assert!(VendorCommand::from_bytes(&[0x3f, 0x5c]).is_none());
    assert!(VendorCommand::from_bytes(&[]).is_none());
}

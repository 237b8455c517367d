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

//! Reading / writing helpers for the slice of Bluetooth HCI touched by the
//! LE Audio hardware-offload path: command opcodes, the vendor command
//! request layout, Command Complete events and status codes.

mod command;
mod event;
mod reader;
mod status;
mod writer;

pub use command::*;
pub use event::*;
pub use status::*;

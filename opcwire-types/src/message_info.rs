// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The `MessageInfo` trait, linking a structured type to its binary encoding id.

use crate::ids::ObjectId;

/// Implemented by messages / structures, to return the id of the type on the wire.
pub trait MessageInfo {
    /// The `_Encoding_DefaultBinary` object id associated with the type.
    fn type_id(&self) -> ObjectId;
}

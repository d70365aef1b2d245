use std::fmt;

use crate::{MapId, ObjectId, StringId};

/// Failures of the map registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaError {
    UnknownMap(MapId),
    UnknownName(StringId),
    OffsetOutOfRange {
        slot: StringId,
        offset: usize,
        value_slot_count: usize,
    },
    SlotCountMismatch { declared: usize, actual: usize },
}

/// Failures of property access on the object heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    NotFound { name: StringId },
    UnknownObject(ObjectId),
    MissingCell { object: ObjectId, offset: usize },
    Schema(SchemaError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    Underflow,
    OutOfBounds { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    MapFailed { size: usize },
    ZeroSizedRequest,
}

/// An integer that does not fit into a fixnum cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixnumRangeError(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Schema(SchemaError),
    Property(PropertyError),
    Stack(StackError),
    Memory(MemoryError),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMap(id) => write!(f, "no map with id {}", id.index()),
            Self::UnknownName(name) => {
                write!(f, "no map named by string {}", name.index())
            }
            Self::OffsetOutOfRange {
                slot,
                offset,
                value_slot_count,
            } => write!(
                f,
                "slot {} has offset {offset} but the map only stores {value_slot_count} values",
                slot.index()
            ),
            Self::SlotCountMismatch { declared, actual } => write!(
                f,
                "map declares {declared} slots but {actual} descriptors were given"
            ),
        }
    }
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => {
                write!(f, "property {} not found", name.index())
            }
            Self::UnknownObject(id) => {
                write!(f, "object {} does not exist", id.index())
            }
            Self::MissingCell { object, offset } => write!(
                f,
                "object {} has no cell at offset {offset}",
                object.index()
            ),
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Underflow => write!(f, "stack underflow"),
            Self::OutOfBounds { index, len } => {
                write!(f, "stack index {index} out of bounds (length {len})")
            }
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MapFailed { size } => {
                write!(f, "failed to map {size} bytes of memory")
            }
            Self::ZeroSizedRequest => {
                write!(f, "cannot resize memory to zero bytes")
            }
        }
    }
}

impl fmt::Display for FixnumRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} does not fit into a 63 bit fixnum", self.0)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "schema error: {err}"),
            Self::Property(err) => write!(f, "property error: {err}"),
            Self::Stack(err) => write!(f, "stack error: {err}"),
            Self::Memory(err) => write!(f, "memory error: {err}"),
        }
    }
}

impl std::error::Error for SchemaError {}
impl std::error::Error for PropertyError {}
impl std::error::Error for StackError {}
impl std::error::Error for MemoryError {}
impl std::error::Error for FixnumRangeError {}
impl std::error::Error for Error {}

impl From<SchemaError> for PropertyError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<SchemaError> for Error {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<PropertyError> for Error {
    fn from(value: PropertyError) -> Self {
        Self::Property(value)
    }
}

impl From<StackError> for Error {
    fn from(value: StackError) -> Self {
        Self::Stack(value)
    }
}

impl From<MemoryError> for Error {
    fn from(value: MemoryError) -> Self {
        Self::Memory(value)
    }
}

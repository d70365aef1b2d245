use std::collections::HashMap;

use crate::{SchemaError, StringId};

/// Sequentially assigned id of a [`Map`] inside its [`MapTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(u32);

impl MapId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Plain data cell.
    Value,
    /// Cell referencing a parent object; lookups walk through it.
    Parent,
    /// Parent link kept at map level. Stored like a value, not traversed.
    MapParent,
    /// Code cell, copied raw.
    Function,
}

impl SlotKind {
    /// Value and parent cells may reference objects owned by the holder.
    #[inline]
    pub fn holds_object(self) -> bool {
        matches!(self, Self::Value | Self::Parent)
    }
}

/// A slot descriptor inside a [`Map`].
///
/// `offset` indexes the owning object's value array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDesc {
    pub name: StringId,
    pub kind: SlotKind,
    pub offset: usize,
}

impl SlotDesc {
    pub fn new(name: StringId, kind: SlotKind, offset: usize) -> Self {
        Self { name, kind, offset }
    }

    #[inline]
    pub fn is_parent(&self) -> bool {
        self.kind == SlotKind::Parent
    }
}

/// Name and kind of a slot whose offset gets assigned by
/// [`MapTable::define`].
#[derive(Debug, Clone, Copy)]
pub struct SlotHelper {
    pub name: StringId,
    pub kind: SlotKind,
}

/// The shape of an object: its ordered slot descriptors and how many value
/// cells an instance stores.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    id: MapId,
    name: StringId,
    value_slot_count: usize,
    slot_descs: Box<[SlotDesc]>,
}

impl Map {
    #[inline]
    pub fn id(&self) -> MapId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> StringId {
        self.name
    }

    /// Number of descriptors, parent references included.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_descs.len()
    }

    /// Number of cells allocated per instance.
    #[inline]
    pub fn value_slot_count(&self) -> usize {
        self.value_slot_count
    }

    #[inline]
    pub fn slot_descs(&self) -> &[SlotDesc] {
        &self.slot_descs
    }

    /// First descriptor named `name`, parents included.
    pub fn find_slot(&self, name: StringId) -> Option<(usize, &SlotDesc)> {
        self.slot_descs
            .iter()
            .enumerate()
            .find(|(_, desc)| desc.name == name)
    }

    pub fn parent_slots(&self) -> impl Iterator<Item = &SlotDesc> {
        self.slot_descs.iter().filter(|desc| desc.is_parent())
    }
}

/// Owns every [`Map`]. Resolves maps by id or by name.
#[derive(Debug, Default)]
pub struct MapTable {
    maps: Vec<Map>,
    names: HashMap<StringId, MapId>,
}

impl MapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new map with a copy of `descs`.
    ///
    /// Names are not required to be unique: a redefinition gets its own id
    /// and takes over the name.
    pub fn create_map(
        &mut self,
        name: StringId,
        descs: &[SlotDesc],
        slot_count: usize,
        value_slot_count: usize,
    ) -> Result<MapId, SchemaError> {
        if slot_count != descs.len() {
            return Err(SchemaError::SlotCountMismatch {
                declared: slot_count,
                actual: descs.len(),
            });
        }

        if let Some(desc) =
            descs.iter().find(|desc| desc.offset >= value_slot_count)
        {
            return Err(SchemaError::OffsetOutOfRange {
                slot: desc.name,
                offset: desc.offset,
                value_slot_count,
            });
        }

        let raw = u32::try_from(self.maps.len())
            .expect("map table exhausted the id space");
        let id = MapId(raw);
        self.maps.push(Map {
            id,
            name,
            value_slot_count,
            slot_descs: descs.into(),
        });

        if let Some(previous) = self.names.insert(name, id) {
            log::warn!(
                "map name {} redefined: map {} shadows map {}",
                name.raw(),
                raw,
                previous.raw()
            );
        }

        log::debug!(
            "created map {raw} with {slot_count} slots and {value_slot_count} values"
        );
        Ok(id)
    }

    /// Create a map whose slots are laid out in declaration order, one value
    /// cell each.
    pub fn define(
        &mut self,
        name: StringId,
        slots: &[SlotHelper],
    ) -> Result<MapId, SchemaError> {
        let descs = slots
            .iter()
            .enumerate()
            .map(|(offset, slot)| SlotDesc::new(slot.name, slot.kind, offset))
            .collect::<Vec<_>>();
        self.create_map(name, &descs, descs.len(), descs.len())
    }

    pub fn get_map(&self, id: MapId) -> Result<&Map, SchemaError> {
        self.maps.get(id.index()).ok_or(SchemaError::UnknownMap(id))
    }

    /// Resolve the most recent map registered under `name`.
    pub fn get_map_by_name(&self, name: StringId) -> Result<&Map, SchemaError> {
        let id = self
            .names
            .get(&name)
            .copied()
            .ok_or(SchemaError::UnknownName(name))?;
        self.get_map(id)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Map> {
        self.maps.iter()
    }
}

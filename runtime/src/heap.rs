//! Object arena.
//!
//! Every [`Object`] lives in a [`Heap`] and is referenced by its
//! [`ObjectId`], both from Rust and from [`Value`] cells. Nothing is ever
//! freed, so an id stays valid for the lifetime of the heap that issued it.
use std::collections::{HashMap, HashSet};

use crate::{
    LookupResult, MapId, MapTable, Object, PropertyError, SchemaError,
    StringId, Value,
};

/// Index of an object inside its [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
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

#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, object: Object) -> ObjectId {
        let raw = u32::try_from(self.objects.len())
            .expect("heap exhausted the object id space");
        self.objects.push(object);
        ObjectId(raw)
    }

    #[inline]
    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.index())
    }

    #[inline]
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Allocate a slot object of `map` with zeroed cells.
    pub fn new_object(
        &mut self,
        maps: &MapTable,
        map: MapId,
    ) -> Result<ObjectId, SchemaError> {
        let map = maps.get_map(map)?;
        Ok(self.allocate(Object::new(map)))
    }

    pub fn new_integer_object(&mut self, value: i64, map: MapId) -> ObjectId {
        self.allocate(Object::integer(value, map))
    }

    pub fn new_float_object(&mut self, value: f64, map: MapId) -> ObjectId {
        self.allocate(Object::float(value, map))
    }

    fn object(&self, id: ObjectId) -> Result<&Object, PropertyError> {
        self.get(id).ok_or(PropertyError::UnknownObject(id))
    }

    /// Read `name` through the receiver and its parents.
    pub fn get_property(
        &self,
        maps: &MapTable,
        receiver: ObjectId,
        name: StringId,
    ) -> Result<Value, PropertyError> {
        match self.lookup(maps, receiver, name)? {
            LookupResult::Found { holder, slot, .. } => {
                self.read_cell(holder, slot.offset)
            }
            LookupResult::None => Err(PropertyError::NotFound { name }),
        }
    }

    /// Write `name` on whichever object owns it: the receiver for a local
    /// slot, otherwise the ancestor the lookup resolved to.
    pub fn set_property(
        &mut self,
        maps: &MapTable,
        receiver: ObjectId,
        name: StringId,
        value: Value,
    ) -> Result<(), PropertyError> {
        match self.lookup(maps, receiver, name)? {
            LookupResult::Found { holder, slot, .. } => {
                self.write_cell(holder, slot.offset, value)
            }
            LookupResult::None => Err(PropertyError::NotFound { name }),
        }
    }

    /// Read a slot declared by the receiver's own map, parent slots
    /// included, without walking any parents.
    pub fn get_local(
        &self,
        maps: &MapTable,
        receiver: ObjectId,
        name: StringId,
    ) -> Result<Value, PropertyError> {
        let offset = self.local_offset(maps, receiver, name)?;
        self.read_cell(receiver, offset)
    }

    /// Write a slot declared by the receiver's own map. This is how parent
    /// links get installed.
    pub fn set_local(
        &mut self,
        maps: &MapTable,
        receiver: ObjectId,
        name: StringId,
        value: Value,
    ) -> Result<(), PropertyError> {
        let offset = self.local_offset(maps, receiver, name)?;
        self.write_cell(receiver, offset, value)
    }

    fn local_offset(
        &self,
        maps: &MapTable,
        receiver: ObjectId,
        name: StringId,
    ) -> Result<usize, PropertyError> {
        let map = maps.get_map(self.object(receiver)?.map())?;
        map.find_slot(name)
            .map(|(_, desc)| desc.offset)
            .ok_or(PropertyError::NotFound { name })
    }

    fn read_cell(
        &self,
        holder: ObjectId,
        offset: usize,
    ) -> Result<Value, PropertyError> {
        self.object(holder)?
            .as_slot_object()
            .and_then(|obj| obj.get_slot(offset))
            .ok_or(PropertyError::MissingCell {
                object: holder,
                offset,
            })
    }

    fn write_cell(
        &mut self,
        holder: ObjectId,
        offset: usize,
        value: Value,
    ) -> Result<(), PropertyError> {
        let written = self
            .get_mut(holder)
            .ok_or(PropertyError::UnknownObject(holder))?
            .as_slot_object_mut()
            .is_some_and(|obj| obj.set_slot(offset, value));

        if written {
            Ok(())
        } else {
            Err(PropertyError::MissingCell {
                object: holder,
                offset,
            })
        }
    }

    /// Shallow copy. Cells referencing other objects keep pointing at the
    /// same children.
    pub fn clone_object(
        &mut self,
        source: ObjectId,
    ) -> Result<ObjectId, PropertyError> {
        let copy = self.object(source)?.clone();
        Ok(self.allocate(copy))
    }

    /// Deep copy of everything reachable from `proto` through Value and
    /// Parent slots. Function and MapParent cells are copied raw.
    ///
    /// Shared children stay shared inside the copy and cycles are
    /// reproduced, each prototype object is materialized exactly once.
    /// A graph with a dangling reference or an unknown map is rejected
    /// before anything is allocated.
    pub fn instantiate(
        &mut self,
        maps: &MapTable,
        proto: ObjectId,
    ) -> Result<ObjectId, PropertyError> {
        self.check_reachable(maps, proto)?;
        let mut copies = HashMap::new();
        let instance = self.instantiate_object(maps, proto, &mut copies)?;
        log::trace!(
            "instantiated object {} as {} ({} objects materialized)",
            proto.raw(),
            instance.raw(),
            copies.len()
        );
        Ok(instance)
    }

    /// Walk the graph `instantiate` would copy and fail on the first
    /// unknown object or map.
    fn check_reachable(
        &self,
        maps: &MapTable,
        proto: ObjectId,
    ) -> Result<(), PropertyError> {
        let mut seen = HashSet::new();
        let mut pending = vec![proto];
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Object::Heap(obj) = self.object(id)? else {
                continue;
            };
            let map = maps.get_map(obj.map())?;
            pending.extend(
                map.slot_descs()
                    .iter()
                    .filter(|slot| slot.kind.holds_object())
                    .filter_map(|slot| obj.get_slot(slot.offset))
                    .filter_map(Value::as_object),
            );
        }
        Ok(())
    }

    fn instantiate_object(
        &mut self,
        maps: &MapTable,
        proto: ObjectId,
        copies: &mut HashMap<ObjectId, ObjectId>,
    ) -> Result<ObjectId, PropertyError> {
        if let Some(&copy) = copies.get(&proto) {
            return Ok(copy);
        }

        let source = match self.object(proto)? {
            Object::Heap(obj) => obj.clone(),
            immediate @ Object::Immediate { .. } => {
                // recursion stops here
                let copy = immediate.clone();
                let copy = self.allocate(copy);
                copies.insert(proto, copy);
                return Ok(copy);
            }
        };

        let map = maps.get_map(source.map())?;

        // register the copy before descending so cycles resolve to it
        let copy = self.allocate(Object::Heap(source.clone()));
        copies.insert(proto, copy);

        let mut cells = source.slots().to_vec();
        for slot in map.slot_descs() {
            if !slot.kind.holds_object() {
                continue;
            }
            let Some(child) = cells.get(slot.offset).and_then(|v| v.as_object())
            else {
                continue;
            };
            let child_copy = self.instantiate_object(maps, child, copies)?;
            cells[slot.offset] = Value::object(child_copy);
        }

        if let Some(Object::Heap(obj)) = self.get_mut(copy) {
            obj.slots_mut().copy_from_slice(&cells);
        }
        Ok(copy)
    }
}

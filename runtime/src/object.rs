use crate::{Map, MapId, Value};

/// Mark bits of an object. `Heap` has no tag set, the immediate tags are
/// mutually exclusive.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjectTag {
    Heap = 0b00,
    Integer = 0b01,
    Float = 0b10,
}

pub const MARK_TAG_MASK: u8 = 0b11;

/// A number stored in place of a slot array.
#[derive(Debug, Copy, Clone)]
pub enum Immediate {
    Integer(i64),
    Float(f64),
}

/// An instance with its own value cells.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotObject {
    map: MapId,
    slots: Box<[Value]>,
}

/// An object is either an immediate number or a slot object. Only the latter
/// owns cells, so an immediate can never be read as a slot array.
///
/// `Clone` is the shallow copy: an immediate copies its number, a slot object
/// copies its cells, so any references in them alias the original children.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Immediate { value: Immediate, map: MapId },
    Heap(SlotObject),
}

impl Immediate {
    #[inline]
    pub fn tag(self) -> ObjectTag {
        match self {
            Self::Integer(_) => ObjectTag::Integer,
            Self::Float(_) => ObjectTag::Float,
        }
    }
}

// floats compare by bits so that an immediate always equals its own copy
impl PartialEq for Immediate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl SlotObject {
    #[inline]
    pub fn map(&self) -> MapId {
        self.map
    }

    #[inline]
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    #[inline]
    pub fn slots_mut(&mut self) -> &mut [Value] {
        &mut self.slots
    }

    #[inline]
    pub fn get_slot(&self, offset: usize) -> Option<Value> {
        self.slots.get(offset).copied()
    }

    #[inline]
    pub fn set_slot(&mut self, offset: usize, value: Value) -> bool {
        match self.slots.get_mut(offset) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }
}

impl Object {
    /// A slot object with `value_slot_count` zeroed cells.
    pub fn new(map: &Map) -> Self {
        Self::with_slots(map.id(), vec![Value::zero(); map.value_slot_count()])
    }

    /// A slot object with the given cells.
    pub fn with_slots(map: MapId, slots: impl Into<Box<[Value]>>) -> Self {
        Self::Heap(SlotObject {
            map,
            slots: slots.into(),
        })
    }

    pub fn integer(value: i64, map: MapId) -> Self {
        Self::Immediate {
            value: Immediate::Integer(value),
            map,
        }
    }

    pub fn float(value: f64, map: MapId) -> Self {
        Self::Immediate {
            value: Immediate::Float(value),
            map,
        }
    }

    #[inline]
    pub fn map(&self) -> MapId {
        match self {
            Self::Immediate { map, .. } => *map,
            Self::Heap(obj) => obj.map,
        }
    }

    #[inline]
    pub fn tag(&self) -> ObjectTag {
        match self {
            Self::Immediate { value, .. } => value.tag(),
            Self::Heap(_) => ObjectTag::Heap,
        }
    }

    /// The raw mark bits, see [`ObjectTag`].
    #[inline]
    pub fn mark(&self) -> u8 {
        self.tag() as u8 & MARK_TAG_MASK
    }

    #[inline]
    pub fn is_immediate(&self) -> bool {
        matches!(self, Self::Immediate { .. })
    }

    #[inline]
    pub fn as_slot_object(&self) -> Option<&SlotObject> {
        match self {
            Self::Heap(obj) => Some(obj),
            Self::Immediate { .. } => None,
        }
    }

    #[inline]
    pub fn as_slot_object_mut(&mut self) -> Option<&mut SlotObject> {
        match self {
            Self::Heap(obj) => Some(obj),
            Self::Immediate { .. } => None,
        }
    }

    #[inline]
    pub fn slots(&self) -> Option<&[Value]> {
        self.as_slot_object().map(SlotObject::slots)
    }

    #[inline]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Immediate {
                value: Immediate::Integer(value),
                ..
            } => Some(*value),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Immediate {
                value: Immediate::Float(value),
                ..
            } => Some(*value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapTable, SlotDesc, SlotKind, StringPool};
    use proptest::prelude::*;

    fn number_map() -> MapId {
        MapId::from_raw(0)
    }

    #[test]
    fn new_object_has_zeroed_value_slots() {
        let mut pool = StringPool::new();
        let mut maps = MapTable::new();
        let descs = [
            SlotDesc::new(pool.string("a"), SlotKind::Value, 0),
            SlotDesc::new(pool.string("p"), SlotKind::Parent, 1),
            SlotDesc::new(pool.string("b"), SlotKind::Value, 2),
        ];
        let id = maps
            .create_map(pool.string("shape"), &descs, 3, 3)
            .expect("map");
        let map = maps.get_map(id).expect("map");

        let obj = Object::new(map);
        assert_eq!(obj.tag(), ObjectTag::Heap);
        assert_eq!(obj.mark(), 0);
        assert_eq!(obj.map(), id);
        let slots = obj.slots().expect("heap object");
        assert_eq!(slots.len(), map.value_slot_count());
        assert!(slots.iter().all(|&v| v == Value::zero()));
    }

    #[test]
    fn immediate_tags_are_exclusive() {
        let int = Object::integer(1, number_map());
        let float = Object::float(1.0, number_map());
        assert_eq!(int.mark(), 0b01);
        assert_eq!(float.mark(), 0b10);
        assert_eq!(int.mark() & float.mark(), 0);
        assert!(int.slots().is_none());
        assert!(float.slots().is_none());
        assert!(int.as_float().is_none());
        assert!(float.as_integer().is_none());
    }

    #[test]
    fn immediate_clone_identity() {
        let obj = Object::integer(42, number_map());
        let copy = obj.clone();
        assert_eq!(copy.as_integer(), Some(42));
        assert!(copy.is_immediate());
        assert!(copy.slots().is_none());
        assert_eq!(copy, obj);
    }

    #[test]
    fn heap_clone_copies_cells() {
        let mut obj =
            Object::with_slots(number_map(), vec![Value::fixnum(1), Value::fixnum(2)]);
        let copy = obj.clone();
        obj.as_slot_object_mut()
            .expect("heap")
            .set_slot(0, Value::fixnum(9));
        assert_eq!(copy.slots().expect("heap")[0], Value::fixnum(1));
        assert_eq!(obj.slots().expect("heap")[0], Value::fixnum(9));
    }

    #[test]
    fn set_slot_rejects_out_of_range() {
        let mut obj = Object::with_slots(number_map(), vec![Value::zero()]);
        let slots = obj.as_slot_object_mut().expect("heap");
        assert!(slots.set_slot(0, Value::fixnum(3)));
        assert!(!slots.set_slot(1, Value::fixnum(3)));
        assert_eq!(slots.get_slot(1), None);
    }

    proptest! {
        #[test]
        fn integer_round_trip(v in any::<i64>()) {
            prop_assert_eq!(Object::integer(v, number_map()).as_integer(), Some(v));
        }

        #[test]
        fn float_round_trip(bits in any::<u64>()) {
            let v = f64::from_bits(bits);
            let decoded = Object::float(v, number_map()).as_float();
            prop_assert_eq!(decoded.map(f64::to_bits), Some(bits));
        }
    }
}

use crate::{
    Heap, MapTable, Object, ObjectId, PropertyError, SlotDesc, StringId, Value,
};

/// Linked list for cycle detection.
///
/// Each node lives on a recursive call's stack frame and points to the
/// caller's node, so the chain is exactly the current traversal path.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VisitedLink<'a> {
    object: ObjectId,
    prev: Option<&'a VisitedLink<'a>>,
}

impl<'a> VisitedLink<'a> {
    #[inline]
    pub(crate) fn new(object: ObjectId, prev: Option<&'a VisitedLink<'a>>) -> Self {
        Self { object, prev }
    }

    #[inline]
    pub(crate) fn contains(mut link: Option<&VisitedLink<'_>>, target: ObjectId) -> bool {
        while let Some(node) = link {
            if node.object == target {
                return true;
            }
            link = node.prev;
        }
        false
    }
}

/// The result of a slot lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    /// Name was not found.
    None,
    /// Name was found.
    Found {
        /// The object that owns the slot (differs from the receiver if the
        /// slot was found through a parent).
        holder: ObjectId,
        /// Copy of the matching slot descriptor.
        slot: SlotDesc,
        /// Index of the slot within the holder's map.
        slot_index: usize,
    },
}

impl LookupResult {
    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

impl Heap {
    /// Look up `name` on `receiver`.
    ///
    /// Local non-parent slots win. Otherwise parent slots are searched depth
    /// first in declaration order and the first hit is returned. Objects
    /// already on the path are skipped, so cyclic parent chains terminate.
    pub fn lookup(
        &self,
        maps: &MapTable,
        receiver: ObjectId,
        name: StringId,
    ) -> Result<LookupResult, PropertyError> {
        self.lookup_object(maps, receiver, name, None)
    }

    fn lookup_object(
        &self,
        maps: &MapTable,
        receiver: ObjectId,
        name: StringId,
        visited: Option<&VisitedLink<'_>>,
    ) -> Result<LookupResult, PropertyError> {
        if VisitedLink::contains(visited, receiver) {
            return Ok(LookupResult::None);
        }

        let object = self
            .get(receiver)
            .ok_or(PropertyError::UnknownObject(receiver))?;

        // immediates carry no cells
        let Object::Heap(obj) = object else {
            return Ok(LookupResult::None);
        };

        let map = maps.get_map(obj.map())?;
        let slots = map.slot_descs();

        // local scan
        for (i, slot) in slots.iter().enumerate() {
            if slot.is_parent() || slot.name != name {
                continue;
            }
            log::trace!("found {} on object {}", name.raw(), receiver.raw());
            return Ok(LookupResult::Found {
                holder: receiver,
                slot: *slot,
                slot_index: i,
            });
        }

        // parent walk
        let link = VisitedLink::new(receiver, visited);

        for slot in map.parent_slots() {
            let Some(parent) = obj.get_slot(slot.offset).and_then(Value::as_object)
            else {
                continue;
            };

            match self.lookup_object(maps, parent, name, Some(&link))? {
                LookupResult::None => continue,
                found => return Ok(found),
            }
        }

        Ok(LookupResult::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SlotHelper, SlotKind, StringPool};

    #[test]
    fn visited_link_chain() {
        let a = ObjectId::from_raw(1);
        let b = ObjectId::from_raw(2);
        let root = VisitedLink::new(a, None);
        let child = VisitedLink::new(b, Some(&root));
        assert!(VisitedLink::contains(Some(&child), a));
        assert!(VisitedLink::contains(Some(&child), b));
        assert!(!VisitedLink::contains(Some(&root), b));
        assert!(!VisitedLink::contains(None, a));
    }

    #[test]
    fn lookup_reports_holder_and_index() {
        let mut pool = StringPool::new();
        let mut maps = MapTable::new();
        let mut heap = Heap::new();

        let name = pool.string("name");
        let base_map = maps
            .define(
                pool.string("base"),
                &[SlotHelper {
                    name,
                    kind: SlotKind::Value,
                }],
            )
            .expect("base");
        let derived_map = maps
            .define(
                pool.string("derived"),
                &[
                    SlotHelper {
                        name: pool.string("extra"),
                        kind: SlotKind::Value,
                    },
                    SlotHelper {
                        name: pool.string("parent"),
                        kind: SlotKind::Parent,
                    },
                ],
            )
            .expect("derived");

        let base = heap.new_object(&maps, base_map).expect("base object");
        let derived = heap.new_object(&maps, derived_map).expect("derived object");
        heap.set_local(&maps, derived, pool.string("parent"), base.into())
            .expect("link parent");

        let result = heap.lookup(&maps, derived, name).expect("lookup");
        let LookupResult::Found {
            holder,
            slot,
            slot_index,
        } = result
        else {
            panic!("expected a hit, got {result:?}");
        };
        assert_eq!(holder, base);
        assert_eq!(slot.name, name);
        assert_eq!(slot_index, 0);

        let missing = heap
            .lookup(&maps, derived, pool.string("nope"))
            .expect("lookup");
        assert!(!missing.is_found());
    }

    #[test]
    fn lookup_on_immediate_finds_nothing() {
        let mut pool = StringPool::new();
        let mut maps = MapTable::new();
        let mut heap = Heap::new();
        let number = maps.define(pool.string("number"), &[]).expect("map");
        let five = heap.new_integer_object(5, number);
        let result = heap.lookup(&maps, five, pool.string("x")).expect("lookup");
        assert_eq!(result, LookupResult::None);
    }
}

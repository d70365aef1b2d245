use std::fmt::{self, Write};

use crate::{
    Heap, Immediate, MapTable, Object, ObjectId, SlotKind, StringId,
    StringPool, Value, lookup::VisitedLink,
};

impl Heap {
    /// Render an object as `name { slot: value, ... }`.
    ///
    /// Immediates print their number, referenced objects are rendered in
    /// place, parent slots are marked `(inherited)`. An object that is
    /// already being rendered further up prints as `<cycle>`.
    pub fn render(
        &self,
        maps: &MapTable,
        strings: &StringPool,
        id: ObjectId,
    ) -> String {
        let mut output = String::new();
        let printer = Printer {
            heap: self,
            maps,
            strings,
        };
        // writing into a String cannot fail
        let _ = printer.write_object(&mut output, id, None);
        output
    }
}

struct Printer<'a> {
    heap: &'a Heap,
    maps: &'a MapTable,
    strings: &'a StringPool,
}

impl Printer<'_> {
    fn write_name(&self, out: &mut impl Write, name: StringId) -> fmt::Result {
        match self.strings.get_string(name) {
            Some(name) => out.write_str(name),
            None => write!(out, "?{}", name.raw()),
        }
    }

    fn write_object(
        &self,
        out: &mut impl Write,
        id: ObjectId,
        path: Option<&VisitedLink<'_>>,
    ) -> fmt::Result {
        if VisitedLink::contains(path, id) {
            return out.write_str("<cycle>");
        }

        let obj = match self.heap.get(id) {
            Some(Object::Heap(obj)) => obj,
            Some(Object::Immediate { value, .. }) => {
                return match value {
                    Immediate::Integer(v) => write!(out, "{v}"),
                    Immediate::Float(v) => write!(out, "{v:?}"),
                };
            }
            None => return write!(out, "#<dangling {}>", id.raw()),
        };

        let Ok(map) = self.maps.get_map(obj.map()) else {
            return write!(out, "#<object {} of unknown map {}>", id.raw(), obj.map().raw());
        };

        self.write_name(out, map.name())?;
        if map.slot_descs().is_empty() {
            return out.write_str(" {}");
        }

        let link = VisitedLink::new(id, path);
        out.write_str(" { ")?;
        for (i, slot) in map.slot_descs().iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            self.write_name(out, slot.name)?;
            if slot.is_parent() {
                out.write_str(" (inherited)")?;
            }
            out.write_str(": ")?;

            let Some(cell) = obj.get_slot(slot.offset) else {
                out.write_str("<missing>")?;
                continue;
            };
            match slot.kind {
                SlotKind::Value | SlotKind::Parent => {
                    self.write_cell(out, cell, Some(&link))?
                }
                SlotKind::MapParent | SlotKind::Function => {
                    write!(out, "{cell}")?
                }
            }
        }
        out.write_str(" }")
    }

    fn write_cell(
        &self,
        out: &mut impl Write,
        cell: Value,
        path: Option<&VisitedLink<'_>>,
    ) -> fmt::Result {
        match cell.as_object() {
            Some(id) => self.write_object(out, id, path),
            None => write!(out, "{cell}"),
        }
    }
}

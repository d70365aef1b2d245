use crate::{
    Error, ExecutableMemory, Heap, MapId, MapTable, ObjectId, PAGE_SIZE,
    PropertyError, SchemaError, SlotHelper, SlotKind, Stack, StackError,
    StringId, StringPool, Value,
};

pub const DEFAULT_STACK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextCreateInfo {
    /// cells
    pub data_stack_size: usize,
    /// cells
    pub retain_stack_size: usize,
    /// cells
    pub call_stack_size: usize,
    /// bytes, rounds up to a page
    pub code_size: usize,
}

impl Default for ContextCreateInfo {
    fn default() -> Self {
        Self {
            data_stack_size: DEFAULT_STACK_SIZE,
            retain_stack_size: DEFAULT_STACK_SIZE,
            call_stack_size: DEFAULT_STACK_SIZE,
            code_size: PAGE_SIZE,
        }
    }
}

/// Everything one execution needs: interned names, map schemas, the object
/// heap, the three stacks and a code buffer.
#[derive(Debug)]
pub struct Context {
    pub strings: StringPool,
    pub maps: MapTable,
    pub heap: Heap,
    pub data_stack: Stack,
    pub retain_stack: Stack,
    pub call_stack: Stack,
    pub code: ExecutableMemory,
}

impl Context {
    pub fn new(info: &ContextCreateInfo) -> Result<Self, Error> {
        log::debug!("creating context with {info:?}");
        Ok(Self {
            strings: StringPool::new(),
            maps: MapTable::new(),
            heap: Heap::new(),
            data_stack: Stack::new(info.data_stack_size)?,
            retain_stack: Stack::new(info.retain_stack_size)?,
            call_stack: Stack::new(info.call_stack_size)?,
            code: ExecutableMemory::new(info.code_size)?,
        })
    }

    #[inline]
    pub fn intern(&mut self, value: &str) -> StringId {
        self.strings.string(value)
    }

    /// Define a map from plain names, laid out in declaration order.
    pub fn define_map(
        &mut self,
        name: &str,
        slots: &[(&str, SlotKind)],
    ) -> Result<MapId, SchemaError> {
        let name = self.intern(name);
        let helpers = slots
            .iter()
            .map(|&(slot, kind)| SlotHelper {
                name: self.strings.string(slot),
                kind,
            })
            .collect::<Vec<_>>();
        self.maps.define(name, &helpers)
    }

    pub fn new_object(&mut self, map: MapId) -> Result<ObjectId, SchemaError> {
        self.heap.new_object(&self.maps, map)
    }

    pub fn get_property_named(
        &mut self,
        receiver: ObjectId,
        name: &str,
    ) -> Result<Value, PropertyError> {
        let name = self.intern(name);
        self.heap.get_property(&self.maps, receiver, name)
    }

    pub fn set_property_named(
        &mut self,
        receiver: ObjectId,
        name: &str,
        value: Value,
    ) -> Result<(), PropertyError> {
        let name = self.intern(name);
        self.heap.set_property(&self.maps, receiver, name, value)
    }

    /// Install `parent` in a parent slot of `receiver`.
    pub fn set_parent_named(
        &mut self,
        receiver: ObjectId,
        slot: &str,
        parent: ObjectId,
    ) -> Result<(), PropertyError> {
        let slot = self.intern(slot);
        self.heap
            .set_local(&self.maps, receiver, slot, parent.into())
    }

    pub fn instantiate(
        &mut self,
        object: ObjectId,
    ) -> Result<ObjectId, PropertyError> {
        self.heap.instantiate(&self.maps, object)
    }

    pub fn render(&self, object: ObjectId) -> String {
        self.heap.render(&self.maps, &self.strings, object)
    }

    /// `>r`: move the top of the data stack onto the retain stack.
    pub fn data_to_retain(&mut self) -> Result<(), StackError> {
        let value = self.data_stack.pop()?;
        self.retain_stack.push(value);
        Ok(())
    }

    /// `r>`: move the top of the retain stack onto the data stack.
    pub fn retain_to_data(&mut self) -> Result<(), StackError> {
        let value = self.retain_stack.pop()?;
        self.data_stack.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context::new(&ContextCreateInfo::default()).expect("context")
    }

    #[test]
    fn defaults() {
        let ctx = context();
        assert!(ctx.data_stack.capacity() >= DEFAULT_STACK_SIZE);
        assert!(ctx.retain_stack.capacity() >= DEFAULT_STACK_SIZE);
        assert!(ctx.call_stack.capacity() >= DEFAULT_STACK_SIZE);
        assert_eq!(ctx.code.capacity(), PAGE_SIZE);
        assert!(ctx.heap.is_empty());
    }

    #[test]
    fn named_properties_through_parents() {
        let mut ctx = context();
        let base = ctx
            .define_map("base", &[("name", SlotKind::Value)])
            .expect("base");
        let derived = ctx
            .define_map(
                "derived",
                &[("parent", SlotKind::Parent), ("size", SlotKind::Value)],
            )
            .expect("derived");

        let b = ctx.new_object(base).expect("b");
        let d = ctx.new_object(derived).expect("d");
        ctx.set_parent_named(d, "parent", b).expect("link");

        ctx.set_property_named(d, "name", Value::fixnum(5)).expect("name");
        ctx.set_property_named(d, "size", Value::fixnum(2)).expect("size");
        assert_eq!(ctx.get_property_named(b, "name"), Ok(Value::fixnum(5)));
        assert_eq!(ctx.get_property_named(d, "size"), Ok(Value::fixnum(2)));

        let missing = ctx.get_property_named(d, "colour");
        let colour = ctx.intern("colour");
        assert_eq!(missing, Err(PropertyError::NotFound { name: colour }));

        assert_eq!(
            ctx.render(d),
            "derived { parent (inherited): base { name: 5 }, size: 2 }"
        );
    }

    #[test]
    fn instantiate_is_independent() {
        let mut ctx = context();
        let point = ctx
            .define_map(
                "point",
                &[("x", SlotKind::Value), ("y", SlotKind::Value)],
            )
            .expect("point");
        let p = ctx.new_object(point).expect("p");
        ctx.set_property_named(p, "x", Value::fixnum(1)).expect("x");

        let copy = ctx.instantiate(p).expect("copy");
        ctx.set_property_named(copy, "x", Value::fixnum(9)).expect("x");
        assert_eq!(ctx.get_property_named(p, "x"), Ok(Value::fixnum(1)));
        assert_eq!(ctx.render(copy), "point { x: 9, y: 0 }");
    }

    #[test]
    fn stack_transfer() {
        let mut ctx = context();
        assert_eq!(ctx.data_to_retain(), Err(StackError::Underflow));
        assert_eq!(ctx.retain_to_data(), Err(StackError::Underflow));

        ctx.data_stack.push(Value::fixnum(1));
        ctx.data_stack.push(Value::fixnum(2));
        ctx.data_to_retain().expect(">r");
        assert_eq!(ctx.data_stack.as_slice(), &[Value::fixnum(1)]);
        assert_eq!(ctx.retain_stack.peek(), Ok(Value::fixnum(2)));

        ctx.retain_to_data().expect("r>");
        assert!(ctx.retain_stack.is_empty());
        assert_eq!(ctx.data_stack.peek(), Ok(Value::fixnum(2)));
    }

    #[test]
    fn tiny_sizes_still_map_a_page() {
        let ctx = Context::new(&ContextCreateInfo {
            data_stack_size: 0,
            retain_stack_size: 1,
            call_stack_size: 1,
            code_size: 0,
        })
        .expect("context");
        assert!(ctx.data_stack.capacity() > 0);
        assert_eq!(ctx.code.capacity(), PAGE_SIZE);
    }
}

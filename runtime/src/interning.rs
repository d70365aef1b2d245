use std::{collections::HashMap, sync::Arc};

/// Sequentially assigned id of an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
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

/// Interns strings into stable ids. Grows monotonically, ids are never
/// reused.
#[derive(Debug, Default)]
pub struct StringPool {
    table: Vec<Arc<str>>,
    mappings: HashMap<Arc<str>, StringId>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `value`, interning it on first sight.
    pub fn string(&mut self, value: &str) -> StringId {
        if let Some(&id) = self.mappings.get(value) {
            return id;
        }
        let raw = u32::try_from(self.table.len())
            .expect("string pool exhausted the id space");
        let id = StringId(raw);
        let interned = Arc::<str>::from(value);
        self.table.push(interned.clone());
        self.mappings.insert(interned, id);
        log::trace!("interned {value:?} as {raw}");
        id
    }

    /// Reverse lookup. `None` means the id was never handed out by this pool.
    pub fn get_string(&self, id: StringId) -> Option<&str> {
        self.table.get(id.index()).map(|s| &**s)
    }

    /// Lookup without interning.
    pub fn get_id(&self, value: &str) -> Option<StringId> {
        self.mappings.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential() {
        let mut pool = StringPool::new();
        assert_eq!(pool.string("x").raw(), 0);
        assert_eq!(pool.string("y").raw(), 1);
        assert_eq!(pool.string("point").raw(), 2);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn same_string_same_id() {
        let mut pool = StringPool::new();
        let a = pool.string("parent");
        let _ = pool.string("other");
        let b = pool.string("parent");
        assert_eq!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn get_string_is_inverse() {
        let mut pool = StringPool::new();
        let ids: Vec<_> =
            ["dup", "swap", "drop", ""].iter().map(|s| pool.string(s)).collect();
        assert_eq!(pool.get_string(ids[0]), Some("dup"));
        assert_eq!(pool.get_string(ids[2]), Some("drop"));
        assert_eq!(pool.get_string(ids[3]), Some(""));
    }

    #[test]
    fn unassigned_id_is_none() {
        let mut pool = StringPool::new();
        pool.string("only");
        assert_eq!(pool.get_string(StringId::from_raw(1)), None);
        assert_eq!(pool.get_id("missing"), None);
        assert_eq!(pool.get_id("only"), Some(StringId::from_raw(0)));
    }
}

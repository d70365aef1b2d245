mod context;
mod error;
mod executable;
mod format;
mod heap;
mod interning;
mod lookup;
mod map;
mod object;
mod stack;
pub mod system;
mod tagged;

pub use context::*;
pub use error::*;
pub use executable::*;
pub use heap::{Heap, ObjectId};
pub use interning::*;
pub use lookup::LookupResult;
pub use map::*;
pub use object::*;
pub use stack::Stack;
pub use system::{PAGE_SIZE, Protection};
pub use tagged::*;

//! Typed arena indices for the five owned record kinds (§3, §9).
//!
//! The source this spec was distilled from models ownership with ambient
//! nullable back-references (stack -> tasks -> activities -> process ->
//! stack). We replace that with one owner arena per kind and typed index
//! newtypes: a `TaskId` can only be looked up in the task arena, never
//! accidentally used as a `StackId`.

use std::fmt;

use generational_arena::Index;

macro_rules! id_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) Index);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let (i, g) = self.0.into_raw_parts();
                write!(f, "{}({}:{})", stringify!($name), i, g)
            }
        }
    };
}

id_type!(ActivityId, "Opaque handle to an Activity record, unique for its lifetime.");
id_type!(TaskId, "Handle to a Task record.");
id_type!(StackId, "Handle to a Stack record.");
id_type!(DisplayId, "Handle to an ActivityDisplay record.");
id_type!(ProcessId, "Handle to a ProcessRecord.");

/// Logical user id. Users are not arena-allocated (they are identified by a
/// small stable integer per §3), so this is a plain newtype, not an index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, serde::Serialize, serde::Deserialize)]
pub struct UserId(pub i32);

impl UserId {
    /// The system user, id 0. Never eligible for eviction (§4.G).
    pub const SYSTEM: UserId = UserId(0);
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user{}", self.0)
    }
}

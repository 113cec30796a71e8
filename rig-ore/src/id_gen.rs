//! ID generator utilities.

/// Hands out monotonically increasing IDs.
///
/// Because IDs only ever grow, ordering by ID is ordering by creation, which is what
/// lets a `BTreeMap<Id, _>` double as an insertion ordered map.
#[derive(Debug)]
pub struct Gen<Id> {
    start: u64,
    next: u64,
    phantom: std::marker::PhantomData<fn() -> Id>,
}

impl<Id> Default for Gen<Id> {
    fn default() -> Self {
        Gen::from_start(0)
    }
}

impl<Id> Gen<Id> {
    pub fn from_start(start: u64) -> Self {
        Gen {
            start,
            next: start,
            phantom: std::marker::PhantomData,
        }
    }

    /// Rewind the generator to where it started.
    pub fn reset(&mut self) {
        self.next = self.start;
    }
}

impl<Id: From<u64>> Gen<Id> {
    pub fn next(&mut self) -> Id {
        let id = self.next;
        self.next = id.checked_add(1).expect("ID allocator overflowed u64");
        Id::from(id)
    }
}

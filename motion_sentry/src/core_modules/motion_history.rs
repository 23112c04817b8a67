/// Number of recent motion flags remembered.
pub const HISTORY_CAPACITY: usize = 2;

/// Fixed-size ring of the most recent "was there motion?" flags.
///
/// Slots start out empty (`None`); each processed frame overwrites the oldest
/// slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotionHistory {
    slots: [Option<bool>; HISTORY_CAPACITY],
    /// Index of the slot the next flag goes into.
    next: usize,
}

impl MotionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, motion: bool) {
        self.slots[self.next] = Some(motion);
        self.next = (self.next + 1) % HISTORY_CAPACITY;
    }

    /// Most recent flag.
    pub fn latest(&self) -> Option<bool> {
        self.slots[(self.next + HISTORY_CAPACITY - 1) % HISTORY_CAPACITY]
    }

    /// Flag recorded just before the latest one.
    pub fn previous(&self) -> Option<bool> {
        self.slots[(self.next + HISTORY_CAPACITY - 2) % HISTORY_CAPACITY]
    }

    /// Flags from oldest to newest, including empty slots.
    pub fn snapshot(&self) -> [Option<bool>; HISTORY_CAPACITY] {
        std::array::from_fn(|i| self.slots[(self.next + i) % HISTORY_CAPACITY])
    }

    /// True when motion was seen in every remembered slot.
    pub fn is_sustained(&self) -> bool {
        self.slots.iter().all(|slot| *slot == Some(true))
    }
}

/// Round-robin assignment over a worker pool.
///
/// Does not look at load: each worker's inbox is an unbounded queue, so a
/// burst of assignments never blocks.
#[derive(Debug, Default)]
pub struct RoundRobin {
    pointer: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next pool member, or `None` for an empty pool.
    pub fn assign<'a, T>(&mut self, pool: &'a [T]) -> Option<&'a T> {
        if pool.is_empty() {
            return None;
        }
        let picked = &pool[self.pointer % pool.len()];
        self.pointer = self.pointer.wrapping_add(1);
        Some(picked)
    }

    pub fn assigned(&self) -> usize {
        self.pointer
    }
}

/// Uniform random pick from an ad pod.
///
/// Holds its own generator so a session can be replayed with a fixed seed.
pub struct AdSelector {
    rng: fastrand::Rng,
}

impl AdSelector {
    pub fn new() -> Self {
        AdSelector {
            rng: fastrand::Rng::new(),
        }
    }

    /// Deterministic selector for tests and simulations.
    pub fn with_seed(seed: u64) -> Self {
        AdSelector {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Index of the chosen candidate, or `None` for an empty pod.
    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.rng.usize(..len))
    }

    /// Choose one item with uniform probability.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        self.pick_index(items.len()).map(|i| &items[i])
    }
}

impl Default for AdSelector {
    fn default() -> Self {
        Self::new()
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the uniform choices made by the generator.
pub trait RandomSource {
    /// Uniform index in `0..upper`. `upper` is never 0.
    fn index(&mut self, upper: usize) -> usize;
}

/// Adapts any `rand` generator.
pub struct RngSource<R>(pub R);

impl<R: Rng> RandomSource for RngSource<R> {
    fn index(&mut self, upper: usize) -> usize {
        self.0.random_range(0..upper)
    }
}

impl RngSource<StdRng> {
    pub fn from_entropy() -> Self {
        RngSource(StdRng::from_rng(&mut rand::rng()))
    }

    pub fn seeded(seed: u64) -> Self {
        RngSource(StdRng::seed_from_u64(seed))
    }

    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::seeded(s),
            None => Self::from_entropy(),
        }
    }
}

/// Picks `k` distinct items uniformly (partial Fisher-Yates).
pub fn choose<T: Copy>(rng: &mut dyn RandomSource, items: &[T], k: usize) -> Vec<T> {
    let mut pool = items.to_vec();
    let k = k.min(pool.len());
    for i in 0..k {
        let j = i + rng.index(pool.len() - i);
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Replays a fixed list of choices, then always answers 0.
    pub struct Scripted {
        pub script: Vec<usize>,
        pub pos: usize,
    }

    impl Scripted {
        pub fn new(script: Vec<usize>) -> Self {
            Self { script, pos: 0 }
        }

        pub fn first() -> Self {
            Self::new(Vec::new())
        }
    }

    impl RandomSource for Scripted {
        fn index(&mut self, upper: usize) -> usize {
            let value = self.script.get(self.pos).copied().unwrap_or(0);
            self.pos += 1;
            value % upper
        }
    }

    #[test]
    fn test_choose_first_is_prefix() {
        let items = [10u8, 20, 30, 40];
        assert_eq!(choose(&mut Scripted::first(), &items, 2), vec![10, 20]);
    }

    #[test]
    fn test_choose_scripted_swaps() {
        let items = [10u8, 20, 30, 40];
        // i=0 takes index 3, i=1 takes 1 + 2 = 3 (the swapped-out 10)
        let picked = choose(&mut Scripted::new(vec![3, 2]), &items, 2);
        assert_eq!(picked, vec![40, 10]);
    }

    #[test]
    fn test_choose_more_than_available() {
        let items = [1u8, 2];
        assert_eq!(choose(&mut Scripted::first(), &items, 5).len(), 2);
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let items: Vec<u8> = (1..=50).collect();
        let a = choose(&mut RngSource::seeded(42), &items, 5);
        let b = choose(&mut RngSource::seeded(42), &items, 5);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
    }
}

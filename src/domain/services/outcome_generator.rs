//! Random outcome generator - weighted reel symbol draws
//!
//! This is the server's authoritative source of spin results. The random
//! source is passed in so tests can seed it.

use rand::Rng;

use crate::domain::value_objects::{Grid, Symbol, GRID_COLUMNS, GRID_ROWS};

/// Draw weight of each symbol. Colors share equal weight.
pub const SYMBOL_WEIGHTS: [(Symbol, u32); 7] = [
    (Symbol::Red, 20),
    (Symbol::Blue, 20),
    (Symbol::Green, 20),
    (Symbol::Yellow, 20),
    (Symbol::Purple, 20),
    (Symbol::Wild, 5),
    (Symbol::Bonus, 3),
];

const TOTAL_WEIGHT: u32 = {
    let mut total = 0;
    let mut i = 0;
    while i < SYMBOL_WEIGHTS.len() {
        total += SYMBOL_WEIGHTS[i].1;
        i += 1;
    }
    total
};

pub fn draw_symbol<R: Rng + ?Sized>(rng: &mut R) -> Symbol {
    let mut roll = rng.gen_range(0..TOTAL_WEIGHT);
    for (symbol, weight) in SYMBOL_WEIGHTS {
        if roll < weight {
            return symbol;
        }
        roll -= weight;
    }
    // roll < TOTAL_WEIGHT, so the loop always returns
    Symbol::Bonus
}

/// Fill a 5x3 grid, row by row
pub fn draw_grid<R: Rng + ?Sized>(rng: &mut R) -> Grid {
    let mut rows = [[Symbol::Red; GRID_COLUMNS]; GRID_ROWS];
    for row in rows.iter_mut() {
        for cell in row.iter_mut() {
            *cell = draw_symbol(rng);
        }
    }
    Grid(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_total_weight() {
        assert_eq!(TOTAL_WEIGHT, 108);
    }

    #[test]
    fn test_same_seed_same_grid() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(draw_grid(&mut a), draw_grid(&mut b));
    }

    #[test]
    fn test_distribution_follows_weights() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut counts: HashMap<Symbol, u32> = HashMap::new();
        let draws = 108_000;
        for _ in 0..draws {
            *counts.entry(draw_symbol(&mut rng)).or_default() += 1;
        }

        // Expected: 20000 per color, 5000 wild, 3000 bonus
        for color in Symbol::COLORS {
            let n = counts[&color];
            assert!((18_500..21_500).contains(&n), "{:?} drawn {} times", color, n);
        }
        assert!((4_300..5_700).contains(&counts[&Symbol::Wild]));
        assert!((2_500..3_500).contains(&counts[&Symbol::Bonus]));
    }
}

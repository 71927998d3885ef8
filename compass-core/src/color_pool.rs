use compass_types::{Color, MAX_RGB};
use rand::Rng;
use rand::seq::SliceRandom;

/// Colors the player has to find each round.
pub const TARGET_COUNT: usize = 4;
/// Decoys mixed into the pool alongside the targets.
pub const FILLER_COUNT: usize = 8;
pub const POOL_SIZE: usize = TARGET_COUNT + FILLER_COUNT;

/// A uniformly random color over the full 24-bit space.
pub fn generate_color<R: Rng + ?Sized>(rng: &mut R) -> Color {
    Color::from_rgb(rng.random_range(0..=MAX_RGB))
}

/// `count` independent draws. Duplicates are possible.
pub fn generate_colors<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Color> {
    (0..count).map(|_| generate_color(rng)).collect()
}

/// Build the clickable pool for `targets`: the targets plus
/// [`FILLER_COUNT`] fillers, shuffled.
///
/// A filler is re-rolled while it equals one of the targets. Fillers are not
/// checked against each other, so two decoys may share a value.
pub fn generate_pool<R: Rng + ?Sized>(rng: &mut R, targets: &[Color]) -> Vec<Color> {
    let mut pool = Vec::with_capacity(targets.len() + FILLER_COUNT);
    pool.extend_from_slice(targets);

    for _ in 0..FILLER_COUNT {
        let mut filler = generate_color(rng);
        while targets.contains(&filler) {
            filler = generate_color(rng);
        }
        pool.push(filler);
    }

    // Fisher-Yates
    pool.shuffle(rng);
    pool
}

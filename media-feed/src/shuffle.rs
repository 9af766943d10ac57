use rand::Rng;

/// Returns a uniformly shuffled copy of `items`
///
/// The input is left untouched, so the same fetched batch can be reshuffled
/// on every reload.
pub fn shuffle<T: Clone>(items: &[T]) -> Vec<T> {
    shuffle_with(items, &mut rand::rng())
}

/// Fisher–Yates shuffle drawing from `rng`
///
/// Walks `i` from the last index down to 1 and swaps it with a uniformly
/// drawn `j` in `[0, i]`.
pub fn shuffle_with<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut shuffled = items.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.random_range(0..=i);
        shuffled.swap(i, j);
    }
    shuffled
}

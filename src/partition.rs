//! Batch partitioning for provider-limited store calls.

/// Split `items` into consecutive chunks of at most `max_size` elements.
///
/// Order is preserved and only the final chunk may be short. An empty input
/// yields no chunks.
///
/// # Panics
///
/// Panics if `max_size` is zero.
pub fn partition<T: Clone>(items: &[T], max_size: usize) -> Vec<Vec<T>> {
    assert!(max_size > 0, "partition size must be greater than zero");
    items.chunks(max_size).map(<[T]>::to_vec).collect()
}

/// Owned variant of [`partition`] that moves items instead of cloning them.
///
/// # Panics
///
/// Panics if `max_size` is zero.
pub fn partition_owned<T>(items: Vec<T>, max_size: usize) -> Vec<Vec<T>> {
    assert!(max_size > 0, "partition size must be greater than zero");

    let mut chunks = Vec::with_capacity(items.len().div_ceil(max_size));
    let mut current = Vec::with_capacity(max_size.min(items.len()));
    for item in items {
        current.push(item);
        if current.len() == max_size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(max_size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

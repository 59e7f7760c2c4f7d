// src/pipeline/partition.rs

//! Contiguous work splitting for partitioned dispatch.

/// Split `items` into `workers` contiguous chunks.
///
/// Every chunk gets `len / workers` items and the last one also takes the
/// remainder. With fewer items than workers, the first `len` chunks get one
/// item each and the rest are empty. Order is preserved and every item lands
/// in exactly one chunk.
pub fn partition<T: Clone>(items: &[T], workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let total = items.len();

    if total < workers {
        return (0..workers)
            .map(|i| items.get(i).cloned().into_iter().collect())
            .collect();
    }

    let size = total / workers;
    (0..workers)
        .map(|i| {
            let start = i * size;
            let end = if i == workers - 1 { total } else { start + size };
            items[start..end].to_vec()
        })
        .collect()
}

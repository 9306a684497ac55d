// Sample Allocation
// Divides a requested total evenly across an ordered key set

use super::SamplingError;

/// Target count per key, in the order the keys were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation<K> {
    entries: Vec<(K, usize)>,
}

impl<K: PartialEq> Allocation<K> {
    pub fn get(&self, key: &K) -> Option<usize> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, usize)> {
        self.entries.iter().map(|(k, count)| (k, *count))
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every key gets `total / keys.len()`; the first `total % keys.len()` keys get one more.
pub fn compute_allocation<K: Clone + PartialEq>(
    keys: &[K],
    total: usize,
) -> Result<Allocation<K>, SamplingError> {
    if keys.is_empty() {
        if total > 0 {
            return Err(SamplingError::Configuration(format!(
                "cannot allocate {} samples across an empty key set",
                total
            )));
        }
        return Ok(Allocation { entries: Vec::new() });
    }

    let base = total / keys.len();
    let remainder = total % keys.len();

    let entries = keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let extra = if i < remainder { 1 } else { 0 };
            (key.clone(), base + extra)
        })
        .collect();

    Ok(Allocation { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_sums_to_total() {
        let keys = vec!["ani", "arc", "cha"];
        for total in 0..40 {
            let alloc = compute_allocation(&keys, total).unwrap();
            assert_eq!(alloc.total(), total);
            assert_eq!(alloc.len(), 3);
        }
    }

    #[test]
    fn test_remainder_goes_to_first_keys() {
        let keys = vec!["ani", "arc", "cha"];
        let alloc = compute_allocation(&keys, 38).unwrap();
        assert_eq!(alloc.get(&"ani"), Some(13));
        assert_eq!(alloc.get(&"arc"), Some(13));
        assert_eq!(alloc.get(&"cha"), Some(12));
    }

    #[test]
    fn test_at_most_remainder_keys_get_extra() {
        let keys: Vec<u32> = (0..9).collect();
        for total in 0..60usize {
            let alloc = compute_allocation(&keys, total).unwrap();
            let base = total / keys.len();
            let bumped = alloc.iter().filter(|(_, c)| *c == base + 1).count();
            let plain = alloc.iter().filter(|(_, c)| *c == base).count();
            assert_eq!(bumped, total % keys.len());
            assert_eq!(bumped + plain, keys.len());
        }
    }

    #[test]
    fn test_empty_keys() {
        let keys: Vec<&str> = Vec::new();
        assert!(compute_allocation(&keys, 0).unwrap().is_empty());
        assert!(matches!(
            compute_allocation(&keys, 5),
            Err(SamplingError::Configuration(_))
        ));
    }
}

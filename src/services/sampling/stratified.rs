// Stratified Selection
// Per-key sampling with deficit tracking and surplus rebalancing

use super::allocation::{compute_allocation, Allocation};
use super::SamplingError;
use crate::services::filename_patterns::FilenamePattern;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Result of the first selection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSelection {
    pub selected: Vec<String>,
    /// Files still needed after every short key gave all it had.
    pub deficit: usize,
    /// Unselected files of keys that had more than their allocation.
    pub excess_pool: Vec<String>,
}

/// Partition names by the key `pattern` extracts. Non-matching names are dropped.
///
/// Each group is sorted and de-duplicated so that a seeded selection does not
/// depend on directory listing order.
pub fn group_by_pattern<P, I, S>(filenames: I, pattern: &P) -> BTreeMap<P::Key, Vec<String>>
where
    P: FilenamePattern,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut groups: BTreeMap<P::Key, Vec<String>> = BTreeMap::new();
    let mut dropped = 0usize;

    for name in filenames {
        let name = name.as_ref();
        match pattern.key(name) {
            Some(key) => groups.entry(key).or_default().push(name.to_string()),
            None => dropped += 1,
        }
    }

    for files in groups.values_mut() {
        files.sort();
        files.dedup();
    }

    if dropped > 0 {
        debug!("[SAMPLING] {} file names did not match the pattern", dropped);
    }
    groups
}

/// Take each key's allocation uniformly at random without replacement.
/// Short keys give everything they have and add to the deficit.
pub fn select_sample<K, R>(
    groups: &BTreeMap<K, Vec<String>>,
    allocation: &Allocation<K>,
    rng: &mut R,
) -> SampleSelection
where
    K: Ord + std::fmt::Debug,
    R: Rng + ?Sized,
{
    let mut selection = SampleSelection::default();
    let empty: Vec<String> = Vec::new();

    for (key, need) in allocation.iter() {
        let files = groups.get(key).unwrap_or(&empty);

        if files.len() >= need {
            let sampled: Vec<String> = files.choose_multiple(rng, need).cloned().collect();
            let leftover: Vec<String> = files
                .iter()
                .filter(|f| !sampled.contains(f))
                .cloned()
                .collect();
            selection.excess_pool.extend(leftover);
            selection.selected.extend(sampled);
        } else {
            debug!(
                "[SAMPLING] key {:?} short by {} (need={}, available={})",
                key,
                need - files.len(),
                need,
                files.len()
            );
            selection.deficit += need - files.len();
            selection.selected.extend(files.iter().cloned());
        }
    }

    selection
}

/// Draw `deficit` items without replacement from the surplus pool.
pub fn rebalance<R: Rng + ?Sized>(
    deficit: usize,
    excess_pool: &[String],
    rng: &mut R,
) -> Result<Vec<String>, SamplingError> {
    if deficit == 0 {
        return Ok(Vec::new());
    }
    if excess_pool.len() < deficit {
        return Err(SamplingError::InsufficientData {
            deficit,
            available: excess_pool.len(),
        });
    }
    Ok(excess_pool.choose_multiple(rng, deficit).cloned().collect())
}

/// Allocation, first-pass selection and rebalancing in one call.
pub fn stratified_sample<K, R>(
    groups: &BTreeMap<K, Vec<String>>,
    keys: &[K],
    total: usize,
    rng: &mut R,
) -> Result<Vec<String>, SamplingError>
where
    K: Ord + Clone + std::fmt::Debug,
    R: Rng + ?Sized,
{
    let allocation = compute_allocation(keys, total)?;
    let mut selection = select_sample(groups, &allocation, rng);

    if selection.deficit > 0 {
        info!(
            "[SAMPLING] rebalancing deficit={} from excess_pool={}",
            selection.deficit,
            selection.excess_pool.len()
        );
        let supplement = rebalance(selection.deficit, &selection.excess_pool, rng)?;
        selection.selected.extend(supplement);
    }

    Ok(selection.selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, CategoryPair};
    use crate::services::filename_patterns::{AuthenticPattern, TamperedPairPattern};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn cats(tokens: &[&str]) -> Vec<Category> {
        tokens.iter().map(|t| Category::new(t)).collect()
    }

    #[test]
    fn test_group_by_pattern_drops_unmatched() {
        let names = vec!["Au_ani_2.jpg", "Au_ani_1.jpg", "readme.txt", "Au_arc_1.jpg"];
        let groups = group_by_pattern(names, &AuthenticPattern::any());
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[&Category::new("ani")],
            vec!["Au_ani_1.jpg".to_string(), "Au_ani_2.jpg".to_string()]
        );
    }

    #[test]
    fn test_one_file_per_category_scenario() {
        let names = vec!["Au_ani_1.jpg", "Au_ani_2.jpg", "Au_arc_1.jpg"];
        let keys = cats(&["ani", "arc"]);
        let groups = group_by_pattern(names, &AuthenticPattern::restricted(&keys));
        let allocation = compute_allocation(&keys, 2).unwrap();
        assert_eq!(allocation.get(&Category::new("ani")), Some(1));
        assert_eq!(allocation.get(&Category::new("arc")), Some(1));

        let mut rng = StdRng::seed_from_u64(42);
        let selection = select_sample(&groups, &allocation, &mut rng);
        assert_eq!(selection.deficit, 0);
        assert_eq!(selection.selected.len(), 2);
        let ani = selection.selected.iter().filter(|f| f.starts_with("Au_ani_")).count();
        let arc = selection.selected.iter().filter(|f| f.starts_with("Au_arc_")).count();
        assert_eq!((ani, arc), (1, 1));
        assert_eq!(selection.excess_pool.len(), 1);
    }

    #[test]
    fn test_selection_is_deterministic_for_seed() {
        let names: Vec<String> = (0..30).map(|i| format!("Au_ani_{}.jpg", i)).collect();
        let keys = cats(&["ani"]);
        let groups = group_by_pattern(&names, &AuthenticPattern::any());
        let allocation = compute_allocation(&keys, 5).unwrap();

        let a = select_sample(&groups, &allocation, &mut StdRng::seed_from_u64(7));
        let b = select_sample(&groups, &allocation, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);

        let mut reversed = names.clone();
        reversed.reverse();
        let groups_rev = group_by_pattern(&reversed, &AuthenticPattern::any());
        let c = select_sample(&groups_rev, &allocation, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.selected, c.selected);
    }

    #[test]
    fn test_selection_has_no_duplicates_or_foreign_names() {
        let names: Vec<String> = (0..12)
            .map(|i| format!("Au_{}_{}.jpg", ["ani", "arc", "cha"][i % 3], i))
            .chain(std::iter::once("Au_ani_0.jpg".to_string()))
            .collect();
        let pool: HashSet<&String> = names.iter().collect();
        let keys = cats(&["ani", "arc", "cha"]);
        let groups = group_by_pattern(&names, &AuthenticPattern::any());

        let mut rng = StdRng::seed_from_u64(1);
        let picked = stratified_sample(&groups, &keys, 10, &mut rng).unwrap();
        let unique: HashSet<&String> = picked.iter().collect();
        assert_eq!(picked.len(), 10);
        assert_eq!(unique.len(), picked.len());
        assert!(picked.iter().all(|p| pool.contains(p)));
    }

    #[test]
    fn test_deficit_filled_from_surplus() {
        // 9 pairs, only ani-ani and arc-arc populated
        let keys = cats(&["ani", "arc", "cha"]);
        let mut names: Vec<String> = (0..10)
            .map(|i| format!("Tp_D_CND_M_N_ani{:05}_ani{:05}_{:05}.jpg", i, i + 1, i))
            .collect();
        names.extend((0..10).map(|i| format!("Tp_D_CND_M_N_arc{:05}_arc{:05}_{:05}.jpg", i, i + 1, i)));
        names.push("Tp_D_CND_M_N_cha00001_ani00002_00001.jpg".to_string());

        let pairs = CategoryPair::grid(&keys);
        let groups = group_by_pattern(&names, &TamperedPairPattern::restricted(&keys));
        let allocation = compute_allocation(&pairs, 18).unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let selection = select_sample(&groups, &allocation, &mut rng);
        // ani-ani and arc-arc give 2 each, cha-ani gives its only file
        assert_eq!(selection.selected.len(), 5);
        assert_eq!(selection.deficit, 13);
        assert_eq!(selection.excess_pool.len(), 16);

        let mut rng = StdRng::seed_from_u64(42);
        let picked = stratified_sample(&groups, &pairs, 18, &mut rng).unwrap();
        assert_eq!(picked.len(), 18);
        let unique: HashSet<&String> = picked.iter().collect();
        assert_eq!(unique.len(), 18);
    }

    #[test]
    fn test_rebalance_errors_iff_pool_too_small() {
        let pool: Vec<String> = (0..4).map(|i| format!("f{}", i)).collect();
        let mut rng = StdRng::seed_from_u64(3);
        for deficit in 0..8 {
            let result = rebalance(deficit, &pool, &mut rng);
            if deficit > pool.len() {
                assert!(matches!(
                    result,
                    Err(SamplingError::InsufficientData { available: 4, .. })
                ));
            } else {
                assert_eq!(result.unwrap().len(), deficit);
            }
        }
    }

    #[test]
    fn test_stratified_sample_insufficient() {
        let names = vec!["Au_ani_1.jpg", "Au_arc_1.jpg"];
        let keys = cats(&["ani", "arc"]);
        let groups = group_by_pattern(names, &AuthenticPattern::any());
        let mut rng = StdRng::seed_from_u64(42);
        let err = stratified_sample(&groups, &keys, 3, &mut rng).unwrap_err();
        assert!(matches!(err, SamplingError::InsufficientData { deficit: 1, available: 0 }));
    }
}

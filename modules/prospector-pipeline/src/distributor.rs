use rand::seq::SliceRandom;

use prospector_common::SearchTerm;

/// Build the full location × category matrix and partition it across
/// `workers` slices.
///
/// Both input lists are shuffled independently before crossing so repeated
/// runs explore the matrix in a different order, then terms are dealt
/// round-robin so slice sizes differ by at most one regardless of N.
/// Every term lands in exactly one slice.
pub fn assign(locations: &[String], categories: &[String], workers: usize) -> Vec<Vec<SearchTerm>> {
    assert!(workers >= 1, "worker count must be at least 1");

    let mut rng = rand::rng();
    let mut locations: Vec<&String> = locations.iter().collect();
    let mut categories: Vec<&String> = categories.iter().collect();
    locations.shuffle(&mut rng);
    categories.shuffle(&mut rng);

    let mut slices: Vec<Vec<SearchTerm>> = vec![Vec::new(); workers];
    let mut i = 0;
    for location in &locations {
        for category in &categories {
            slices[i % workers].push(SearchTerm::new(location.as_str(), category.as_str()));
            i += 1;
        }
    }
    slices
}

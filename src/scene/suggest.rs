//! "Did you mean" suggestions for misspelled names

/// Compute Levenshtein edit distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Two rolling rows are enough
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];
    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Find up to three names within `max_distance` edits of `target`, closest first
pub(crate) fn find_similar<'a>(
    names: impl IntoIterator<Item = &'a str>,
    target: &str,
    max_distance: usize,
) -> Vec<String> {
    let mut candidates: Vec<(&str, usize)> = names
        .into_iter()
        .filter_map(|name| {
            let dist = levenshtein_distance(name, target);
            (dist <= max_distance && dist > 0).then_some((name, dist))
        })
        .collect();

    candidates.sort_by(|(a, da), (b, db)| da.cmp(db).then(a.cmp(b)));
    candidates.dedup_by(|(a, _), (b, _)| a == b);
    candidates
        .into_iter()
        .map(|(name, _)| name.to_string())
        .take(3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("Sphere", "Sphere"), 0);
        assert_eq!(levenshtein_distance("Sphere", "Spere"), 1);
        assert_eq!(levenshtein_distance("", "Box"), 3);
        assert_eq!(levenshtein_distance("Box", "Cone"), 3);
    }

    #[test]
    fn test_find_similar() {
        let names = ["Transform", "Group", "Shape", "Sphere"];
        assert_eq!(find_similar(names, "Shpere", 2), vec!["Sphere".to_string()]);
        assert_eq!(find_similar(names, "Grop", 2), vec!["Group".to_string()]);
        assert!(find_similar(names, "Viewpoint", 2).is_empty());
        // Exact matches are not suggestions
        assert!(find_similar(names, "Group", 2).is_empty());
    }
}

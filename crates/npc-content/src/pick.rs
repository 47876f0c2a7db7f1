use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;

pub(crate) fn pick<T>(items: &[T]) -> Option<&T> {
    items.choose(&mut rand::thread_rng())
}

/// Weighted choice; zero weights count as one so every item stays reachable.
pub(crate) fn pick_weighted<T>(items: &[T], weight: impl Fn(&T) -> u32) -> Option<&T> {
    let dist = WeightedIndex::new(items.iter().map(|item| weight(item).max(1))).ok()?;
    items.get(dist.sample(&mut rand::thread_rng()))
}

/// Random line from `lines`, or `fallback` when the table is empty.
pub(crate) fn line<'a>(lines: &'a [String], fallback: &'a str) -> &'a str {
    pick(lines).map_or(fallback, String::as_str)
}

/// Substitute `{user}` in a template line.
pub(crate) fn fill(template: &str, user: &str) -> String {
    template.replace("{user}", user)
}

pub(crate) fn strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_weighted_skips_nothing_and_handles_empty() {
        let empty: [u32; 0] = [];
        assert!(pick_weighted(&empty, |_| 1).is_none());

        let items = [0u32, 0];
        assert!(pick_weighted(&items, |w| *w).is_some());
    }

    #[test]
    fn test_pick_weighted_prefers_heavy_items() {
        let items = [(1u32, "rare"), (1000, "common")];
        let common = (0..200)
            .filter(|_| pick_weighted(&items, |(w, _)| *w).map(|(_, n)| *n) == Some("common"))
            .count();
        assert!(common > 150);
    }

    #[test]
    fn test_line_and_fill() {
        assert_eq!(line(&[], "nada"), "nada");
        assert_eq!(line(&strings(&["uno"]), "nada"), "uno");
        assert_eq!(fill("hola {user}, {user}", "ana"), "hola ana, ana");
    }
}

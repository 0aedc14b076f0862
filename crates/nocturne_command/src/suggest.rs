//! "Did you mean" suggestions for unknown commands.

/// Suggests up to three alternatives: prefix matches first, then
/// substring matches, then anything within Levenshtein distance 3.
pub fn suggest<'a>(input: &str, names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.collect();

    let mut matches: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| name.starts_with(input))
        .collect();

    if matches.is_empty() {
        matches = names
            .iter()
            .copied()
            .filter(|name| name.contains(input))
            .collect();
    }

    if matches.is_empty() {
        // Fall back to edit distance, closest first.
        let mut scored: Vec<(usize, &str)> = names
            .iter()
            .copied()
            .filter_map(|name| {
                let distance = levenshtein(input, name);
                (distance <= 3).then_some((distance, name))
            })
            .collect();
        scored.sort();

        return scored
            .into_iter()
            .take(3)
            .map(|(_, name)| name.to_owned())
            .collect();
    }

    matches.sort();
    matches.truncate(3);
    matches.into_iter().map(str::to_owned).collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, &ca) in a.iter().enumerate() {
        let mut previous = row[0];
        row[0] = i + 1;

        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous + usize::from(ca != cb);
            previous = row[j + 1];
            row[j + 1] = substitution.min(previous + 1).min(row[j] + 1);
        }
    }

    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 5] = ["say", "shout", "stop", "whisper", "emote"];

    #[test]
    fn prefix_wins_over_distance() {
        assert_eq!(suggest("s", NAMES.iter().copied()), vec!["say", "shout", "stop"]);
    }

    #[test]
    fn substring_when_no_prefix() {
        assert_eq!(suggest("isp", NAMES.iter().copied()), vec!["whisper"]);
    }

    #[test]
    fn levenshtein_as_last_resort() {
        assert_eq!(suggest("emoet", NAMES.iter().copied()), vec!["emote"]);
        assert!(suggest("zzzzzzzz", NAMES.iter().copied()).is_empty());
    }

    #[test]
    fn distance_metric() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }
}

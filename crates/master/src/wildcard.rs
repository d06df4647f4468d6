//! Name patterns with `*` wildcards

/// Match `name` against `pattern`, where `*` matches any run of characters
pub fn simple_match(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((prefix, rest)) => {
            let Some(tail) = name.strip_prefix(prefix) else {
                return false;
            };
            if rest.is_empty() {
                return true;
            }
            tail.char_indices()
                .map(|(i, _)| i)
                .chain(std::iter::once(tail.len()))
                .any(|i| simple_match(rest, &tail[i..]))
        }
    }
}

/// Whether `pattern` contains a wildcard
pub fn is_pattern(pattern: &str) -> bool {
    pattern.contains('*')
}

/// Resolve include/exclude patterns (`-name` excludes) against `names`
///
/// Returns matches in the iteration order of `names`.
pub fn resolve<'a, I>(patterns: &[String], names: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    if patterns.is_empty() {
        return names;
    }
    let (excludes, includes): (Vec<&String>, Vec<&String>) =
        patterns.iter().partition(|p| p.starts_with('-'));
    names
        .into_iter()
        .filter(|name| {
            let included = includes.is_empty() || includes.iter().any(|p| simple_match(p, name));
            let excluded = excludes.iter().any(|p| simple_match(&p[1..], name));
            included && !excluded
        })
        .collect()
}

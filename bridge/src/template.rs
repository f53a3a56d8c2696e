//! Placeholder substitution for the message templates in the config file.

/// Replaces `{name}` placeholders using `lookup`. Placeholders the lookup does
/// not know are left as written, and substituted text is never re-scanned.
pub fn fill<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replacement = after
            .find('}')
            .and_then(|close| lookup(&after[..close]).map(|value| (close, value)));

        match replacement {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Fills positional placeholders `{0}`, `{1}`, ... from `args`.
pub fn fill_positional(template: &str, args: &[&str]) -> String {
    fill(template, |name| {
        name.parse::<usize>()
            .ok()
            .and_then(|index| args.get(index).copied())
    })
}

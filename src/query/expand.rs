//! Expansion of target expressions such as `PV:(A|B):(1|2)` into concrete
//! PV names. The expansion is always applied, also for regex targets, since
//! the archiver only understands a limited regex dialect.

/// Expands every parenthesized alternation of `unparsed`, recursively.
///
/// Groups are substituted in order, producing the Cartesian product of their
/// alternatives. Results that expand again into several targets are removed
/// from their position and their expansions appended at the end.
pub fn expand_targets(unparsed: &str) -> Vec<String> {
    let clean = unparsed.trim();

    let groups = locate_outer_parens(clean);
    if groups.is_empty() {
        return vec![clean.to_string()];
    }

    let alternatives: Vec<Vec<&str>> = groups
        .iter()
        .map(|&(start, end)| split_lowest_level(&clean[start + 1..end - 1]))
        .collect();

    let mut settled = Vec::new();
    let mut expanded = Vec::new();
    for combination in permute(&alternatives) {
        let sub = expand_targets(&selective_insert(clean, &groups, &combination));
        if sub.len() > 1 {
            expanded.extend(sub);
        } else {
            settled.extend(sub);
        }
    }

    settled.extend(expanded);
    settled
}

/// Byte spans `[start, end)` of parenthesis pairs not nested in another pair.
fn locate_outer_parens(input: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (pos, c) in input.char_indices() {
        match c {
            '(' => {
                if depth == 0 {
                    start = pos;
                }
                depth += 1;
            }
            ')' => {
                if depth == 1 {
                    spans.push((start, pos + 1));
                }
                depth -= 1;
            }
            _ => {}
        }
    }

    spans
}

/// Splits on `|` outside of any nested parentheses.
fn split_lowest_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (pos, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '|' if depth == 0 => {
                parts.push(&input[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);

    parts
}

/// Ordered Cartesian product: `[[a, b], [c, d]]` gives `ac, ad, bc, bd`.
fn permute<'a>(alternatives: &[Vec<&'a str>]) -> Vec<Vec<&'a str>> {
    alternatives.iter().fold(vec![Vec::new()], |acc, choices| {
        acc.iter()
            .flat_map(|prefix| {
                choices.iter().map(move |choice| {
                    let mut next = prefix.clone();
                    next.push(*choice);
                    next
                })
            })
            .collect()
    })
}

fn selective_insert(input: &str, spans: &[(usize, usize)], inserts: &[&str]) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev = 0;

    for (&(start, end), insert) in spans.iter().zip(inserts) {
        out.push_str(&input[prev..start]);
        out.push_str(insert);
        prev = end;
    }
    out.push_str(&input[prev..]);

    out
}

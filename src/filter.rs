use crate::models::FilterRule;

/// Applies every rule, in order, to the text.
pub fn apply_filters(text: &str, filters: &[FilterRule]) -> String {
    let mut result = text.to_string();
    for rule in filters {
        result = apply_filter(&result, rule);
    }
    result
}

/// Applies one rule repeatedly until no further match: each leftmost `start`
/// occurrence and everything through the next `end` occurrence is removed,
/// markers included. Plain byte scanning, no HTML awareness.
fn apply_filter(text: &str, rule: &FilterRule) -> String {
    let mut result = text.to_string();

    loop {
        let Some(start_idx) = result.find(&rule.start) else {
            break;
        };
        let search_from = start_idx + rule.start.len();
        let Some(end_rel) = result[search_from..].find(&rule.end) else {
            break;
        };
        let end_idx = search_from + end_rel + rule.end.len();
        result = format!("{}{}", &result[..start_idx], &result[end_idx..]);
    }

    result
}

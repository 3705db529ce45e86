//! Key-style normalization for trigger event data.
//!
//! Declarations may spell event-data keys in camelCase (`groupId`) or
//! snake_case (`group_id`); the platform's wire format is snake_case. Both
//! spellings map to one canonical key here, once, before any per-kind logic
//! looks at the data.

use std::collections::BTreeMap;

/// Loosely-typed trigger event data keyed by field name.
pub type EventData = BTreeMap<String, serde_json::Value>;

/// Convert a camelCase, PascalCase or snake_case key to snake_case.
///
/// Runs of capitals are kept together as one word (`envID` → `env_id`,
/// `HTTPSPort` → `https_port`).
pub fn to_snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' {
            out.push('_');
            continue;
        }
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let starts_word = match prev {
                None | Some('_' | '-') => false,
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                Some(_) => false,
            };
            if starts_word {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalize every top-level key of `data` to snake_case.
///
/// When a declaration carries both spellings of the same field, the value
/// written in snake_case wins.
pub fn normalize_keys(data: &EventData) -> EventData {
    let mut out = EventData::new();
    for (key, value) in data {
        let canonical = to_snake_case(key);
        if canonical == *key || !out.contains_key(&canonical) {
            out.insert(canonical, value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_case_keys_become_snake_case() {
        assert_eq!(to_snake_case("groupId"), "group_id");
        assert_eq!(to_snake_case("logTopicId"), "log_topic_id");
        assert_eq!(to_snake_case("sharditeratorType"), "sharditerator_type");
    }

    #[test]
    fn snake_case_keys_are_unchanged() {
        assert_eq!(to_snake_case("group_id"), "group_id");
        assert_eq!(to_snake_case("sl_domain"), "sl_domain");
        assert_eq!(to_snake_case("name"), "name");
    }

    #[test]
    fn acronym_runs_stay_together() {
        assert_eq!(to_snake_case("envID"), "env_id");
        assert_eq!(to_snake_case("topicURN"), "topic_urn");
        assert_eq!(to_snake_case("HTTPSPort"), "https_port");
    }

    #[test]
    fn hyphens_become_underscores() {
        assert_eq!(to_snake_case("match-mode"), "match_mode");
    }

    #[test]
    fn both_spellings_resolve_to_the_same_field() {
        let mut camel = EventData::new();
        camel.insert("groupId".to_owned(), json!("g1"));
        let mut snake = EventData::new();
        snake.insert("group_id".to_owned(), json!("g1"));
        assert_eq!(normalize_keys(&camel), normalize_keys(&snake));
    }

    #[test]
    fn snake_case_wins_on_collision() {
        let mut data = EventData::new();
        data.insert("groupId".to_owned(), json!("from-camel"));
        data.insert("group_id".to_owned(), json!("from-snake"));
        let normalized = normalize_keys(&data);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized["group_id"], json!("from-snake"));
    }
}

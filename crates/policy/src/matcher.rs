use crate::Policy;

/// Return the active policies covering `path`, highest priority first.
///
/// The sort is stable, so policies sharing a priority keep the order the
/// store returned them in.
pub fn matching_policies(policies: &[Policy], path: &str) -> Vec<Policy> {
    let mut matched: Vec<Policy> = policies
        .iter()
        .filter(|p| p.is_active && pattern_matches(&p.endpoint_pattern, path))
        .cloned()
        .collect();

    matched.sort_by(|a, b| b.priority.cmp(&a.priority));
    matched
}

/// Glob-style pattern test where `*` matches any run of characters,
/// equivalent to SQL `LIKE` with `%` substituted for `*`.
///
/// A pattern without a wildcard matches only the exact path.
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == path;
    }

    let mut pieces = pattern.split('*');

    // The leading literal must anchor at the start of the path.
    let first = pieces.next().unwrap_or("");
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let pieces: Vec<&str> = pieces.collect();
    let last_index = pieces.len() - 1;

    for (i, piece) in pieces.iter().enumerate() {
        if piece.is_empty() {
            // Trailing `*` (or an adjacent pair) consumes whatever is left.
            if i == last_index {
                return true;
            }
            continue;
        }

        if i == last_index {
            // The trailing literal must anchor at the end of the path.
            return rest.ends_with(piece);
        }

        match rest.find(piece) {
            Some(at) => rest = &rest[at + piece.len()..],
            None => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Priority, TimeWindow, UserScope};

    fn policy(id: i64, pattern: &str, priority: Priority, active: bool) -> Policy {
        Policy {
            id,
            name: format!("policy-{id}"),
            description: None,
            endpoint_pattern: pattern.to_string(),
            request_limit: 10,
            time_window: TimeWindow::new("1m"),
            burst_limit: 10,
            user_scope: UserScope::All,
            priority,
            is_active: active,
        }
    }

    #[test]
    fn exact_pattern_requires_exact_path() {
        assert!(pattern_matches("/api/users", "/api/users"));
        assert!(!pattern_matches("/api/users", "/api/users/7"));
        assert!(!pattern_matches("/api/users", "/api"));
    }

    #[test]
    fn suffix_wildcard() {
        assert!(pattern_matches("/api/users/*", "/api/users/7"));
        assert!(pattern_matches("/api/users/*", "/api/users/7/posts"));
        assert!(pattern_matches("/api/users/*", "/api/users/"));
        assert!(!pattern_matches("/api/users/*", "/api/orders/7"));
    }

    #[test]
    fn segment_wildcard() {
        assert!(pattern_matches("/api/*/export", "/api/users/export"));
        assert!(pattern_matches("/api/*/export", "/api/v2/users/export"));
        assert!(!pattern_matches("/api/*/export", "/api/users/import"));
    }

    #[test]
    fn bare_wildcard_matches_everything() {
        assert!(pattern_matches("*", "/"));
        assert!(pattern_matches("*", "/anything/at/all"));
    }

    #[test]
    fn wildcard_may_match_empty() {
        assert!(pattern_matches("/api*", "/api"));
        assert!(!pattern_matches("/a*a", "a"));
        assert!(pattern_matches("/a*a", "/aa"));
    }

    #[test]
    fn inactive_policies_are_skipped() {
        let policies = vec![
            policy(1, "/api/*", Priority::High, false),
            policy(2, "/api/*", Priority::Low, true),
        ];

        let matched = matching_policies(&policies, "/api/users");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 2);
    }

    #[test]
    fn ordered_by_priority_descending() {
        let policies = vec![
            policy(1, "/api/*", Priority::Low, true),
            policy(2, "/api/users/*", Priority::High, true),
            policy(3, "/api*", Priority::Medium, true),
        ];

        let matched = matching_policies(&policies, "/api/users/7");
        let ids: Vec<i64> = matched.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let policies = vec![
            policy(10, "/api/*", Priority::Medium, true),
            policy(11, "/api*", Priority::Medium, true),
            policy(12, "*", Priority::Medium, true),
        ];

        let matched = matching_policies(&policies, "/api/users");
        let ids: Vec<i64> = matched.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[test]
    fn no_match_yields_empty() {
        let policies = vec![policy(1, "/admin/*", Priority::High, true)];
        assert!(matching_policies(&policies, "/api/users").is_empty());
    }
}

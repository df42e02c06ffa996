//! Shared guardrails for query payload bounds and computation limits.

pub const MAX_QUERY_LENGTH: usize = 512;
pub const MAX_RELATED_SYMBOLS: usize = 100;
pub const MAX_RANK_ITERATIONS: usize = 10_000;
pub const DEFAULT_MAX_RELATED: usize = 5;

pub fn clamp_int(value: usize, minimum: usize, maximum: usize) -> usize {
    value.max(minimum).min(maximum)
}

pub fn clamp_related(value: usize) -> usize {
    clamp_int(value, 0, MAX_RELATED_SYMBOLS)
}

pub fn clamp_iterations(value: usize) -> usize {
    clamp_int(value, 1, MAX_RANK_ITERATIONS)
}

/// Trim a query and cut it to `MAX_QUERY_LENGTH` bytes on a char boundary.
pub fn truncate_query(query: &str) -> String {
    let stripped = query.trim();
    if stripped.len() <= MAX_QUERY_LENGTH {
        return stripped.to_string();
    }
    let mut end = MAX_QUERY_LENGTH;
    while !stripped.is_char_boundary(end) {
        end -= 1;
    }
    stripped[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_related() {
        assert_eq!(clamp_related(0), 0);
        assert_eq!(clamp_related(5), 5);
        assert_eq!(clamp_related(10_000), MAX_RELATED_SYMBOLS);
    }

    #[test]
    fn test_clamp_iterations_has_floor() {
        assert_eq!(clamp_iterations(0), 1);
        assert_eq!(clamp_iterations(usize::MAX), MAX_RANK_ITERATIONS);
    }

    #[test]
    fn test_truncate_query_respects_char_boundary() {
        assert_eq!(truncate_query("  rank  "), "rank");
        let long = "é".repeat(MAX_QUERY_LENGTH);
        let truncated = truncate_query(&long);
        assert!(truncated.len() <= MAX_QUERY_LENGTH);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}

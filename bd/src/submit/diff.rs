//! Diff filtering and truncation
//!
//! The raw diff feeds description synthesis, which has an input budget.
//! Generated and lockfile churn carries no signal, so those sections are
//! dropped before the byte cap is applied.

use tracing::debug;

/// Marker appended when the cap cuts the diff short
pub const TRUNCATION_MARKER: &str = "\n[... diff truncated ...]\n";

/// What to keep of a diff
#[derive(Debug, Clone)]
pub struct DiffPolicy {
    /// Byte cap on the filtered diff
    pub max_bytes: usize,

    /// Path fragments whose file sections are dropped entirely
    pub exclude: Vec<String>,
}

impl Default for DiffPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 60_000,
            exclude: vec![
                "Cargo.lock".to_string(),
                "package-lock.json".to_string(),
                "yarn.lock".to_string(),
                "pnpm-lock.yaml".to_string(),
                ".min.js".to_string(),
            ],
        }
    }
}

/// Apply `policy` to a unified diff
pub fn filter_diff(diff: &str, policy: &DiffPolicy) -> String {
    let mut kept = String::with_capacity(diff.len());

    for section in split_sections(diff) {
        let header = section.lines().next().unwrap_or("");
        if policy.exclude.iter().any(|frag| header.contains(frag.as_str())) {
            debug!(header, "dropped diff section");
            continue;
        }
        kept.push_str(section);
    }

    if kept.len() > policy.max_bytes {
        // Cut on a line boundary inside the budget
        let mut cut = policy.max_bytes;
        while !kept.is_char_boundary(cut) {
            cut -= 1;
        }
        let cut = kept[..cut].rfind('\n').unwrap_or(cut);
        kept.truncate(cut);
        kept.push_str(TRUNCATION_MARKER);
    }

    kept
}

/// Split a unified diff into per-file sections
fn split_sections(diff: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut starts: Vec<usize> = diff
        .match_indices("diff --git ")
        .filter(|(i, _)| *i == 0 || diff.as_bytes()[i - 1] == b'\n')
        .map(|(i, _)| i)
        .collect();
    starts.push(diff.len());

    for pair in starts.windows(2) {
        sections.push(&diff[pair[0]..pair[1]]);
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
index 111..222 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1 +1,2 @@
 fn main() {}
+// more
diff --git a/Cargo.lock b/Cargo.lock
index 333..444 100644
--- a/Cargo.lock
+++ b/Cargo.lock
@@ -1 +1,100 @@
+churn
";

    #[test]
    fn test_lockfile_sections_dropped() {
        let out = filter_diff(SAMPLE, &DiffPolicy::default());
        assert!(out.contains("src/lib.rs"));
        assert!(!out.contains("Cargo.lock"));
    }

    #[test]
    fn test_truncation_marker() {
        let policy = DiffPolicy {
            max_bytes: 40,
            exclude: vec![],
        };
        let out = filter_diff(SAMPLE, &policy);
        assert!(out.len() <= 40 + TRUNCATION_MARKER.len());
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_empty_diff_passes_through() {
        assert_eq!(filter_diff("", &DiffPolicy::default()), "");
    }
}

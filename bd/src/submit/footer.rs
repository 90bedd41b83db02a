//! PR body footer
//!
//! The footer carries the PR's own number (never a work-item number) so the
//! validator and downstream tooling can correlate a body with its PR. Two
//! renditions exist: a markdown copy for the GitHub body and a markup-free
//! copy for the commit-message trail.

/// Markdown footer appended to the GitHub-facing body
pub fn github_footer(pr_number: u64) -> String {
    format!("---\n*Submitted with branchdeck. Run `bd checkout {pr_number}` to review locally.*")
}

/// Plain-text footer for the commit trail
pub fn plain_footer(pr_number: u64) -> String {
    format!("Submitted with branchdeck. Run 'bd checkout {pr_number}' to review locally.")
}

/// Body without any footer, for re-rendering on update
pub fn strip_footer(body: &str) -> String {
    match body.find("\n---\n*Submitted with branchdeck") {
        Some(idx) => body[..idx].trim_end().to_string(),
        None => body.trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_carries_pr_number() {
        assert!(github_footer(501).contains("bd checkout 501"));
        assert!(plain_footer(501).contains("bd checkout 501"));
    }

    #[test]
    fn test_plain_copy_has_no_markup() {
        let plain = plain_footer(12);
        assert!(!plain.contains('*'));
        assert!(!plain.contains('`'));
        assert!(!plain.contains("---"));
    }

    #[test]
    fn test_strip_footer_round_trip() {
        let body = format!("Description.\n\n{}", github_footer(42));
        assert_eq!(strip_footer(&body), "Description.");
        assert_eq!(strip_footer("no footer here"), "no footer here");
    }
}

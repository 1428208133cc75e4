use crate::git::merged_head_sha;
use crate::providers::github::PullRequest;

use super::backlog::Backlog;

/// One open PR normalized into a sync candidate.
#[derive(Debug, Clone)]
pub struct SyncCandidate {
    /// Mirror branch name: `pr<number>_<sanitized head ref>`
    pub name: String,
    pub merge_commit_sha: String,
    pub base_sha: String,
    pub head_sha: String,
    /// The mirror already has this PR at its current head
    pub synced: bool,
    pub backlog: Backlog,
}

impl SyncCandidate {
    /// Candidates that actually get pushed this cycle.
    pub fn is_active(&self) -> bool {
        !self.synced && self.backlog.is_none()
    }
}

/// The normalized open-PR set plus the heads that could not be mirrored.
#[derive(Debug, Default)]
pub struct PrListing {
    pub candidates: Vec<SyncCandidate>,
    /// Head shas of PRs with no merge commit (likely unmergeable)
    pub unmergeable_heads: Vec<String>,
}

/// Mirror branch name for a PR. Characters git refuses in ref names are
/// replaced so the name round-trips through refspecs.
pub fn candidate_name(number: u64, head_ref: &str) -> String {
    let sanitized: String = head_ref
        .chars()
        .map(|c| match c {
            ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    format!("pr{number}_{sanitized}")
}

/// Whether a mirror tip subject records a merge of the given head.
fn subject_matches_head(subject: Option<&str>, head_sha: &str) -> bool {
    subject
        .and_then(merged_head_sha)
        .is_some_and(|sha| sha == head_sha)
}

/// Normalize the raw open-PR listing into sync candidates.
///
/// `tip_subject` looks up the subject line of the mirror tracking ref for a
/// candidate name, `None` when the ref does not exist; the decision of what
/// counts as already synced stays here.
pub fn collect_candidates(
    pulls: &[PullRequest],
    tip_subject: impl Fn(&str) -> Option<String>,
) -> PrListing {
    let mut listing = PrListing::default();

    for pull in pulls {
        let Some(merge_commit_sha) = &pull.merge_commit_sha else {
            println!(
                "PR {} ({}) has no merge commit sha, skipping",
                pull.number, pull.head.ref_
            );
            listing.unmergeable_heads.push(pull.head.sha.clone());
            continue;
        };

        let name = candidate_name(pull.number, &pull.head.ref_);
        let synced = subject_matches_head(tip_subject(&name).as_deref(), &pull.head.sha);
        if synced {
            println!(
                "Skip pushing {name} because the mirror already has HEAD {}",
                pull.head.sha
            );
        }

        listing.candidates.push(SyncCandidate {
            name,
            merge_commit_sha: merge_commit_sha.clone(),
            base_sha: pull.base.sha.clone(),
            head_sha: pull.head.sha.clone(),
            synced,
            backlog: Backlog::None,
        });
    }

    listing.candidates.sort_by(|a, b| a.name.cmp(&b.name));

    println!("All Open PRs:");
    for candidate in &listing.candidates {
        println!("    {}", candidate.name);
    }
    println!("Filtered Open PRs:");
    for candidate in listing.candidates.iter().filter(|c| !c.synced) {
        println!("    {}", candidate.name);
    }

    listing
}

/// Protected branches eligible for sync. The main branch is withheld while
/// a pipeline is already running on its current head.
pub fn protected_for_sync(
    mut branches: Vec<String>,
    main_branch: Option<&str>,
    running_sha: Option<&str>,
) -> Vec<String> {
    if let (Some(main), Some(sha)) = (main_branch, running_sha) {
        if branches.iter().any(|b| b == main) {
            println!("Skip pushing {main} because it already has a pipeline running ({sha})");
            branches.retain(|b| b != main);
        }
    }

    println!("Protected branches:");
    for branch in &branches {
        println!("    {branch}");
    }
    branches
}

/// Deletion refspecs for PR mirrors whose PR is no longer open.
pub fn prs_to_delete(open_names: &[String], synced_names: &[String]) -> Vec<String> {
    println!("Synced PRs:");
    for name in synced_names {
        println!("    {name}");
    }

    println!("Synced Closed PRs:");
    let mut closed_refspecs = Vec::new();
    for name in synced_names.iter().filter(|s| !open_names.contains(s)) {
        println!("    {name}");
        closed_refspecs.push(format!(":github/{name}"));
    }
    closed_refspecs
}

/// Push/fetch refspec pairs for the open-PR set.
///
/// Only active candidates produce refspecs; deferred and already-mirrored
/// ones are narrated and skipped. PR pairs stay index aligned and always
/// precede protected-branch and tag entries appended later.
pub fn build_refspecs(candidates: &[SyncCandidate]) -> (Vec<String>, Vec<String>) {
    println!("Building initial lists of refspecs to fetch and push");
    let mut push_refspecs = Vec::new();
    let mut fetch_refspecs = Vec::new();

    for candidate in candidates {
        if candidate.synced {
            continue;
        }
        match &candidate.backlog {
            Backlog::None => {
                println!(
                    "  pushing {} (based on {})",
                    candidate.name, candidate.base_sha
                );
                push_refspecs.push(format!("github/{0}:github/{0}", candidate.name));
                fetch_refspecs.push(format!(
                    "+{}:refs/remotes/github/{}",
                    candidate.merge_commit_sha, candidate.name
                ));
            }
            Backlog::Base => {
                println!(
                    "  defer pushing {} (based on {})",
                    candidate.name, candidate.base_sha
                );
            }
            Backlog::Check(_) => {
                println!("  defer pushing {} (based on checks)", candidate.name);
            }
        }
    }

    (push_refspecs, fetch_refspecs)
}

/// Append refspec pairs for protected branches, after all PR entries.
pub fn extend_refspecs_for_protected_branches(
    protected_branches: &[String],
    push_refspecs: &mut Vec<String>,
    fetch_refspecs: &mut Vec<String>,
) {
    for branch in protected_branches {
        push_refspecs.push(format!("github/{0}:github/{0}", branch));
        fetch_refspecs.push(format!("+refs/heads/{0}:refs/remotes/github/{0}", branch));
    }
}

/// Append refspec pairs for tags, after the protected-branch entries.
pub fn extend_refspecs_for_tags(
    tags: &[String],
    push_refspecs: &mut Vec<String>,
    fetch_refspecs: &mut Vec<String>,
) {
    for tag in tags {
        push_refspecs.push(format!("refs/tags/{0}:refs/tags/{0}", tag));
        fetch_refspecs.push(format!("+refs/tags/{0}:refs/tags/{0}", tag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::github::PullRequest;

    fn pull(number: u64, head_ref: &str, head_sha: &str, merge_sha: Option<&str>) -> PullRequest {
        serde_json::from_value(serde_json::json!({
            "number": number,
            "head": {"ref": head_ref, "sha": head_sha},
            "base": {"sha": format!("base-of-{number}")},
            "merge_commit_sha": merge_sha,
        }))
        .unwrap()
    }

    fn names(strings: &[&str]) -> Vec<String> {
        strings.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn candidate_name_prefixes_number_and_keeps_ordinary_refs() {
        assert_eq!(candidate_name(1, "improve_docs"), "pr1_improve_docs");
        assert_eq!(candidate_name(42, "feature/nested"), "pr42_feature/nested");
    }

    #[test]
    fn candidate_name_replaces_characters_git_refuses() {
        assert_eq!(candidate_name(3, "weird ref~name"), "pr3_weird-ref-name");
        assert_eq!(candidate_name(4, "a^b:c?d"), "pr4_a-b-c-d");
    }

    #[test]
    fn already_merged_head_is_filtered_from_the_active_set() {
        // pr2's mirror log says its head was already merged; pr1 is new.
        let pulls = vec![
            pull(1, "improve_docs", "shafoo", Some("aaaaaaaa")),
            pull(2, "fix_test", "shagah", Some("bbbbbbbb")),
        ];
        let listing = collect_candidates(&pulls, |name| {
            (name == "pr2_fix_test").then(|| "Merge shagah into shabar".to_string())
        });

        let active: Vec<&str> = listing
            .candidates
            .iter()
            .filter(|c| !c.synced)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(active, vec!["pr1_improve_docs"]);
        assert_eq!(listing.candidates.len(), 2);
    }

    #[test]
    fn stale_merge_subject_does_not_count_as_synced() {
        let pulls = vec![pull(1, "fix_test", "newhead", Some("cccccccc"))];
        let listing = collect_candidates(&pulls, |_| Some("Merge oldhead into shabar".to_string()));

        assert!(!listing.candidates[0].synced);
    }

    #[test]
    fn missing_merge_commit_records_an_unmergeable_head() {
        let pulls = vec![pull(9, "conflicted", "shaconflict", None)];
        let listing = collect_candidates(&pulls, |_| None);

        assert!(listing.candidates.is_empty());
        assert_eq!(listing.unmergeable_heads, vec!["shaconflict"]);
    }

    #[test]
    fn prs_to_delete_returns_deletion_refspecs_in_order() {
        let synced = names(&["pr1_first_try", "pr2_different_approach", "pr3_try_this"]);
        let open = names(&["pr3_try_this", "pr4_new_stuff"]);

        let refspecs = prs_to_delete(&open, &synced);

        assert_eq!(
            refspecs,
            vec![":github/pr1_first_try", ":github/pr2_different_approach"]
        );
    }

    fn candidate(name: &str, backlog: Backlog) -> SyncCandidate {
        SyncCandidate {
            name: name.to_string(),
            merge_commit_sha: format!("merge-{name}"),
            base_sha: format!("base-{name}"),
            head_sha: format!("head-{name}"),
            synced: false,
            backlog,
        }
    }

    #[test]
    fn refspec_pairs_stay_aligned_and_prs_precede_protected_branches() {
        let candidates = vec![
            candidate("pr1_a", Backlog::None),
            candidate("pr2_b", Backlog::None),
        ];
        let (mut push, mut fetch) = build_refspecs(&candidates);
        assert_eq!(push.len(), 2);
        assert_eq!(fetch.len(), 2);
        assert_eq!(push[0], "github/pr1_a:github/pr1_a");
        assert_eq!(fetch[0], "+merge-pr1_a:refs/remotes/github/pr1_a");

        extend_refspecs_for_protected_branches(&names(&["develop"]), &mut push, &mut fetch);
        assert_eq!(push[2], "github/develop:github/develop");
        assert_eq!(fetch[2], "+refs/heads/develop:refs/remotes/github/develop");

        extend_refspecs_for_tags(&names(&["v1.0"]), &mut push, &mut fetch);
        assert_eq!(push[3], "refs/tags/v1.0:refs/tags/v1.0");
        assert_eq!(fetch[3], "+refs/tags/v1.0:refs/tags/v1.0");
    }

    #[test]
    fn backlogged_candidates_produce_no_refspecs() {
        let candidates = vec![
            candidate("pr1_a", Backlog::Base),
            candidate("pr2_b", Backlog::Check("waiting for style check to succeed".into())),
            candidate("pr3_c", Backlog::None),
        ];
        let (push, fetch) = build_refspecs(&candidates);

        assert_eq!(push, vec!["github/pr3_c:github/pr3_c"]);
        assert_eq!(fetch.len(), 1);
    }

    #[test]
    fn synced_candidates_produce_no_refspecs() {
        let mut synced = candidate("pr1_a", Backlog::None);
        synced.synced = true;
        let (push, fetch) = build_refspecs(&[synced]);

        assert!(push.is_empty());
        assert!(fetch.is_empty());
    }

    #[test]
    fn main_branch_with_running_pipeline_is_withheld_from_protected_set() {
        let branches = protected_for_sync(
            names(&["develop", "main"]),
            Some("main"),
            Some("mainsha"),
        );
        assert_eq!(branches, vec!["develop"]);
    }

    #[test]
    fn main_branch_without_running_pipeline_stays_protected() {
        let branches = protected_for_sync(names(&["develop", "main"]), Some("main"), None);
        assert_eq!(branches, vec!["develop", "main"]);
    }
}

use crate::providers::github::CheckRun;

/// Why a PR is being withheld from a pipeline run this cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Backlog {
    /// Eligible for a pipeline run now
    #[default]
    None,
    /// The PR's base commit is the one being tested on the main branch
    Base,
    /// A prerequisite check has not succeeded yet; carries the user-facing
    /// description
    Check(String),
}

impl Backlog {
    pub fn is_none(&self) -> bool {
        matches!(self, Backlog::None)
    }
}

/// Decide whether a PR may receive a pipeline run now.
///
/// Two ordered gates, short-circuiting on the first hit: the base gate,
/// then the configured prerequisite checks in configured order. A check
/// with no run at all counts the same as a failed one.
pub fn evaluate(
    base_sha: &str,
    running_main_sha: Option<&str>,
    prereq_checks: &[String],
    check_runs: &[CheckRun],
) -> Backlog {
    if running_main_sha == Some(base_sha) {
        return Backlog::Base;
    }

    for check in prereq_checks {
        let satisfied = check_runs
            .iter()
            .filter(|run| run.name == *check)
            .any(|run| run.is_successful());
        if !satisfied {
            return Backlog::Check(format!("waiting for {check} check to succeed"));
        }
    }

    Backlog::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_run(name: &str, status: &str, conclusion: Option<&str>) -> CheckRun {
        CheckRun {
            name: name.to_string(),
            status: status.to_string(),
            conclusion: conclusion.map(str::to_string),
        }
    }

    fn checks(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn eligible_when_nothing_applies() {
        let runs = vec![check_run("style", "completed", Some("success"))];
        let result = evaluate("base1", Some("other"), &checks(&["style"]), &runs);
        assert_eq!(result, Backlog::None);
    }

    #[test]
    fn base_match_backlogs_the_pr() {
        let result = evaluate("base1", Some("base1"), &[], &[]);
        assert_eq!(result, Backlog::Base);
    }

    #[test]
    fn base_gate_short_circuits_the_check_gate() {
        // The check would also fail, but the base reason wins and the
        // checks are never consulted.
        let runs = vec![check_run("style", "completed", Some("failure"))];
        let result = evaluate("base1", Some("base1"), &checks(&["style"]), &runs);
        assert_eq!(result, Backlog::Base);
    }

    #[test]
    fn no_running_main_pipeline_skips_the_base_gate() {
        let result = evaluate("base1", None, &[], &[]);
        assert_eq!(result, Backlog::None);
    }

    #[test]
    fn failed_prereq_check_backlogs_with_description() {
        let runs = vec![check_run("style", "completed", Some("failure"))];
        let result = evaluate("base1", None, &checks(&["style"]), &runs);
        assert_eq!(
            result,
            Backlog::Check("waiting for style check to succeed".to_string())
        );
    }

    #[test]
    fn missing_check_run_counts_as_unsatisfied() {
        let result = evaluate("base1", None, &checks(&["style"]), &[]);
        assert_eq!(
            result,
            Backlog::Check("waiting for style check to succeed".to_string())
        );
    }

    #[test]
    fn incomplete_check_run_counts_as_unsatisfied() {
        let runs = vec![check_run("style", "in_progress", None)];
        let result = evaluate("base1", None, &checks(&["style"]), &runs);
        assert_eq!(
            result,
            Backlog::Check("waiting for style check to succeed".to_string())
        );
    }

    #[test]
    fn first_unsatisfied_check_in_configured_order_wins() {
        let runs = vec![
            check_run("lint", "completed", Some("failure")),
            check_run("build", "completed", Some("failure")),
        ];
        let result = evaluate("base1", None, &checks(&["build", "lint"]), &runs);
        assert_eq!(
            result,
            Backlog::Check("waiting for build check to succeed".to_string())
        );
    }

    #[test]
    fn a_later_successful_rerun_satisfies_the_check() {
        let runs = vec![
            check_run("style", "completed", Some("failure")),
            check_run("style", "completed", Some("success")),
        ];
        let result = evaluate("base1", None, &checks(&["style"]), &runs);
        assert_eq!(result, Backlog::None);
    }
}

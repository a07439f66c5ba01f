//! Exec-failure classification: ordered rule tables deciding whether a failed shell command
//! (or a message reporting one) is benign noise.
//!
//! Rules only ever mark something harmless with high confidence. When no rule matches the
//! caller forwards the notification.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Marker showing the caller deliberately silenced stderr.
pub const STDERR_NULL_MARKER: &str = "2>/dev/null";

/// Commands whose exit code 1 means "no match" / "not found" / "differs", not failure.
pub const NO_MATCH_COMMANDS: &[&str] = &[
    "grep", "egrep", "fgrep", "rg", "ag", "ack", "diff", "cmp", "test", "which", "pgrep", "pidof",
];

static NO_GLOB_MATCH: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // zsh: "zsh: no matches found: *.log", "zsh:1: no matches found: *.log"
        r"\b(?:zsh|bash|sh)(?::\d+)?: no matches found",
        // bash failglob: "bash: no match: *.txt", "bash: line 3: no match: *.txt"
        r"(?m)(?:^|\bbash: (?:line \d+: )?)no match: \S",
        // tcsh: a line reading exactly "No match."
        r"(?m)^No match\.\r?$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static EXIT_CODE_REPORT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)exited with code\s+(-?\d+)",
        r"(?i)exit code[:\s]+(-?\d+)",
        r"(?i)exit status[:\s]+(-?\d+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Allow-listed commands that are also everyday English words.
const AMBIGUOUS_COMMAND_WORDS: &[&str] = &["test", "which", "diff", "cmp", "ack"];

/// Any allow-listed command behind an explicit marker: a backtick, a `$ ` prompt, or a bare
/// parenthetical such as "(grep)".
static NO_MATCH_COMMAND_MARKED: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let names = NO_MATCH_COMMANDS.join("|");
    Regex::new(&format!(
        r"(?m)(?:(?:`\s*|\$\s+)(?:{names})(?:\s|`|$)|\((?:{names})\))"
    ))
    .ok()
});

/// Unambiguous allow-listed command at line start or after a pipe.
static NO_MATCH_COMMAND_LEADING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let names: Vec<&str> = NO_MATCH_COMMANDS
        .iter()
        .copied()
        .filter(|c| !AMBIGUOUS_COMMAND_WORDS.contains(c))
        .collect();
    Regex::new(&format!(
        r"(?m)(?:^\s*|\|\s*|\()(?:{})(?:\s|\)|`|$)",
        names.join("|")
    ))
    .ok()
});

/// One failed `exec` tool call.
#[derive(Debug, Clone, Copy)]
pub struct ExecFailure<'a> {
    pub command: &'a str,
    pub exit_code: i64,
    pub stderr: &'a str,
}

/// A named predicate over an exec failure. A match means harmless.
pub struct FailureRule {
    pub name: &'static str,
    pub matches: fn(&ExecFailure<'_>) -> bool,
}

/// Evaluated in order; first match wins.
pub const FAILURE_RULES: &[FailureRule] = &[
    FailureRule {
        name: "stderr-redirected",
        matches: stderr_redirected,
    },
    FailureRule {
        name: "no-match-exit-1",
        matches: no_match_exit_1,
    },
    FailureRule {
        name: "no-glob-match",
        matches: no_glob_stderr,
    },
];

fn stderr_redirected(f: &ExecFailure<'_>) -> bool {
    f.command.contains(STDERR_NULL_MARKER)
}

fn no_match_exit_1(f: &ExecFailure<'_>) -> bool {
    f.exit_code == 1 && final_command(f.command).is_some_and(|c| NO_MATCH_COMMANDS.contains(&c))
}

fn no_glob_stderr(f: &ExecFailure<'_>) -> bool {
    matches_no_glob(f.stderr)
}

/// First failure rule that marks this failure harmless, if any.
pub fn matching_failure_rule(failure: &ExecFailure<'_>) -> Option<&'static str> {
    FAILURE_RULES
        .iter()
        .find(|r| (r.matches)(failure))
        .map(|r| r.name)
}

pub fn is_harmless_exec_failure(command: &str, exit_code: i64, stderr: &str) -> bool {
    matching_failure_rule(&ExecFailure {
        command,
        exit_code,
        stderr,
    })
    .is_some()
}

/// Verdict of a message rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Harmless,
    Concerning,
}

/// Exit-code report extracted from an outgoing message.
#[derive(Debug, Clone, Copy)]
pub struct ExecReport<'a> {
    pub text: &'a str,
    pub exit_code: i64,
}

pub struct MessageRule {
    pub name: &'static str,
    pub matches: fn(&ExecReport<'_>) -> bool,
    pub verdict: Verdict,
}

/// Evaluated in order; first match decides. No match means concerning.
pub const MESSAGE_RULES: &[MessageRule] = &[
    MessageRule {
        name: "exit-code-above-1",
        matches: exit_code_above_1,
        verdict: Verdict::Concerning,
    },
    MessageRule {
        name: "names-no-match-command",
        matches: names_no_match_command,
        verdict: Verdict::Harmless,
    },
    MessageRule {
        name: "stderr-redirected",
        matches: mentions_redirect,
        verdict: Verdict::Harmless,
    },
    MessageRule {
        name: "no-glob-match",
        matches: mentions_no_glob,
        verdict: Verdict::Harmless,
    },
];

fn exit_code_above_1(r: &ExecReport<'_>) -> bool {
    r.exit_code > 1
}

fn names_no_match_command(r: &ExecReport<'_>) -> bool {
    [&NO_MATCH_COMMAND_MARKED, &NO_MATCH_COMMAND_LEADING]
        .into_iter()
        .filter_map(|re| (**re).as_ref())
        .any(|re| re.is_match(r.text))
}

fn mentions_redirect(r: &ExecReport<'_>) -> bool {
    r.text.contains(STDERR_NULL_MARKER)
}

fn mentions_no_glob(r: &ExecReport<'_>) -> bool {
    matches_no_glob(r.text)
}

/// Exit code reported in free text ("exited with code 2", "exit code: 1"), if any.
pub fn reported_exit_code(content: &str) -> Option<i64> {
    EXIT_CODE_REPORT
        .iter()
        .find_map(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Rule deciding a message; `None` when the message reports no exit code at all.
pub fn classify_exec_message(content: &str) -> Option<(&'static str, Verdict)> {
    let exit_code = reported_exit_code(content)?;
    let report = ExecReport {
        text: content,
        exit_code,
    };
    let decided = MESSAGE_RULES
        .iter()
        .find(|r| (r.matches)(&report))
        .map(|r| (r.name, r.verdict))
        .unwrap_or(("unrecognised-exit", Verdict::Concerning));
    Some(decided)
}

pub fn is_harmless_exec_message(content: &str) -> bool {
    matches!(classify_exec_message(content), Some((_, Verdict::Harmless)))
}

fn matches_no_glob(text: &str) -> bool {
    !text.is_empty() && NO_GLOB_MATCH.iter().any(|re| re.is_match(text))
}

/// Base command of every pipeline / list segment: first word, and the word after each
/// `|`, `&&`, `;`. Leading `VAR=value` assignments and directory prefixes are skipped.
pub fn base_commands(command: &str) -> impl Iterator<Item = &str> {
    command
        .split(['|', ';'])
        .flat_map(|seg| seg.split("&&"))
        .filter_map(|seg| {
            seg.split_whitespace()
                .find(|w| !is_env_assignment(w))
                .map(|w| w.rsplit('/').next().unwrap_or(w))
        })
}

/// Command whose exit status the whole line reports: the last pipeline / list segment.
pub fn final_command(command: &str) -> Option<&str> {
    base_commands(command).last()
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

//! Recovers a list of commands from free-form backend text.
//!
//! Models ignore the formatting directive often enough that the output has to
//! be treated as untrusted: fenced blocks, blank lines and enumeration labels
//! ("Option 1:", a bare "2)") are stripped, everything else is a candidate.

const FENCE: &str = "```";
const ENUMERATION_LABELS: [&str; 1] = ["Option"];
const LABEL_TERMINATORS: [char; 3] = ['.', ')', ':'];

/// Ordered candidate commands parsed from one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList(Vec<String>);

impl CandidateList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 1-based lookup, matching the numbering shown to the operator.
    pub fn get(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|idx| self.0.get(idx))
            .map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.get(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for CandidateList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        CandidateList(iter.into_iter().map(Into::into).collect())
    }
}

pub fn segment_response(raw: &str) -> CandidateList {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !is_fence_marker(line))
        .filter(|line| !is_enumeration_label(line))
        .collect()
}

/// A bare fence or a fence carrying only an info string (```bash).
pub fn is_fence_marker(line: &str) -> bool {
    match line.trim().strip_prefix(FENCE) {
        Some(info) => !info.chars().any(|ch| ch.is_whitespace() || ch == '`'),
        None => false,
    }
}

/// Lines such as `Option 2:`, `Option A - using lsof`, or a lone `3)`.
pub fn is_enumeration_label(line: &str) -> bool {
    let line = line.trim();
    let worded = ENUMERATION_LABELS.iter().any(|label| {
        line.strip_prefix(label).is_some_and(|rest| {
            rest.chars()
                .next()
                .is_none_or(|next| !next.is_alphabetic() || next.is_uppercase())
        })
    });
    worded || is_bare_label_token(line)
}

/// Digits or a single letter closed by `.`, `)` or `:`, with nothing else.
fn is_bare_label_token(line: &str) -> bool {
    let Some(token) = line.strip_suffix(&LABEL_TERMINATORS[..]) else {
        return false;
    };
    match token.chars().count() {
        0 => false,
        1 => token.chars().all(|ch| ch.is_ascii_alphanumeric()),
        _ => token.chars().all(|ch| ch.is_ascii_digit()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(raw: &str) -> Vec<String> {
        segment_response(raw).as_slice().to_vec()
    }

    #[test]
    fn plain_lines_become_candidates_in_order() {
        assert_eq!(candidates("cmd1\ncmd2\ncmd3"), vec!["cmd1", "cmd2", "cmd3"]);
    }

    #[test]
    fn fences_and_blank_lines_only_yield_nothing() {
        assert!(segment_response("").is_empty());
        assert!(segment_response("```\n\n   \n```").is_empty());
        assert!(segment_response("```bash\n```\n\t\n").is_empty());
    }

    #[test]
    fn fenced_block_is_unwrapped() {
        let raw = "```sh\ndf -h\ndu -sh /\n```";
        assert_eq!(candidates(raw), vec!["df -h", "du -sh /"]);
    }

    #[test]
    fn option_labels_are_dropped_but_commands_kept() {
        let raw = "Option 1:\nlsof -i :5050\n\nOption 2:\nnetstat -ano | findstr :5050";
        assert_eq!(
            candidates(raw),
            vec!["lsof -i :5050", "netstat -ano | findstr :5050"]
        );
    }

    #[test]
    fn words_that_merely_start_with_option_survive() {
        assert!(!is_enumeration_label("Optional-Flags --help"));
        assert!(is_enumeration_label("Option"));
        assert!(is_enumeration_label("OptionA"));
        assert!(is_enumeration_label("Option 3)"));
    }

    #[test]
    fn fence_detection_ignores_commands_with_backticks() {
        assert!(is_fence_marker("```"));
        assert!(is_fence_marker("  ```powershell  "));
        assert!(!is_fence_marker("```echo hi```"));
        assert!(!is_fence_marker("echo `date`"));
    }

    #[test]
    fn indented_option_labels_are_dropped() {
        assert_eq!(
            candidates("  Option 1:\nlsof -i :5050\n\tOption 2 -\nss -ltnp"),
            vec!["lsof -i :5050", "ss -ltnp"]
        );
    }

    #[test]
    fn bare_number_and_letter_labels_are_dropped() {
        assert_eq!(
            candidates("1.\nls -la\n2)\nls -l\n 10: \na)\nB.\nfind . -name '*.log'"),
            vec!["ls -la", "ls -l", "find . -name '*.log'"]
        );
        assert!(!is_enumeration_label("1. ls -la"));
        assert!(!is_enumeration_label("ab:"));
        assert!(!is_enumeration_label("cd ..."));
        assert!(!is_enumeration_label("."));
    }

    #[test]
    fn inline_backticked_command_is_not_a_fence() {
        assert!(!is_fence_marker("```ls```"));
        assert_eq!(candidates("```ls```"), vec!["```ls```"]);
    }

    #[test]
    fn crlf_and_indentation_are_normalized() {
        let raw = "  ps aux | grep ssh\r\n\r\n\tss -tnp  \r\n";
        assert_eq!(candidates(raw), vec!["ps aux | grep ssh", "ss -tnp"]);
    }

    #[test]
    fn positions_are_one_based() {
        let list: CandidateList = ["df -h", "du -sh /"].into_iter().collect();
        assert_eq!(list.first(), Some("df -h"));
        assert_eq!(list.get(2), Some("du -sh /"));
        assert_eq!(list.get(0), None);
        assert_eq!(list.get(3), None);
    }
}

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::error::GuideError;
use crate::segment::CandidateList;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Chosen(String),
    NeedsMoreContext,
    Aborted,
}

/// What one line of operator input means for a menu of `candidate_count` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Default,
    Abort,
    MoreContext,
    Candidate(usize),
    Invalid,
}

pub fn parse_menu_choice(input: &str, candidate_count: usize) -> MenuChoice {
    let answer = input.trim_end_matches(&['\r', '\n'][..]);
    if answer.is_empty() {
        return MenuChoice::Default;
    }

    match answer.trim().parse::<usize>() {
        Ok(0) => MenuChoice::Abort,
        Ok(index) if index == candidate_count + 1 => MenuChoice::MoreContext,
        Ok(index) if index <= candidate_count => MenuChoice::Candidate(index),
        _ => MenuChoice::Invalid,
    }
}

/// Maps a parsed choice onto the candidate list. `Ok(None)` means "ask again".
pub fn resolve_menu_choice(
    choice: MenuChoice,
    candidates: &CandidateList,
) -> std::result::Result<Option<SelectionOutcome>, GuideError> {
    match choice {
        MenuChoice::Default => candidates
            .first()
            .map(|command| Some(SelectionOutcome::Chosen(command.to_string())))
            .ok_or(GuideError::NoCandidates),
        MenuChoice::Abort => Ok(Some(SelectionOutcome::Aborted)),
        MenuChoice::MoreContext => Ok(Some(SelectionOutcome::NeedsMoreContext)),
        MenuChoice::Candidate(position) => Ok(candidates
            .get(position)
            .map(|command| SelectionOutcome::Chosen(command.to_string()))),
        MenuChoice::Invalid => Ok(None),
    }
}

pub fn render_menu<W: Write>(candidates: &CandidateList, out: &mut W) -> Result<()> {
    writeln!(out, "0. Exit")?;
    for (idx, command) in candidates.iter().enumerate() {
        writeln!(out, "{}. {}", idx + 1, command)?;
    }
    writeln!(
        out,
        "{}. None of these work. I need to provide more context.",
        candidates.len() + 1
    )?;
    write!(out, "Choice: ")?;
    out.flush().context("failed to flush menu output")
}

/// Shows the menu until the operator gives a usable answer.
///
/// Invalid input and a blank answer on an empty list redisplay the menu.
/// Closing the input stream counts as an abort.
pub fn select_candidate<R: BufRead, W: Write>(
    candidates: &CandidateList,
    input: &mut R,
    out: &mut W,
) -> Result<SelectionOutcome> {
    loop {
        render_menu(candidates, out)?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("failed to read selection input")?;
        if read == 0 {
            writeln!(out)?;
            tracing::warn!("operator input closed during selection; treating as exit");
            return Ok(SelectionOutcome::Aborted);
        }

        let choice = parse_menu_choice(&line, candidates.len());
        match resolve_menu_choice(choice, candidates) {
            Ok(Some(outcome)) => {
                tracing::debug!(?choice, "selection resolved");
                return Ok(outcome);
            }
            Ok(None) => {
                tracing::debug!(input = line.trim(), "invalid selection");
                writeln!(out, "Invalid selection. Please try again.")?;
            }
            Err(err @ GuideError::NoCandidates) => {
                tracing::warn!("default selection requested with no candidates");
                writeln!(out, "{err}.")?;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn list(items: &[&str]) -> CandidateList {
        items.iter().copied().collect()
    }

    fn run(candidates: &CandidateList, input: &str) -> (SelectionOutcome, String) {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut out = Vec::new();
        let outcome =
            select_candidate(candidates, &mut reader, &mut out).expect("selection should resolve");
        (outcome, String::from_utf8(out).expect("menu output is utf-8"))
    }

    #[test]
    fn numbered_pick_returns_that_candidate() {
        let candidates = list(&["netstat -ano | findstr :5050", "lsof -i :5050"]);
        let (outcome, _) = run(&candidates, "2\n");
        assert_eq!(outcome, SelectionOutcome::Chosen("lsof -i :5050".to_string()));
    }

    #[test]
    fn blank_input_defaults_to_first_candidate() {
        let candidates = list(&["df -h", "du -sh /"]);
        let (outcome, _) = run(&candidates, "\n");
        assert_eq!(outcome, SelectionOutcome::Chosen("df -h".to_string()));
    }

    #[test]
    fn zero_aborts_and_last_slot_asks_for_context() {
        let candidates = list(&["a", "b"]);
        assert_eq!(run(&candidates, "0\n").0, SelectionOutcome::Aborted);
        assert_eq!(run(&candidates, "3\n").0, SelectionOutcome::NeedsMoreContext);
    }

    #[test]
    fn menu_lists_exit_candidates_and_more_context() {
        let candidates = list(&["df -h", "du -sh /"]);
        let (_, menu) = run(&candidates, "1\n");
        assert_eq!(
            menu,
            "0. Exit\n1. df -h\n2. du -sh /\n3. None of these work. I need to provide more context.\nChoice: "
        );
    }

    #[test]
    fn invalid_input_redisplays_without_touching_candidates() {
        let candidates = list(&["df -h", "du -sh /"]);
        let before = candidates.clone();
        let (outcome, menu) = run(&candidates, "abc\n7\n-1\n 2 \n");
        assert_eq!(outcome, SelectionOutcome::Chosen("du -sh /".to_string()));
        assert_eq!(menu.matches("Invalid selection. Please try again.").count(), 3);
        assert_eq!(menu.matches("Choice: ").count(), 4);
        assert_eq!(candidates, before);
    }

    #[test]
    fn blank_input_on_empty_list_is_a_notice_not_a_pick() {
        let candidates = CandidateList::default();
        let (outcome, menu) = run(&candidates, "\n1\n");
        assert_eq!(outcome, SelectionOutcome::NeedsMoreContext);
        assert!(menu.contains("no usable commands"));
        assert!(menu.contains("1. None of these work."));
    }

    #[test]
    fn closed_input_aborts() {
        let candidates = list(&["ls"]);
        assert_eq!(run(&candidates, "").0, SelectionOutcome::Aborted);
        assert_eq!(run(&candidates, "9\n").0, SelectionOutcome::Aborted);
    }

    #[test]
    fn parse_covers_every_menu_slot() {
        assert_eq!(parse_menu_choice("", 2), MenuChoice::Default);
        assert_eq!(parse_menu_choice("0", 2), MenuChoice::Abort);
        assert_eq!(parse_menu_choice("1", 2), MenuChoice::Candidate(1));
        assert_eq!(parse_menu_choice("2", 2), MenuChoice::Candidate(2));
        assert_eq!(parse_menu_choice("3", 2), MenuChoice::MoreContext);
        assert_eq!(parse_menu_choice("4", 2), MenuChoice::Invalid);
        assert_eq!(parse_menu_choice("1.5", 2), MenuChoice::Invalid);
        assert_eq!(parse_menu_choice("1", 0), MenuChoice::MoreContext);
    }

    #[test]
    fn whitespace_only_answer_is_invalid_not_default() {
        assert_eq!(parse_menu_choice(" \n", 2), MenuChoice::Invalid);
        assert_eq!(parse_menu_choice("\t", 2), MenuChoice::Invalid);
        assert_eq!(parse_menu_choice("\r\n", 2), MenuChoice::Default);

        let candidates = list(&["df -h", "du -sh /"]);
        let (outcome, menu) = run(&candidates, "   \n2\n");
        assert_eq!(outcome, SelectionOutcome::Chosen("du -sh /".to_string()));
        assert_eq!(menu.matches("Invalid selection. Please try again.").count(), 1);
    }
}

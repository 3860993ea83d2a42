//! Conversation assembly for each round.
//!
//! The layout is fixed so the backend always sees the same transcript shape:
//! persona with few-shot examples, environment context, replayed turns,
//! the new prompt, and finally the output-format reminder.

use serde::Serialize;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

pub const EXAMPLE_CORPUS: &str = r#"
prompt: What is using port 5050?
netstat -ano | findstr :5050
lsof -i :5050
Get-Process -Id (Get-NetTCPConnection -LocalPort 5050).OwningProcess

prompt: Find a file named myfile.txt
find / -name myfile.txt
locate myfile.txt
grep -r "myfile.txt" /

prompt: Show me disk space usage
df -h
du -sh /
ncdu /

prompt: Print each line in the file at the specified path for which the value of the first field has been seen more than once.
awk 'seen[$1]++ {print $1}' path/to/list.txt

prompt: Restart the Docker service.
systemctl restart docker.service

prompt: Generate an ed25519 SSH key pair.
ssh-keygen -t ed25519

prompt: Delete all files in the current directory or subdirectories that contain an underscore in their filename.
find . -type f -regex ".*_.*" | xargs rm -f

prompt: list all the existing connections using port 22
netstat -nt | grep :22
"#;

pub const OUTPUT_FORMAT_DIRECTIVE: &str = "Remember, only answer with console commands. \
Do not enumerate them, describe them, or provide any context. Only give commands. \
If there are several suggestions, put them on separate lines. Again, only the commands themselves. \
No context. No enumerations. Don't surround with quotes. Just the commands.";

pub fn instruction_preamble() -> String {
    format!(
        "You are ConsoleGPT, a command line terminal user assistant. \
         You take descriptions of things to do and respond only with console commands. \
         Examples:\n{EXAMPLE_CORPUS}"
    )
}

pub fn environment_message(environment_context: &str) -> String {
    format!("System information context: {environment_context}")
}

/// Builds the full conversation for the next round.
///
/// Prior responses are replayed verbatim under the system role, so the
/// backend sees everything it previously offered rather than only the
/// command the operator picked. `history_depth` trims replay to the most
/// recent turns; the session itself is never modified.
pub fn build_conversation(
    session: &Session,
    prompt: &str,
    history_depth: Option<usize>,
) -> Vec<Message> {
    let replay = session.replay_window(history_depth);
    let mut messages = Vec::with_capacity(4 + replay.len() * 2);

    messages.push(Message::system(instruction_preamble()));
    messages.push(Message::system(environment_message(
        session.environment_context(),
    )));

    for turn in replay {
        messages.push(Message::user(turn.prompt()));
        messages.push(Message::system(turn.raw_response()));
    }

    messages.push(Message::user(prompt));
    messages.push(Message::system(OUTPUT_FORMAT_DIRECTIVE));
    messages
}

pub fn conversation_chars(messages: &[Message]) -> usize {
    messages.iter().map(|message| message.content.len()).sum()
}

/// Rough token estimate (chars / 4, rounded to the nearest 10).
pub fn estimate_tokens(char_count: usize) -> usize {
    (char_count / 4 + 5) / 10 * 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;

    #[test]
    fn first_round_has_fixed_frame_around_prompt() {
        let session = Session::new("macOS 14, zsh");
        let messages = build_conversation(&session, "show disk usage", None);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.starts_with("You are ConsoleGPT"));
        assert!(messages[0].content.contains("ssh-keygen -t ed25519"));
        assert_eq!(
            messages[1],
            Message::system("System information context: macOS 14, zsh")
        );
        assert_eq!(messages[2], Message::user("show disk usage"));
        assert_eq!(messages[3], Message::system(OUTPUT_FORMAT_DIRECTIVE));
    }

    #[test]
    fn prior_turns_replay_as_user_then_system_pairs() {
        let mut session = Session::new("");
        session.record_turn(Turn::new("free port 5050", "```\nlsof -i :5050\n```"));
        session.record_turn(Turn::new("on windows", "netstat -ano | findstr :5050"));

        let messages = build_conversation(&session, "kill it", None);
        assert_eq!(messages.len(), 8);
        assert_eq!(messages[1].content, "System information context: ");
        assert_eq!(messages[2], Message::user("free port 5050"));
        assert_eq!(messages[3], Message::system("```\nlsof -i :5050\n```"));
        assert_eq!(messages[4], Message::user("on windows"));
        assert_eq!(messages[5], Message::system("netstat -ano | findstr :5050"));
        assert_eq!(messages[6], Message::user("kill it"));
        assert_eq!(messages[7].content, OUTPUT_FORMAT_DIRECTIVE);
    }

    #[test]
    fn history_depth_limits_replay_to_recent_turns() {
        let mut session = Session::new("ctx");
        for idx in 0..5 {
            session.record_turn(Turn::new(format!("p{idx}"), format!("r{idx}")));
        }

        let messages = build_conversation(&session, "next", Some(2));
        let replayed = messages[2..messages.len() - 2]
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<_>>();
        assert_eq!(replayed, vec!["p3", "r3", "p4", "r4"]);
        assert_eq!(session.len(), 5);
    }

    #[test]
    fn message_roles_serialize_lowercase() {
        let json = serde_json::to_value(Message::user("ls")).expect("message should serialize");
        assert_eq!(json, serde_json::json!({"role": "user", "content": "ls"}));
    }

    #[test]
    fn token_estimate_rounds_to_tens() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(400), 100);
        assert_eq!(estimate_tokens(418), 100);
        assert_eq!(estimate_tokens(420), 110);
    }
}

use std::sync::Arc;

use estimo_chat::{Choice, ConversationId, Event, Inbound, Outbound, Router};
use estimo_config::{EstimoConfig, normalize_handle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::bootstrap;
use crate::cli::ConsoleArgs;

/// What one console line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Skip,
    Quit,
    Send(Event),
    Invalid(String),
}

/// Handle `est console --as <handle>`.
pub async fn handle(args: &ConsoleArgs, config: &EstimoConfig) -> anyhow::Result<()> {
    let service = Arc::new(bootstrap::open_service(config).await?);
    let router = Router::from_config(service, config);

    let handle = normalize_handle(&args.handle);
    let conversation = ConversationId::new(
        args.conversation
            .clone()
            .unwrap_or_else(|| format!("console-{handle}")),
    );
    debug!(conversation = %conversation, handle = %handle, "console started");
    println!("Speaking as @{handle}. /help lists commands, #N picks a choice, /quit leaves.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut choices: Vec<Choice> = Vec::new();
    while let Some(line) = lines.next_line().await? {
        let event = match parse_line(&line, &choices) {
            Line::Skip => continue,
            Line::Quit => break,
            Line::Invalid(message) => {
                println!("{message}");
                continue;
            }
            Line::Send(event) => event,
        };

        let replies = router
            .handle(Inbound {
                conversation: conversation.clone(),
                sender: handle.clone(),
                event,
            })
            .await;
        let offered = collect_choices(&replies);
        print!("{}", render(&replies));
        // A reply without a menu leaves the previous one clickable.
        if !offered.is_empty() {
            choices = offered;
        }
    }
    Ok(())
}

fn parse_line(line: &str, choices: &[Choice]) -> Line {
    let line = line.trim();
    if line.is_empty() {
        return Line::Skip;
    }
    if let Some(command) = line.strip_prefix('/') {
        let (name, args) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        if matches!(name, "quit" | "exit") {
            return Line::Quit;
        }
        return Line::Send(Event::Command {
            name: name.to_string(),
            args: args.trim().to_string(),
        });
    }
    if let Some(index) = line.strip_prefix('#') {
        return match index.parse::<usize>() {
            Ok(n) if (1..=choices.len()).contains(&n) => {
                Line::Send(Event::Click(choices[n - 1].token.clone()))
            }
            _ => Line::Invalid(format!("no choice {line} on the last menu")),
        };
    }
    Line::Send(Event::Text(line.to_string()))
}

fn collect_choices(replies: &[Outbound]) -> Vec<Choice> {
    replies.iter().flat_map(|r| r.choices.iter().cloned()).collect()
}

/// Replies in order, with choices numbered across the whole batch.
fn render(replies: &[Outbound]) -> String {
    let mut out = String::new();
    let mut n = 0;
    for reply in replies {
        out.push_str(&reply.text);
        out.push('\n');
        for choice in &reply.choices {
            n += 1;
            out.push_str(&format!("  #{n} {}\n", choice.label));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn menu() -> Vec<Choice> {
        vec![
            Choice {
                label: "core".into(),
                token: "team_score_x".into(),
            },
            Choice {
                label: "Cancel".into(),
                token: "cancel".into(),
            },
        ]
    }

    #[test]
    fn commands_split_name_and_args() {
        assert_eq!(
            parse_line("/addteam  Core Team ", &[]),
            Line::Send(Event::Command {
                name: "addteam".into(),
                args: "Core Team".into()
            })
        );
        assert_eq!(
            parse_line("/help", &[]),
            Line::Send(Event::Command {
                name: "help".into(),
                args: String::new()
            })
        );
        assert_eq!(parse_line("/quit", &[]), Line::Quit);
    }

    #[test]
    fn hash_number_clicks_a_choice() {
        assert_eq!(
            parse_line("#2", &menu()),
            Line::Send(Event::Click("cancel".into()))
        );
        assert!(matches!(parse_line("#3", &menu()), Line::Invalid(_)));
        assert!(matches!(parse_line("#0", &menu()), Line::Invalid(_)));
        assert!(matches!(parse_line("#x", &menu()), Line::Invalid(_)));
    }

    #[test]
    fn everything_else_is_text() {
        assert_eq!(parse_line("  42 ", &[]), Line::Send(Event::Text("42".into())));
        assert_eq!(parse_line("   ", &[]), Line::Skip);
    }

    #[test]
    fn choices_are_numbered_across_replies() {
        let replies = vec![
            Outbound::text("saved"),
            Outbound {
                text: "pick".into(),
                choices: menu(),
            },
        ];
        assert_eq!(render(&replies), "saved\npick\n  #1 core\n  #2 Cancel\n");
        assert_eq!(collect_choices(&replies).len(), 2);
    }
}

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::common::{ChatCommand, ChatEvent, ComplaintId, PartyId};

use super::state::AppState;

const HELP: &str = "Commands: /open <complaint> <counterpart> [name], /close, /reset, /quit. \
Anything else is sent as a message.";

/// What one line of terminal input asks for.
#[derive(Debug)]
pub enum InputAction {
    Commands(Vec<ChatCommand>),
    Help,
    Quit,
    Invalid(String),
}

pub fn parse_input(line: &str) -> InputAction {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return InputAction::Commands(vec![
            ChatCommand::UpdateDraft(line.to_string()),
            ChatCommand::SubmitDraft,
        ]);
    };

    let mut parts = rest.split_whitespace();
    match parts.next() {
        Some("open") => {
            let (Some(complaint), Some(counterpart)) = (parts.next(), parts.next()) else {
                return InputAction::Invalid("usage: /open <complaint> <counterpart> [name]".into());
            };
            let name: Vec<&str> = parts.collect();
            let counterpart_name = (!name.is_empty()).then(|| name.join(" "));
            InputAction::Commands(vec![ChatCommand::OpenConversation {
                complaint_id: ComplaintId::from(complaint),
                counterpart: PartyId::from(counterpart),
                counterpart_name,
            }])
        }
        Some("close") => InputAction::Commands(vec![ChatCommand::CloseConversation]),
        Some("reset") => InputAction::Commands(vec![ChatCommand::ResetSession]),
        Some("quit") | Some("exit") => InputAction::Quit,
        Some("help") => InputAction::Help,
        Some(other) => InputAction::Invalid(format!("unknown command /{other}")),
        None => InputAction::Help,
    }
}

/// Line-oriented terminal view over a running chat client.
pub struct TerminalApp {
    state: AppState,
    command_sender: mpsc::Sender<ChatCommand>,
    event_receiver: mpsc::Receiver<ChatEvent>,
}

impl TerminalApp {
    pub fn new(
        command_sender: mpsc::Sender<ChatCommand>,
        event_receiver: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        Self {
            state: AppState::new(),
            command_sender,
            event_receiver,
        }
    }

    pub async fn run(mut self) -> std::io::Result<()> {
        println!("{HELP}");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match parse_input(&line) {
                        InputAction::Commands(commands) => {
                            for command in commands {
                                if let Err(err) = self.command_sender.send(command).await {
                                    log::warn!("Failed to send command to chat client: {err}");
                                }
                            }
                        }
                        InputAction::Help => println!("{HELP}"),
                        InputAction::Invalid(reason) => println!("{reason}"),
                        InputAction::Quit => break,
                    }
                }
                event = self.event_receiver.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    for line in self.state.apply(&event) {
                        println!("{line}");
                    }
                }
            }
        }

        Ok(())
    }
}

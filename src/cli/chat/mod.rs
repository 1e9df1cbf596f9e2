pub mod command;
pub mod prompt;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use color_print::cformat;
use command::Command;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use eyre::Result;
use prompt::generate_prompt;

use crate::client::controller::{Bubble, ERROR_BUBBLE};
use crate::client::format::Markup;
use crate::client::voice::VoiceInput;
use crate::client::{
    AttachmentKind, ChatController, FileStore, HttpRelayClient, PendingAttachment,
    RelayApi, Role, Submission, SubmitOutcome, Theme, View,
};

const WELCOME_TEXT: &str = "
Welcome to PikaBot!
Your intelligent AI companion powered by Google Gemini

Things to try
• Chat: just type a message
• Image Analysis: /image <path>, then ask about it
• File Reading: /file <path>, then ask about it

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
PikaBot

/image <path>  Attach an image to the next message
/file <path>   Attach a text file to the next message
/remove        Remove the attached file
/voice         Toggle voice input
/theme         Switch between dark and light theme
/clear         Clear the chat history
/help          Show this help dialogue
/quit          Quit the application
";

const CLEAR_CONFIRMATION: &str = "Are you sure you want to clear the chat history? [y/N] ";

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    controller: ChatController<FileStore, HttpRelayClient>,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        store: FileStore,
        relay: HttpRelayClient,
    ) -> Result<Self> {
        // No speech driver is available in a terminal.
        let controller = ChatController::load(store, relay, VoiceInput::new(None), Markup::terminal())?;
        Ok(Self {
            output,
            input,
            interactive,
            controller,
        })
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Handle non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            self.controller.set_input(input);
            let outcome = self.send().await?;
            return Ok(match outcome {
                SubmitOutcome::Failed => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            });
        }

        if self.interactive {
            self.print_view()?;
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_view(&mut self) -> Result<()> {
        match self.controller.view() {
            View::Welcome => writeln!(self.output, "{}", WELCOME_TEXT)?,
            View::Transcript(bubbles) => {
                for bubble in &bubbles {
                    self.print_bubble(bubble)?;
                }
            }
        }
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let prompt_text = generate_prompt(self.controller.attachment());
            let readline = rl.readline(&prompt_text);

            match readline {
                Ok(line) => {
                    if line.trim().is_empty() && self.controller.attachment().is_none() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    match Command::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(Command::Clear) => {
                            let answer = rl.readline(CLEAR_CONFIRMATION).unwrap_or_default();
                            let confirmed = matches!(answer.trim(), "y" | "Y" | "yes");
                            if self.controller.clear_history(confirmed)? {
                                self.print_view()?;
                            }
                        }
                        Ok(command) => {
                            if let Err(e) = self.handle_command(command).await {
                                writeln!(self.output, "Error: {}", e)?;
                            }
                        }
                        Err(e) => writeln!(self.output, "{}", e)?,
                    }
                }
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Send(text) => {
                self.controller.set_input(text);
                self.send().await?;
            }
            Command::Image(path) => self.attach(AttachmentKind::Image, &path).await?,
            Command::File(path) => self.attach(AttachmentKind::Document, &path).await?,
            Command::Remove => {
                if let Some(attachment) = self.controller.remove_attachment() {
                    writeln!(self.output, "Removed {}", attachment.name)?;
                }
            }
            Command::Voice => {
                let state = self.controller.toggle_voice()?;
                writeln!(self.output, "Voice input: {:?}", state)?;
            }
            Command::Theme => {
                let theme = self.controller.toggle_theme()?;
                writeln!(self.output, "Theme: {}", theme)?;
            }
            Command::Help => writeln!(self.output, "{}", HELP_TEXT)?,
            Command::Clear | Command::Quit => {}
        }
        Ok(())
    }

    async fn attach(&mut self, kind: AttachmentKind, path: &Path) -> Result<()> {
        let path = crate::cli::expand_home(path);
        let attachment = PendingAttachment::from_path(kind, &path).await?;
        let name = attachment.name.clone();
        self.controller.attach(attachment)?;
        writeln!(self.output, "Attached {} {}", kind, name)?;
        Ok(())
    }

    /// Runs one turn with a typing indicator while the relay works.
    async fn send(&mut self) -> Result<SubmitOutcome> {
        let request = match self.controller.begin_submit() {
            Submission::Ignored => return Ok(SubmitOutcome::Ignored),
            Submission::Busy => return Ok(SubmitOutcome::Busy),
            Submission::Dispatch(request) => request,
        };
        let mark = self.controller.transcript().len();

        write!(self.output, "{}", cformat!("<dim>PikaBot is typing...</dim>"))?;
        self.output.flush()?;

        let result = self.controller.relay().exchange(request).await;
        let outcome = self.controller.complete(result);

        queue!(self.output, MoveToColumn(0), Clear(ClearType::CurrentLine))?;

        for bubble in self.controller.transcript_since(mark).to_vec() {
            self.print_bubble(&bubble)?;
        }
        self.output.flush()?;

        Ok(outcome)
    }

    fn print_bubble(&mut self, bubble: &Bubble) -> Result<()> {
        let label = match (bubble.role, self.controller.theme()) {
            (Role::User, Theme::Dark) => cformat!("<bold><cyan>You</cyan></bold>"),
            (Role::User, Theme::Light) => cformat!("<bold><blue>You</blue></bold>"),
            (Role::Assistant, _) if bubble.text == ERROR_BUBBLE => {
                cformat!("<bold><red>PikaBot</red></bold>")
            }
            (Role::Assistant, Theme::Dark) => cformat!("<bold><yellow>PikaBot</yellow></bold>"),
            (Role::Assistant, Theme::Light) => cformat!("<bold><magenta>PikaBot</magenta></bold>"),
        };
        let body = self.controller.format(&bubble.text);
        writeln!(self.output, "{}: {}", label, body)?;
        Ok(())
    }
}

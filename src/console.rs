use ark_console_client::{
    CommandDispatcher,
    ServerRef,
};
use color_eyre::Result;
use std::io::Write as _;
use tokio::io::{
    AsyncBufReadExt as _,
    BufReader,
};

/// One line typed into the console.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleInput<'a> {
    Empty,
    Quit,
    History,
    Complete(&'a str),
    Command(&'a str),
}

impl<'a> ConsoleInput<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(directive) = line.strip_prefix(':') else {
            return Self::Command(line);
        };
        let (name, rest) = directive.split_once(char::is_whitespace).unwrap_or((directive, ""));
        match name {
            "quit" | "exit" | "q" => Self::Quit,
            "history" => Self::History,
            "complete" => Self::Complete(rest.trim()),
            _ => Self::Command(line),
        }
    }
}

/// Reads commands from stdin until EOF or `:quit`.
pub async fn run(dispatcher: &CommandDispatcher, server: &ServerRef) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&server.name)?;

    while let Some(line) = lines.next_line().await? {
        match ConsoleInput::parse(&line) {
            ConsoleInput::Empty => {}
            ConsoleInput::Quit => break,
            ConsoleInput::History => {
                for (index, command) in dispatcher.history().iter().enumerate() {
                    println!("{:>4}  {command}", index + 1);
                }
            }
            ConsoleInput::Complete(prefix) => {
                let suggestions = dispatcher.with_history(|history| {
                    history
                        .suggest(prefix)
                        .into_iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                });
                if suggestions.is_empty() {
                    println!("no earlier command starts with {prefix:?}");
                }
                for suggestion in suggestions {
                    println!("{suggestion}");
                }
            }
            ConsoleInput::Command(command) => {
                let result = dispatcher.send_command(server, command).await;
                if result.success {
                    println!("{}", result.output());
                } else {
                    eprintln!("error: {}", result.output());
                }
            }
        }
        prompt(&server.name)?;
    }
    println!();
    Ok(())
}

fn prompt(server: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{server}> ")?;
    stdout.flush()?;
    Ok(())
}

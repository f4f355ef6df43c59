//! The read-eval-print loop: one prompt in, one completion out.

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::completion::{Complete, CompletionError, CompletionRequest, DEFAULT_TEMPERATURE};
use crate::palm::ModelDescriptor;

const BANNER: &str = "Welcome to the PaLM Code Assistant!\n\
                      Ask me any coding-related question and I'll provide you the code.\n";
const PROMPT: &str = "\nEnter your question: ";
const NO_OUTPUT: &str = "(the service returned no completion for this prompt)";

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed `exit` or `quit`
    UserExit,
    /// Input was closed
    EndOfInput,
    /// The service refused access to the API key
    Forbidden,
}

/// What a line of input asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Exit,
    Blank,
    Prompt(&'a str),
}

impl<'a> Input<'a> {
    pub fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Input::Blank
        } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
            Input::Exit
        } else {
            Input::Prompt(trimmed)
        }
    }
}

pub struct Repl<C: Complete> {
    completer: C,
    model: Option<ModelDescriptor>,
    temperature: f32,
}

impl<C: Complete> Repl<C> {
    pub fn new(completer: C) -> Self {
        Self {
            completer,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_model(mut self, model: Option<ModelDescriptor>) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Runs until the user exits, input ends, or access is forbidden.
    /// Only I/O failures on `input`/`output` are returned as errors.
    pub async fn run<R, W>(&self, input: &mut R, output: &mut W) -> Result<SessionEnd>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        write_out(output, BANNER).await?;

        let mut buf = Vec::new();
        loop {
            write_out(output, PROMPT).await?;

            buf.clear();
            let read = input
                .read_until(b'\n', &mut buf)
                .await
                .context("Failed to read from input")?;
            if read == 0 {
                write_out(output, "\nGoodbye!\n").await?;
                return Ok(SessionEnd::EndOfInput);
            }

            // Invalid UTF-8 is replaced rather than ending the session
            let line = String::from_utf8_lossy(&buf);
            let prompt = match Input::parse(&line) {
                Input::Exit => {
                    write_out(output, "Goodbye!\n").await?;
                    return Ok(SessionEnd::UserExit);
                }
                Input::Blank => continue,
                Input::Prompt(prompt) => prompt,
            };

            debug!("Forwarding prompt of {} byte(s)", prompt.len());
            let request = CompletionRequest::new(prompt)
                .with_model(self.model.clone())
                .with_temperature(self.temperature);

            match self.completer.complete(request).await {
                Ok(result) => {
                    let text = if result.text.is_empty() {
                        NO_OUTPUT
                    } else {
                        result.text.as_str()
                    };
                    write_out(output, &format!("\nGenerated Code:\n{}\n", text)).await?;
                }
                Err(e) if e.is_session_fatal() => {
                    info!("Ending session: {}", e);
                    write_out(output, &forbidden_message(&e)).await?;
                    return Ok(SessionEnd::Forbidden);
                }
                Err(e) => {
                    write_out(output, &format!("Error: {}\n", e)).await?;
                }
            }
        }
    }
}

fn forbidden_message(e: &CompletionError) -> String {
    let detail = match e {
        CompletionError::AccessForbidden(msg) if !msg.is_empty() => format!("{}\n", msg),
        _ => String::new(),
    };
    format!(
        "Error: Generative Language API access is forbidden.\n{}\
         Please ensure you've enabled the API and have the correct permissions.\n",
        detail
    )
}

async fn write_out<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output
        .write_all(text.as_bytes())
        .await
        .context("Failed to write to output")?;
    output.flush().await.context("Failed to flush output")?;
    Ok(())
}

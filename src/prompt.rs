use std::io::{self, BufRead, Write};

/// Line-based question/answer source.
pub trait Prompt {
  /// Returns `None` once input is exhausted.
  fn ask(&mut self, question: &str) -> io::Result<Option<String>>;
}

/// Writes the question to `output` and reads one line from `input`.
pub struct LinePrompt<R, W> {
  input: R,
  output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
  pub fn new(input: R, output: W) -> Self {
    Self { input, output }
  }
}

impl LinePrompt<io::StdinLock<'static>, io::Stdout> {
  pub fn stdio() -> Self {
    Self::new(io::stdin().lock(), io::stdout())
  }
}

impl<R: BufRead, W: Write> Prompt for LinePrompt<R, W> {
  fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
    write!(self.output, "{}", question)?;
    self.output.flush()?;
    let mut line = String::new();
    if self.input.read_line(&mut line)? == 0 {
      return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
  }
}

/// Answers given up front (from the command line) skip the question.
pub struct Preset<P> {
  answers: Vec<Option<String>>,
  inner: P,
}

impl<P: Prompt> Preset<P> {
  pub fn new(answers: Vec<Option<String>>, inner: P) -> Self {
    Self { answers, inner }
  }
}

impl<P: Prompt> Prompt for Preset<P> {
  fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
    if !self.answers.is_empty() {
      if let Some(answer) = self.answers.remove(0) {
        return Ok(Some(answer));
      }
    }
    self.inner.ask(question)
  }
}

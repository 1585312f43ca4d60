use std::io::{self, BufRead, Write};

/// The human side of the game.
pub trait Oracle {
    /// Ask for the person the player is thinking of.
    fn concept(&mut self) -> io::Result<String>;

    /// Ask a yes/no question. Only ever returns once the answer is valid.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;

    fn tell(&mut self, message: &str) -> io::Result<()>;
}

/// Accepts `y`/`n` in any case, ignoring surrounding whitespace.
pub fn parse_yes_no(input: &str) -> Option<bool> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("y") {
        Some(true)
    } else if input.eq_ignore_ascii_case("n") {
        Some(false)
    } else {
        None
    }
}

/// Line-oriented oracle over any reader/writer pair.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn prompt(&mut self, text: &str) -> io::Result<String> {
        write!(self.output, "{text}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed before an answer was given",
            ));
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Oracle for Console<R, W> {
    fn concept(&mut self) -> io::Result<String> {
        loop {
            let concept = self.prompt("Who are you thinking of? (kept secret until the end): ")?;
            if !concept.is_empty() {
                return Ok(concept);
            }
        }
    }

    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        loop {
            let line = self.prompt(&format!("{question} (y/n): "))?;
            match parse_yes_no(&line) {
                Some(answer) => return Ok(answer),
                None => {
                    tracing::debug!(input = %line, "rejected answer");
                    writeln!(self.output, "Please answer 'y' or 'n'.")?;
                }
            }
        }
    }

    fn tell(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{message}")
    }
}

//! Input form for a scan request.
//!
//! [`TerminalForm`] prompts with `dialoguer` when a terminal is attached;
//! [`Prompter`] reads plain lines otherwise (piped input, tests). Both show
//! the defaults, take them on a blank answer, and ask again on invalid input.
//! End of input cancels the form.

use std::io::{self, BufRead, IsTerminal, Write};

use dialoguer::console::Term;
use dialoguer::{Input, Select};
use scanscope_core::{Objective, PatchRegion, ScanRequest};

#[derive(thiserror::Error, Debug)]
pub enum FormError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Prompt(#[from] dialoguer::Error),
    #[error("{0}")]
    Invalid(String),
}

/// White-balance answers: a gain and, optionally, the patch drawn on the
/// preview in display coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WhiteBalanceInput {
    pub gain: f32,
    pub patch: Option<PatchRegion>,
}

/// Parse a stage coordinate in µm. Fractions are truncated.
pub fn parse_coordinate(text: &str, default: i64) -> Result<i64, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(default);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v.trunc() as i64),
        _ => Err(format!(
            "Invalid value '{text}', please enter a non-negative number."
        )),
    }
}

/// Parse a white-balance gain. Blank means no white balance.
pub fn parse_gain(text: &str) -> Result<Option<f32>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match text.parse::<f32>() {
        Ok(g) if g.is_finite() && g > 0.0 => Ok(Some(g)),
        _ => Err(format!("Invalid gain '{text}', please enter a positive number.")),
    }
}

/// Parse `x1 y1 x2 y2` (spaces or commas). Blank means no patch.
pub fn parse_patch(text: &str) -> Result<Option<PatchRegion>, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let values: Vec<usize> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| format!("Invalid patch '{text}', expected 'x1 y1 x2 y2'."))?;
    match values.as_slice() {
        &[x1, y1, x2, y2] => Ok(Some(PatchRegion::from_corners((x1, y1), (x2, y2)))),
        _ => Err(format!("Invalid patch '{text}', expected 'x1 y1 x2 y2'.")),
    }
}

/// One question per field. `Ok(None)` from any method cancels the form.
pub trait RequestForm {
    fn coordinate(&mut self, label: &str, default: i64) -> Result<Option<i64>, FormError>;

    fn objective(&mut self, default: Objective) -> Result<Option<Objective>, FormError>;

    /// Blank skips white balance.
    fn gain(&mut self) -> Result<Option<f32>, FormError>;

    /// Blank skips the patch.
    fn patch(&mut self) -> Result<Option<PatchRegion>, FormError>;

    /// The four edges and the objective, in form order.
    fn request(&mut self, defaults: &ScanRequest) -> Result<Option<ScanRequest>, FormError> {
        let Some(y_top) = self.coordinate("Y top (µm)", defaults.y_top)? else {
            return Ok(None);
        };
        let Some(y_bottom) = self.coordinate("Y bottom (µm)", defaults.y_bottom)? else {
            return Ok(None);
        };
        let Some(x_left) = self.coordinate("X left (µm)", defaults.x_left)? else {
            return Ok(None);
        };
        let Some(x_right) = self.coordinate("X right (µm)", defaults.x_right)? else {
            return Ok(None);
        };
        let Some(objective) = self.objective(defaults.objective)? else {
            return Ok(None);
        };
        Ok(Some(ScanRequest {
            y_top,
            y_bottom,
            x_left,
            x_right,
            objective,
        }))
    }

    /// Optional white-balance gain and patch. `None` when skipped.
    fn white_balance(&mut self) -> Result<Option<WhiteBalanceInput>, FormError> {
        let Some(gain) = self.gain()? else {
            return Ok(None);
        };
        let patch = self.patch()?;
        Ok(Some(WhiteBalanceInput { gain, patch }))
    }
}

const GAIN_PROMPT: &str = "White balance gain (blank to skip)";
const PATCH_PROMPT: &str = "Reference patch on preview as 'x1 y1 x2 y2' (blank to skip)";

/// Interactive prompts on the terminal's stderr.
#[derive(Debug)]
pub struct TerminalForm {
    term: Term,
}

impl TerminalForm {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    /// Both stdin and stderr are attached to a terminal.
    pub fn available() -> bool {
        io::stdin().is_terminal() && Term::stderr().is_term()
    }

    fn optional_text<T>(
        &self,
        prompt: &str,
        parse: impl Fn(&str) -> Result<Option<T>, String> + Copy,
    ) -> Result<Option<T>, FormError> {
        let answer: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .validate_with(move |text: &String| parse(text.as_str()).map(|_| ()))
            .interact_text_on(&self.term)?;
        parse(&answer).map_err(FormError::Invalid)
    }
}

impl Default for TerminalForm {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestForm for TerminalForm {
    fn coordinate(&mut self, label: &str, default: i64) -> Result<Option<i64>, FormError> {
        let answer: String = Input::new()
            .with_prompt(label)
            .default(default.to_string())
            .validate_with(move |text: &String| {
                parse_coordinate(text.as_str(), default).map(|_| ())
            })
            .interact_text_on(&self.term)?;
        parse_coordinate(&answer, default)
            .map(Some)
            .map_err(FormError::Invalid)
    }

    fn objective(&mut self, default: Objective) -> Result<Option<Objective>, FormError> {
        let labels: Vec<&str> = Objective::ALL.iter().map(|o| o.label()).collect();
        let current = Objective::ALL
            .iter()
            .position(|&o| o == default)
            .unwrap_or(0);
        let choice = Select::new()
            .with_prompt("Objective")
            .items(&labels)
            .default(current)
            .interact_on_opt(&self.term)?;
        Ok(choice.map(|i| Objective::ALL[i]))
    }

    fn gain(&mut self) -> Result<Option<f32>, FormError> {
        self.optional_text(GAIN_PROMPT, parse_gain)
    }

    fn patch(&mut self) -> Result<Option<PatchRegion>, FormError> {
        self.optional_text(PATCH_PROMPT, parse_patch)
    }
}

/// Line-based fallback: asks on `output`, reads answers from `input`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// One answer, trimmed. `None` at end of input.
    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    }

    fn ask_until<T>(
        &mut self,
        question: &str,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> io::Result<Option<T>> {
        while let Some(answer) = self.ask(question)? {
            match parse(&answer) {
                Ok(value) => return Ok(Some(value)),
                Err(msg) => writeln!(self.output, "{msg}")?,
            }
        }
        Ok(None)
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> RequestForm for Prompter<R, W> {
    fn coordinate(&mut self, label: &str, default: i64) -> Result<Option<i64>, FormError> {
        let question = format!("{label} [{default}]: ");
        Ok(self.ask_until(&question, |text| parse_coordinate(text, default))?)
    }

    fn objective(&mut self, default: Objective) -> Result<Option<Objective>, FormError> {
        let choices: Vec<&str> = Objective::ALL.iter().map(|o| o.label()).collect();
        let question = format!("Objective ({}) [{default}]: ", choices.join("/"));
        Ok(self.ask_until(&question, |text| {
            if text.is_empty() {
                return Ok(default);
            }
            text.parse::<Objective>().map_err(|err| err.to_string())
        })?)
    }

    fn gain(&mut self) -> Result<Option<f32>, FormError> {
        Ok(self.ask_until(&format!("{GAIN_PROMPT}: "), parse_gain)?.flatten())
    }

    fn patch(&mut self) -> Result<Option<PatchRegion>, FormError> {
        Ok(self.ask_until(&format!("{PATCH_PROMPT}: "), parse_patch)?.flatten())
    }
}

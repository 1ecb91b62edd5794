use std::fmt;

use quiz_core::model::OptionKey;

/// One line typed by the user while a quiz is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Toggle these option keys on the current question.
    Select(Vec<OptionKey>),
    Show,
    Next,
    Previous,
    /// Zero-based target index.
    Jump(usize),
    Pause,
    Review,
    Study,
    Status,
    Save,
    Quit,
    Help,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Unknown(String),
    InvalidJump { raw: String },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Unknown(raw) => write!(f, "unknown command: {raw} (type `help`)"),
            InputError::InvalidJump { raw } => {
                write!(f, "jump needs a question number from 1, got: {raw}")
            }
        }
    }
}

impl std::error::Error for InputError {}

impl Input {
    pub fn parse(line: &str) -> Result<Self, InputError> {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            return Ok(Self::Empty);
        };

        let command = match first.to_ascii_lowercase().as_str() {
            "show" | "check" => Self::Show,
            "next" => Self::Next,
            "prev" | "previous" | "back" => Self::Previous,
            "jump" | "goto" => {
                let raw = words.next().unwrap_or_default().to_owned();
                let number: usize = raw
                    .parse()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| InputError::InvalidJump { raw: raw.clone() })?;
                Self::Jump(number - 1)
            }
            "pause" | "resume" => Self::Pause,
            "review" => Self::Review,
            "study" => Self::Study,
            "status" => Self::Status,
            "save" => Self::Save,
            "quit" | "exit" => Self::Quit,
            "help" | "?" => Self::Help,
            _ => return parse_keys(line),
        };
        Ok(command)
    }
}

// Option keys are short labels such as `A` or `b c`; anything longer is a typo.
fn parse_keys(line: &str) -> Result<Input, InputError> {
    let keys: Vec<OptionKey> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            if token.len() <= 2 && token.chars().all(|c| c.is_ascii_alphanumeric()) {
                Ok(OptionKey::new(token.to_ascii_uppercase()))
            } else {
                Err(InputError::Unknown(line.to_owned()))
            }
        })
        .collect::<Result<_, _>>()?;
    Ok(Input::Select(keys))
}

pub fn print_controls() {
    println!("Commands:");
    println!("  A | b c          toggle option(s) on the current question");
    println!("  show             check the selected answer");
    println!("  next | prev      move between questions");
    println!("  jump <n>         go to question n");
    println!("  pause            pause or resume the timer");
    println!("  review | study   review answers, or retry the ones you missed");
    println!("  status | save    show progress, or save the session now");
    println!("  quit             save and leave");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_map_to_commands() {
        assert_eq!(Input::parse("  NEXT "), Ok(Input::Next));
        assert_eq!(Input::parse("prev"), Ok(Input::Previous));
        assert_eq!(Input::parse("jump 3"), Ok(Input::Jump(2)));
        assert_eq!(Input::parse(""), Ok(Input::Empty));
    }

    #[test]
    fn short_tokens_become_uppercase_keys() {
        assert_eq!(
            Input::parse("a, c"),
            Ok(Input::Select(vec![OptionKey::new("A"), OptionKey::new("C")]))
        );
    }

    #[test]
    fn bad_input_is_reported() {
        assert_eq!(
            Input::parse("jump 0"),
            Err(InputError::InvalidJump { raw: "0".into() })
        );
        assert!(matches!(Input::parse("nextt"), Err(InputError::Unknown(_))));
    }
}

//! The trigger rule: does a message greet the bot?

use regex::{Regex, RegexBuilder};

use crate::base::types::Res;

/// The word that makes the bot answer.
pub const TRIGGER_WORD: &str = "hello";

/// Matches [`TRIGGER_WORD`] as a standalone word anywhere in a message.
#[derive(Debug, Clone)]
pub struct Trigger {
    pattern: Regex,
}

impl Trigger {
    /// Build the trigger; the match is case-sensitive unless `case_insensitive` is set.
    pub fn new(case_insensitive: bool) -> Res<Self> {
        let pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(TRIGGER_WORD)))
            .case_insensitive(case_insensitive)
            .build()?;

        Ok(Self { pattern })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

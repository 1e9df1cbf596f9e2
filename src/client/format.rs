//! Light message formatting: a fixed list of regex substitutions for bold,
//! italic, inline code and line breaks. This is not a markdown parser.

use crossterm::style::{Attribute, SetAttribute};
use regex::{Captures, Regex};

/// Opening/closing strings emitted by the formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup {
    pub bold: (String, String),
    pub italic: (String, String),
    pub code: (String, String),
    pub line_break: String,
}

impl Markup {
    /// ANSI attributes for a terminal; newlines are kept as they are.
    pub fn terminal() -> Self {
        let attr = |a: Attribute| SetAttribute(a).to_string();
        Self {
            bold: (attr(Attribute::Bold), attr(Attribute::NormalIntensity)),
            italic: (attr(Attribute::Italic), attr(Attribute::NoItalic)),
            code: (attr(Attribute::Reverse), attr(Attribute::NoReverse)),
            line_break: "\n".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Formatter {
    bold: Regex,
    italic: Regex,
    code: Regex,
    markup: Markup,
}

impl Formatter {
    pub fn new(markup: Markup) -> Result<Self, regex::Error> {
        Ok(Self {
            bold: Regex::new(r"\*\*(.*?)\*\*")?,
            italic: Regex::new(r"\*(.*?)\*")?,
            code: Regex::new(r"`(.*?)`")?,
            markup,
        })
    }

    pub fn format(&self, text: &str) -> String {
        let formatted = wrap(&self.bold, text, &self.markup.bold);
        let formatted = wrap(&self.italic, &formatted, &self.markup.italic);
        let formatted = wrap(&self.code, &formatted, &self.markup.code);
        formatted.replace('\n', &self.markup.line_break)
    }
}

fn wrap(re: &Regex, text: &str, (open, close): &(String, String)) -> String {
    re.replace_all(text, |caps: &Captures| format!("{open}{}{close}", &caps[1]))
        .into_owned()
}

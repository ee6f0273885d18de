//! Raw catalog lines with their terminators

/// Line terminator as found in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Last line without a trailing newline
    None,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::None => "",
        }
    }
}

/// One line of the catalog, content and terminator kept apart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub text: String,
    pub ending: LineEnding,
}

/// Split `content` into lines, remembering each terminator
pub fn split_lines(content: &str) -> Vec<RawLine> {
    content
        .split_inclusive('\n')
        .map(|chunk| {
            if let Some(text) = chunk.strip_suffix("\r\n") {
                RawLine {
                    text: text.to_string(),
                    ending: LineEnding::CrLf,
                }
            } else if let Some(text) = chunk.strip_suffix('\n') {
                RawLine {
                    text: text.to_string(),
                    ending: LineEnding::Lf,
                }
            } else {
                RawLine {
                    text: chunk.to_string(),
                    ending: LineEnding::None,
                }
            }
        })
        .collect()
}

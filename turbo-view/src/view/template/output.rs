//! Output buffers.
//!
//! Everything a template prints goes to the innermost open capture, or to
//! the page itself when nothing is being captured. Sections and cached fragments
//! open captures to collect their content before deciding where it goes.
use super::Error;

/// What opened a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    Section,
    Fragment,
}

impl Capture {
    fn name(&self) -> &'static str {
        match self {
            Capture::Section => "section",
            Capture::Fragment => "cache",
        }
    }
}

#[derive(Debug, Default)]
pub struct Output {
    root: String,
    captures: Vec<(Capture, String)>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text to the innermost capture.
    pub fn write(&mut self, text: &str) {
        match self.captures.last_mut() {
            Some((_, buffer)) => buffer.push_str(text),
            None => self.root.push_str(text),
        }
    }

    /// Start capturing output.
    pub fn start(&mut self, capture: Capture) {
        self.captures.push((capture, String::new()));
    }

    /// Stop capturing and return what was captured. The innermost capture
    /// must have been opened by the same kind of block.
    pub fn end(&mut self, capture: Capture) -> Result<String, Error> {
        match self.captures.last() {
            Some((open, _)) if *open == capture => Ok(self
                .captures
                .pop()
                .map(|(_, buffer)| buffer)
                .unwrap_or_default()),
            _ => Err(Error::UnbalancedCapture),
        }
    }

    /// Number of open captures.
    pub fn depth(&self) -> usize {
        self.captures.len()
    }

    /// The page output. Fails if a capture was never closed.
    pub fn finish(self) -> Result<String, Error> {
        match self.captures.last() {
            Some((capture, _)) => Err(Error::Unclosed(capture.name())),
            None => Ok(self.root),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nested_captures() -> Result<(), Error> {
        let mut output = Output::new();

        output.write("a");
        output.start(Capture::Section);
        output.write("b");
        output.start(Capture::Fragment);
        output.write("c");
        assert_eq!(output.depth(), 2);

        assert_eq!(output.end(Capture::Fragment)?, "c");
        assert_eq!(output.end(Capture::Section)?, "b");
        output.write("d");

        assert_eq!(output.finish()?, "ad");

        Ok(())
    }

    #[test]
    fn test_unbalanced() {
        let mut output = Output::new();
        assert!(matches!(
            output.end(Capture::Section),
            Err(Error::UnbalancedCapture)
        ));

        output.start(Capture::Fragment);
        assert!(matches!(
            output.end(Capture::Section),
            Err(Error::UnbalancedCapture)
        ));
        assert!(matches!(output.finish(), Err(Error::Unclosed("cache"))));
    }
}

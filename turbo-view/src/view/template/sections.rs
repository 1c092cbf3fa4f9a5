//! Named sections, e.g. `@section('title') ... @endsection`.
//!
//! Child templates fill sections, layouts print them with `@yield`.
//! Sections are kept for the whole layout chain of one render call.
use super::Error;

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone)]
pub struct SectionStack {
    // Sections being captured, innermost last.
    open: Vec<String>,
    completed: HashMap<String, String>,
    // Sections completed while evaluating the current template.
    pass: HashSet<String>,
}

impl SectionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a section.
    pub fn start(&mut self, name: &str) {
        self.open.push(name.to_string());
    }

    /// Close the innermost open section and return its name.
    pub fn end(&mut self) -> Result<String, Error> {
        self.open.pop().ok_or(Error::NoOpenSection)
    }

    /// Is any section open?
    pub fn is_open(&self) -> bool {
        !self.open.is_empty()
    }

    /// Store section content. Later content for the same name replaces earlier content.
    pub fn insert(&mut self, name: &str, content: String) {
        self.completed.insert(name.to_string(), content);
        self.pass.insert(name.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.completed.get(name).map(|content| content.as_str())
    }

    /// Content of a section, or the default if the section was never defined.
    pub fn yield_section(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }

    /// Start evaluating another template in the layout chain.
    pub fn begin_pass(&mut self) {
        self.pass.clear();
    }

    /// Was the section completed by the template evaluated last?
    pub fn defined_in_pass(&self, name: &str) -> bool {
        self.pass.contains(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sections() -> Result<(), Error> {
        let mut sections = SectionStack::new();

        sections.start("outer");
        sections.start("inner");
        assert_eq!(sections.end()?, "inner");
        sections.insert("inner", "i".into());
        assert_eq!(sections.end()?, "outer");
        sections.insert("outer", "o".into());

        assert!(!sections.is_open());
        assert_eq!(sections.yield_section("inner", "default"), "i");
        assert_eq!(sections.yield_section("missing", "default"), "default");

        Ok(())
    }

    #[test]
    fn test_no_open_section() {
        let mut sections = SectionStack::new();
        assert!(matches!(sections.end(), Err(Error::NoOpenSection)));
    }

    #[test]
    fn test_passes() {
        let mut sections = SectionStack::new();

        sections.insert("content", "child".into());
        assert!(sections.defined_in_pass("content"));

        sections.begin_pass();
        assert!(!sections.defined_in_pass("content"));
        assert_eq!(sections.get("content"), Some("child"));
    }
}

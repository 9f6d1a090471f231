//! Where the Ruby translator writes its output.
//!
//! Translation and validation walk the pattern the same way. Translation writes canonical
//! pattern text into a [`PatternSink`]; validation only needs the errors and writes into a
//! [`NullSink`].

use crate::casefold::UnfoldSink;
use crate::charset::{write_class, write_code_point, CodePointSet};
use crate::error::Result;

pub trait RubySink {
    /// Appends canonical syntax as is.
    fn push_str(&mut self, text: &str);
    /// Appends a literal codepoint, escaped where needed.
    fn push_code_point(&mut self, c: u32);
    /// Appends a class matching one codepoint out of `set`.
    fn push_class(&mut self, set: &CodePointSet);
    /// Position of the next write.
    fn mark(&self) -> usize;
    /// Wraps everything written since `mark` in a non-capturing group.
    fn wrap_from(&mut self, mark: usize);
}

#[derive(Debug, Clone, Default)]
pub struct PatternSink {
    out: String,
}

impl PatternSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl RubySink for PatternSink {
    fn push_str(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn push_code_point(&mut self, c: u32) {
        write_code_point(&mut self.out, c, false);
    }

    fn push_class(&mut self, set: &CodePointSet) {
        match set.single_code_point() {
            Some(c) => write_code_point(&mut self.out, c, false),
            None => write_class(&mut self.out, set),
        }
    }

    fn mark(&self) -> usize {
        self.out.len()
    }

    fn wrap_from(&mut self, mark: usize) {
        self.out.insert_str(mark, "(?:");
        self.out.push(')');
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RubySink for NullSink {
    fn push_str(&mut self, _text: &str) {}
    fn push_code_point(&mut self, _c: u32) {}
    fn push_class(&mut self, _set: &CodePointSet) {}
    fn mark(&self) -> usize {
        0
    }
    fn wrap_from(&mut self, _mark: usize) {}
}

macro_rules! unfold_into_ruby_sink {
    ($($sink:ty),*) => {
        $(
            impl UnfoldSink for $sink {
                fn class(&mut self, set: CodePointSet) -> Result<()> {
                    self.push_class(&set);
                    Ok(())
                }
                fn dead(&mut self) -> Result<()> {
                    self.push_str("[]");
                    Ok(())
                }
                fn begin_alternation(&mut self) -> Result<()> {
                    self.push_str("(?:");
                    Ok(())
                }
                fn next_alternative(&mut self) -> Result<()> {
                    self.push_str("|");
                    Ok(())
                }
                fn end_alternation(&mut self) -> Result<()> {
                    self.push_str(")");
                    Ok(())
                }
            }
        )*
    };
}

unfold_into_ruby_sink!(PatternSink, NullSink);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_the_last_term() {
        let mut sink = PatternSink::new();
        sink.push_code_point('a' as u32);
        let mark = sink.mark();
        sink.push_code_point('*' as u32);
        sink.push_str("*");
        sink.wrap_from(mark);
        assert_eq!(sink.into_string(), "a(?:\\**)");
    }

    #[test]
    fn classes_of_one_are_literals() {
        let mut sink = PatternSink::new();
        sink.push_class(&CodePointSet::from_code_point('.' as u32));
        sink.push_class(&CodePointSet::from_range('a' as u32, 'c' as u32));
        sink.push_class(&CodePointSet::empty());
        assert_eq!(sink.into_string(), "\\.[a-c][]");
    }
}

//! Indented C text builder.

/// Indentation unit of generated code.
const INDENT: &str = "    ";

/// Line-oriented writer that tracks brace depth.
#[derive(Debug, Default)]
pub struct CWriter {
    out: String,
    depth: usize,
}

impl CWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current depth.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Write `<head> {` and indent.
    pub fn open(&mut self, head: impl AsRef<str>) {
        self.line(format!("{} {{", head.as_ref()));
        self.depth += 1;
    }

    /// Dedent and write `}`.
    pub fn close(&mut self) {
        self.close_with("");
    }

    /// Dedent and write `}<tail>`, e.g. `} Ball_Data;`.
    pub fn close_with(&mut self, tail: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(format!("}}{}", tail));
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_blocks() {
        let mut w = CWriter::new();
        w.open("int main(void)");
        w.open("while (w.running)");
        w.line("w.frame++;");
        w.close();
        w.blank();
        w.line("return 0;");
        w.close();
        assert_eq!(
            w.finish(),
            "int main(void) {\n    while (w.running) {\n        w.frame++;\n    }\n\n    return 0;\n}\n"
        );
    }

    #[test]
    fn test_close_with_tail() {
        let mut w = CWriter::new();
        w.open("typedef struct");
        w.line("float x;");
        w.close_with(" Ball_Data;");
        assert_eq!(w.finish(), "typedef struct {\n    float x;\n} Ball_Data;\n");
    }

    #[test]
    fn test_unbalanced_close_stays_at_zero() {
        let mut w = CWriter::new();
        w.close();
        assert_eq!(w.depth(), 0);
        assert_eq!(w.finish(), "}\n");
    }
}

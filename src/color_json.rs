//! Purpose: Render pretty JSON with optional ANSI colorization for CLI output.
//! Exports: `colorize_json`.
//! Role: Small, pure formatter used by CLI emission paths.
//! Invariants: When color is disabled, output equals serde_json::to_string_pretty.
//! Invariants: ANSI escapes appear only when explicitly enabled.
use serde_json::Value;

const INDENT: &str = "  ";

// Conservative 8/16-color palette for broad terminal compatibility.
#[derive(Clone, Copy)]
enum Tint {
    Key,
    Text,
    Number,
    Flag,
    Punct,
}

impl Tint {
    fn code(self) -> &'static str {
        match self {
            Tint::Key => "36",
            Tint::Text => "32",
            Tint::Number => "33",
            Tint::Flag => "35",
            Tint::Punct => "39",
        }
    }
}

pub fn colorize_json(value: &Value, use_color: bool) -> String {
    let mut painter = Painter {
        use_color,
        out: String::new(),
    };
    painter.value(value, 0);
    painter.out
}

struct Painter {
    use_color: bool,
    out: String,
}

impl Painter {
    fn value(&mut self, value: &Value, level: usize) {
        match value {
            Value::Null => self.push("null", Tint::Punct),
            Value::Bool(flag) => {
                let text = if *flag { "true" } else { "false" };
                self.push(text, Tint::Flag);
            }
            Value::Number(num) => self.push(&num.to_string(), Tint::Number),
            Value::String(text) => {
                let encoded = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string());
                self.push(&encoded, Tint::Text);
            }
            Value::Array(items) => self.array(items, level),
            Value::Object(map) => self.object(map, level),
        }
    }

    fn array(&mut self, items: &[Value], level: usize) {
        if items.is_empty() {
            self.push("[]", Tint::Punct);
            return;
        }
        self.push("[", Tint::Punct);
        self.out.push('\n');
        for (idx, item) in items.iter().enumerate() {
            self.indent(level + 1);
            self.value(item, level + 1);
            if idx + 1 < items.len() {
                self.push(",", Tint::Punct);
            }
            self.out.push('\n');
        }
        self.indent(level);
        self.push("]", Tint::Punct);
    }

    fn object(&mut self, map: &serde_json::Map<String, Value>, level: usize) {
        if map.is_empty() {
            self.push("{}", Tint::Punct);
            return;
        }
        self.push("{", Tint::Punct);
        self.out.push('\n');
        let len = map.len();
        for (idx, (key, value)) in map.iter().enumerate() {
            self.indent(level + 1);
            let encoded = serde_json::to_string(key).unwrap_or_else(|_| "\"\"".to_string());
            self.push(&encoded, Tint::Key);
            self.push(":", Tint::Punct);
            self.out.push(' ');
            self.value(value, level + 1);
            if idx + 1 < len {
                self.push(",", Tint::Punct);
            }
            self.out.push('\n');
        }
        self.indent(level);
        self.push("}", Tint::Punct);
    }

    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
    }

    fn push(&mut self, text: &str, tint: Tint) {
        if !self.use_color {
            self.out.push_str(text);
            return;
        }
        self.out.push_str("\u{1b}[");
        self.out.push_str(tint.code());
        self.out.push('m');
        self.out.push_str(text);
        self.out.push_str("\u{1b}[0m");
    }
}

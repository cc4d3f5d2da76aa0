//! Text presenter for the difference tree.

use std::fmt::Write as _;

use nestdiff_types::Difference;

/// Render `root` as an indented, diff-style report.
pub fn render_text(root: &Difference) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- {}", root.source1);
    let _ = writeln!(out, "+++ {}", root.source2);
    render_node(&mut out, root, "");
    out
}

fn render_node(out: &mut String, node: &Difference, prefix: &str) {
    for comment in &node.comments {
        let _ = writeln!(out, "{prefix}┄ {comment}");
    }
    if let Some(marker) = &node.incomplete {
        let _ = writeln!(out, "{prefix}┄ [{marker}]");
    }
    for line in body_lines(&node.unified_diff) {
        let _ = writeln!(out, "{prefix}{line}");
    }

    let inner = format!("{prefix}│ ");
    for child in &node.details {
        let _ = writeln!(out, "{prefix}├── {}", child.source1);
        if child.source1 != child.source2 {
            let _ = writeln!(out, "{inner}├── +++ {}", child.source2);
        }
        render_node(out, child, &inner);
    }
}

// The node headings already name both sides.
fn body_lines(diff: &str) -> impl Iterator<Item = &str> {
    let mut lines = diff.lines().peekable();
    if lines.next_if(|l| l.starts_with("--- ")).is_some() {
        lines.next_if(|l| l.starts_with("+++ "));
    }
    lines
}

// Terminal side of the `generate` command: reading the idea and printing the checklist.

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use crate::roadmap::{Roadmap, TaskCompletion};

/// Asks for the project idea on stdin. Returns `None` on EOF or a blank line.
pub fn prompt_for_idea() -> io::Result<Option<String>> {
    print!("Input your project idea: ");
    io::stdout().flush()?;

    let mut idea = String::new();
    if io::stdin().lock().read_line(&mut idea)? == 0 {
        return Ok(None);
    }
    let idea = idea.trim();
    Ok((!idea.is_empty()).then(|| idea.to_string()))
}

/// Indented checklist: modules, submodules with tools, then `[x]`/`[ ]` tasks.
pub fn render_checklist(roadmap: &Roadmap, completion: &TaskCompletion) -> String {
    let mut out = String::new();
    let tasks = roadmap.tasks();
    let mut next = tasks.iter().peekable();

    for (m, module) in roadmap.modules.iter().enumerate() {
        let _ = writeln!(out, "# {}", module.module);
        if !module.dependencies.is_empty() {
            let _ = writeln!(out, "  depends on: {}", module.dependencies.join(", "));
        }
        for (s, sub) in module.submodules.iter().enumerate() {
            let _ = writeln!(out, "  ## {}", sub.submodule_name);
            if !sub.tools.is_empty() {
                let _ = writeln!(out, "     tools: {}", sub.tools.join(", "));
            }
            while let Some(task) = next.next_if(|t| t.module == m && t.submodule == s) {
                let mark = if completion.is_done(task.id.as_str()) { 'x' } else { ' ' };
                let _ = writeln!(out, "     [{mark}] {}  ({})", task.text, task.id);
            }
            if !sub.dependencies.is_empty() {
                let _ = writeln!(out, "     depends on: {}", sub.dependencies.join(", "));
            }
        }
    }
    out
}

//! Prompt templates for the generation service.
//!
//! Two modes:
//! - COMPLETION_INSTRUCTION: implement stubbed functions from their intent
//! - REPAIR_INSTRUCTION: fix the fault shown by the error and trace
//!
//! Both end with OUTPUT_RULES: the whole file, code only, one fenced block.

use super::stubs::StubSite;
use super::RepairMode;
use crate::tracer::StepRecord;

/// Instruction for completion mode.
pub const COMPLETION_INSTRUCTION: &str = "\
[TASK]
The program stopped at a function that is not implemented yet.
1. Read the comments and the name of the function to understand its goal.
2. Write the complete function implementation.
3. Output the FULL executable file, including the main entry block.";

/// Instruction for repair mode.
pub const REPAIR_INSTRUCTION: &str = "\
[TASK]
Fix the runtime failure.
1. Analyze the execution trace and the error.
2. Modify the code to fix the bug.
3. Output the FULL executable file.";

/// Output-format constraint shared by both modes.
pub const OUTPUT_RULES: &str = "\
[STRICT OUTPUT RULES]
1. Output ONLY valid {lang} code.
2. Enclose the code in a single ```{lang} ... ``` block.
3. NO explanations. NO conversational text.";

/// Everything one request is built from.
#[derive(Debug)]
pub struct PromptInput<'a> {
    pub language: &'a str,
    pub mode: RepairMode,
    pub source: &'a str,
    pub error_text: &'a str,
    /// Already cut to the configured tail length.
    pub trace_tail: &'a [StepRecord],
    pub stubs: &'a [StubSite],
}

pub fn instruction(mode: RepairMode) -> &'static str {
    match mode {
        RepairMode::Completion => COMPLETION_INSTRUCTION,
        RepairMode::Repair => REPAIR_INSTRUCTION,
    }
}

/// Build the single prompt sent to the backend.
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let lang = input.language;
    let mut prompt = format!("You are a backend {lang} coding engine.\n\n");

    prompt.push_str("[INPUT SOURCE]\n");
    prompt.push_str(&format!("```{lang}\n{}\n```\n", input.source.trim_end()));
    prompt.push_str(&format!("Error: {}\n", input.error_text.trim_end()));

    if !input.trace_tail.is_empty() {
        prompt.push_str("\n[EXECUTION TRACE]\n");
        for step in input.trace_tail {
            prompt.push_str(&format_step(step));
            prompt.push('\n');
        }
    }

    prompt.push('\n');
    prompt.push_str(instruction(input.mode));
    prompt.push('\n');

    if input.mode == RepairMode::Completion && !input.stubs.is_empty() {
        prompt.push_str("Functions to implement:\n");
        for stub in input.stubs {
            prompt.push_str(&format!("- `{}` (line {})\n", stub.name, stub.line));
        }
    }

    prompt.push('\n');
    prompt.push_str(&OUTPUT_RULES.replace("{lang}", lang));
    prompt.push('\n');
    prompt
}

/// `line 4: arr=[5, 2], pivot=5`
fn format_step(step: &StepRecord) -> String {
    if step.bindings.is_empty() {
        return format!("line {}", step.location);
    }
    let vars = step
        .bindings
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("line {}: {vars}", step.location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn step(line: u32, vars: &[(&str, &str)]) -> StepRecord {
        StepRecord {
            location: line,
            bindings: vars
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn repair_prompt_has_all_sections() {
        let trace = vec![step(1, &[]), step(2, &[("x", "0")])];
        let prompt = build_prompt(&PromptInput {
            language: "python",
            mode: RepairMode::Repair,
            source: "x = 0\nprint(1 / x)\n",
            error_text: "ZeroDivisionError: division by zero",
            trace_tail: &trace,
            stubs: &[],
        });

        assert!(prompt.contains("```python\nx = 0\nprint(1 / x)\n```"));
        assert!(prompt.contains("Error: ZeroDivisionError"));
        assert!(prompt.contains("[EXECUTION TRACE]\nline 1\nline 2: x=0\n"));
        assert!(prompt.contains("Fix the runtime failure"));
        assert!(prompt.contains("Output ONLY valid python code"));
        assert!(!prompt.contains("not implemented yet"));
    }

    #[test]
    fn completion_prompt_names_stubs() {
        let stubs = vec![StubSite {
            name: "quicksort".into(),
            line: 3,
        }];
        let prompt = build_prompt(&PromptInput {
            language: "python",
            mode: RepairMode::Completion,
            source: "def quicksort(arr):\n    raise NotImplementedError\n",
            error_text: "NotImplementedError",
            trace_tail: &[],
            stubs: &stubs,
        });

        assert!(prompt.contains("not implemented yet"));
        assert!(prompt.contains("- `quicksort` (line 3)"));
        assert!(!prompt.contains("[EXECUTION TRACE]"));
    }

    #[test]
    fn repair_mode_never_lists_stubs() {
        let stubs = vec![StubSite {
            name: "f".into(),
            line: 1,
        }];
        let prompt = build_prompt(&PromptInput {
            language: "python",
            mode: RepairMode::Repair,
            source: "",
            error_text: "ValueError",
            trace_tail: &[],
            stubs: &stubs,
        });
        assert!(!prompt.contains("Functions to implement"));
    }

    #[test]
    fn output_rules_use_language_tag() {
        let prompt = build_prompt(&PromptInput {
            language: "ruby",
            mode: RepairMode::Repair,
            source: "puts 1",
            error_text: "boom",
            trace_tail: &[],
            stubs: &[],
        });
        assert!(prompt.contains("```ruby ... ```"));
        assert!(!prompt.contains("{lang}"));
    }
}

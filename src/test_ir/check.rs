//! CHECK-directive validation for test IR files.
//!
//! A test file is test IR interleaved with `; RUN:` and `; CHECK...:` comment
//! lines. The runner feeds the IR through the command named by each RUN line
//! and matches the rendered procedures against the directives in order, the
//! way LLVM's FileCheck does for its own tests.

use super::{parse_ir, render_unit, resolve_text};
use crate::core::options::{CompileOptions, TargetKind};
use crate::core::session::CompilationSession;
use bumpalo::Bump;

/// A CHECK directive extracted from a test IR file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDirective {
    /// `CHECK:` some later line contains the pattern
    Check(String),
    /// `CHECK-LABEL:` same as `CHECK`, used to anchor a procedure
    CheckLabel(String),
    /// `CHECK-NEXT:` the line right after the previous match contains the pattern
    CheckNext(String),
    /// `CHECK-NOT:` no line before the next positive match contains the pattern
    CheckNot(String),
    /// `CHECK-EMPTY` the next line is blank
    CheckEmpty,
    /// `COM:` ignored
    Comment(String),
}

impl CheckDirective {
    /// Recognise a directive comment. Returns `None` for ordinary IR lines.
    fn from_line(line: &str) -> Option<Self> {
        let body = line.strip_prefix(';')?.trim_start();
        let (name, pattern) = match body.split_once(':') {
            Some((name, pattern)) => (name, pattern.trim().to_string()),
            None => (body.trim_end(), String::new()),
        };
        let directive = match name {
            "CHECK" => CheckDirective::Check(pattern),
            "CHECK-LABEL" => CheckDirective::CheckLabel(pattern),
            "CHECK-NEXT" => CheckDirective::CheckNext(pattern),
            "CHECK-NOT" => CheckDirective::CheckNot(pattern),
            "CHECK-EMPTY" => CheckDirective::CheckEmpty,
            "COM" => CheckDirective::Comment(pattern),
            _ => return None,
        };
        Some(directive)
    }
}

/// A RUN directive: the command plus its flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirective {
    pub command: String,
    pub args: Vec<String>,
}

/// A test IR file split into its directives and the IR itself
#[derive(Debug)]
pub struct TestSpec {
    pub run_directives: Vec<RunDirective>,
    pub check_directives: Vec<CheckDirective>,
    pub ir_content: String,
}

impl TestSpec {
    pub fn parse(content: &str) -> Result<Self, String> {
        let mut spec = TestSpec {
            run_directives: Vec::new(),
            check_directives: Vec::new(),
            ir_content: String::new(),
        };
        let mut ir_lines = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if let Some(run) = trimmed.strip_prefix("; RUN:") {
                let mut words = run.split_whitespace().map(str::to_string);
                let command = words
                    .next()
                    .ok_or_else(|| format!("line {}: RUN without a command", line_no + 1))?;
                spec.run_directives.push(RunDirective {
                    command,
                    args: words.collect(),
                });
            } else if let Some(directive) = CheckDirective::from_line(trimmed) {
                spec.check_directives.push(directive);
            } else {
                ir_lines.push(line);
            }
        }

        spec.ir_content = ir_lines.join("\n");
        Ok(spec)
    }
}

/// Position in the output while walking the directives.
struct Matcher<'o> {
    lines: Vec<&'o str>,
    pos: usize,
    forbidden: Vec<&'o str>,
}

impl<'o> Matcher<'o> {
    fn new(output: &'o str) -> Self {
        Self {
            lines: output.lines().collect(),
            pos: 0,
            forbidden: Vec::new(),
        }
    }

    /// Verifies pending CHECK-NOT patterns against `lines[pos..end]`.
    fn settle_forbidden(&mut self, end: usize) -> Result<(), String> {
        for pattern in self.forbidden.drain(..) {
            if let Some(line) = self.lines[self.pos..end].iter().find(|l| l.contains(pattern)) {
                return Err(format!("CHECK-NOT: '{}' occurs in '{}'", pattern, line));
            }
        }
        Ok(())
    }

    fn find(&mut self, pattern: &str) -> Result<usize, String> {
        let offset = self.lines[self.pos..]
            .iter()
            .position(|line| line.contains(pattern))
            .ok_or_else(|| format!("CHECK: '{}' not found after line {}", pattern, self.pos))?;
        let at = self.pos + offset;
        self.settle_forbidden(at)?;
        self.pos = at + 1;
        Ok(at)
    }

    fn next_line(&mut self, what: &str) -> Result<Option<&'o str>, String> {
        let line = self.lines.get(self.pos).copied();
        if line.is_some() {
            self.settle_forbidden(self.pos)?;
            self.pos += 1;
        } else if !what.is_empty() {
            return Err(format!("CHECK-NEXT: output ended, expected '{}'", what));
        }
        Ok(line)
    }

    fn finish(mut self) -> Result<(), String> {
        let end = self.lines.len();
        self.settle_forbidden(end)
    }
}

/// Runs test IR files through the pipeline
pub struct TestRunner {
    verbose: bool,
}

impl TestRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Every RUN line must produce output satisfying every CHECK.
    pub fn run_test(&self, spec: &TestSpec) -> Result<(), String> {
        if spec.run_directives.is_empty() {
            return Err("no RUN directive".to_string());
        }
        for run in &spec.run_directives {
            let output = self.execute_command(&spec.ir_content, run)?;
            if self.verbose {
                println!("{}", output);
            }
            self.validate_output(&output, &spec.check_directives)?;
        }
        Ok(())
    }

    /// Execute a test command and return the output.
    ///
    /// Internal compiler errors become part of the output as `ERROR: ...`
    /// lines so tests can CHECK for them.
    pub fn execute_command(&self, ir: &str, run: &RunDirective) -> Result<String, String> {
        let mut options = CompileOptions::default();
        let mut inline = false;

        for arg in &run.args {
            match arg.as_str() {
                "--debug" => options.debug = true,
                "--eager" => options.eager_ordering = true,
                "--inline" => inline = true,
                "--target=native" => options.target = TargetKind::Native,
                "--target=interpreted" => options.target = TargetKind::Interpreted,
                "--target=stack" => options.target = TargetKind::StackMachine,
                "%s" => {}
                other => return Err(format!("unknown RUN argument '{}'", other)),
            }
        }

        let arena = Bump::new();
        let session = CompilationSession::with_options(&arena, options);

        let result = match run.command.as_str() {
            "print" => parse_ir(&session, ir).map(|unit| render_unit(&unit)),
            "resolve" => resolve_text(&session, ir, inline).map(|unit| render_unit(&unit)),
            other => return Err(format!("unknown RUN command '{}'", other)),
        };

        match result {
            Ok(output) => Ok(output),
            Err(e) if e.is_internal() => Ok(format!("ERROR: {}\n", e)),
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn validate_output(
        &self,
        output: &str,
        directives: &[CheckDirective],
    ) -> Result<(), String> {
        let mut matcher = Matcher::new(output);

        for directive in directives {
            match directive {
                CheckDirective::Comment(_) => {}
                CheckDirective::CheckNot(pattern) => matcher.forbidden.push(pattern),
                CheckDirective::Check(pattern) | CheckDirective::CheckLabel(pattern) => {
                    let at = matcher.find(pattern)?;
                    if self.verbose {
                        println!("matched '{}' at line {}", pattern, at);
                    }
                }
                CheckDirective::CheckNext(pattern) => {
                    let line = matcher.next_line(pattern)?.unwrap_or_default();
                    if !line.contains(pattern.as_str()) {
                        return Err(format!("CHECK-NEXT: wanted '{}', found '{}'", pattern, line));
                    }
                }
                CheckDirective::CheckEmpty => {
                    // Running off the end counts as a blank line.
                    if let Some(line) = matcher.next_line("")? {
                        if !line.trim().is_empty() {
                            return Err(format!("CHECK-EMPTY: found '{}'", line));
                        }
                    }
                }
            }
        }

        matcher.finish()
    }
}

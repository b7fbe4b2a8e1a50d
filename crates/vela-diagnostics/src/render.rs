//! Terminal rendering of diagnostics.
//!
//! [`Renderer`] writes through any `termcolor::WriteColor`, so the same code
//! drives colored stderr output and plain in-memory buffers.

use crate::span::{Label, LabelStyle, LineColumn, ResolvedSpan, SourceSpan};
use crate::{Diagnostic, DiagnosticResult, Severity};
use std::collections::HashMap;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use unicode_width::UnicodeWidthStr;

/// Configuration for the diagnostic renderer.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub use_color: bool,
    pub show_docs_links: bool,
    pub docs_base_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            use_color: true,
            show_docs_links: false,
            docs_base_url: "https://vela-lang.org/errors".to_string(),
        }
    }
}

/// Source text by file path, used to show context lines.
#[derive(Debug, Default)]
pub struct SourceCache {
    files: HashMap<String, String>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.files.insert(path.into(), source.into());
    }

    pub fn get_source(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|s| s.as_str())
    }

    /// Resolves a span to line/column information and the covered lines.
    pub fn resolve_span(&self, span: &SourceSpan) -> Option<ResolvedSpan> {
        let path = span.file.to_string_lossy();
        let source = self.get_source(&path)?;

        let start = offset_to_line_col(source, span.start);
        let end = offset_to_line_col(source, span.end);

        let source_lines: Vec<String> = source
            .lines()
            .skip(start.line.saturating_sub(1))
            .take(end.line - start.line + 1)
            .map(String::from)
            .collect();

        Some(ResolvedSpan {
            span: span.clone(),
            start,
            end,
            source_lines,
        })
    }
}

/// Converts a byte offset to a 1-indexed line and display column.
pub fn offset_to_line_col(source: &str, offset: usize) -> LineColumn {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    LineColumn::new(line, before[line_start..].width() + 1)
}

/// Renders diagnostics in the `error[CODE]: message` / ` --> file:line:col` format.
pub struct Renderer<W> {
    config: RenderConfig,
    stream: W,
}

impl Renderer<StandardStream> {
    /// A renderer writing to stderr.
    pub fn stderr(config: RenderConfig) -> Self {
        let choice = if config.use_color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            config,
            stream: StandardStream::stderr(choice),
        }
    }
}

impl<W: WriteColor> Renderer<W> {
    pub fn new(stream: W, config: RenderConfig) -> Self {
        Self { config, stream }
    }

    pub fn into_inner(self) -> W {
        self.stream
    }

    fn severity_color(severity: Severity) -> Color {
        match severity {
            Severity::Error => Color::Red,
            Severity::Note => Color::Cyan,
            Severity::Help => Color::Green,
        }
    }

    fn write_colored(&mut self, text: &str, color: Color, bold: bool) -> DiagnosticResult<()> {
        if !self.config.use_color {
            write!(self.stream, "{}", text)?;
            return Ok(());
        }
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(bold);
        self.stream.set_color(&spec)?;
        write!(self.stream, "{}", text)?;
        self.stream.reset()?;
        Ok(())
    }

    fn write_header(&mut self, diagnostic: &Diagnostic) -> DiagnosticResult<()> {
        let color = Self::severity_color(diagnostic.severity);
        let mut header = diagnostic.severity.as_str().to_string();
        if let Some(code) = diagnostic.code {
            header.push_str(&format!("[{}]", code));
        }
        self.write_colored(&header, color, true)?;
        self.write_colored(&format!(": {}", diagnostic.message), Color::White, true)?;
        writeln!(self.stream)?;
        Ok(())
    }

    fn write_underline(
        &mut self,
        label: &Label,
        resolved: &ResolvedSpan,
        severity: Severity,
        gutter: usize,
    ) -> DiagnosticResult<()> {
        let (mark, color) = match label.style {
            LabelStyle::Primary => ('^', Self::severity_color(severity)),
            LabelStyle::Secondary => ('-', Color::Blue),
        };

        let start_col = resolved.start.column.saturating_sub(1);
        let len = if resolved.is_multiline() {
            let first = resolved.source_lines.first().map_or(0, |l| l.width());
            first.saturating_sub(start_col)
        } else {
            resolved.end.column.saturating_sub(resolved.start.column)
        }
        .max(1);

        write!(self.stream, "{:>gutter$} | {:start_col$}", "", "")?;
        let underline: String = std::iter::repeat(mark).take(len).collect();
        self.write_colored(&underline, color, true)?;
        if !label.message.is_empty() {
            write!(self.stream, " ")?;
            self.write_colored(&label.message, color, false)?;
        }
        writeln!(self.stream)?;
        Ok(())
    }

    /// Renders a single diagnostic followed by a blank line.
    pub fn render(&mut self, diagnostic: &Diagnostic, sources: &SourceCache) -> DiagnosticResult<()> {
        self.write_header(diagnostic)?;

        let resolved = diagnostic
            .spans
            .primary_span()
            .and_then(|span| sources.resolve_span(span));

        let gutter = resolved
            .as_ref()
            .map_or(2, |r| r.end.line.to_string().len().max(2));

        if let Some(resolved) = &resolved {
            writeln!(
                self.stream,
                "{:gutter$}--> {}:{}:{}",
                "",
                resolved.span.file.display(),
                resolved.start.line,
                resolved.start.column
            )?;
            writeln!(self.stream, "{:gutter$} |", "")?;

            for (i, line) in resolved.source_lines.iter().enumerate() {
                self.write_colored(&format!("{:>gutter$}", resolved.start.line + i), Color::Blue, true)?;
                writeln!(self.stream, " | {}", line)?;
            }

            for label in diagnostic.spans.labels() {
                // Labels on other lines of the file are not drawn under this excerpt.
                if let Some(label_resolved) = sources.resolve_span(&label.span) {
                    if label_resolved.start.line >= resolved.start.line
                        && label_resolved.start.line <= resolved.end.line
                    {
                        self.write_underline(label, &label_resolved, diagnostic.severity, gutter)?;
                    }
                }
            }
        }

        for child in &diagnostic.children {
            write!(self.stream, "{:gutter$} = ", "")?;
            self.write_colored(child.severity.as_str(), Self::severity_color(child.severity), true)?;
            writeln!(self.stream, ": {}", child.message)?;
        }

        if self.config.show_docs_links {
            if let Some(url) = diagnostic.docs_url(&self.config.docs_base_url) {
                writeln!(self.stream, "{:gutter$} = docs: {}", "", url)?;
            }
        }

        writeln!(self.stream)?;
        Ok(())
    }

    /// Renders every diagnostic and then the summary line.
    pub fn render_all(&mut self, diagnostics: &[Diagnostic], sources: &SourceCache) -> DiagnosticResult<()> {
        for diagnostic in diagnostics {
            self.render(diagnostic, sources)?;
        }
        self.render_summary(diagnostics)
    }

    /// `error: aborting due to N errors`, or nothing for a clean run.
    pub fn render_summary(&mut self, diagnostics: &[Diagnostic]) -> DiagnosticResult<()> {
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        if errors > 0 {
            let plural = if errors == 1 { "" } else { "s" };
            self.write_colored("error", Color::Red, true)?;
            writeln!(self.stream, ": aborting due to {} error{}", errors, plural)?;
        }
        Ok(())
    }
}

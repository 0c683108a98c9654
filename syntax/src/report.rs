//! Rendering syntax errors with ariadne.

use crate::SyntaxError;
use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, sources};
use std::io::Write;

/// Writes one ariadne report per error in `errors`, which were found in `src`.
pub fn write_reports(
    filename: &str,
    src: &str,
    errors: &[SyntaxError],
    color: bool,
    mut out: impl Write,
) -> std::io::Result<()> {
    let filename = filename.to_string();
    for e in errors {
        Report::build(ReportKind::Error, (filename.clone(), e.span.into_range()))
            .with_config(
                Config::new()
                    .with_index_type(IndexType::Byte)
                    .with_color(color),
            )
            .with_message(&e.message)
            .with_label(
                Label::new((filename.clone(), e.span.into_range()))
                    .with_message(&e.message)
                    .with_color(Color::Red),
            )
            .with_labels(e.contexts.iter().map(|(label, span)| {
                Label::new((filename.clone(), span.into_range()))
                    .with_message(format!("while parsing this {label}"))
                    .with_color(Color::Yellow)
            }))
            .finish()
            .write(sources([(filename.clone(), src.to_string())]), &mut out)?;
    }
    Ok(())
}

/// [`write_reports`] into a string, without colors.
pub fn render_reports(filename: &str, src: &str, errors: &[SyntaxError]) -> String {
    let mut buf = Vec::new();
    // writing into a Vec cannot fail
    let _ = write_reports(filename, src, errors, false, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

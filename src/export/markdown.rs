use crate::core::db::ApiKind;
use crate::export::{ExportError, NumberedApi, ScreenExport};

/// Renders the api listing of a screen, queries first, then mutations.
pub fn render_markdown(export: &ScreenExport) -> Result<String, ExportError> {
    if export.apis.is_empty() {
        return Err(ExportError::NoApis(export.screen.name.clone()));
    }

    let mut out = String::new();
    push_paragraph(&mut out, &format!("# {}", export.screen.name));
    if let Some(description) = non_empty(&export.screen.description) {
        push_paragraph(&mut out, description);
    }
    push_section(&mut out, "Queries", export, ApiKind::Query);
    push_section(&mut out, "Mutations", export, ApiKind::Mutation);
    Ok(out)
}

fn push_section(out: &mut String, title: &str, export: &ScreenExport, kind: ApiKind) {
    let mut entries = export.apis.iter().filter(|n| n.api.kind == kind).peekable();
    if entries.peek().is_none() {
        return;
    }
    push_paragraph(out, &format!("## {title}"));
    for entry in entries {
        push_entry(out, entry);
    }
}

fn push_entry(out: &mut String, entry: &NumberedApi) {
    push_paragraph(out, &format!("### {}. {}", entry.label, entry.api.name));
    if let Some(description) = non_empty(&entry.api.description) {
        push_paragraph(out, description);
    }
    out.push_str("```graphql\n");
    out.push_str(&entry.api.code);
    out.push_str("\n```\n\n");
}

fn push_paragraph(out: &mut String, text: &str) {
    out.push_str(text);
    out.push_str("\n\n");
}

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.is_empty())
}

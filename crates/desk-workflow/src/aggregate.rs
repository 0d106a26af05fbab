//! Stage output aggregation
//!
//! Stage outputs are free-form text that is expected, not guaranteed, to be
//! organised as `### Title` sections. Parsing is best effort: output that does
//! not start with a section header contributes nothing to the document.

use crate::PipelineRun;
use desk_core::{Result, StageIdentity};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// `### Title` at the start of a line (after optional indentation), up to the line break
static SECTION_HEADER: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*### (.*?)\s*[\r\n]+"));

/// One titled section of a stage output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// The sections recovered from one stage invocation
#[derive(Debug, Clone)]
pub struct ParsedStageOutput {
    pub identity: StageIdentity,
    pub sections: Vec<Section>,
}

/// Split one output into sections
///
/// Each header's title is paired with the text up to the next header or the
/// end of the output, both trimmed. A repeated title keeps its first position
/// and takes the later body. Only a `### ` that starts a line is a header: one
/// inside a line, or the tail of `####`, stays in the body.
pub fn parse_sections(text: &str) -> Vec<Section> {
    if !text.trim_start().starts_with("###") {
        return Vec::new();
    }

    let pattern = match SECTION_HEADER.as_ref() {
        Ok(pattern) => pattern,
        Err(e) => {
            warn!(error = %e, "Section header pattern failed to compile");
            return Vec::new();
        }
    };
    let headers: Vec<_> = pattern.captures_iter(text).collect();
    let mut sections: Vec<Section> = Vec::with_capacity(headers.len());

    for (i, caps) in headers.iter().enumerate() {
        let (Some(whole), Some(title)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let body_end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let title = title.as_str().trim().to_string();
        let body = text[whole.end()..body_end].trim().to_string();

        match sections.iter_mut().find(|s| s.title == title) {
            Some(existing) => existing.body = body,
            None => sections.push(Section { title, body }),
        }
    }
    sections
}

/// Parse every stage output, dropping stages with no sections
pub fn parse_stage_outputs(run: &PipelineRun) -> Vec<ParsedStageOutput> {
    run.records
        .iter()
        .filter_map(|record| {
            let sections = parse_sections(&record.output);
            if sections.is_empty() {
                debug!(stage = %record.identity, "Stage output has no sections, skipping");
                return None;
            }
            Some(ParsedStageOutput {
                identity: record.identity.clone(),
                sections,
            })
        })
        .collect()
}

/// Render parsed outputs as Markdown
///
/// ```text
/// # <stage identity>
///
/// ## <section title>
///
/// <body>
/// ```
pub fn render_markdown(parsed: &[ParsedStageOutput]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for stage in parsed {
        lines.push(format!("# {}\n", stage.identity));
        for section in &stage.sections {
            let title = section.title.trim_matches(|c| c == '#' || c == ' ').trim();
            lines.push(format!("## {title}\n"));
            lines.push(section.body.trim().to_string());
            lines.push(String::new());
        }
    }
    lines.join("\n")
}

/// Parse, render and write a finished run to `path`, returning the document
pub async fn write_markdown(run: &PipelineRun, path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let parsed = parse_stage_outputs(run);
    let document = render_markdown(&parsed);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, document.as_bytes()).await?;

    info!(
        path = %path.display(),
        stages = parsed.len(),
        bytes = document.len(),
        "Report written"
    );
    Ok(document)
}

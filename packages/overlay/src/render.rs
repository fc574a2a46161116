//! Panel content rendering.
//!
//! Produces the HTML for the panel's content area together with the plain
//! text offered by the copy control. Every interpolated value is escaped.

use explain_stream::{Outcome, SourceLink, StructuredExplanation};

use crate::error::GENERIC_FAILURE_MESSAGE;

pub const LABEL_SUMMARY: &str = "What This Says";
pub const LABEL_KEY_POINTS: &str = "Key Takeaways";
pub const LABEL_CONTEXT: &str = "Background Context";
pub const LABEL_IMPLICATIONS: &str = "What This Means";
pub const LABEL_CRITICAL: &str = "Critical Take";
pub const LABEL_BOTTOM_LINE: &str = "Bottom Line";
pub const LABEL_SOURCES: &str = "Sources";

pub const EMPTY_EXPLANATION: &str = "No analysis available";
pub const EMPTY_RESPONSE: &str = "No response";
pub const LOADING: &str = "Analyzing...";
pub const SELECT_TEXT_FIRST: &str = "Select text first.";

/// Content for the panel body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rendered {
    pub html: String,
    pub plain_text: String,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn loading() -> Rendered {
    Rendered {
        html: format!(
            r#"<div class="loading"><div class="spinner"></div><span>{}</span></div>"#,
            LOADING
        ),
        plain_text: String::new(),
    }
}

/// Text received so far, shown while the stream is open.
pub fn streaming(text: &str) -> Rendered {
    Rendered {
        html: format!(r#"<div class="streaming">{}</div>"#, escape_html(text)),
        plain_text: text.to_string(),
    }
}

/// Error or notice box.
pub fn message(text: &str) -> Rendered {
    Rendered {
        html: format!(r#"<div class="error">{}</div>"#, escape_html(text)),
        plain_text: text.to_string(),
    }
}

pub fn outcome(outcome: &Outcome) -> Rendered {
    match outcome {
        Outcome::Structured { explanation, .. } => explanation_sections(explanation),
        Outcome::Raw(text) => raw(text),
        Outcome::Failed(_) => message(GENERIC_FAILURE_MESSAGE),
    }
}

/// Unparsed output as a single summary section.
pub fn raw(text: &str) -> Rendered {
    let body = if text.trim().is_empty() { EMPTY_RESPONSE } else { text };
    Rendered {
        html: format!(
            r#"<div class="section"><div class="summary">{}</div></div>"#,
            escape_html(body)
        ),
        plain_text: body.to_string(),
    }
}

pub fn explanation_sections(explanation: &StructuredExplanation) -> Rendered {
    if explanation.is_empty() {
        return message(EMPTY_EXPLANATION);
    }

    let mut doc = SectionWriter::default();
    if let Some(summary) = &explanation.summary {
        doc.text(LABEL_SUMMARY, "summary", summary);
    }
    if !explanation.key_points.is_empty() {
        doc.list(LABEL_KEY_POINTS, &explanation.key_points);
    }
    if let Some(context) = &explanation.context {
        doc.text(LABEL_CONTEXT, "context-box", context);
    }
    if let Some(implications) = &explanation.implications {
        doc.text(LABEL_IMPLICATIONS, "implications-box", implications);
    }
    if let Some(critical) = &explanation.critical_analysis {
        doc.text(LABEL_CRITICAL, "analysis-box", critical);
    }
    if let Some(bottom_line) = &explanation.bottom_line {
        doc.text(LABEL_BOTTOM_LINE, "bottom-line", bottom_line);
    }
    if !explanation.sources.is_empty() {
        doc.sources(&explanation.sources);
    }
    doc.finish()
}

#[derive(Default)]
struct SectionWriter {
    html: String,
    plain: Vec<String>,
}

impl SectionWriter {
    fn open(&mut self, label: &str) {
        self.html.push_str(r#"<div class="section"><div class="section-label">"#);
        self.html.push_str(label);
        self.html.push_str("</div>");
    }

    fn text(&mut self, label: &str, class: &str, body: &str) {
        self.open(label);
        self.html
            .push_str(&format!(r#"<div class="{}">{}</div></div>"#, class, escape_html(body)));
        self.plain.push(format!("{}\n{}", label, body));
    }

    fn list(&mut self, label: &str, items: &[String]) {
        self.open(label);
        self.html.push_str(r#"<ul class="key-points">"#);
        for item in items {
            self.html.push_str(&format!("<li>{}</li>", escape_html(item)));
        }
        self.html.push_str("</ul></div>");

        let bullets: Vec<String> = items.iter().map(|item| format!("- {}", item)).collect();
        self.plain.push(format!("{}\n{}", label, bullets.join("\n")));
    }

    fn sources(&mut self, sources: &[SourceLink]) {
        self.open(LABEL_SOURCES);
        self.html.push_str(r#"<ol class="sources">"#);
        for source in sources {
            self.html.push_str(&format!(
                r#"<li><a href="{}" target="_blank" rel="noopener noreferrer">{}</a></li>"#,
                escape_html(&source.url),
                escape_html(&source.title)
            ));
        }
        self.html.push_str("</ol></div>");

        let lines: Vec<String> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{}] {} ({})", i + 1, s.title, s.url))
            .collect();
        self.plain.push(format!("{}\n{}", LABEL_SOURCES, lines.join("\n")));
    }

    fn finish(self) -> Rendered {
        Rendered {
            html: self.html,
            plain_text: self.plain.join("\n\n"),
        }
    }
}

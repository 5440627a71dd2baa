//! Markdown run reports for batch output

use chrono::Local;
use std::fmt::Write;

use super::classifier::decode_program_args;
use super::types::BatchResults;

const PROGRAM_ARGS_PREVIEW_CHARS: usize = 100;

/// A builder for creating structured markdown documents
pub struct MarkdownBuilder {
    content: String,
}

impl MarkdownBuilder {
    pub fn new() -> Self {
        Self {
            content: String::with_capacity(4096),
        }
    }

    pub fn heading(&mut self, level: u8, text: &str) -> &mut Self {
        let prefix = "#".repeat(level as usize);
        let _ = writeln!(self.content, "{} {}\n", prefix, text);
        self
    }

    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        let _ = writeln!(self.content, "{}\n", text);
        self
    }

    pub fn code_block(&mut self, language: &str, text: &str) -> &mut Self {
        let _ = writeln!(self.content, "```{}\n{}\n```\n", language, text);
        self
    }

    pub fn metadata(&mut self, key: &str, value: &str) -> &mut Self {
        let _ = writeln!(self.content, "**{}:** {}\n", key, value);
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        let _ = writeln!(self.content, "- {}", text);
        self
    }

    pub fn horizontal_rule(&mut self) -> &mut Self {
        let _ = writeln!(self.content, "---\n");
        self
    }

    pub fn build(self) -> String {
        self.content
    }
}

impl Default for MarkdownBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Context of a run that the batch results alone do not carry
#[derive(Debug, Clone)]
pub struct RunContext {
    /// `live` or `replay`
    pub mode: String,
    /// Control plane address or snapshot id
    pub source: String,
    pub selected: usize,
}

/// Formats batch results as a Markdown report
pub struct MarkdownFormatter;

impl MarkdownFormatter {
    pub fn format_run_report(context: &RunContext, results: &BatchResults) -> String {
        let mut builder = MarkdownBuilder::new();

        builder
            .heading(1, "Job Relaunch Report")
            .metadata("Mode", &context.mode)
            .metadata("Source", &context.source)
            .metadata("Generated", &Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

        builder
            .heading(2, "Summary")
            .bullet(&format!("Selected jobs: {}", context.selected))
            .bullet(&format!("Succeeded: {}", results.succeeded))
            .bullet(&format!("Failed: {}", results.failed))
            .bullet(&format!("Query descriptors: {}", results.query.len()))
            .bullet(&format!("ETL descriptors: {}", results.etl.len()))
            .paragraph("");

        if !results.failed_jobs.is_empty() {
            builder.heading(2, "Failed Jobs");
            for (job_id, reason) in &results.failed_jobs {
                builder.bullet(&format!("`{}`: {}", job_id, reason));
            }
            builder.paragraph("");
        }

        Self::add_query_preview(&mut builder, results);
        Self::add_etl_preview(&mut builder, results);

        builder.horizontal_rule();
        builder.build()
    }

    fn add_query_preview(builder: &mut MarkdownBuilder, results: &BatchResults) {
        let Some((key, descriptor)) = results.query.iter().next() else {
            return;
        };

        builder
            .heading(2, "Query Descriptor Preview")
            .metadata("Key", key)
            .metadata("Entry class", &descriptor.entry_class)
            .metadata(
                "Parallelism",
                &descriptor
                    .parallelism
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "null".to_string()),
            )
            .metadata("Program args", &truncate(&descriptor.program_args, PROGRAM_ARGS_PREVIEW_CHARS))
            .metadata("Savepoint", descriptor.savepoint_path.as_deref().unwrap_or("none"));

        if let Some(decoded) = decode_program_args(&descriptor.program_args) {
            if let Ok(pretty) = serde_json::to_string_pretty(&decoded) {
                builder.code_block("json", &pretty);
            }
        }
    }

    fn add_etl_preview(builder: &mut MarkdownBuilder, results: &BatchResults) {
        let Some((key, descriptor)) = results.etl.iter().next() else {
            return;
        };

        let etl = if descriptor.etl.is_empty() {
            "(unresolved)"
        } else {
            descriptor.etl.as_str()
        };
        builder
            .heading(2, "ETL Descriptor Preview")
            .metadata("Key", key)
            .metadata("ETL", etl)
            .metadata("Savepoint", descriptor.savepoint.as_deref().unwrap_or("none"));
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

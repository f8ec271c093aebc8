//! Schema validation of SDL documents.
//!
//! [`validate`] walks the parsed tree alongside a [`Schema`] and reports
//! parse errors, type mismatches, cardinality violations, namespace misuse
//! and unknown tags/attributes. [`diagnostics`] converts the result into
//! LSP diagnostics for a `dub.sdl` document.

use std::ops::Range;

use ropey::Rope;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity};

use crate::{
    config::Settings,
    range::lsp_range,
    schema::{Schema, TagSchema, ValueSchema},
    sdl::{self, Document, Severity, Tag, Value},
};

pub const SOURCE: &str = "dub-lsp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdlDiagnostic {
    /// Byte range; `None` for document-level problems.
    pub range: Option<Range<usize>>,
    pub message: String,
    pub severity: Severity,
}

impl SdlDiagnostic {
    fn error(range: Option<Range<usize>>, message: impl Into<String>) -> Self {
        SdlDiagnostic {
            range,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    fn warning(range: Option<Range<usize>>, message: impl Into<String>) -> Self {
        SdlDiagnostic {
            range,
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// Validate a parsed document against `schema`.
pub fn validate(document: &Document, schema: &Schema) -> Vec<SdlDiagnostic> {
    let mut validator = Validator {
        schema,
        out: document
            .errors
            .iter()
            .map(|e| SdlDiagnostic {
                range: e.range.clone(),
                message: e.message.clone(),
                severity: e.severity,
            })
            .collect(),
    };

    validator.scan_tag(&document.root, &schema.root);

    let present = document.root.tags();
    for required in &schema.required {
        if !present.contains_key(required) {
            validator.out.push(SdlDiagnostic::error(
                None,
                format!("Missing required tag '{required}'"),
            ));
        }
    }

    validator.out
}

struct Validator<'a> {
    schema: &'a Schema,
    out: Vec<SdlDiagnostic>,
}

impl<'a> Validator<'a> {
    fn scan_tag(&mut self, tag: &Tag, node: &'a TagSchema) {
        let schema: &'a Schema = self.schema;
        let children = schema.children(node);

        for child in &tag.children {
            let namespace = child.namespace.as_deref().unwrap_or("");
            if !namespace.is_empty() && !schema.namespaces.iter().any(|ns| *ns == namespace) {
                self.out.push(SdlDiagnostic::warning(
                    Some(child.name_range.clone()),
                    format!("Unknown namespace '{namespace}'"),
                ));
                continue;
            }

            let Some(child_schema) = children.and_then(|c| c.get(child.name.as_str())) else {
                self.out.push(SdlDiagnostic::warning(
                    Some(child.name_range.clone()),
                    format!("Unknown tag '{}'", child.qualified_name()),
                ));
                continue;
            };

            // Tags that declare no namespace accept any allowed prefix.
            if child_schema.namespace.is_some() && child_schema.namespace_name() != namespace {
                self.out.push(SdlDiagnostic::error(
                    child.range.clone(),
                    "Invalid namespace",
                ));
            }
            self.scan_tag(child, child_schema);
        }

        if node.require_tags && tag.children.is_empty() {
            self.out.push(SdlDiagnostic::error(
                tag.range.clone(),
                "This node must have children",
            ));
        }

        if let Some(values) = &node.values {
            for value in &tag.values {
                self.check_value(value, values);
            }
            if tag.range.is_some() {
                if let Some(min) = node.min_values.filter(|min| tag.values.len() < *min) {
                    self.out.push(SdlDiagnostic::error(
                        tag.range.clone(),
                        format!("Not enough values. Requires at least {min}"),
                    ));
                }
                if let Some(max) = node.max_values.filter(|max| tag.values.len() > *max) {
                    self.out.push(SdlDiagnostic::error(
                        tag.range.clone(),
                        format!("Too many values. Allows at most {max}"),
                    ));
                }
            }
        }

        for attribute in &tag.attributes {
            match node.attributes.get(attribute.qualified_name().as_str()) {
                Some(attribute_schema) => {
                    self.check_value(&attribute.value, &attribute_schema.values)
                }
                None => self.out.push(SdlDiagnostic::warning(
                    Some(attribute.name_range.clone()),
                    format!("Unknown attribute '{}'", attribute.qualified_name()),
                )),
            }
        }
    }

    fn check_value(&mut self, value: &Value, schema: &ValueSchema) {
        let range = Some(value.range.clone());
        if value.kind != schema.kind {
            self.out.push(SdlDiagnostic::error(
                range.clone(),
                format!("Type mismatch. Expected type: {}", schema.kind),
            ));
        }

        if let Some(validate) = schema.validate {
            if let Some(message) = validate(value) {
                self.out.push(SdlDiagnostic::error(range, message));
            }
        } else if let Some(pattern) = &schema.pattern {
            if !pattern.is_match(&value.text) {
                self.out.push(SdlDiagnostic::warning(
                    range,
                    "This value does not match the pattern",
                ));
            }
        } else if let Some(members) = schema.enum_values {
            if !schema.enum_optional && !members.iter().any(|m| *m == value.text) {
                self.out
                    .push(SdlDiagnostic::error(range, "This is not a valid value"));
            }
        }
    }
}

/// LSP diagnostics for a `dub.sdl` document, or `None` when linting is disabled.
pub fn diagnostics(
    text: &str,
    rope: &Rope,
    schema: &Schema,
    settings: &Settings,
) -> Option<Vec<Diagnostic>> {
    if !settings.enable_sdl_linting {
        return None;
    }

    let document = sdl::parse(text);
    let diags = validate(&document, schema)
        .into_iter()
        .map(|diag| Diagnostic {
            range: diag.range.map(|r| lsp_range(rope, r)).unwrap_or_default(),
            severity: Some(match diag.severity {
                Severity::Error => DiagnosticSeverity::ERROR,
                Severity::Warning => DiagnosticSeverity::WARNING,
            }),
            source: Some(SOURCE.into()),
            message: diag.message,
            ..Default::default()
        })
        .collect();

    Some(diags)
}

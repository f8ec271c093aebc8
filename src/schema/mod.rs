//! Declarative SDL schema.
//!
//! A [`Schema`] describes which tags may appear where, the type and number
//! of their values, their attributes, and which completion source feeds a
//! value. [`dub`] holds the schema of `dub.sdl` recipes.

pub mod dub;

use std::collections::BTreeMap;

use regex::Regex;

use crate::{location::QualifiedName, sdl::Value, sdl::ValueType};

pub use dub::{complete_license, dub_schema, DUB_SCHEMA, LICENSES};

pub type TagMap = BTreeMap<&'static str, TagSchema>;

/// Custom check for a value; returns an error message when the value is rejected.
pub type ValueValidator = fn(&Value) -> Option<String>;

/// Where completion candidates for a value come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSource {
    /// Package names from the package index (`pkg` or `pkg:subpackage`).
    PackageName,
    /// Released versions of the package named by the tag's first value.
    PackageVersion,
    /// License identifiers and `or` combinations.
    License,
}

#[derive(Debug, Clone)]
pub struct ValueSchema {
    pub kind: ValueType,
    pub pattern: Option<Regex>,
    pub validate: Option<ValueValidator>,
    pub complete: Option<CompletionSource>,
    pub enum_values: Option<&'static [&'static str]>,
    /// Values outside `enum_values` are accepted.
    pub enum_optional: bool,
}

impl ValueSchema {
    pub fn of(kind: ValueType) -> Self {
        ValueSchema {
            kind,
            pattern: None,
            validate: None,
            complete: None,
            enum_values: None,
            enum_optional: false,
        }
    }

    pub fn string() -> Self {
        ValueSchema::of(ValueType::String)
    }

    pub fn boolean() -> Self {
        ValueSchema::of(ValueType::Boolean)
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_validator(mut self, validate: ValueValidator) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn with_completion(mut self, source: CompletionSource) -> Self {
        self.complete = Some(source);
        self
    }

    pub fn with_enum(mut self, values: &'static [&'static str]) -> Self {
        self.enum_values = Some(values);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub description: &'static str,
    pub values: ValueSchema,
}

/// Child tags of a schema node.
#[derive(Debug, Clone)]
pub enum Children {
    Own(TagMap),
    /// The same children as the schema root (used by `subPackage`).
    Root,
}

/// What a tag may contain. Built with the chained methods below.
#[derive(Debug, Clone, Default)]
pub struct TagSchema {
    /// Shown on hover and in completion documentation.
    pub description: &'static str,
    /// Type of the positional values, `None` when the tag takes none.
    pub values: Option<ValueSchema>,
    pub attributes: BTreeMap<&'static str, AttributeSchema>,
    /// Allowed child tags, `None` for tags without a block.
    pub tags: Option<Children>,
    /// Namespace the tag must be written in (`x:ddoxFilterArgs`).
    pub namespace: Option<&'static str>,
    pub min_values: Option<usize>,
    pub max_values: Option<usize>,
    /// The block must contain at least one child tag.
    pub require_tags: bool,
}

impl TagSchema {
    /// A tag with no values, attributes or children.
    pub fn new(description: &'static str) -> Self {
        TagSchema {
            description,
            ..Default::default()
        }
    }

    /// Accept positional values of this type.
    pub fn values(mut self, values: ValueSchema) -> Self {
        self.values = Some(values);
        self
    }

    /// Allow `name=value` with the given description and value type.
    pub fn attribute(
        mut self,
        name: &'static str,
        description: &'static str,
        values: ValueSchema,
    ) -> Self {
        self.attributes
            .insert(name, AttributeSchema { description, values });
        self
    }

    /// Allow a `{ ... }` block with these child tags.
    pub fn children(mut self, tags: Children) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Require the tag to be written as `namespace:name`.
    pub fn namespace(mut self, namespace: &'static str) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Require at least `n` values.
    pub fn at_least(mut self, n: usize) -> Self {
        self.min_values = Some(n);
        self
    }

    /// Require exactly `n` values.
    pub fn exactly(mut self, n: usize) -> Self {
        self.min_values = Some(n);
        self.max_values = Some(n);
        self
    }

    /// Reject an empty block.
    pub fn require_tags(mut self) -> Self {
        self.require_tags = true;
        self
    }

    /// Namespace as written in documents, empty when undeclared.
    pub fn namespace_name(&self) -> &'static str {
        self.namespace.unwrap_or("")
    }
}

/// A whole document schema: the root tag plus document-level rules.
#[derive(Debug, Clone)]
pub struct Schema {
    pub title: &'static str,
    pub root: TagSchema,
    /// Namespaces allowed for tags of this document.
    pub namespaces: Vec<&'static str>,
    /// Tags that must appear at the root.
    pub required: Vec<&'static str>,
}

impl Schema {
    /// Child tags allowed below `node`, resolving [`Children::Root`].
    pub fn children<'s>(&'s self, node: &'s TagSchema) -> Option<&'s TagMap> {
        match node.tags.as_ref()? {
            Children::Own(map) => Some(map),
            Children::Root => match self.root.tags.as_ref()? {
                Children::Own(map) => Some(map),
                Children::Root => None,
            },
        }
    }

    /// Walk `path` from the root. A step matches only when the tag's declared
    /// namespace equals the namespace it was written with.
    pub fn resolve(&self, path: &[QualifiedName]) -> Option<&TagSchema> {
        path.iter().try_fold(&self.root, |node, step| {
            let child = self.children(node)?.get(step.name.as_str())?;
            (child.namespace_name() == step.namespace).then_some(child)
        })
    }
}

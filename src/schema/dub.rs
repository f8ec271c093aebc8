//! Schema of `dub.sdl` package recipes.
//!
//! Descriptions follow the dub package format documentation. Build settings
//! are shared between the recipe root, `configuration` and `buildType`
//! blocks; `subPackage` blocks accept everything the root accepts.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Children, CompletionSource, Schema, TagMap, TagSchema, ValueSchema};
use crate::sdl::Value;

pub static DUB_SCHEMA: Lazy<Schema> = Lazy::new(dub_schema);

pub const LICENSES: &[&str] = &[
    "public domain",
    "proprietary",
    "AFL-3.0",
    "AGPL-3.0",
    "Apache-2.0",
    "APSL-2.0",
    "Artistic-2.0",
    "BSL-1.0",
    "BSD 2-clause",
    "BSD 3-clause",
    "EPL-1.0",
    "GPL-2.0",
    "GPL-3.0",
    "ISC",
    "LGPL-2.1",
    "LGPL-3.0",
    "MIT",
    "MPL-2.0",
    "MS-PL",
    "MS-RL",
    "NCSA",
    "OpenSSL",
    "SSLeay",
    "Zlib",
];

const TARGET_TYPES: &[&str] = &[
    "autodetect",
    "none",
    "executable",
    "library",
    "sourceLibrary",
    "staticLibrary",
    "dynamicLibrary",
];

const BUILD_REQUIREMENTS: &[&str] = &[
    "allowWarnings",
    "silenceWarnings",
    "disallowDeprecations",
    "silenceDeprecations",
    "disallowInlining",
    "disallowOptimization",
    "requireBoundsCheck",
    "requireContracts",
    "relaxProperties",
    "noDefaultFlags",
];

const BUILD_OPTIONS: &[&str] = &[
    "debugMode",
    "releaseMode",
    "coverage",
    "debugInfo",
    "debugInfoC",
    "alwaysStackFrame",
    "stackStomping",
    "inline",
    "noBoundsCheck",
    "optimize",
    "profile",
    "profileGC",
    "unittests",
    "verbose",
    "ignoreUnknownPragmas",
    "syntaxOnly",
    "warnings",
    "warningsAsErrors",
    "ignoreDeprecations",
    "deprecationWarnings",
    "deprecationErrors",
    "property",
    "betterC",
];

/// Build settings that cannot be overridden per build type.
const NOT_IN_BUILD_TYPE: &[&str] = &[
    "dependency",
    "targetType",
    "targetName",
    "targetPath",
    "workingDirectory",
    "subConfiguration",
];

static PACKAGE_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-z0-9_]+$").unwrap());

/// Offer license names, `or`, or what may follow `or`, depending on the
/// last word typed.
pub fn complete_license(partial: &str) -> Vec<String> {
    let all = || LICENSES.iter().map(|l| l.to_string()).collect::<Vec<_>>();

    let words = partial.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() || !partial.ends_with(' ') {
        return all();
    }
    if words.last() == Some(&"or") {
        let mut out = vec!["later".to_string(), "proprietary".to_string()];
        out.extend(all());
        out
    } else {
        vec!["or".to_string()]
    }
}

fn validate_license(value: &Value) -> Option<String> {
    value
        .text
        .trim()
        .is_empty()
        .then(|| "This value must be set".to_string())
}

/// Tag taking one or more string values.
fn strings(description: &'static str) -> TagSchema {
    TagSchema::new(description)
        .values(ValueSchema::string())
        .at_least(1)
}

/// Tag taking exactly one string value.
fn string(description: &'static str) -> TagSchema {
    TagSchema::new(description)
        .values(ValueSchema::string())
        .exactly(1)
}

fn build_settings() -> TagMap {
    let mut tags = TagMap::new();

    tags.insert(
        "dependency",
        TagSchema::new(
            "Adds a single dependency of the given name, attributes are used to configure the version/path to use - see next section for how version specifications look like. Use multiple dependency directives to add more than one dependency.",
        )
        .values(ValueSchema::string().with_completion(CompletionSource::PackageName))
        .attribute(
            "version",
            "The version specification as used for the simple form",
            ValueSchema::string().with_completion(CompletionSource::PackageVersion),
        )
        .attribute(
            "path",
            "Use a folder to source a package from",
            ValueSchema::string(),
        )
        .attribute(
            "optional",
            "Indicates an optional dependency",
            ValueSchema::boolean(),
        )
        .attribute(
            "default",
            "Choose an optional dependency by default",
            ValueSchema::boolean(),
        )
        .exactly(1),
    );
    tags.insert(
        "systemDependencies",
        string("A textual description of the required system dependencies (external C libraries) required by the package. This will be visible on the registry and will be displayed in case of linker errors."),
    );
    tags.insert(
        "targetType",
        TagSchema::new("Specifies a specific target type - this setting does not support the platform attribute")
            .values(ValueSchema::string().with_enum(TARGET_TYPES))
            .exactly(1),
    );
    tags.insert(
        "targetName",
        string("Sets the base name of the output file; type and platform specific pre- and suffixes are added automatically - this setting does not support the platform attribute"),
    );
    tags.insert(
        "targetPath",
        string("The destination path of the output binary - this setting does not support the platform attribute"),
    );
    tags.insert(
        "workingDirectory",
        string("A fixed working directory from which the generated executable will be run - this setting does not support the platform attribute"),
    );
    tags.insert(
        "subConfiguration",
        TagSchema::new("Locks a dependency (first argument) to a specific configuration (second argument); see also the configurations section - this setting does not support the platform attribute")
            .values(ValueSchema::string())
            .exactly(2),
    );
    tags.insert(
        "buildRequirements",
        TagSchema::new("List of required settings for the build process. See the build requirements section for details.")
            .values(ValueSchema::string().with_enum(BUILD_REQUIREMENTS))
            .at_least(1),
    );
    tags.insert(
        "buildOptions",
        TagSchema::new("List of build option identifiers (corresponding to compiler flags) - see the build options section for details.")
            .values(ValueSchema::string().with_enum(BUILD_OPTIONS))
            .at_least(1),
    );
    tags.insert(
        "libs",
        strings(r#"A list of external library names - depending on the compiler, these will be converted to the proper linker flag (e.g. "ssl" might get translated to "-L-lssl")"#),
    );
    tags.insert(
        "sourceFiles",
        strings("Additional files passed to the compiler - can be useful to add certain configuration dependent source files that are not contained in the general source folder"),
    );
    tags.insert(
        "sourcePaths",
        strings(r#"Allows to customize the path where to look for source files (any folder "source" or "src" is automatically used as a source path if no sourcePaths setting is specified) - note that you usually also need to define "importPaths" as "sourcePaths" don't influence those"#),
    );
    tags.insert(
        "excludedSourceFiles",
        strings(r#"Files that should be removed for the set of already added source files (takes precedence over "sourceFiles" and "sourcePaths") - Glob matching can be used to pattern match multiple files at once"#),
    );
    tags.insert(
        "mainSourceFile",
        string(r#"Determines the file that contains the main() function. This setting can be used by dub to exclude this file in situations where a different main function is defined (e.g. for "dub test") - this setting does not support platform suffixes"#),
    );
    tags.insert(
        "copyFiles",
        strings(r#"A list of globs matching files or directories to be copied to targetPath. Matching directories are copied recursively, i.e. "copyFiles": ["path/to/dir"]" recursively copies dir, while "copyFiles": ["path/to/dir/*"]" only copies files within dir."#),
    );
    tags.insert(
        "versions",
        strings("A list of D versions to be defined during compilation"),
    );
    tags.insert(
        "debugVersions",
        strings("A list of D debug identifiers to be defined during compilation"),
    );
    tags.insert(
        "importPaths",
        strings("Additional import paths to search for D modules (the source/ folder is used by default as a source folder, if it exists)"),
    );
    tags.insert(
        "stringImportPaths",
        strings("Additional import paths to search for string imports/views (the views/ folder is used by default as a string import folder, if it exists)"),
    );
    tags.insert(
        "preGenerateCommands",
        strings("A list of shell commands that is executed before project generation is started"),
    );
    tags.insert(
        "postGenerateCommands",
        strings("A list of shell commands that is executed after project generation is finished"),
    );
    tags.insert(
        "preBuildCommands",
        strings("A list of shell commands that is executed always before the project is built"),
    );
    tags.insert(
        "postBuildCommands",
        strings("A list of shell commands that is executed always after the project is built"),
    );
    tags.insert(
        "dflags",
        strings("Additional flags passed to the D compiler - note that these flags are usually specific to the compiler in use, but a set of flags is automatically translated from DMD to the selected compiler"),
    );
    tags.insert(
        "lflags",
        strings("Additional flags passed to the linker - note that these flags are usually specific to the linker in use"),
    );

    tags
}

pub fn dub_schema() -> Schema {
    let mut tags = build_settings();

    tags.insert(
        "name",
        TagSchema::new(r#"Name of the package, used to uniquely identify the package. Must be comprised of only lower case ASCII alpha-numeric characters, "-" or "_"."#)
            .values(ValueSchema::string().with_pattern(PACKAGE_NAME_RE.clone()))
            .exactly(1),
    );
    tags.insert("description", string("Brief description of the package"));
    tags.insert("homepage", string("URL of the project website"));
    tags.insert(
        "authors",
        strings(r#"List of project authors (the suggested format is either "Peter Parker" or "Peter Parker <pparker@example.com>")"#),
    );
    tags.insert("copyright", string("Copyright declaration string"));
    tags.insert(
        "license",
        TagSchema::new("License(s) under which the project can be used")
            .values(
                ValueSchema::string()
                    .with_validator(validate_license)
                    .with_completion(CompletionSource::License),
            )
            .exactly(1),
    );
    tags.insert(
        "subPackage",
        TagSchema::new("Defines a sub-package using either a path to a sub directory, or in-place")
            .values(ValueSchema::string())
            .children(Children::Root),
    );

    let mut configuration_tags = build_settings();
    configuration_tags.insert(
        "platforms",
        TagSchema::new("Restricts the configuration to the given platforms")
            .values(ValueSchema::string()),
    );
    tags.insert(
        "configuration",
        TagSchema::new("Speficies a build configuration (chosen on the command line using --config=...)")
            .values(ValueSchema::string())
            .children(Children::Own(configuration_tags))
            .exactly(1)
            .require_tags(),
    );

    let mut build_type_tags = build_settings();
    build_type_tags.retain(|name, _| !NOT_IN_BUILD_TYPE.contains(name));
    tags.insert(
        "buildType",
        TagSchema::new("Defines an additional custom build type or overrides one of the default ones (chosen on the command line using --build=...)")
            .values(ValueSchema::string())
            .children(Children::Own(build_type_tags))
            .exactly(1)
            .require_tags(),
    );
    tags.insert(
        "ddoxFilterArgs",
        strings("Specifies a list of command line flags usable for controlling filter behavior for --build=ddox [experimental]")
            .namespace("x"),
    );

    Schema {
        title: "dub Package Schema",
        root: TagSchema::new("dub package recipe").children(Children::Own(tags)),
        namespaces: vec!["x"],
        required: vec!["name"],
    }
}

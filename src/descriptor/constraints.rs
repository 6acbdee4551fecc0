//! Constraint schemas for bundle descriptors.
//!
//! A schema is an ordered list of `(field, Constraint)` pairs; declaration
//! order determines validation order and therefore which violation is
//! reported when several exist. The schema graph is a finite static tree
//! built once per process.

use regex::Regex;
use std::sync::LazyLock;

/// Guidance shown when a component name violates the name pattern.
pub const INVALID_NAME_MESSAGE: &str =
    "Only lowercase letters, numbers and dashes are allowed and the name must start with a letter";

/// Guidance shown when a version string violates the version pattern.
pub const INVALID_VERSION_MESSAGE: &str =
    "Version must start with a number or digit prefixed by 'v'";

static VALID_NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("valid pattern"));

static VALID_VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?\d+.*$").expect("valid pattern"));

/// A regex constraint paired with its field-specific guidance message.
#[derive(Debug)]
pub struct FieldPattern {
    /// Full-match pattern (anchored)
    pub regex: &'static LazyLock<Regex>,
    /// Guidance appended to the violation message
    pub message: &'static str,
}

/// Constraint on a single descriptor field.
#[derive(Debug)]
pub enum Constraint {
    /// String field, optionally pattern- or enum-constrained
    Str {
        /// Absent or null fails validation when true
        required: bool,
        /// Full-match pattern with guidance message
        pattern: Option<&'static FieldPattern>,
        /// Closed set of accepted values (simple enums)
        allowed_values: Option<&'static [&'static str]>,
    },
    /// Numeric field
    Number {
        /// Absent or null fails validation when true
        required: bool,
    },
    /// Boolean field
    Boolean {
        /// Absent or null fails validation when true
        required: bool,
    },
    /// Nested object with its own schema
    Object {
        /// Absent or null fails validation when true
        required: bool,
        /// Schema of the nested object
        properties: Schema,
    },
    /// Array of objects
    Array {
        /// Absent or null fails validation when true
        required: bool,
        /// Schema of each element
        items: ItemSchema,
    },
    /// Map with arbitrary string keys and string values
    Map {
        /// Absent or null fails validation when true
        required: bool,
    },
}

/// Ordered field schema; order fixes the error-reporting tie-break.
pub type Schema = Vec<(&'static str, Constraint)>;

/// Schema of an array element.
#[derive(Debug)]
pub enum ItemSchema {
    /// Every element conforms to one object schema
    Object(Schema),
    /// Elements are a discriminated union: the discriminator field selects
    /// the variant schema by explicit lookup
    Union {
        /// Field whose value selects the variant
        discriminator: &'static str,
        /// Ordered (discriminator value, variant schema) pairs
        variants: Vec<(&'static str, Schema)>,
    },
}

static NAME_FIELD: FieldPattern = FieldPattern {
    regex: &VALID_NAME_PATTERN,
    message: INVALID_NAME_MESSAGE,
};

static VERSION_FIELD: FieldPattern = FieldPattern {
    regex: &VALID_VERSION_PATTERN,
    message: INVALID_VERSION_MESSAGE,
};

/// Accepted microfrontend stacks
pub const MICROFRONTEND_STACKS: &[&str] = &["react", "angular"];

/// Accepted microservice stacks
pub const MICROSERVICE_STACKS: &[&str] = &["spring-boot", "node"];

fn api_claim_internal_schema() -> Schema {
    vec![
        (
            "name",
            Constraint::Str {
                required: true,
                pattern: None,
                allowed_values: None,
            },
        ),
        (
            "type",
            Constraint::Str {
                required: true,
                pattern: None,
                allowed_values: None,
            },
        ),
        (
            "serviceId",
            Constraint::Str {
                required: true,
                pattern: None,
                allowed_values: None,
            },
        ),
    ]
}

fn microfrontend_schema() -> Schema {
    vec![
        (
            "name",
            Constraint::Str {
                required: true,
                pattern: Some(&NAME_FIELD),
                allowed_values: None,
            },
        ),
        (
            "stack",
            Constraint::Str {
                required: true,
                pattern: None,
                allowed_values: Some(MICROFRONTEND_STACKS),
            },
        ),
        ("titles", Constraint::Map { required: false }),
        (
            "apiClaims",
            Constraint::Array {
                required: false,
                items: ItemSchema::Union {
                    discriminator: "type",
                    variants: vec![("internal", api_claim_internal_schema())],
                },
            },
        ),
    ]
}

fn microservice_schema() -> Schema {
    vec![
        (
            "name",
            Constraint::Str {
                required: true,
                pattern: Some(&NAME_FIELD),
                allowed_values: None,
            },
        ),
        (
            "stack",
            Constraint::Str {
                required: true,
                pattern: None,
                allowed_values: Some(MICROSERVICE_STACKS),
            },
        ),
        (
            "healthCheckPath",
            Constraint::Str {
                required: false,
                pattern: None,
                allowed_values: None,
            },
        ),
    ]
}

/// Schema of the local `bundle.json` descriptor.
pub static BUNDLE_DESCRIPTOR_CONSTRAINTS: LazyLock<Schema> = LazyLock::new(|| {
    vec![
        (
            "name",
            Constraint::Str {
                required: true,
                pattern: Some(&NAME_FIELD),
                allowed_values: None,
            },
        ),
        (
            "version",
            Constraint::Str {
                required: true,
                pattern: Some(&VERSION_FIELD),
                allowed_values: None,
            },
        ),
        (
            "description",
            Constraint::Str {
                required: false,
                pattern: None,
                allowed_values: None,
            },
        ),
        (
            "microfrontends",
            Constraint::Array {
                required: true,
                items: ItemSchema::Object(microfrontend_schema()),
            },
        ),
        (
            "microservices",
            Constraint::Array {
                required: true,
                items: ItemSchema::Object(microservice_schema()),
            },
        ),
    ]
});

/// Schema of the descriptor embedded in a published bundle image.
pub static IMAGE_DESCRIPTOR_CONSTRAINTS: LazyLock<Schema> = LazyLock::new(|| {
    vec![
        (
            "name",
            Constraint::Str {
                required: true,
                pattern: None,
                allowed_values: None,
            },
        ),
        (
            "descriptorVersion",
            Constraint::Str {
                required: true,
                pattern: None,
                allowed_values: None,
            },
        ),
        (
            "description",
            Constraint::Str {
                required: false,
                pattern: None,
                allowed_values: None,
            },
        ),
    ]
});

//! Tool schema registry.
//!
//! Declares the fixed set of callable operations, their parameter schemas,
//! and their access class. Built once at startup; every schema is checked
//! for completeness before the registry can be advertised.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::schema::{assert_complete, ParamSchema};

/// Access class of a tool, mapped to a credential scope by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolAccess {
    Read,
    Write,
}

/// A callable operation: wire name, usage contract, parameter schema.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub access: ToolAccess,
    pub schema: ParamSchema,
}

impl ToolDefinition {
    fn new(
        name: &str,
        access: ToolAccess,
        description: impl Into<String>,
        schema: ParamSchema,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.into(),
            access,
            schema,
        }
    }
}

/// Wire form of a tool for discovery responses.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate tool name: {0}")]
    DuplicateName(String),

    #[error("incomplete schema for tool '{tool}': {detail}")]
    IncompleteSchema { tool: String, detail: String },
}

/// Immutable registry of the operations the gateway exposes.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Builds a registry, rejecting duplicate names and any schema whose
    /// emitted JSON contains an array node without an item schema.
    pub fn new(tools: Vec<ToolDefinition>) -> Result<Self, RegistryError> {
        for (index, tool) in tools.iter().enumerate() {
            if tools[..index].iter().any(|t| t.name == tool.name) {
                return Err(RegistryError::DuplicateName(tool.name.clone()));
            }
            assert_complete(&tool.schema.to_json()).map_err(|detail| {
                RegistryError::IncompleteSchema {
                    tool: tool.name.clone(),
                    detail,
                }
            })?;
        }
        Ok(Self { tools })
    }

    /// The gateway's built-in ERP operations.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(vec![
            ToolDefinition::new(
                "search",
                ToolAccess::Read,
                "Search for records in any ERP model using domain filters. \
                 Returns matching record ids. The domain is a list of \
                 [field, operator, value] triples, e.g. \
                 [[\"name\", \"ilike\", \"john\"]] or \
                 [[\"customer_rank\", \">\", 0]]; operators include =, !=, >, \
                 <, >=, <=, like, ilike, in, not in. An empty domain matches \
                 every record; always pair it with a limit.",
                ParamSchema::object(
                    vec![
                        ("model".into(), model_schema()),
                        ("domain".into(), domain_schema()),
                        ("limit".into(), ParamSchema::integer_with("Maximum number of records to return")),
                        ("offset".into(), ParamSchema::integer_with("Number of records to skip (for pagination)")),
                        ("order".into(), ParamSchema::string_with("Sort order, e.g. 'name asc' or 'create_date desc'")),
                    ],
                    &["model", "domain"],
                ),
            ),
            ToolDefinition::new(
                "read",
                ToolAccess::Read,
                "Read field values from records by id. Use after a search to \
                 fetch the actual data. Specify fields to reduce payload \
                 size; omit to fetch every field.",
                ParamSchema::object(
                    vec![
                        ("model".into(), model_schema()),
                        ("ids".into(), ids_schema()),
                        ("fields".into(), fields_schema()),
                    ],
                    &["model", "ids"],
                ),
            ),
            ToolDefinition::new(
                "search_read",
                ToolAccess::Read,
                "Search and read in one call: returns complete field maps for \
                 every matching record instead of just ids. More efficient \
                 than search followed by read.",
                ParamSchema::object(
                    vec![
                        ("model".into(), model_schema()),
                        ("domain".into(), domain_schema()),
                        ("fields".into(), fields_schema()),
                        ("limit".into(), ParamSchema::integer_with("Maximum number of records to return")),
                        ("offset".into(), ParamSchema::integer_with("Number of records to skip (for pagination)")),
                        ("order".into(), ParamSchema::string_with("Sort order, e.g. 'create_date desc'")),
                    ],
                    &["model", "domain"],
                ),
            ),
            ToolDefinition::new(
                "create",
                ToolAccess::Write,
                "Create a new record. Values is a map of field name to value; \
                 many-to-one fields take the related record's id. Returns the \
                 created record's id. Use get_model_fields first to see which \
                 fields a model requires.",
                ParamSchema::object(
                    vec![
                        ("model".into(), model_schema()),
                        ("values".into(), values_schema()),
                    ],
                    &["model", "values"],
                ),
            ),
            ToolDefinition::new(
                "update",
                ToolAccess::Write,
                "Update existing records. Only the fields present in values \
                 change; everything else is left as is. All listed ids \
                 receive the same values.",
                ParamSchema::object(
                    vec![
                        ("model".into(), model_schema()),
                        ("ids".into(), ids_schema()),
                        ("values".into(), values_schema()),
                    ],
                    &["model", "ids", "values"],
                ),
            ),
            ToolDefinition::new(
                "delete",
                ToolAccess::Write,
                "Delete records permanently. Deletion cannot be undone and \
                 may be blocked by server-side constraints; consider \
                 archiving (update with active=false) instead.",
                ParamSchema::object(
                    vec![
                        ("model".into(), model_schema()),
                        ("ids".into(), ids_schema()),
                    ],
                    &["model", "ids"],
                ),
            ),
            ToolDefinition::new(
                "get_model_fields",
                ToolAccess::Read,
                "Describe the fields of a model: label, type, help text, \
                 required and readonly flags. Check this before creating or \
                 updating records.",
                ParamSchema::object(
                    vec![("model".into(), model_schema())],
                    &["model"],
                ),
            ),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for discovery responses (tool listings).
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema: tool.schema.to_json(),
            })
            .collect()
    }
}

fn model_schema() -> ParamSchema {
    ParamSchema::string_with("ERP model name, e.g. 'res.partner' or 'sale.order'")
}

fn ids_schema() -> ParamSchema {
    ParamSchema::array_with(ParamSchema::integer(), "Record ids (integers, never strings)")
}

fn fields_schema() -> ParamSchema {
    ParamSchema::array_with(ParamSchema::string(), "Field names to retrieve (omit for all)")
}

fn values_schema() -> ParamSchema {
    ParamSchema::open_object("Map of field name to value")
}

/// Schema for a search domain: a sequence of filter triples, optionally
/// interleaved with the prefix logical operators '&', '|', '!'.
///
/// A triple is [field, operator, value] where value may be a primitive, a
/// list of primitives (for 'in' style filters), or an object. Every array
/// level declares its element schema down to the leaves.
fn domain_schema() -> ParamSchema {
    let primitive = ParamSchema::any_of(vec![
        ParamSchema::string(),
        ParamSchema::number(),
        ParamSchema::boolean(),
        ParamSchema::Null,
    ]);
    let triple_element = ParamSchema::any_of(vec![
        ParamSchema::string(),
        ParamSchema::number(),
        ParamSchema::boolean(),
        ParamSchema::Null,
        ParamSchema::array(primitive),
        ParamSchema::open_object("Structured filter value"),
    ]);
    let term = ParamSchema::any_of(vec![
        // A logical operator between triples.
        ParamSchema::string(),
        ParamSchema::array(triple_element),
    ]);
    ParamSchema::array_with(
        term,
        "Filter domain: [field, operator, value] triples, e.g. \
         [[\"customer_rank\", \">\", 0]]. Empty matches all records.",
    )
}

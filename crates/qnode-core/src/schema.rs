use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ids::{CollectionId, SegmentId, Timestamp};

/// Element type of a collection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
    VectorBinary,
    VectorFloat,
}

impl DataType {
    /// Returns the canonical upper-case name used in schema definitions.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
            Self::VectorBinary => "VECTOR_BINARY",
            Self::VectorFloat => "VECTOR_FLOAT",
        }
    }

    /// Returns true for binary and float vector types.
    #[must_use]
    pub const fn is_vector(&self) -> bool {
        matches!(self, Self::VectorBinary | Self::VectorFloat)
    }
}

impl FromStr for DataType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOOL" => Ok(Self::Bool),
            "INT8" => Ok(Self::Int8),
            "INT16" => Ok(Self::Int16),
            "INT32" => Ok(Self::Int32),
            "INT64" => Ok(Self::Int64),
            "FLOAT" => Ok(Self::Float),
            "DOUBLE" => Ok(Self::Double),
            "STRING" => Ok(Self::String),
            "VECTOR_BINARY" => Ok(Self::VectorBinary),
            "VECTOR_FLOAT" => Ok(Self::VectorFloat),
            _ => Err(()),
        }
    }
}

/// Free-form key/value parameter attached to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Definition of a single collection field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name, unique within the collection schema.
    pub name: String,
    /// Element type.
    pub data_type: DataType,
    /// Type parameters such as `dim` for vector fields.
    #[serde(default)]
    pub type_params: Vec<KeyValuePair>,
    /// Index build parameters, carried through untouched.
    #[serde(default)]
    pub index_params: Vec<KeyValuePair>,
}

impl FieldSchema {
    /// Creates a field without type or index parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            type_params: Vec::new(),
            index_params: Vec::new(),
        }
    }

    /// Adds a type parameter (builder pattern).
    #[must_use]
    pub fn with_type_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.type_params.push(KeyValuePair::new(key, value));
        self
    }

    /// Looks up a type parameter by key.
    #[must_use]
    pub fn type_param(&self, key: &str) -> Option<&str> {
        self.type_params
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    /// Returns the `dim` type parameter, if present and numeric.
    #[must_use]
    pub fn dim(&self) -> Option<u32> {
        self.type_param("dim").and_then(|v| v.trim().parse().ok())
    }
}

/// Field layout of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name. Used as the secondary lookup key.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Whether primary keys are assigned by the cluster.
    #[serde(default)]
    pub auto_id: bool,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            auto_id: false,
            fields,
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.data_type.is_vector())
    }
}

/// Collection definition delivered with a "load collection" instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub id: CollectionId,
    pub schema: CollectionSchema,
    pub create_time: Timestamp,
    /// Segments known to the coordinator at load time. Informational only.
    #[serde(default)]
    pub segment_ids: Vec<SegmentId>,
    /// Partition tags known to the coordinator at load time. Informational only.
    #[serde(default)]
    pub partition_tags: Vec<String>,
}

impl CollectionMeta {
    #[must_use]
    pub fn new(id: CollectionId, schema: CollectionSchema, create_time: Timestamp) -> Self {
        Self {
            id,
            schema,
            create_time,
            segment_ids: Vec::new(),
            partition_tags: Vec::new(),
        }
    }

    /// Adds a known partition tag (builder pattern).
    #[must_use]
    pub fn with_partition_tag(mut self, tag: impl Into<String>) -> Self {
        self.partition_tags.push(tag.into());
        self
    }

    /// Name the collection is indexed under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}

use haulage_warehouse::Row;
use serde::Serialize;
use serde_json::Value;

use crate::cursor::Watermark;
use crate::error::PipelineError;

/// One order node as returned by the orders query.
///
/// The node is kept verbatim. Only `id` and `updated_at` are interpreted;
/// both must be present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OrderRecord {
    fields: Row,
    #[serde(skip)]
    id: String,
    #[serde(skip)]
    updated_at: Watermark,
}

impl OrderRecord {
    pub fn from_node(node: Value) -> Result<Self, PipelineError> {
        let Value::Object(fields) = node else {
            return Err(PipelineError::MalformedResponse(String::from(
                "order node is not an object",
            )));
        };

        let id = match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(PipelineError::MalformedResponse(String::from(
                    "order node has no 'id'",
                )))
            }
        };

        let updated_at = fields
            .get("updated_at")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PipelineError::MalformedResponse(format!("order '{id}' has no 'updated_at'"))
            })
            .and_then(|raw| Watermark::parse(raw).map_err(PipelineError::from))?;

        Ok(Self {
            fields,
            id,
            updated_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn updated_at(&self) -> &Watermark {
        &self.updated_at
    }

    pub fn line_items(&self) -> Option<&Vec<Value>> {
        self.fields.get("line_items").and_then(Value::as_array)
    }

    pub fn set_line_items(&mut self, items: Vec<Value>) {
        self.fields
            .insert(String::from("line_items"), Value::Array(items));
    }

    pub fn fields(&self) -> &Row {
        &self.fields
    }

    pub fn into_row(self) -> Row {
        self.fields
    }
}

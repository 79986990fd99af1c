//! Tool schema and tool call types for LLM interactions.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Name of the synthetic terminal tool every tool catalogue ends with.
pub const RESPOND_TOOL_NAME: &str = "respond_to_user";

const CALL_ID_PREFIX: &str = "tool_";
const CALL_ID_LEN: usize = 15;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Parsed tool arguments, keyed by parameter name.
///
/// Every backend's argument shape is converted to this map as soon as a reply
/// is classified, so tool execution never branches on where a call came from.
pub type Arguments = serde_json::Map<String, Value>;

/// The JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// A JSON string.
    String,
    /// A JSON number without a fractional part.
    Integer,
    /// `true` or `false`.
    Boolean,
}

impl ParameterType {
    /// Whether `value` is an instance of this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// One declared parameter of a tool.
///
/// ```
/// use easyrag_common::tools::{ParameterType, ToolParameter};
///
/// let unit = ToolParameter::string("unit", "Temperature unit")
///     .with_enum(["celsius", "fahrenheit"]);
/// let zip = ToolParameter::string("zipCode", "US zip code").required();
///
/// assert_eq!(unit.param_type, ParameterType::String);
/// assert!(!unit.required);
/// assert!(zip.required);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ToolParameter {
    /// Parameter name as it appears in the arguments object.
    pub name: String,
    /// Human-readable description shown to the model.
    pub description: String,
    /// The JSON type of the parameter.
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Allowed values, if restricted.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Whether the parameter must be present.
    #[serde(default)]
    pub required: bool,
}

impl ToolParameter {
    /// Creates an optional parameter of the given type.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        param_type: ParameterType,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type,
            enum_values: None,
            required: false,
        }
    }

    /// Creates a string parameter.
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ParameterType::String)
    }

    /// Creates an integer parameter.
    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ParameterType::Integer)
    }

    /// Creates a boolean parameter.
    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, ParameterType::Boolean)
    }

    /// Marks the parameter as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Restricts the parameter to the given values.
    #[must_use]
    pub fn with_enum(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// Describes a single property in a function parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Property {
    /// The JSON type of the property.
    #[serde(rename = "type")]
    pub prop_type: ParameterType,
    /// Human-readable description of this property.
    pub description: String,
    /// Allowed enum values for this property.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl From<&ToolParameter> for Property {
    fn from(param: &ToolParameter) -> Self {
        Self {
            prop_type: param.param_type,
            description: param.description.clone(),
            enum_values: param.enum_values.clone(),
        }
    }
}

/// Defines the parameter schema for a function using JSON Schema conventions.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Parameters {
    /// The JSON type, always "object".
    #[serde(rename = "type")]
    pub param_type: String,
    /// Parameter names to their property definitions, in declaration order.
    pub properties: IndexMap<String, Property>,
    /// List of required parameter names, in declaration order.
    pub required: Vec<String>,
}

impl Parameters {
    /// Creates a new `Parameters` with type "object".
    #[must_use]
    pub fn new(properties: IndexMap<String, Property>, required: Vec<String>) -> Self {
        Self {
            param_type: "object".to_string(),
            properties,
            required,
        }
    }

    /// Builds the schema from an ordered parameter list.
    ///
    /// The `required` list is derived by filtering on [`ToolParameter::required`].
    #[must_use]
    pub fn from_tool_parameters(params: &[ToolParameter]) -> Self {
        let properties = params
            .iter()
            .map(|p| (p.name.clone(), Property::from(p)))
            .collect();
        let required = params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.clone())
            .collect();
        Self::new(properties, required)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new(IndexMap::new(), Vec::new())
    }
}

/// Describes a function that can be called by an LLM.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Function {
    /// The name of the function.
    pub name: String,
    /// Human-readable description of what the function does.
    pub description: String,
    /// JSON Schema definition of the function's parameters.
    pub parameters: Parameters,
}

/// A tool exported to a backend.
///
/// Serializes to the function-calling shape both backends accept:
///
/// ```
/// use easyrag_common::tools::{Tool, ToolParameter};
/// use serde_json::json;
///
/// let tool = Tool::from_parameters(
///     "weather",
///     "Current weather for a zip code",
///     &[ToolParameter::string("zipCode", "US zip code").required()],
/// );
///
/// assert_eq!(serde_json::to_value(&tool).unwrap(), json!({
///     "type": "function",
///     "function": {
///         "name": "weather",
///         "description": "Current weather for a zip code",
///         "parameters": {
///             "type": "object",
///             "properties": {
///                 "zipCode": {"type": "string", "description": "US zip code"}
///             },
///             "required": ["zipCode"]
///         }
///     }
/// }));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder, Eq, PartialEq)]
pub struct Tool {
    /// The type of tool (defaults to "function").
    #[serde(rename = "type")]
    #[builder(default = "function".to_string())]
    pub r#type: String,
    /// The function definition.
    pub function: Function,
}

impl Tool {
    /// Creates a function tool from an ordered parameter list.
    pub fn from_parameters(
        name: impl Into<String>,
        description: impl Into<String>,
        params: &[ToolParameter],
    ) -> Self {
        Self::builder()
            .function(Function {
                name: name.into(),
                description: description.into(),
                parameters: Parameters::from_tool_parameters(params),
            })
            .build()
    }

    /// The synthetic terminal tool.
    ///
    /// Gives JSON-only backends a schema-validated way to say "I am done":
    /// its single `response` argument is returned to the caller as the final
    /// answer.
    #[must_use]
    pub fn respond_to_user() -> Self {
        Self::from_parameters(
            RESPOND_TOOL_NAME,
            "Finish using tools and respond to the user.",
            &[ToolParameter::string(
                "response",
                "The plain text response that will be displayed to the user.",
            )
            .required()],
        )
    }

    /// The function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Represents an invocation of a function with arguments.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    /// The name of the function being called.
    pub name: String,
    /// The parsed arguments.
    #[serde(default)]
    pub arguments: Arguments,
}

impl FunctionCall {
    /// Returns the arguments encoded as a JSON object string.
    #[must_use]
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

/// A canonical tool call request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Unique identifier for this tool call.
    pub id: String,
    /// The function being invoked.
    pub function: FunctionCall,
    /// The type of call, typically "function".
    pub call_type: String,
}

impl ToolCall {
    /// Creates a new tool call with a generated id.
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self::with_id(generate_call_id(), name, arguments)
    }

    /// Creates a new tool call with the given id.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
            call_type: "function".to_string(),
        }
    }

    /// Whether this call invokes the terminal tool.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.function.name == RESPOND_TOOL_NAME
    }
}

/// Removes every character outside `[A-Za-z0-9_-]` from a tool name.
///
/// ```
/// use easyrag_common::tools::sanitize_tool_name;
///
/// assert_eq!(sanitize_tool_name("weather!!"), "weather");
/// assert_eq!(sanitize_tool_name(" get current-time "), "getcurrent-time");
/// ```
#[must_use]
pub fn sanitize_tool_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Generates a call id of the form `tool_` followed by 15 base36 characters.
///
/// Used for backends that do not return call ids of their own.
#[must_use]
pub fn generate_call_id() -> String {
    let mut seed = Uuid::new_v4().as_u128();
    let mut id = String::with_capacity(CALL_ID_PREFIX.len() + CALL_ID_LEN);
    id.push_str(CALL_ID_PREFIX);
    for _ in 0..CALL_ID_LEN {
        let digit = usize::try_from(seed % 36).unwrap_or_default();
        id.push(char::from(BASE36[digit]));
        seed /= 36;
    }
    id
}

/// Parses a raw argument string into [`Arguments`].
///
/// An empty or blank string means "no arguments".
///
/// # Errors
///
/// Returns an error if the string is not JSON or is JSON but not an object.
pub fn parse_arguments(raw: &str) -> anyhow::Result<Arguments> {
    if raw.trim().is_empty() {
        return Ok(Arguments::new());
    }
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("tool arguments must be a JSON object, got: {other}"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_list_derived_from_parameters() {
        let tool = Tool::from_parameters(
            "forecast",
            "Forecast",
            &[
                ToolParameter::string("city", "City").required(),
                ToolParameter::integer("days", "Days"),
                ToolParameter::boolean("metric", "Metric").required(),
            ],
        );

        assert_eq!(tool.function.parameters.required, vec!["city", "metric"]);
        assert_eq!(tool.function.parameters.properties.len(), 3);
        assert_eq!(
            tool.function.parameters.properties["days"].prop_type,
            ParameterType::Integer
        );
    }

    #[test]
    fn test_properties_keep_declaration_order() {
        let tool = Tool::from_parameters(
            "book",
            "Book a table",
            &[
                ToolParameter::string("zipCode", "Zip").required(),
                ToolParameter::integer("guests", "Guests"),
                ToolParameter::boolean("accessible", "Accessible"),
            ],
        );

        let names: Vec<&str> = tool
            .function
            .parameters
            .properties
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, vec!["zipCode", "guests", "accessible"]);

        let json = serde_json::to_string(&tool).unwrap();
        let zip = json.find("\"zipCode\"").unwrap();
        let guests = json.find("\"guests\"").unwrap();
        let accessible = json.find("\"accessible\"").unwrap();
        assert!(zip < guests && guests < accessible);

        let value = serde_json::to_value(&tool).unwrap();
        let keys: Vec<&String> = value["function"]["parameters"]["properties"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(keys, ["zipCode", "guests", "accessible"]);
    }

    #[test]
    fn test_enum_serialization() {
        let tool = Tool::from_parameters(
            "convert",
            "Convert",
            &[ToolParameter::string("unit", "Unit").with_enum(["c", "f"])],
        );
        let value = serde_json::to_value(&tool).unwrap();

        assert_eq!(
            value["function"]["parameters"]["properties"]["unit"],
            json!({"type": "string", "description": "Unit", "enum": ["c", "f"]})
        );
        assert_eq!(value["function"]["parameters"]["required"], json!([]));
    }

    #[test]
    fn test_no_parameters_schema() {
        let tool = Tool::from_parameters("schedule", "Today's schedule", &[]);
        let value = serde_json::to_value(&tool).unwrap();

        assert_eq!(
            value["function"]["parameters"],
            json!({"type": "object", "properties": {}, "required": []})
        );
    }

    #[test]
    fn test_respond_tool_schema() {
        let tool = Tool::respond_to_user();
        let value = serde_json::to_value(&tool).unwrap();

        assert_eq!(value["function"]["name"], RESPOND_TOOL_NAME);
        assert_eq!(
            value["function"]["description"],
            "Finish using tools and respond to the user."
        );
        assert_eq!(value["function"]["parameters"]["required"], json!(["response"]));
        assert_eq!(
            value["function"]["parameters"]["properties"]["response"]["type"],
            "string"
        );
    }

    #[test]
    fn test_sanitize_examples() {
        assert_eq!(sanitize_tool_name("weather!!"), "weather");
        assert_eq!(sanitize_tool_name("get_time"), "get_time");
        assert_eq!(sanitize_tool_name("\"schedule\""), "schedule");
        assert_eq!(sanitize_tool_name("météo"), "mto");
    }

    #[test]
    fn test_generated_call_id_shape() {
        let id = generate_call_id();

        assert!(id.starts_with("tool_"));
        assert_eq!(id.len(), 20);
        assert!(id[5..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(id, generate_call_id());
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments("").unwrap(), Arguments::new());
        assert_eq!(parse_arguments("  ").unwrap(), Arguments::new());

        let args = parse_arguments(r#"{"zipCode":"92021"}"#).unwrap();
        assert_eq!(args["zipCode"], json!("92021"));

        assert!(parse_arguments("[1, 2]").is_err());
        assert!(parse_arguments("not json").is_err());
    }

    #[test]
    fn test_arguments_json_roundtrip() {
        let mut args = Arguments::new();
        args.insert("days".into(), json!(3));
        let call = ToolCall::new("forecast", args.clone());

        assert_eq!(parse_arguments(&call.function.arguments_json()).unwrap(), args);
    }

    #[test]
    fn test_parameter_type_matches() {
        assert!(ParameterType::String.matches(&json!("x")));
        assert!(!ParameterType::String.matches(&json!(1)));
        assert!(ParameterType::Integer.matches(&json!(-4)));
        assert!(!ParameterType::Integer.matches(&json!(1.5)));
        assert!(!ParameterType::Integer.matches(&json!("1")));
        assert!(ParameterType::Boolean.matches(&json!(false)));
    }

    #[test]
    fn test_terminal_detection() {
        assert!(ToolCall::new(RESPOND_TOOL_NAME, Arguments::new()).is_terminal());
        assert!(!ToolCall::new("schedule", Arguments::new()).is_terminal());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sanitized_names_only_contain_allowed_chars(name in ".*") {
            let sanitized = sanitize_tool_name(&name);
            prop_assert!(sanitized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        }

        #[test]
        fn sanitizing_keeps_allowed_chars_in_order(name in "[A-Za-z0-9_-]{0,32}", noise in "[!@#$%^&*(). ]{0,8}") {
            let noisy = format!("{noise}{name}{noise}");
            prop_assert_eq!(sanitize_tool_name(&noisy), name);
        }

        #[test]
        fn sanitizing_is_idempotent(name in ".*") {
            let once = sanitize_tool_name(&name);
            prop_assert_eq!(sanitize_tool_name(&once), once.clone());
        }
    }
}

//! Argument validation against a tool's declared parameter schema.

use serde_json::Value;

use easyrag_common::tools::{Arguments, Parameters};

/// Checks `args` against `schema`.
///
/// Every required parameter must be present and non-null, every declared
/// parameter that is present must have the declared type, and enum-restricted
/// parameters must hold one of the allowed values. Undeclared arguments are
/// passed through untouched.
///
/// # Errors
///
/// Returns a message listing every violation found.
pub fn validate_arguments(schema: &Parameters, args: &Arguments) -> Result<(), String> {
    let mut problems = Vec::new();

    for name in &schema.required {
        if args.get(name).is_none_or(Value::is_null) {
            problems.push(format!("missing required parameter `{name}`"));
        }
    }

    for (name, property) in &schema.properties {
        let Some(value) = args.get(name).filter(|v| !v.is_null()) else {
            continue;
        };

        if !property.prop_type.matches(value) {
            problems.push(format!(
                "parameter `{name}` must be of type {}, got {value}",
                property.prop_type
            ));
            continue;
        }

        if let Some(allowed) = &property.enum_values {
            let accepted = value
                .as_str()
                .is_some_and(|s| allowed.iter().any(|a| a == s));
            if !accepted {
                problems.push(format!(
                    "parameter `{name}` must be one of [{}], got {value}",
                    allowed.join(", ")
                ));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(format!("invalid arguments: {}", problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use easyrag_common::tools::ToolParameter;
    use serde_json::json;

    fn schema() -> Parameters {
        Parameters::from_tool_parameters(&[
            ToolParameter::string("zipCode", "Zip").required(),
            ToolParameter::integer("days", "Days"),
            ToolParameter::string("unit", "Unit").with_enum(["c", "f"]),
            ToolParameter::boolean("detailed", "Detail"),
        ])
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_arguments() {
        let result = validate_arguments(
            &schema(),
            &args(json!({"zipCode": "92021", "days": 3, "unit": "f", "detailed": true})),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_extra_arguments_allowed() {
        let result = validate_arguments(&schema(), &args(json!({"zipCode": "1", "extra": 1})));
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate_arguments(&schema(), &Arguments::new()).unwrap_err();
        assert!(err.contains("missing required parameter `zipCode`"));

        let err = validate_arguments(&schema(), &args(json!({"zipCode": null}))).unwrap_err();
        assert!(err.contains("`zipCode`"));
    }

    #[test]
    fn test_wrong_type() {
        let err =
            validate_arguments(&schema(), &args(json!({"zipCode": 92021, "days": "3"}))).unwrap_err();
        assert!(err.contains("`zipCode` must be of type string"));
        assert!(err.contains("`days` must be of type integer"));
    }

    #[test]
    fn test_enum_violation() {
        let err =
            validate_arguments(&schema(), &args(json!({"zipCode": "1", "unit": "kelvin"}))).unwrap_err();
        assert!(err.contains("must be one of [c, f]"));
    }

    #[test]
    fn test_empty_schema_accepts_anything() {
        let empty = Parameters::default();
        assert!(validate_arguments(&empty, &Arguments::new()).is_ok());
        assert!(validate_arguments(&empty, &args(json!({"x": 1}))).is_ok());
    }
}

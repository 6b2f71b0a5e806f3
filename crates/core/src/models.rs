use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use url::Url;

use crate::DispatchError;

/// A buildable target; each one maps to its own workflow file.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Android15,
    Android16,
}

impl Variant {
    pub const fn variants() -> &'static [Self] { &[Self::Android15, Self::Android16] }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Android15 => "android15",
            Self::Android16 => "android16",
        }
    }

    pub fn workflow_file(&self) -> &'static str {
        match self {
            Self::Android15 => "android15.yml",
            Self::Android16 => "android16.yml",
        }
    }
}

impl FromStr for Variant {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "android15" => Ok(Self::Android15),
            "android16" => Ok(Self::Android16),
            _ => Err(invalid_variant()),
        }
    }
}

fn invalid_variant() -> DispatchError {
    DispatchError::invalid("Invalid version. Must be android15 or android16")
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Inputs that must be present and non-blank, in the order they are checked.
pub const REQUIRED_INPUTS: &[&str] = &[
    "api_level",
    "device_name",
    "version_name",
    "framework_url",
    "services_url",
    "miui_services_url",
];

/// Body of `POST /api/trigger-workflow`, before validation. `variant` and
/// `parameters` are accepted in place of `version` and `inputs`, but not alongside them.
#[derive(Debug, Default, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub variant: Option<Value>,
    #[serde(default)]
    pub inputs: Option<Value>,
    #[serde(default)]
    pub parameters: Option<Value>,
}

impl DispatchRequest {
    pub fn parse(body: &[u8]) -> Result<Self, DispatchError> {
        serde_json::from_slice(body).map_err(|_| DispatchError::invalid("Invalid JSON body"))
    }

    /// The requested variant, if it names a known one. Used to label log lines for
    /// requests that fail validation.
    pub fn variant_hint(&self) -> Option<Variant> {
        match self.version.as_ref().or(self.variant.as_ref())? {
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn device_hint(&self) -> Option<&str> {
        let inputs = self.inputs.as_ref().or(self.parameters.as_ref())?;
        inputs.get("device_name")?.as_str().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn validate(self) -> Result<Dispatch, DispatchError> {
        let version = either(self.version, self.variant, "version", "variant")?;
        let inputs = either(self.inputs, self.parameters, "inputs", "parameters")?;
        let version = version.filter(|v| !is_blank(v));
        let (Some(version), Some(fields)) = (version, inputs) else {
            return Err(DispatchError::invalid("Missing required fields: version and inputs"));
        };
        let variant = match &version {
            Value::String(s) => s.trim().parse()?,
            _ => return Err(invalid_variant()),
        };
        let Value::Object(fields) = fields else {
            return Err(DispatchError::invalid("Invalid inputs: expected an object"));
        };

        for &key in REQUIRED_INPUTS {
            if input_text(&fields, key)?.is_none() {
                return Err(DispatchError::invalid(format!("Missing required input: {key}")));
            }
        }
        let text = |key: &str| input_text(&fields, key).map(Option::unwrap_or_default);
        let inputs = WorkflowInputs {
            api_level: text("api_level")?,
            device_name: text("device_name")?,
            version_name: text("version_name")?,
            framework_url: text("framework_url")?,
            services_url: text("services_url")?,
            miui_services_url: text("miui_services_url")?,
            user_id: input_text(&fields, "user_id")?,
            features: Features {
                enable_signature_bypass: input_flag(&fields, "enable_signature_bypass")?,
                enable_cn_notification_fix: input_flag(&fields, "enable_cn_notification_fix")?,
                enable_disable_secure_flag: input_flag(&fields, "enable_disable_secure_flag")?,
            },
        };
        for (key, value) in [
            ("framework_url", &inputs.framework_url),
            ("services_url", &inputs.services_url),
            ("miui_services_url", &inputs.miui_services_url),
        ] {
            check_url(key, value)?;
        }
        Ok(Dispatch { variant, inputs })
    }
}

fn either(
    field: Option<Value>,
    alias: Option<Value>,
    field_name: &str,
    alias_name: &str,
) -> Result<Option<Value>, DispatchError> {
    match (field, alias) {
        (Some(_), Some(_)) => Err(DispatchError::invalid(format!(
            "Conflicting fields: {field_name} and {alias_name}"
        ))),
        (field, alias) => Ok(field.or(alias)),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Read a scalar input as trimmed text. Absent, null and blank values are `None`.
fn input_text(inputs: &Map<String, Value>, key: &str) -> Result<Option<String>, DispatchError> {
    match inputs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(DispatchError::invalid(format!("Invalid value for input: {key}"))),
    }
}

fn input_flag(inputs: &Map<String, Value>, key: &str) -> Result<Option<bool>, DispatchError> {
    match inputs.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(_) => {
            Err(DispatchError::invalid(format!("Invalid value for {key}: expected true or false")))
        }
    }
}

fn check_url(key: &str, value: &str) -> Result<(), DispatchError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(DispatchError::invalid(format!("Invalid URL for {key}"))),
    }
}

/// A validated request, ready to be sent upstream.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Dispatch {
    pub variant: Variant,
    pub inputs: WorkflowInputs,
}

/// The `inputs` object forwarded to the workflow. Optional inputs that were not
/// supplied are left out entirely.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct WorkflowInputs {
    pub api_level: String,
    pub device_name: String,
    pub version_name: String,
    pub framework_url: String,
    pub services_url: String,
    pub miui_services_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub features: Features,
}

/// Patch toggles understood by the workflows. Workflow inputs are strings, so these
/// are sent as `"true"` / `"false"`.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Features {
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "flag_string")]
    pub enable_signature_bypass: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "flag_string")]
    pub enable_cn_notification_fix: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "flag_string")]
    pub enable_disable_secure_flag: Option<bool>,
}

fn flag_string<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(true) => serializer.serialize_str("true"),
        Some(false) => serializer.serialize_str("false"),
        None => serializer.serialize_none(),
    }
}

/// Body of the workflow dispatch call.
#[derive(Debug, Serialize)]
pub struct DispatchPayload<'a> {
    #[serde(rename = "ref")]
    pub git_ref: &'a str,
    pub inputs: &'a WorkflowInputs,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Triggered {
    pub success: bool,
    pub message: String,
    pub workflow_url: String,
}

impl Triggered {
    pub fn new(workflow_url: String) -> Self {
        Self { success: true, message: "Workflow triggered successfully".to_string(), workflow_url }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn valid_inputs() -> Value {
        json!({
            "api_level": "35",
            "device_name": "X",
            "version_name": "15",
            "framework_url": "https://a",
            "services_url": "https://b",
            "miui_services_url": "https://c",
        })
    }

    fn validate(body: Value) -> Result<Dispatch, DispatchError> {
        DispatchRequest::parse(body.to_string().as_bytes())?.validate()
    }

    fn error_message(body: Value) -> String {
        match validate(body) {
            Err(DispatchError::InvalidRequest(message)) => message,
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_variant_lookup() {
        for variant in Variant::variants() {
            assert_eq!(variant.as_str().parse::<Variant>().unwrap(), *variant);
            assert_eq!(variant.workflow_file(), format!("{variant}.yml"));
        }
        assert!("android14".parse::<Variant>().is_err());
        assert!("Android15".parse::<Variant>().is_err());
    }

    #[test]
    fn test_valid_request() {
        let dispatch = validate(json!({ "version": "android15", "inputs": valid_inputs() })).unwrap();
        assert_eq!(dispatch.variant, Variant::Android15);
        assert_eq!(dispatch.inputs.device_name, "X");
        assert_eq!(dispatch.inputs.user_id, None);
        assert_eq!(serde_json::to_value(&dispatch.inputs).unwrap(), valid_inputs());
    }

    #[test]
    fn test_variant_parameters_aliases() {
        let dispatch =
            validate(json!({ "variant": "android16", "parameters": valid_inputs() })).unwrap();
        assert_eq!(dispatch.variant, Variant::Android16);
    }

    #[test]
    fn test_conflicting_aliases() {
        let message = error_message(
            json!({ "version": "android15", "variant": "android16", "inputs": valid_inputs() }),
        );
        assert_eq!(message, "Conflicting fields: version and variant");
        let message = error_message(
            json!({ "version": "android15", "inputs": valid_inputs(), "parameters": {} }),
        );
        assert_eq!(message, "Conflicting fields: inputs and parameters");
    }

    #[test]
    fn test_log_hints() {
        let mut inputs = valid_inputs();
        inputs.as_object_mut().unwrap().remove("api_level");
        let request = DispatchRequest::parse(
            json!({ "variant": " android16 ", "parameters": inputs }).to_string().as_bytes(),
        )
        .unwrap();
        assert_eq!(request.variant_hint(), Some(Variant::Android16));
        assert_eq!(request.device_hint(), Some("X"));

        let request = DispatchRequest::parse(b"{\"version\": \"android9\"}").unwrap();
        assert_eq!(request.variant_hint(), None);
        assert_eq!(request.device_hint(), None);
    }

    #[test]
    fn test_missing_fields() {
        let cases = [
            json!({}),
            json!({ "version": "android15" }),
            json!({ "inputs": valid_inputs() }),
            json!({ "version": "", "inputs": valid_inputs() }),
            json!({ "version": "android15", "inputs": null }),
        ];
        for body in cases {
            assert_eq!(error_message(body), "Missing required fields: version and inputs");
        }
    }

    #[test]
    fn test_invalid_variant() {
        for version in [json!("android14"), json!("ANDROID15"), json!(15), json!(["android15"])] {
            let message = error_message(json!({ "version": version, "inputs": valid_inputs() }));
            assert!(message.starts_with("Invalid version"), "{message}");
        }
    }

    #[test]
    fn test_first_missing_key_is_named() {
        for (index, &key) in REQUIRED_INPUTS.iter().enumerate() {
            let mut inputs = valid_inputs();
            // Remove this key and every key after it; the first one should be reported
            for later in &REQUIRED_INPUTS[index..] {
                inputs.as_object_mut().unwrap().remove(*later);
            }
            let message = error_message(json!({ "version": "android15", "inputs": inputs }));
            assert_eq!(message, format!("Missing required input: {key}"));
        }
    }

    #[test]
    fn test_blank_required_value_is_missing() {
        let mut inputs = valid_inputs();
        inputs["version_name"] = json!("   ");
        let message = error_message(json!({ "version": "android15", "inputs": inputs }));
        assert_eq!(message, "Missing required input: version_name");
    }

    #[test]
    fn test_invalid_urls() {
        let cases = [
            ("framework_url", "not a url"),
            ("services_url", "ftp://example.com/services.jar"),
            ("miui_services_url", "file:///tmp/miui-services.jar"),
        ];
        for (key, value) in cases {
            let mut inputs = valid_inputs();
            inputs[key] = json!(value);
            let message = error_message(json!({ "version": "android15", "inputs": inputs }));
            assert_eq!(message, format!("Invalid URL for {key}"));
        }
    }

    #[test]
    fn test_user_id() {
        for blank in [json!(""), json!("  \t"), Value::Null] {
            let mut inputs = valid_inputs();
            inputs["user_id"] = blank;
            let dispatch = validate(json!({ "version": "android15", "inputs": inputs })).unwrap();
            let forwarded = serde_json::to_value(&dispatch.inputs).unwrap();
            assert!(forwarded.get("user_id").is_none());
        }

        let mut inputs = valid_inputs();
        inputs["user_id"] = json!(" 12345 ");
        let dispatch = validate(json!({ "version": "android15", "inputs": inputs })).unwrap();
        assert_eq!(serde_json::to_value(&dispatch.inputs).unwrap()["user_id"], "12345");
    }

    #[test]
    fn test_scalar_inputs_are_stringified() {
        let mut inputs = valid_inputs();
        inputs["api_level"] = json!(36);
        let dispatch = validate(json!({ "version": "android16", "inputs": inputs })).unwrap();
        assert_eq!(dispatch.inputs.api_level, "36");

        let mut inputs = valid_inputs();
        inputs["device_name"] = json!({ "name": "X" });
        let message = error_message(json!({ "version": "android16", "inputs": inputs }));
        assert_eq!(message, "Invalid value for input: device_name");
    }

    #[test]
    fn test_feature_flags() {
        let mut inputs = valid_inputs();
        inputs["enable_signature_bypass"] = json!(true);
        inputs["enable_cn_notification_fix"] = json!("FALSE");
        inputs["unrelated"] = json!("ignored");
        let dispatch = validate(json!({ "version": "android15", "inputs": inputs })).unwrap();
        let forwarded = serde_json::to_value(&dispatch.inputs).unwrap();
        assert_eq!(forwarded["enable_signature_bypass"], "true");
        assert_eq!(forwarded["enable_cn_notification_fix"], "false");
        assert!(forwarded.get("enable_disable_secure_flag").is_none());
        assert!(forwarded.get("unrelated").is_none());

        let mut inputs = valid_inputs();
        inputs["enable_disable_secure_flag"] = json!("yes");
        let message = error_message(json!({ "version": "android15", "inputs": inputs }));
        assert!(message.starts_with("Invalid value for enable_disable_secure_flag"));
    }

    #[test]
    fn test_malformed_body() {
        for body in ["{", "\"android15\"", "", "null"] {
            let err = DispatchRequest::parse(body.as_bytes()).unwrap_err();
            assert_eq!(err.to_string(), "Invalid JSON body");
        }
    }

    #[test]
    fn test_payload_shape() {
        let dispatch = validate(json!({ "version": "android15", "inputs": valid_inputs() })).unwrap();
        let payload = DispatchPayload { git_ref: "master", inputs: &dispatch.inputs };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({ "ref": "master", "inputs": valid_inputs() })
        );
    }
}

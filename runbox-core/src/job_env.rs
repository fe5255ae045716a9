//! Job environment contract
//!
//! The scheduler injects these variables into the job container and the
//! worker reads them back. They are the worker's only input besides the
//! artifacts they point at.

use std::time::Duration;
use uuid::Uuid;

/// Header carrying the shared-secret callback token
pub const EXECUTION_TOKEN_HEADER: &str = "x-execution-token";

pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const AWS_REGION: &str = "AWS_REGION";
pub const S3_BUCKET_NAME: &str = "S3_BUCKET_NAME";
pub const AWS_S3_ENDPOINT: &str = "AWS_S3_ENDPOINT";
pub const AWS_S3_FORCE_PATH_STYLE: &str = "AWS_S3_FORCE_PATH_STYLE";
pub const CODE_KEY: &str = "CODE_KEY";
pub const REQUIREMENTS_KEY: &str = "REQUIREMENTS_KEY";
pub const INPUT_KEY: &str = "INPUT_KEY";
pub const OUTPUT_KEY: &str = "OUTPUT_KEY";
pub const EXECUTION_ID: &str = "EXECUTION_ID";
pub const USER_ID: &str = "USER_ID";
pub const EXECUTION_CALLBACK_URL: &str = "EXECUTION_CALLBACK_URL";
pub const EXECUTION_UPDATE_TOKEN: &str = "EXECUTION_UPDATE_TOKEN";
pub const EXECUTION_TIMEOUT_SECS: &str = "EXECUTION_TIMEOUT_SECS";

/// Errors reading the job environment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Object store credentials handed to the worker
#[derive(Clone, PartialEq, Eq)]
pub struct StoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Typed form of the variables a job container receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEnvironment {
    pub credentials: StoreCredentials,
    pub region: String,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub code_key: String,
    pub requirements_key: Option<String>,
    pub input_key: Option<String>,
    pub output_key: String,
    pub execution_id: Uuid,
    pub user_id: String,
    pub callback_url: String,
    pub callback_token: String,
    pub timeout: Option<Duration>,
}

impl JobEnvironment {
    /// Renders the contract as `(name, value)` pairs in a stable order
    pub fn to_vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(&str, String)> = vec![
            (AWS_ACCESS_KEY_ID, self.credentials.access_key_id.clone()),
            (AWS_SECRET_ACCESS_KEY, self.credentials.secret_access_key.clone()),
        ];

        if let Some(token) = &self.credentials.session_token {
            vars.push((AWS_SESSION_TOKEN, token.clone()));
        }

        vars.extend([
            (AWS_REGION, self.region.clone()),
            (S3_BUCKET_NAME, self.bucket.clone()),
        ]);

        if let Some(endpoint) = &self.endpoint {
            vars.push((AWS_S3_ENDPOINT, endpoint.clone()));
        }
        if self.force_path_style {
            vars.push((AWS_S3_FORCE_PATH_STYLE, "true".to_string()));
        }

        vars.extend([
            (CODE_KEY, self.code_key.clone()),
            (OUTPUT_KEY, self.output_key.clone()),
            (EXECUTION_ID, self.execution_id.to_string()),
            (USER_ID, self.user_id.clone()),
            (EXECUTION_CALLBACK_URL, self.callback_url.clone()),
            (EXECUTION_UPDATE_TOKEN, self.callback_token.clone()),
        ]);

        if let Some(key) = &self.requirements_key {
            vars.push((REQUIREMENTS_KEY, key.clone()));
        }
        if let Some(key) = &self.input_key {
            vars.push((INPUT_KEY, key.clone()));
        }
        if let Some(timeout) = self.timeout {
            vars.push((EXECUTION_TIMEOUT_SECS, timeout.as_secs().to_string()));
        }

        vars.into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    /// Reads the contract from the process environment
    pub fn from_env() -> Result<Self, EnvError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the contract through an arbitrary lookup function
    ///
    /// Empty values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(EnvError::Missing(name));

        let execution_id = required(EXECUTION_ID)?;
        let execution_id = Uuid::parse_str(&execution_id).map_err(|e| EnvError::Invalid {
            name: EXECUTION_ID,
            reason: e.to_string(),
        })?;

        let timeout = match optional(EXECUTION_TIMEOUT_SECS) {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| EnvError::Invalid {
                    name: EXECUTION_TIMEOUT_SECS,
                    reason: e.to_string(),
                })?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            credentials: StoreCredentials {
                access_key_id: required(AWS_ACCESS_KEY_ID)?,
                secret_access_key: required(AWS_SECRET_ACCESS_KEY)?,
                session_token: optional(AWS_SESSION_TOKEN),
            },
            region: required(AWS_REGION)?,
            bucket: required(S3_BUCKET_NAME)?,
            endpoint: optional(AWS_S3_ENDPOINT),
            force_path_style: optional(AWS_S3_FORCE_PATH_STYLE)
                .is_some_and(|value| value.eq_ignore_ascii_case("true")),
            code_key: required(CODE_KEY)?,
            requirements_key: optional(REQUIREMENTS_KEY),
            input_key: optional(INPUT_KEY),
            output_key: required(OUTPUT_KEY)?,
            execution_id,
            user_id: required(USER_ID)?,
            callback_url: required(EXECUTION_CALLBACK_URL)?,
            callback_token: required(EXECUTION_UPDATE_TOKEN)?,
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample() -> JobEnvironment {
        JobEnvironment {
            credentials: StoreCredentials {
                access_key_id: "AKIA".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: None,
            },
            region: "us-east-2".to_string(),
            bucket: "runbox".to_string(),
            endpoint: None,
            force_path_style: false,
            code_key: "executions/1/main.py".to_string(),
            requirements_key: None,
            input_key: Some("uploads/input.zip".to_string()),
            output_key: "executions/1/output.zip".to_string(),
            execution_id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            callback_url: "http://orchestrator/api/executions".to_string(),
            callback_token: "token".to_string(),
            timeout: None,
        }
    }

    #[test]
    fn test_vars_survive_a_trip_through_the_container() {
        let env = sample();
        let vars: HashMap<String, String> = env.to_vars().into_iter().collect();

        assert!(!vars.contains_key(REQUIREMENTS_KEY));
        assert!(!vars.contains_key(AWS_SESSION_TOKEN));
        assert_eq!(vars[INPUT_KEY], "uploads/input.zip");

        let parsed = JobEnvironment::from_lookup(|name| vars.get(name).cloned()).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn test_missing_required_variable() {
        let mut vars: HashMap<String, String> = sample().to_vars().into_iter().collect();
        vars.remove(EXECUTION_CALLBACK_URL);

        let err = JobEnvironment::from_lookup(|name| vars.get(name).cloned()).unwrap_err();
        assert_eq!(err, EnvError::Missing(EXECUTION_CALLBACK_URL));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut vars: HashMap<String, String> = sample().to_vars().into_iter().collect();
        vars.insert(CODE_KEY.to_string(), "  ".to_string());

        let err = JobEnvironment::from_lookup(|name| vars.get(name).cloned()).unwrap_err();
        assert_eq!(err, EnvError::Missing(CODE_KEY));
    }

    #[test]
    fn test_invalid_execution_id_and_timeout() {
        let mut vars: HashMap<String, String> = sample().to_vars().into_iter().collect();
        vars.insert(EXECUTION_ID.to_string(), "not-a-uuid".to_string());
        assert!(matches!(
            JobEnvironment::from_lookup(|name| vars.get(name).cloned()),
            Err(EnvError::Invalid { name: EXECUTION_ID, .. })
        ));

        let mut vars: HashMap<String, String> = sample().to_vars().into_iter().collect();
        vars.insert(EXECUTION_TIMEOUT_SECS.to_string(), "soon".to_string());
        assert!(matches!(
            JobEnvironment::from_lookup(|name| vars.get(name).cloned()),
            Err(EnvError::Invalid { name: EXECUTION_TIMEOUT_SECS, .. })
        ));
    }

    #[test]
    fn test_timeout_and_path_style() {
        let env = JobEnvironment {
            timeout: Some(Duration::from_secs(90)),
            force_path_style: true,
            endpoint: Some("http://minio:9000".to_string()),
            ..sample()
        };
        let vars: HashMap<String, String> = env.to_vars().into_iter().collect();
        assert_eq!(vars[EXECUTION_TIMEOUT_SECS], "90");
        assert_eq!(vars[AWS_S3_FORCE_PATH_STYLE], "true");

        let parsed = JobEnvironment::from_lookup(|name| vars.get(name).cloned()).unwrap();
        assert_eq!(parsed.timeout, Some(Duration::from_secs(90)));
        assert!(parsed.force_path_style);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}

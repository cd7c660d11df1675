use std::fmt;

use serde::Deserialize;
use snafu::{OptionExt, Snafu};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display(
        "cannot get secretId/Key, your account could be sub-account and does not have the access to use SLS_QcsRole, please make sure the role exists first and is bound to your account"
    ))]
    MissingSecret,

    #[snafu(display("temporary credentials are malformed: {field} is missing"))]
    Malformed { field: &'static str },
}

/// Temporary secrets as handed out by the platform for an assumed role.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TemporarySecrets {
    #[serde(rename = "TmpSecretId")]
    pub tmp_secret_id: Option<String>,

    #[serde(rename = "TmpSecretKey")]
    pub tmp_secret_key: Option<String>,

    #[serde(rename = "Token")]
    pub token: Option<String>,

    #[serde(rename = "appId")]
    pub app_id: Option<String>,
}

impl fmt::Debug for TemporarySecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporarySecrets")
            .field("tmp_secret_id", &self.tmp_secret_id)
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

/// Validated credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub secret_id: String,
    pub secret_key: String,
    pub token: Option<String>,

    /// Suffixed to bucket names, which are unique per account.
    pub app_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl TryFrom<&TemporarySecrets> for Credentials {
    type Error = Error;

    fn try_from(secrets: &TemporarySecrets) -> Result<Self, Self::Error> {
        let non_empty = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());

        let secret_id = non_empty(&secrets.tmp_secret_id).context(MissingSecretSnafu)?;
        let secret_key = non_empty(&secrets.tmp_secret_key).context(MalformedSnafu {
            field: "TmpSecretKey",
        })?;
        let app_id = non_empty(&secrets.app_id).context(MalformedSnafu { field: "appId" })?;

        Ok(Self {
            secret_id,
            secret_key,
            token: non_empty(&secrets.token),
            app_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn secrets() -> TemporarySecrets {
        serde_json::from_str(
            r#"{"TmpSecretId": "AKID", "TmpSecretKey": "secret", "Token": "token", "appId": "1250000000"}"#,
        )
        .expect("secrets parse")
    }

    #[test]
    fn validates_complete_secrets() {
        let credentials = Credentials::try_from(&secrets()).expect("secrets are complete");

        assert_eq!(credentials.secret_id, "AKID");
        assert_eq!(credentials.app_id, "1250000000");
        assert_eq!(credentials.token.as_deref(), Some("token"));
    }

    #[rstest]
    #[case::no_id(TemporarySecrets { tmp_secret_id: None, ..secrets() }, Error::MissingSecret)]
    #[case::empty_id(
        TemporarySecrets { tmp_secret_id: Some(String::new()), ..secrets() },
        Error::MissingSecret
    )]
    #[case::no_key(
        TemporarySecrets { tmp_secret_key: None, ..secrets() },
        Error::Malformed { field: "TmpSecretKey" }
    )]
    #[case::no_app_id(
        TemporarySecrets { app_id: None, ..secrets() },
        Error::Malformed { field: "appId" }
    )]
    fn rejects_incomplete_secrets(#[case] secrets: TemporarySecrets, #[case] expected: Error) {
        assert_eq!(Credentials::try_from(&secrets), Err(expected));
    }

    #[test]
    fn debug_hides_secret_key() {
        let credentials = Credentials::try_from(&secrets()).expect("secrets are complete");

        assert!(!format!("{credentials:?}").contains("\"secret\""));
        assert!(!format!("{:?}", secrets()).contains("\"secret\""));
    }
}

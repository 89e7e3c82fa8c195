use crate::{Error, ProjectId};

/// What the composition root needs to reach the backend
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub project_id: ProjectId,
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "backend url {:?} is not an http(s) url",
                self.url
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(Error::InvalidConfig(String::from("anonymous key is empty")));
        }
        Ok(())
    }

    /// Endpoint identity, used to share one client per backend
    pub fn endpoint(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str, anon_key: &str) -> BackendConfig {
        BackendConfig {
            url: url.to_string(),
            anon_key: anon_key.to_string(),
            project_id: ProjectId::stub(),
        }
    }

    #[test]
    fn validation() {
        assert_eq!(config("https://example.org", "key").validate(), Ok(()));
        assert!(matches!(
            config("example.org", "key").validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            config("http://localhost:54321", " ").validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        assert_eq!(
            config("https://example.org/", "k").endpoint(),
            config("https://example.org", "k").endpoint(),
        );
    }
}

use std::{fmt, str::FromStr};

use crate::{Uuid, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn stub() -> ProjectId {
        ProjectId(STUB_UUID)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ProjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<ProjectId, uuid::Error> {
        Uuid::try_parse(s).map(ProjectId)
    }
}

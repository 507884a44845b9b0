use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::ids::{ParameterId, ProjectId};
use crate::error::{CoreError, Result};

/// How lenient the judge should be for a parameter: 0 is strict, 1 lenient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tolerance(f64);

impl Tolerance {
    pub const STRICT: Tolerance = Tolerance(0.0);
    pub const LENIENT: Tolerance = Tolerance(1.0);

    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::validation(format!(
                "tolerance must be between 0 and 1, got {}",
                value
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance(0.5)
    }
}

impl FromStr for Tolerance {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CoreError::validation("tolerance is required"));
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| CoreError::validation(format!("tolerance is not a number: {:?}", s)))?;
        Tolerance::new(value)
    }
}

impl TryFrom<f64> for Tolerance {
    type Error = CoreError;

    fn try_from(value: f64) -> Result<Self> {
        Tolerance::new(value)
    }
}

impl From<Tolerance> for f64 {
    fn from(t: Tolerance) -> Self {
        t.0
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Parameter {
    pub id: ParameterId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tolerance: Tolerance,
    pub project_id: ProjectId,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating or editing a parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct NewParameter {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: String,
    pub tolerance: Tolerance,
    pub project_id: ProjectId,
}

impl NewParameter {
    /// Builds a parameter from raw user input. The tolerance text is parsed
    /// here so a bad value never reaches the backend.
    pub fn parse(
        project_id: ProjectId,
        name: impl Into<String>,
        description: impl Into<String>,
        tolerance: &str,
    ) -> Result<Self> {
        let param = Self {
            name: name.into().trim().to_string(),
            description: description.into(),
            tolerance: tolerance.parse()?,
            project_id,
        };
        param.validate()?;
        Ok(param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("0" => true)]
    #[test_case("1" => true)]
    #[test_case("0.35" => true)]
    #[test_case(" 0.5 " => true)]
    #[test_case("abc" => false)]
    #[test_case("-0.1" => false)]
    #[test_case("1.5" => false)]
    #[test_case("" => false)]
    #[test_case("NaN" => false)]
    #[test_case("inf" => false)]
    fn tolerance_parsing(input: &str) -> bool {
        input.parse::<Tolerance>().is_ok()
    }

    #[test]
    fn tolerance_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Tolerance>("0.7").is_ok());
        assert!(serde_json::from_str::<Tolerance>("1.2").is_err());
    }

    #[test]
    fn new_parameter_requires_name() {
        let err = NewParameter::parse(ProjectId::new(), "  ", "desc", "0.5").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn new_parameter_parses_tolerance() {
        let p = NewParameter::parse(ProjectId::new(), "Accuracy", "Is it correct", "0.25").unwrap();
        assert_eq!(p.tolerance.value(), 0.25);
    }
}

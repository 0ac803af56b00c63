use crate::error::CoTeacherError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subject area the assistant focuses on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subject {
    #[default]
    General,
    Mathematics,
    Science,
    Accountancy,
    SocialStudies,
    ForeignLanguages,
    Arts,
    PhysicalEducation,
    SpecialEducation,
}

impl Subject {
    pub const ALL: [Subject; 9] = [
        Subject::General,
        Subject::Mathematics,
        Subject::Science,
        Subject::Accountancy,
        Subject::SocialStudies,
        Subject::ForeignLanguages,
        Subject::Arts,
        Subject::PhysicalEducation,
        Subject::SpecialEducation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Mathematics => "Mathematics",
            Self::Science => "Science",
            Self::Accountancy => "Accountancy",
            Self::SocialStudies => "Social Studies",
            Self::ForeignLanguages => "Foreign Languages",
            Self::Arts => "Arts",
            Self::PhysicalEducation => "Physical Education",
            Self::SpecialEducation => "Special Education",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// "social_studies", "Social-Studies" and "social studies" all compare equal.
fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| if c == '-' || c == '_' { ' ' } else { c.to_ascii_lowercase() })
        .collect()
}

impl FromStr for Subject {
    type Err = CoTeacherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|subject| subject.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| CoTeacherError::InvalidInput(format!("unknown subject: {s}")))
    }
}

/// How much detail replies should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    Concise,
    #[default]
    Balanced,
    Detailed,
}

impl ResponseStyle {
    pub const ALL: [ResponseStyle; 3] = [Self::Concise, Self::Balanced, Self::Detailed];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Concise => "Concise",
            Self::Balanced => "Balanced",
            Self::Detailed => "Detailed",
        }
    }
}

impl fmt::Display for ResponseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResponseStyle {
    type Err = CoTeacherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|style| style.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| CoTeacherError::InvalidInput(format!("unknown response style: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_parses_display_name_and_aliases() {
        assert_eq!("Social Studies".parse::<Subject>().unwrap(), Subject::SocialStudies);
        assert_eq!("social_studies".parse::<Subject>().unwrap(), Subject::SocialStudies);
        assert_eq!("PHYSICAL-EDUCATION".parse::<Subject>().unwrap(), Subject::PhysicalEducation);
        assert!("Astrology".parse::<Subject>().is_err());
    }

    #[test]
    fn every_subject_round_trips_through_its_name() {
        for subject in Subject::ALL {
            assert_eq!(subject.name().parse::<Subject>().unwrap(), subject);
        }
    }

    #[test]
    fn style_defaults_to_balanced() {
        assert_eq!(ResponseStyle::default(), ResponseStyle::Balanced);
        assert_eq!(" detailed ".parse::<ResponseStyle>().unwrap(), ResponseStyle::Detailed);
        assert!("verbose".parse::<ResponseStyle>().is_err());
    }
}

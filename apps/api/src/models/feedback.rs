use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsTip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedTip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsSection {
    pub score: u32,
    #[serde(default)]
    pub tips: Vec<AtsTip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSection {
    pub score: u32,
    #[serde(default)]
    pub tips: Vec<DetailedTip>,
}

/// AI analysis of a resume against one job posting. Scores are 0–100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: u32,
    #[serde(rename = "ATS")]
    pub ats: AtsSection,
    pub tone_and_style: FeedbackSection,
    pub content: FeedbackSection,
    pub structure: FeedbackSection,
    pub skills: FeedbackSection,
}

/// Colour band of an ATS score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AtsBand {
    Good,
    Warning,
    Bad,
}

impl AtsBand {
    pub fn for_score(score: u32) -> Self {
        if score > 69 {
            AtsBand::Good
        } else if score > 49 {
            AtsBand::Warning
        } else {
            AtsBand::Bad
        }
    }
}

/// Badge band of an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallBand {
    Strong,
    Moderate,
    Weak,
}

impl OverallBand {
    pub fn for_score(score: u32) -> Self {
        if score >= 80 {
            OverallBand::Strong
        } else if score >= 60 {
            OverallBand::Moderate
        } else {
            OverallBand::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBands {
    pub overall: OverallBand,
    pub ats: AtsBand,
}

impl Feedback {
    pub fn bands(&self) -> ScoreBands {
        ScoreBands {
            overall: OverallBand::for_score(self.overall_score),
            ats: AtsBand::for_score(self.ats.score),
        }
    }
}

/// Shape the model must return. Mirrors `models::feedback::Feedback`.
pub const FEEDBACK_RESPONSE_FORMAT: &str = r#"{
  "overallScore": number (0-100),
  "ATS": {
    "score": number (0-100),
    "tips": [{ "type": "good" | "improve", "tip": string }]
  },
  "toneAndStyle": {
    "score": number (0-100),
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  },
  "content": { same shape as toneAndStyle },
  "structure": { same shape as toneAndStyle },
  "skills": { same shape as toneAndStyle }
}"#;

pub const FEEDBACK_PROMPT: &str = "\
You are an expert in ATS (Applicant Tracking System) and resume analysis. \
Analyze the attached resume and rate it against the job below. \
Be thorough and honest: if the resume is weak, give low scores. \
Give 3-4 tips per section, mixing strengths (\"good\") and fixes (\"improve\").

Job title: {job_title}
Job description: {job_description}

Return the analysis as a JSON object with exactly this format:
{format}

Return ONLY the JSON object, without any other text or backticks.";

/// Builds the analysis instructions for one job posting.
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    FEEDBACK_PROMPT
        .replace("{job_title}", job_title.trim())
        .replace("{job_description}", job_description.trim())
        .replace("{format}", FEEDBACK_RESPONSE_FORMAT)
}

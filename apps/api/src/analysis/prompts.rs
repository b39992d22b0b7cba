// All LLM prompt constants for the Analysis module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Role half of the analysis system prompt; `JSON_ONLY_SYSTEM` is appended.
pub const ANALYZE_SYSTEM: &str = "You are an expert resume analyzer. \
    Analyze resumes and provide detailed feedback on format, content, and ATS optimization.";

/// Resume analysis prompt template. Replace `{score_instruction}` and `{resume_text}`.
pub const ANALYZE_PROMPT_TEMPLATE: &str = r#"Analyze this resume and provide detailed feedback on format, content, and ATS optimization. Return the analysis in JSON format with the following structure:
{
  "personalInfo": {
    "name": "string",
    "email": "string",
    "linkedin": "string (optional)"
  },
  "workExperience": {
    "roles": ["string"],
    "achievements": ["string"],
    "impact": ["string"]
  },
  "education": {
    "degrees": ["string"],
    "certifications": ["string"]
  },
  "skills": ["string"],
  "atsScore": number,
  "readabilityScore": number,
  "suggestions": {
    "strengths": ["string"],
    "weaknesses": ["string"],
    "improvements": ["string"]
  }
}

{score_instruction}

Resume text: {resume_text}"#;

/// Role half of the matching system prompt; `JSON_ONLY_SYSTEM` is appended.
pub const MATCH_SYSTEM: &str = "Compare the resume with the job description and provide \
    a match percentage, matching skills, missing skills, and suggestions for improvement.";

/// Job match prompt template.
/// Replace: {score_instruction}, {resume_text}, {job_description}
pub const MATCH_PROMPT_TEMPLATE: &str = r#"Compare this resume with the job description and provide a detailed analysis in JSON format with the following structure:
{
  "percentage": number,
  "matchingSkills": ["string"],
  "missingSkills": ["string"],
  "suggestions": ["string"]
}

{score_instruction}
A skill must never appear in both "matchingSkills" and "missingSkills".

Resume: {resume_text}

Job Description: {job_description}"#;

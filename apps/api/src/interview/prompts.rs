// All model prompts for the interview flow.
// Cross-cutting fragments come from llm_client::prompts.

/// System prompt for job extraction: enforces JSON-only output.
pub const JOB_EXTRACTION_SYSTEM: &str = "You are a concise resume-building assistant. \
    Extract key role info and required skills from a job posting. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Job extraction prompt. Replace `{job_text}` before sending.
pub const JOB_EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract the requirements of the following job posting.

Return a JSON object with this EXACT schema (no extra fields):
{
  "role": "Full Stack Developer",
  "must_have": ["React", "Node.js"],
  "nice_to_have": ["Docker"],
  "responsibilities": "Build and maintain web applications; integrate systems."
}

Rules:
- must_have: the top 6 explicit requirements, most important first, short skill names.
- nice_to_have: the top 4 preferred / bonus / "a plus" items.
- Keep skill names as they appear in the posting. Do not translate them.
- responsibilities: one short sentence or a semicolon-separated list.

JOB POSTING:
{job_text}
"#;

/// Role sentence for the answer interpreter; JSON rules are appended at call time.
pub const ANSWER_INTERPRETATION_ROLE: &str = "You are a precise interviewer's assistant. \
    You map a candidate's free-form answers onto the exact fields that were asked for.";

/// Answer interpretation prompt. Replace `{requested}` and `{answer_text}` before sending.
pub const ANSWER_INTERPRETATION_PROMPT_TEMPLATE: &str = r#"The candidate was asked for the following items:
{requested}

Map the candidate's answer onto those items and return a JSON object using ONLY these keys
(omit every key the answer does not address):
{
  "phone": "string",
  "state": "string",
  "city": "string",
  "neighborhood": "string",
  "education": [{"institution": "string", "degree": "string", "field": "string", "year": "string"}],
  "certifications": [{"name": "string", "issuer": "string", "year": "string"}],
  "languages": [{"language": "string", "proficiency": "string"}],
  "experience": [{"title": "string", "company": "string", "duration": "string", "technologies": ["string"], "description": "string"}],
  "skills": [{"skill": "exact skill name as asked", "experience_text": "string", "level": "beginner|intermediate|advanced|expert"}]
}

Rules:
- Only include keys for items in the list above.
- Use the skill names exactly as they were asked.
- "level" is optional; omit it if the candidate did not give one.
- If the candidate says they have no experience with a skill, report that in experience_text.

CANDIDATE ANSWER:
{answer_text}
"#;

/// System prompt for the fit narrative (plain text, not JSON).
pub const NARRATIVE_SYSTEM: &str = "You are a concise career advisor. \
    Write in a formal tone. Respond with plain prose only: no lists, no headings, no markdown.";

/// Narrative prompt. Replace `{role}`, `{covered_must}`, `{uncovered_must}`,
/// `{covered_nice}`, `{uncovered_nice}` and `{completeness}` before sending.
pub const NARRATIVE_PROMPT_TEMPLATE: &str = r#"Write a 3 to 5 sentence fit summary for a candidate applying to the role "{role}".

Must-have skills the candidate has: {covered_must}
Must-have skills the candidate lacks: {uncovered_must}
Nice-to-have skills the candidate has: {covered_nice}
Nice-to-have skills the candidate lacks: {uncovered_nice}
Profile completeness: {completeness}%

Only mention the skills listed above. Do not invent experience.
"#;

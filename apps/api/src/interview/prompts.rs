// Interview LLM prompt templates.
// All prompts for question generation, evaluation and coaching are defined here.

use crate::llm_client::prompts::EVALUATION_FORMAT;
use crate::models::QuestionType;

/// Optional free text the candidate supplies to personalize a run.
#[derive(Debug, Clone, Default)]
pub struct CandidateContext {
    pub resume: Option<String>,
    pub job_description: Option<String>,
    pub candidate_analysis: Option<String>,
}

impl CandidateContext {
    pub fn is_empty(&self) -> bool {
        [&self.resume, &self.job_description, &self.candidate_analysis]
            .iter()
            .all(|f| f.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

pub const QUESTION_TEMPLATE: &str = r#"You are an expert interviewer specializing in {type_label} questions. Generate {count} high-quality {type_label} interview questions for the subject "{subject}".

{type_guidance}
{context_section}
PERSONALIZATION GUIDELINES:
- Reference specific skills, technologies, or experiences mentioned in the candidate's background
- Align questions with the job requirements and responsibilities
- Consider the candidate's experience level and self-identified areas of focus

Return ONLY a valid JSON object with this exact structure:
{
  "questions": [
    {"id": "1", "question": "Your {type_label} question here", "type": "{type}", "category": "{subject}"},
    {"id": "2", "question": "Your {type_label} question here", "type": "{type}", "category": "{subject}"}
  ]
}

Do NOT include any other text, formatting, or explanations. Only return the JSON object."#;

pub const EVALUATION_TEMPLATE: &str = r#"You are evaluating a {type_label} interview response. Assess the candidate's answer based on the following criteria:

**Evaluation Criteria:**
{criteria}

**Scoring Guide:**
{scoring}

"#;

const BEHAVIORAL_GUIDANCE: &str = "\
Behavioral questions should:
- Ask about specific past experiences and situations
- Use the STAR method framework (Situation, Task, Action, Result)
- Focus on soft skills, teamwork, problem-solving, and leadership
- Encourage detailed storytelling about roles, actions, outcomes and lessons learned";

const TECHNICAL_GUIDANCE: &str = "\
IMPORTANT: These must be TECHNICAL questions, NOT behavioral questions. Do NOT ask about past experiences, teamwork, or personal situations.

Technical questions should:
- Test theoretical knowledge and understanding of concepts
- Ask for explanations, comparisons of approaches, and trade-offs
- Cover fundamental principles as well as advanced topics
- Include design or problem-solving scenarios where appropriate";

const SITUATIONAL_GUIDANCE: &str = "\
Situational questions should:
- Present hypothetical scenarios and challenges relevant to the subject
- Test decision-making, prioritization, and planning
- Require the candidate to weigh multiple perspectives and stakeholders
- Reflect the real work environment described in the job description when available";

const CODING_GUIDANCE: &str = "\
Coding questions should:
- Ask the candidate to write actual code or pseudocode
- Cover algorithms, data structures, debugging, and optimization
- Be solvable within 15-20 minutes and state inputs and expected outputs
- Use the programming languages and frameworks from the candidate's background when known";

const SQL_GUIDANCE: &str = "\
SQL query writing questions should:
- Describe a small schema (tables and relevant columns) inline in the question
- Ask for a specific query: joins, aggregation, window functions, subqueries, or CTEs
- State the expected result shape and any edge cases (NULLs, ties, duplicates)
- Range from straightforward filtering to multi-step analytical queries";

const PYTHON_DS_GUIDANCE: &str = "\
Python data science questions should:
- Ask for Python code using pandas, NumPy, or scikit-learn
- Cover data cleaning, feature engineering, aggregation, and model evaluation
- Describe the input data (columns, types, sample rows) inside the question
- Include at least one question on statistical reasoning or metric choice";

const BEHAVIORAL_CRITERIA: &str = "\
- **STAR Method Usage**: Does the response follow Situation, Task, Action, Result structure?
- **Specificity**: Are concrete examples and details provided?
- **Relevance**: Does the answer directly address the question?
- **Impact**: Are outcomes and results clearly stated?
- **Learning**: Does the candidate show reflection and growth?";

const TECHNICAL_CRITERIA: &str = "\
- **Technical Accuracy**: Is the information correct and up-to-date?
- **Depth of Knowledge**: Does the response show comprehensive understanding?
- **Problem-Solving**: Is there clear logical reasoning and approach?
- **Communication**: Can complex concepts be explained clearly?
- **Practical Application**: Does the answer show real-world understanding?";

const SITUATIONAL_CRITERIA: &str = "\
- **Problem Analysis**: Does the response show thorough understanding of the situation?
- **Strategic Thinking**: Is there evidence of a systematic approach and planning?
- **Decision Quality**: Are the proposed actions logical and well-reasoned?
- **Stakeholder Consideration**: Are multiple perspectives and impacts considered?
- **Practicality**: Are the proposed solutions realistic and implementable?";

const CODING_CRITERIA: &str = "\
- **Correctness**: Does the solution work for the given problem and its edge cases?
- **Code Quality**: Is the code well-structured and readable?
- **Efficiency**: Are time and space complexity reasonable and discussed?
- **Problem Understanding**: Does the candidate clarify requirements?
- **Communication**: Is the approach explained clearly?";

const SQL_CRITERIA: &str = "\
- **Correctness**: Does the query return exactly the requested result?
- **Edge Cases**: Are NULLs, duplicates, and ties handled?
- **Query Design**: Are joins, grouping, and window functions used appropriately?
- **Performance Awareness**: Does the candidate consider indexes and query cost?
- **Readability**: Is the query formatted and aliased clearly?";

const PYTHON_DS_CRITERIA: &str = "\
- **Correctness**: Does the code produce the intended transformation or model?
- **Library Fluency**: Are pandas / NumPy / scikit-learn used idiomatically?
- **Data Handling**: Are missing values, types, and leakage handled?
- **Statistical Reasoning**: Are metric and method choices justified?
- **Communication**: Are results and assumptions explained clearly?";

const SCORING_GUIDE: &str = "\
- 90-100: Excellent on every criterion, specific and complete
- 80-89: Good on most criteria with minor gaps
- 70-79: Adequate, but general or missing some criteria
- 60-69: Weak, vague, or partially incorrect
- Below 60: Poor structure, major errors, or does not address the question";

fn type_label(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Behavioral => "behavioral",
        QuestionType::Technical => "technical",
        QuestionType::Situational => "situational",
        QuestionType::Coding => "coding",
        QuestionType::SqlQueryWriting => "SQL query writing",
        QuestionType::PythonDataScience => "Python data science",
    }
}

fn type_guidance(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Behavioral => BEHAVIORAL_GUIDANCE,
        QuestionType::Technical => TECHNICAL_GUIDANCE,
        QuestionType::Situational => SITUATIONAL_GUIDANCE,
        QuestionType::Coding => CODING_GUIDANCE,
        QuestionType::SqlQueryWriting => SQL_GUIDANCE,
        QuestionType::PythonDataScience => PYTHON_DS_GUIDANCE,
    }
}

fn type_criteria(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Behavioral => BEHAVIORAL_CRITERIA,
        QuestionType::Technical => TECHNICAL_CRITERIA,
        QuestionType::Situational => SITUATIONAL_CRITERIA,
        QuestionType::Coding => CODING_CRITERIA,
        QuestionType::SqlQueryWriting => SQL_CRITERIA,
        QuestionType::PythonDataScience => PYTHON_DS_CRITERIA,
    }
}

/// Builds the generator prompt for `count` questions of `question_type` on `subject`.
pub fn question_prompt(
    question_type: QuestionType,
    count: u32,
    subject: &str,
    context: &CandidateContext,
) -> String {
    let context_section = if context.is_empty() {
        String::new()
    } else {
        format!("\nPERSONALIZATION CONTEXT:\n{}", context_summary(context))
    };

    fill(
        QUESTION_TEMPLATE,
        &[
            ("type_guidance", type_guidance(question_type)),
            ("type_label", type_label(question_type)),
            ("type", question_type.as_str()),
            ("count", &count.to_string()),
            ("subject", subject),
            ("context_section", &context_section),
        ],
    )
}

/// Substitutes `{name}` placeholders in one pass over the template.
/// Substituted text is never rescanned, so braces in user input stay literal.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values.iter().find(|(name, _)| {
            tail.strip_prefix(name)
                .is_some_and(|after| after.starts_with('}'))
        });
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Builds the evaluator system prompt. Context guidelines sit between the
/// scoring guide and the response format.
pub fn evaluation_prompt(question_type: QuestionType, context: &CandidateContext) -> String {
    let mut prompt = fill(
        EVALUATION_TEMPLATE,
        &[
            ("type_label", type_label(question_type)),
            ("criteria", type_criteria(question_type)),
            ("scoring", SCORING_GUIDE),
        ],
    );

    if !context.is_empty() {
        prompt.push_str("CONTEXT-AWARE EVALUATION GUIDELINES:\n");
        prompt.push_str(&context_summary(context));
        prompt.push_str(
            "When evaluating this response, also consider:\n\
             - How well the answer aligns with the candidate's stated background and experience\n\
             - Whether the response demonstrates skills relevant to the job requirements\n\
             - How the response addresses the candidate's self-identified areas of focus\n\n",
        );
    }

    prompt.push_str(EVALUATION_FORMAT);
    prompt
}

pub const CLARIFICATION_SYSTEM: &str = "You are a supportive interview coach who guides candidates \
    to think critically without giving direct answers.";

pub const CLARIFICATION_TEMPLATE: &str = r#"You are an expert interview coach helping a candidate who is struggling with an interview question.

INTERVIEW QUESTION: "{interview_question}"

CANDIDATE'S CLARIFYING QUESTION: "{clarifying_question}"

Your role is to guide the candidate to think critically and figure out the answer themselves. DO NOT provide direct answers. Instead:

1. Acknowledge their clarifying question
2. Help them identify what assumptions they might be making
3. Guide them to think through the problem step by step
4. Suggest what information they might need to consider
5. Encourage them to structure their thinking

Keep your response concise (2-3 paragraphs maximum) and encouraging."#;

// ────────────────────────────────────────────────────────────────────────────
// Candidate context summary
// ────────────────────────────────────────────────────────────────────────────

/// Keyword buckets pulled from free text. First match wins per line.
struct Buckets<'a> {
    rules: &'a [(&'a [&'a str], usize)],
    hits: Vec<Vec<String>>,
}

impl<'a> Buckets<'a> {
    fn classify(text: &str, rules: &'a [(&'a [&'a str], usize)]) -> Self {
        let mut hits = vec![Vec::new(); rules.len()];
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let lower = line.to_lowercase();
            if let Some(i) = rules
                .iter()
                .position(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
            {
                hits[i].push(line.to_string());
            }
        }
        Self { rules, hits }
    }

    fn joined(&self, bucket: usize) -> String {
        let cap = self.rules[bucket].1;
        self.hits[bucket]
            .iter()
            .take(cap)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

const RESUME_RULES: &[(&[&str], usize)] = &[
    (&["skill", "technolog", "tool", "language"], 5),
    (&["experience", "work", "job", "engineer", "developer"], 3),
    (&["project", "developed", "built", "launched"], 3),
    (&["education", "degree", "university", "college"], 2),
];

const JOB_RULES: &[(&[&str], usize)] = &[
    (&["require", "must have", "qualification"], 5),
    (&["responsib", "duty", "duties", "task"], 3),
    (&["technolog", "tool", "framework", "stack"], 5),
    (&["communication", "teamwork", "leadership", "collaborat"], 3),
];

/// Summarizes resume, job description and self-analysis into a prompt section.
pub fn context_summary(context: &CandidateContext) -> String {
    let mut summary = String::new();

    if let Some(resume) = context.resume.as_deref().filter(|s| !s.trim().is_empty()) {
        let b = Buckets::classify(resume, RESUME_RULES);
        summary.push_str(&format!(
            "CANDIDATE BACKGROUND ANALYSIS:\n\
             - Key Skills: {}\n\
             - Experience Areas: {}\n\
             - Notable Projects: {}\n\
             - Education: {}\n\n",
            b.joined(0),
            b.joined(1),
            b.joined(2),
            b.joined(3)
        ));
    }

    if let Some(jd) = context
        .job_description
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        let b = Buckets::classify(jd, JOB_RULES);
        summary.push_str(&format!(
            "JOB REQUIREMENTS ANALYSIS:\n\
             - Key Requirements: {}\n\
             - Main Responsibilities: {}\n\
             - Required Technologies: {}\n\
             - Soft Skills Needed: {}\n\n",
            b.joined(0),
            b.joined(1),
            b.joined(2),
            b.joined(3)
        ));
    }

    if let Some(analysis) = context
        .candidate_analysis
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        summary.push_str(&format!("CANDIDATE'S SELF-ANALYSIS:\n{}\n\n", analysis.trim()));
    }

    summary
}

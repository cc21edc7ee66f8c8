//! Prompt templates for the reasoning gateway.

use crate::context::{ScoringContext, SynergyContext};

/// Kind of analysis requested from the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Free-form markdown review of workload, bottlenecks and skill fit.
    Synergy,
    /// JSON array of `{task_id, priority}` scores.
    Priority,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Synergy => "synergy",
            PromptKind::Priority => "priority",
        }
    }
}

/// Render the synergy analysis prompt.
pub fn synergy_prompt(ctx: &SynergyContext) -> String {
    format!(
        r#"You are SynergyBot, an expert project management assistant.
Analyze the following list of tasks for a project named "{project}".
Provide a concise, actionable analysis focusing on FOUR key areas: Workload Balance, Potential Bottlenecks, Suggested Priorities, AND **Skill Mismatch**.
A **Skill Mismatch** is a high-risk situation where a task is assigned to a user whose role is not appropriate for it. For example, a "Design" task assigned to a "Backend Developer" is a mismatch. Point these out clearly.
Format your response in simple markdown.

### Project Task List
{tasks}
### Analysis
"#,
        project = ctx.project_name,
        tasks = ctx.render(),
    )
}

/// Render the priority scoring prompt.
pub fn priority_prompt(ctx: &ScoringContext) -> String {
    format!(
        r#"You are a world-class technical project manager responsible for prioritizing tasks for the project "{project}".
Your goal is to assign a priority score from 1 (lowest) to 100 (highest) to each task.
You MUST follow this Prioritization Rubric:
1. **Foundation First:** Core backend and database tasks (like "create database", "setup server", "build API", "make backend") are the most critical blockers and must receive the highest priority scores (90-100).
2. **Dependencies Matter:** Integration tasks (like "connect frontend to backend") MUST have a lower priority than the core tasks they depend on.
3. **Features Last:** Specific user-facing features (like "payment gateway", "user profile page") should generally have a lower priority than the foundational backend work they rely on.
4. **UI in Parallel:** UI/Frontend tasks can often be worked on in parallel to the backend, but their priority is secondary to critical backend blockers.

Analyze these tasks based on the rubric:
{tasks}

Your response MUST be ONLY a valid JSON array of objects. Each object must have two keys: "task_id" (integer) and "priority" (integer).
Do not include any explanation, markdown, or any text outside of the JSON array.
Example response format: [{{"task_id": 1, "priority": 95}}, {{"task_id": 2, "priority": 80}}]
"#,
        project = ctx.project_name,
        tasks = ctx.render(),
    )
}

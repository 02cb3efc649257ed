//! Default stage instructions bundled at compile time.

/// Requirement Extractor - SOP to structured requirements
pub const REQUIREMENTS_EXTRACTOR: &str = include_str!("defaults/requirements_extractor.md");

/// Personality Parser - free-text personality to structured traits
pub const PERSONALITY_PARSER: &str = include_str!("defaults/personality_parser.md");

/// Plan Drafter - architecture plan from requirements
pub const PLAN_DRAFTER: &str = include_str!("defaults/plan_drafter.md");

/// Plan Reviewer - critiques a plan against requirements
pub const PLAN_REVIEWER: &str = include_str!("defaults/plan_reviewer.md");

/// Code Generator - agent source, one turn of the tool loop
pub const CODE_GENERATOR: &str = include_str!("defaults/code_generator.md");

/// Code Reviewer - semantic review of syntax-valid source
pub const CODE_REVIEWER: &str = include_str!("defaults/code_reviewer.md");

/// Prompt Synthesizer - final behavior prompt
pub const PROMPT_SYNTHESIZER: &str = include_str!("defaults/prompt_synthesizer.md");

/// Output Repair - one retry for unparseable JSON
pub const OUTPUT_REPAIR: &str = include_str!("defaults/output_repair.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("requirements_extractor", REQUIREMENTS_EXTRACTOR),
        ("personality_parser", PERSONALITY_PARSER),
        ("plan_drafter", PLAN_DRAFTER),
        ("plan_reviewer", PLAN_REVIEWER),
        ("code_generator", CODE_GENERATOR),
        ("code_reviewer", CODE_REVIEWER),
        ("prompt_synthesizer", PROMPT_SYNTHESIZER),
        ("output_repair", OUTPUT_REPAIR),
    ]
}

// src/conversation/prompts.rs
//! Provider prompts for each step of the workflow.

pub fn script_prompt(category: &str, topic: &str) -> String {
    format!(
        "Generate a comprehensive YouTube video script for the category: \"{}\" on the topic: \"{}\". \
The script should include a catchy intro, detailed main content with multiple points, \
and a compelling outro with a call to action.",
        category, topic
    )
}

pub fn refine_prompt(instruction: &str, script: &str) -> String {
    format!(
        "Based on the previous script and conversation, refine the script with the following instruction: \"{}\".\n\nPrevious Script:\n{}",
        instruction, script
    )
}

pub fn thumbnail_prompt(category: &str, topic: &str) -> String {
    format!(
        "A professional, high-resolution YouTube thumbnail for a {} video about \"{}\". Must be eye-catching and cinematic.",
        category, topic
    )
}

pub fn hashtags_prompt(script: &str) -> String {
    format!(
        "Based on the following YouTube video script, generate a list of 15-20 relevant and SEO-optimized hashtags. \
Include a mix of broad and niche tags. Format them as a single line of text, with each tag starting with '#'.\n\nScript:\n{}",
        script
    )
}

//! Structured prompt generation for Composer.
//!
//! Turns a validated idea into the markdown brief handed to the controlled
//! application through the prompt sentinel.

use crate::idea::Idea;

const TEMPLATE: &str = "\
# {{title}}

## Description
{{description}}

## Application Type
{{type}}

## Features
{{features}}
";

/// Render the prompt for an idea. Optional sections (technologies,
/// dependencies, deployment targets) are appended only when present.
pub fn build_prompt(idea: &Idea) -> String {
    let mut prompt = TEMPLATE
        .replace("{{title}}", &idea.title)
        .replace("{{description}}", &idea.description)
        .replace("{{type}}", &idea.application_type.humanized())
        .replace("{{features}}", &bullet_list(&idea.features));

    if !idea.technologies.is_empty() {
        prompt.push_str("\n## Frameworks/Technologies to Use\n");
        prompt.push_str(&bullet_list(&idea.technologies));
        prompt.push('\n');
    }
    if !idea.dependencies.is_empty() {
        prompt.push_str("\n## Dependencies\n");
        prompt.push_str(&bullet_list(&idea.dependencies));
        prompt.push('\n');
    }
    if !idea.deployment_targets.is_empty() {
        prompt.push_str("\n## Deployment Targets\n");
        prompt.push_str(&bullet_list(&idea.deployment_targets));
        prompt.push('\n');
    }

    prompt.push_str(
        "\nPlease create a complete application based on the above requirements. \
         The application should be well-structured, follow best practices, and \
         include appropriate documentation.\n",
    );
    prompt
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idea::{Idea, IdeaInput};

    fn idea(json: &str) -> Idea {
        let input: IdeaInput = serde_json::from_str(json).unwrap();
        Idea::validate(input).unwrap()
    }

    #[test]
    fn prompt_substitutes_required_sections() {
        let idea = idea(
            r#"{"name":"demo","title":"Demo App","description":"a test app",
                "applicationType":"web_app","features":["login","search"]}"#,
        );
        let prompt = build_prompt(&idea);
        assert!(prompt.starts_with("# Demo App\n"));
        assert!(prompt.contains("a test app"));
        assert!(prompt.contains("Web App"));
        assert!(prompt.contains("- login\n- search"));
        assert!(!prompt.contains("{{"), "no unexpanded placeholders");
        assert!(!prompt.contains("## Deployment Targets"));
    }

    #[test]
    fn optional_sections_appear_when_present() {
        let idea = idea(
            r#"{"name":"demo","description":"x","applicationType":"api",
                "features":["f"],"technologies":["rust"],
                "deploymentTarget":["vercel"]}"#,
        );
        let prompt = build_prompt(&idea);
        assert!(prompt.contains("## Frameworks/Technologies to Use\n- rust"));
        assert!(prompt.contains("## Deployment Targets\n- vercel"));
    }
}

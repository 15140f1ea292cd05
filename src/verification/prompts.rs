//! Prompts for the licensing verification agent

/// Placeholder used in the user turn when the sheet has no version.
pub const VERSION_PLACEHOLDER: &str = "N/A";

pub const SYSTEM_PROMPT: &str = r#"You are an assistant specialised in checking the licensing status of corporate software.

Your task is to search the web for current information on whether a specific software product requires a license for corporate/commercial use.

INSTRUCTIONS:
1. Search for current, reliable information about the software and its version
2. Check whether the software requires licensing for corporate/commercial use
3. Identify official sources (vendor site, official documentation, license terms)
4. Consider free vs. paid editions and open-source vs. proprietary licenses
5. Assume the context of a financial institution (a bank) with about 8,000 employees

RESPONSE FORMAT (JSON only):
{
    "status_licenciamento": "Sim" or "Não",
    "nivel_confianca": number from 0 to 100,
    "fontes": ["source1", "source2", ...],
    "links": ["https://link1.com", "https://link2.com", ...],
    "resumo": "Short summary of the research and conclusion"
}

CRITERIA:
- "Sim" if the software REQUIRES a license for corporate use
- "Não" if the software is free, open source without restrictions, or requires no license
- Confidence reflects the quality and number of sources found
- Prefer official sources and vendor documentation"#;

/// Search query suggested to the model for one product.
pub fn search_query(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{} {} corporate commercial license", name, version),
        None => format!("{} corporate commercial license", name),
    }
}

pub fn describe_software(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("Software: {} (Version: {})", name, version),
        None => format!("Software: {}", name),
    }
}

/// User turn for one product.
pub fn user_prompt(name: &str, version: Option<&str>) -> String {
    format!(
        r#"Research the following software:

Name: {}
Version: {}

{}
Suggested search: "{}"

Determine whether this software requires licensing for corporate use in a financial institution.
Return the answer in the JSON format specified."#,
        name,
        version.unwrap_or(VERSION_PLACEHOLDER),
        describe_software(name, version),
        search_query(name, version),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_uses_placeholder_without_version() {
        let prompt = user_prompt("Notepad++", None);
        assert!(prompt.contains("Name: Notepad++"));
        assert!(prompt.contains("Version: N/A"));
        assert!(prompt.contains("\"Notepad++ corporate commercial license\""));
    }

    #[test]
    fn test_user_prompt_with_version() {
        let prompt = user_prompt("Office", Some("2019"));
        assert!(prompt.contains("Version: 2019"));
        assert!(prompt.contains("Software: Office (Version: 2019)"));
    }

    #[test]
    fn test_system_prompt_names_every_output_field() {
        for field in ["status_licenciamento", "nivel_confianca", "fontes", "links", "resumo"] {
            assert!(SYSTEM_PROMPT.contains(field), "missing {}", field);
        }
    }
}

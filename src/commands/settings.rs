//! Settings commands

use colored::Colorize;

use super::AppContext;
use crate::cli::SettingsCommand;
use crate::error::Result;
use crate::pricing::format_usd;

/// Handle `polychat settings ...`
pub fn handle_settings(ctx: &AppContext, command: SettingsCommand) -> Result<()> {
    let settings = &ctx.settings;
    match command {
        SettingsCommand::Show => {
            let key = match settings.api_key()? {
                Some(key) => mask_key(&key),
                None => "not set".yellow().to_string(),
            };
            let cost = match settings.cost_per_1k()? {
                Some(cost) => format!("{} / 1K tokens", format_usd(cost)),
                None => "not set".to_string(),
            };
            println!("Endpoint:       {}", ctx.config.api.endpoint);
            println!("Model:          {}", settings.selected_model()?.cyan());
            println!("API key:        {}", key);
            println!("Cost estimate:  {}", cost);
            println!("Custom models:  {}", settings.custom_models()?.len());
        }
        SettingsCommand::SetKey { key } => {
            settings.set_api_key(&key)?;
            println!("{}", "API key saved".green());
        }
        SettingsCommand::ClearKey => {
            settings.clear_api_key()?;
            println!("{}", "API key removed".green());
        }
        SettingsCommand::SetModel { model } => {
            settings.set_selected_model(&model)?;
            println!("{}", format!("Model set to {}", model.trim()).green());
        }
        SettingsCommand::SetCost { cost } => {
            settings.set_cost_per_1k(cost)?;
            println!("{}", format!("Cost per 1K tokens set to {}", format_usd(cost)).green());
        }
        SettingsCommand::ClearCost => {
            settings.clear_cost_per_1k()?;
            println!("{}", "Cost per 1K tokens removed".green());
        }
        SettingsCommand::System { id, text } => match text {
            Some(text) => {
                ctx.registry.set_system_prompt(&id, &text)?;
                if text.trim().is_empty() {
                    println!("{}", "System prompt cleared".green());
                } else {
                    println!("{}", "System prompt saved".green());
                }
            }
            None => {
                ctx.registry.require(&id)?;
                let prompt = ctx.registry.system_prompt(&id)?;
                if prompt.is_empty() {
                    println!("{}", "No system prompt".yellow());
                } else {
                    println!("{}", prompt);
                }
            }
        },
    }
    Ok(())
}

/// Show only the last four characters of a credential
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(8), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk-or-v1-abcdef1234"), "********1234");
        assert_eq!(mask_key("abc"), "***");
        assert_eq!(mask_key(""), "");
    }
}

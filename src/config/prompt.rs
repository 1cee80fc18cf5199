use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;

use crate::llm::SafetySetting;

#[derive(Debug)]
pub enum PromptError {
    MissingPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },
    InvalidValue(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::MissingPlaceholder { template, placeholder } =>
                write!(f, "Prompt template '{}' is missing the '{}' placeholder", template, placeholder),
            PromptError::InvalidValue(msg) => write!(f, "Invalid prompt configuration: {}", msg),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// Persona text, per-flow templates and sampling knobs. Every key is optional
/// in the JSON file; anything absent keeps its built-in value.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub persona_name: String,
    pub persona_prefix: String,
    pub introduction_directive: String,
    pub chat_temperature: f32,
    pub code_generation_template: String,
    pub code_temperature: f32,
    pub diagnosis_template: String,
    pub diagnosis_annotation_note: String,
    pub diagnosis_safety_settings: Vec<SafetySetting>,
    pub beat_generation_template: String,
    pub beat_suggestion_template: String,
    /// Empty by default, which leaves the upstream's own thresholds in place.
    pub beat_safety_settings: Vec<SafetySetting>,
    /// Shown to the user in place of a reply that could not be completed.
    pub error_message: String,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona_name: "Aurora".to_string(),
            persona_prefix: concat!(
                "Você é {persona_name}, uma desenvolvedora de software especialista em Next.js, React e Tailwind CSS. ",
                "Responda sempre em português do Brasil, de forma clara e objetiva. ",
                "Quando a resposta tiver código, coloque-o em blocos de código Markdown indicando a linguagem."
            ).to_string(),
            introduction_directive: concat!(
                "Esta é a primeira mensagem da conversa: cumprimente o usuário e apresente-se ",
                "brevemente como {persona_name} antes de responder."
            ).to_string(),
            chat_temperature: 0.3,
            code_generation_template: concat!(
                "Você é um desenvolvedor de software especialista em Next.js, React e Tailwind CSS.\n",
                "Gere o código de um único componente React que atenda à descrição abaixo.\n",
                "Responda apenas com o código completo, em um único bloco, sem explicações.\n\n",
                "Descrição do usuário: \"{description}\""
            ).to_string(),
            code_temperature: 0.3,
            diagnosis_template: concat!(
                "Você é um assistente médico de IA. Analise com profissionalismo e respeito a descrição ",
                "dos sintomas do paciente e, se houver, a imagem enviada.\n",
                "{annotation_note}",
                "Se a análise mencionar uma possível Infecção Sexualmente Transmissível, inclua a mensagem: ",
                "\"Previna-se: use sempre preservativo nas relações sexuais!\"\n",
                "Sem imagem, baseie a análise apenas nos sintomas.\n",
                "No campo disclaimer, informe sempre que esta análise foi gerada por IA e não substitui ",
                "uma consulta médica profissional.\n\n",
                "Descrição dos sintomas: {symptoms}"
            ).to_string(),
            diagnosis_annotation_note: concat!(
                "A imagem pode ter marcações em vermelho feitas pelo usuário para destacar áreas de ",
                "preocupação; dê atenção especial a elas.\n"
            ).to_string(),
            diagnosis_safety_settings: SafetySetting::permissive(),
            beat_generation_template: "Generate a music beat in the style of {style}.".to_string(),
            beat_suggestion_template: concat!(
                "You are an AI music assistant that suggests improvements to a user-created beat.\n\n",
                "Beat:\n{modified_beat}\n\n",
                "Target style:\n{target_style}\n\n",
                "Suggest a few concrete, actionable improvements that bring the beat closer to the target style."
            ).to_string(),
            beat_safety_settings: Vec::new(),
            error_message: "Desculpe, não foi possível concluir a resposta. Por favor, tente novamente.".to_string(),
            last_loaded: None,
        }
    }
}

fn require(
    template: &str,
    name: &'static str,
    placeholder: &'static str
) -> Result<(), PromptError> {
    if template.contains(placeholder) {
        Ok(())
    } else {
        Err(PromptError::MissingPlaceholder { template: name, placeholder })
    }
}

impl PromptConfig {
    pub fn validate(&self) -> Result<(), PromptError> {
        if self.persona_name.trim().is_empty() {
            return Err(PromptError::InvalidValue("persona_name must not be empty".to_string()));
        }
        for (name, value) in [
            ("chat_temperature", self.chat_temperature),
            ("code_temperature", self.code_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(
                    PromptError::InvalidValue(format!("{} must be within 0.0..=2.0, got {}", name, value))
                );
            }
        }
        require(&self.code_generation_template, "code_generation_template", "{description}")?;
        require(&self.diagnosis_template, "diagnosis_template", "{symptoms}")?;
        require(&self.diagnosis_template, "diagnosis_template", "{annotation_note}")?;
        require(&self.beat_generation_template, "beat_generation_template", "{style}")?;
        require(&self.beat_suggestion_template, "beat_suggestion_template", "{modified_beat}")?;
        require(&self.beat_suggestion_template, "beat_suggestion_template", "{target_style}")?;
        Ok(())
    }
}

pub fn load_prompts_from_str(json: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let mut config = load_prompts_from_str(&file_content)?;
    config.last_loaded = Some(SystemTime::now());
    info!("Loaded prompt configuration from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

/// Returns a fresh config when the file was modified after `current_config`
/// was loaded, `None` when it is unchanged.
pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        match current_config.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Prompts file changed, reloading...");
                return load_prompts(path).map(Some);
            }
            None => {
                info!("No last_loaded timestamp, reloading prompts...");
                return load_prompts(path).map(Some);
            }
        }
    }
    Ok(None)
}

fn persona(config: &PromptConfig, text: &str) -> String {
    text.replace("{persona_name}", &config.persona_name)
}

/// Persona prefix, plus the self-introduction directive on the first turn.
pub fn get_chat_prefix(config: &PromptConfig, is_first_message: bool) -> String {
    let mut prefix = persona(config, &config.persona_prefix);
    if is_first_message {
        prefix.push('\n');
        prefix.push_str(&persona(config, &config.introduction_directive));
    }
    prefix
}

pub fn get_chat_prompt(config: &PromptConfig, message: &str, is_first_message: bool) -> String {
    format!("{}\n\nMensagem do usuário: {}", get_chat_prefix(config, is_first_message), message)
}

pub fn get_code_prompt(config: &PromptConfig, description: &str) -> String {
    config.code_generation_template.replace("{description}", description)
}

pub fn get_diagnosis_prompt(config: &PromptConfig, symptoms: &str, has_image: bool) -> String {
    let note = if has_image { config.diagnosis_annotation_note.as_str() } else { "" };
    config.diagnosis_template.replace("{annotation_note}", note).replace("{symptoms}", symptoms)
}

pub fn get_beat_prompt(config: &PromptConfig, style: &str) -> String {
    config.beat_generation_template.replace("{style}", style)
}

pub fn get_beat_suggestion_prompt(
    config: &PromptConfig,
    modified_beat: &str,
    target_style: &str
) -> String {
    config.beat_suggestion_template
        .replace("{modified_beat}", modified_beat)
        .replace("{target_style}", target_style)
}

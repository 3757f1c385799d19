//! Per-configuration prompt strategies for answer generation.

use crate::providers::llm::ChatMessage;
use serde::Serialize;

const BASE_PERSONA: &str = "Você é um especialista em normas técnicas do CBMGO.";
const STEP_BY_STEP: &str = "Pense passo a passo antes de responder.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptStrategy {
    NoRag,
    SimpleRag,
    AgenticRag,
    FewShot,
    ChainOfThought,
    /// Any label not recognized above.
    Generic,
}

impl PromptStrategy {
    pub const RECOGNIZED: [PromptStrategy; 5] = [
        PromptStrategy::NoRag,
        PromptStrategy::SimpleRag,
        PromptStrategy::AgenticRag,
        PromptStrategy::FewShot,
        PromptStrategy::ChainOfThought,
    ];

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "no-rag" | "no-context" => PromptStrategy::NoRag,
            "simple-rag" | "simple-retrieval" => PromptStrategy::SimpleRag,
            "agentic-rag" | "agentic-retrieval" => PromptStrategy::AgenticRag,
            "few-shot" => PromptStrategy::FewShot,
            "chain-of-thought" => PromptStrategy::ChainOfThought,
            _ => PromptStrategy::Generic,
        }
    }

    /// Canonical configuration label.
    pub fn label(&self) -> &'static str {
        match self {
            PromptStrategy::NoRag => "no-rag",
            PromptStrategy::SimpleRag => "simple-rag",
            PromptStrategy::AgenticRag => "agentic-rag",
            PromptStrategy::FewShot => "few-shot",
            PromptStrategy::ChainOfThought => "chain-of-thought",
            PromptStrategy::Generic => "default",
        }
    }

    pub fn system_prompt(&self) -> String {
        match self {
            PromptStrategy::NoRag => {
                format!("{} Responda com base apenas no seu conhecimento.", BASE_PERSONA)
            }
            PromptStrategy::SimpleRag => format!(
                "{} Use as informações fornecidas para responder com precisão.",
                BASE_PERSONA
            ),
            PromptStrategy::AgenticRag => "Você é um agente especializado em normas técnicas do CBMGO. \
                 Analise a questão, busque informações relevantes e forneça uma resposta estruturada."
                .to_string(),
            PromptStrategy::FewShot => format!(
                "{} Aqui estão alguns exemplos de como responder perguntas similares:",
                BASE_PERSONA
            ),
            PromptStrategy::ChainOfThought => format!("{} {}", BASE_PERSONA, STEP_BY_STEP),
            PromptStrategy::Generic => BASE_PERSONA.to_string(),
        }
    }

    pub fn user_message(&self, question_text: &str) -> String {
        match self {
            PromptStrategy::ChainOfThought => format!("{}\n\n{}", question_text, STEP_BY_STEP),
            PromptStrategy::FewShot => format!(
                "Com base nos exemplos de normas técnicas, responda: {}",
                question_text
            ),
            _ => question_text.to_string(),
        }
    }

    pub fn messages(&self, question_text: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(self.user_message(question_text)),
        ]
    }

    /// Short operator-facing description (`configs` command).
    pub fn description(&self) -> &'static str {
        match self {
            PromptStrategy::NoRag => "Sem uso de RAG (Retrieval-Augmented Generation)",
            PromptStrategy::SimpleRag => "RAG simples com busca básica",
            PromptStrategy::AgenticRag => "RAG com agentes inteligentes",
            PromptStrategy::FewShot => "Aprendizado com poucos exemplos",
            PromptStrategy::ChainOfThought => "Cadeia de pensamento estruturada",
            PromptStrategy::Generic => "Configuração padrão do modelo",
        }
    }

    /// Clause used inside simulated answers ("... que {clause}.").
    pub fn simulation_clause(&self) -> &'static str {
        match self {
            PromptStrategy::NoRag => "utiliza apenas o conhecimento pré-treinado do modelo",
            PromptStrategy::SimpleRag => "inclui busca básica por informações relevantes",
            PromptStrategy::AgenticRag => "emprega agentes inteligentes para análise contextual",
            PromptStrategy::FewShot => "aprende através de exemplos fornecidos",
            PromptStrategy::ChainOfThought => "estrutura o raciocínio passo a passo",
            PromptStrategy::Generic => "utiliza configuração personalizada",
        }
    }
}

/// Deterministic Markdown placeholder produced in simulate mode.
pub fn simulated_answer(configuration: &str, model_name: &str) -> String {
    let strategy = PromptStrategy::from_label(configuration);
    format!(
        "# Resposta - {title}

## Análise da Norma Técnica

Com base na pergunta apresentada sobre as **normas técnicas do CBMGO**, posso fornecer a seguinte análise:

### Pontos principais:
1. **Requisitos específicos** - conforme estabelecido na regulamentação
2. *Procedimentos obrigatórios* para cumprimento da norma
3. Critérios de `avaliação` e `verificação`

### Configuração utilizada: `{config}`
Esta resposta foi gerada utilizando a configuração **{config}**, que {clause}.

> **Importante**: Esta é uma resposta simulada gerada pelo modo de simulação.

### Conformidade:
- [x] Atende aos requisitos mínimos
- [x] Segue as diretrizes estabelecidas
- [ ] Requer verificação adicional

**Modelo**: {model}
**Status**: ✅ Simulação concluída
",
        title = title_case(&configuration.replace('-', " ")),
        config = configuration,
        clause = strategy.simulation_clause(),
        model = model_name,
    )
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::Role;

    const Q: &str = "Qual a distância mínima?";

    #[test]
    fn aliases_map_to_the_same_strategy() {
        assert_eq!(PromptStrategy::from_label("no-context"), PromptStrategy::NoRag);
        assert_eq!(
            PromptStrategy::from_label("simple-retrieval"),
            PromptStrategy::SimpleRag
        );
        assert_eq!(
            PromptStrategy::from_label("Agentic-Retrieval"),
            PromptStrategy::AgenticRag
        );
        assert_eq!(PromptStrategy::from_label("zero-shot"), PromptStrategy::Generic);
    }

    #[test]
    fn chain_of_thought_appends_instruction() {
        let msgs = PromptStrategy::ChainOfThought.messages(Q);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.ends_with(STEP_BY_STEP));
        assert_eq!(
            msgs[1].content,
            "Qual a distância mínima?\n\nPense passo a passo antes de responder."
        );
    }

    #[test]
    fn few_shot_rewrites_user_message() {
        let msgs = PromptStrategy::FewShot.messages(Q);
        assert_eq!(
            msgs[1].content,
            "Com base nos exemplos de normas técnicas, responda: Qual a distância mínima?"
        );
    }

    #[test]
    fn generic_uses_bare_persona_and_question() {
        let msgs = PromptStrategy::from_label("custom").messages(Q);
        assert_eq!(msgs[0].content, BASE_PERSONA);
        assert_eq!(msgs[1].content, Q);
    }

    #[test]
    fn simulated_answer_mentions_config_and_model() {
        let text = simulated_answer("chain-of-thought", "gpt-4.1");
        assert!(text.starts_with("# Resposta - Chain Of Thought"));
        assert!(text.contains("**chain-of-thought**, que estrutura o raciocínio passo a passo."));
        assert!(text.contains("**Modelo**: gpt-4.1"));
        assert_eq!(text, simulated_answer("chain-of-thought", "gpt-4.1"));
    }
}

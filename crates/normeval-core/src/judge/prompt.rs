use crate::model::Question;

const DISPUTED_NOTICE: &str = "⚠️ ATENÇÃO: Esta pergunta está marcada como 'resposta duvidosa', \
indicando que a resposta esperada oficial pode conter erros ou imprecisões.
Avalie com critério crítico e considere, de forma independente, se a resposta do LLM pode estar mais correta.";

/// Rubric prompt sent to the structured-judgment service.
pub fn build_prompt(question: &Question, answer_text: &str) -> String {
    let norm = &question.norm;
    let item = &question.item;
    let expected = &question.expected_answer;
    let disputed = if question.flags.disputed {
        DISPUTED_NOTICE
    } else {
        ""
    };

    format!(
        r#"Você é um especialista técnico em normas do CBMGO (Corpo de Bombeiros Militar de Goiás).

CONTEXTO DA PERGUNTA:
- Norma Técnica: {norm}
- Item/Artigo: {item}
- Referência Completa: {reference}
- Pergunta: {text}

RESPOSTA ESPERADA (oficial):
{expected}

RESPOSTA DO LLM PARA AVALIAR:
{answer}

{disputed}

⚠️ INSTRUÇÃO CRÍTICA PARA AVALIAÇÃO:
COMPARE DIRETAMENTE a resposta final do LLM com a RESPOSTA ESPERADA oficial: "{expected}"
- Se as respostas finais são DIFERENTES (valores numéricos, unidades, conceitos), marque correct = false
- Se as respostas finais são IGUAIS ou EQUIVALENTES, marque correct = true
- NÃO se deixe influenciar por boa fundamentação técnica se a resposta final está ERRADA

CRITÉRIOS DE AVALIAÇÃO:

1. Correção Técnica (correct):
   - PRIMEIRO: compare a resposta FINAL do LLM com "{expected}"
   - A resposta está correta conforme {norm} - {item}?

2. Conformidade Normativa:
   - norm_mentioned: menciona explicitamente a norma correta ({norm})?
   - item_mentioned: cita o item/artigo específico ({item})?
   - source_cited: cita ESPECIFICAMENTE {norm} E {item}? (citações genéricas, incorretas ou outras normas = false)

3. Qualidade da Resposta (inteiros de 1 a 5):
   - clarity: explicação compreensível e bem estruturada (independente da correção)
   - technical_grounding: uso CORRETO de terminologia técnica e conceitos normativos
     * se correct = false, technical_grounding no máximo 2
     * se correct = true, avalie a qualidade da fundamentação de 1 a 5
   - concision: resposta direta sem ser superficial

4. norm_conformance (1 a 5): alinhamento com os requisitos específicos da {norm}.
   Se a norma não for mencionada, norm_conformance no máximo 3.

5. technical_completeness (1 a 5): aborda todos os aspectos relevantes da questão?

REGRAS PARA source_cited:
- true APENAS se mencionar EXPLICITAMENTE "{norm}" E "{item}"
- false se citar outras normas, outros itens, fontes genéricas ("conforme norma", "segundo CBMGO"), leis ou decretos, ou nenhuma fonte

INSTRUÇÕES GERAIS:
- correct determina o limite máximo de technical_grounding
- uma resposta incorreta NÃO pode ter fundamentação técnica alta (máximo 2)
- se a resposta for parcialmente correta, identifique os pontos específicos
- seja rigoroso mas justo

Responda SOMENTE com um objeto JSON com os campos:
correct, norm_mentioned, item_mentioned, source_cited (booleanos);
clarity, technical_grounding, concision, norm_conformance, technical_completeness (inteiros 1-5);
rationale (texto com a justificativa detalhada);
correct_points e incorrect_points (listas de textos)."#,
        norm = norm,
        item = item,
        reference = question.norm_reference,
        text = question.text,
        expected = expected,
        answer = answer_text,
        disputed = disputed,
    )
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prompt templates with `{name}` placeholders
//!
//! `{{` and `}}` produce literal braces. Substituted values are inserted
//! verbatim and never re-parsed, so braces inside retrieved text are safe.

use crate::rag::errors::PromptError;
use std::collections::HashMap;

/// Default question-answering prompt (Portuguese, matching the chat's console language)
pub const DEFAULT_QA_TEMPLATE: &str = "
Use as informações abaixo para responder a pergunta de forma breve e clara. Se não souber, responda 'Não sei'.

Informações:
{context}

Pergunta: {question}
Resposta:
";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Variable(String),
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    segments: Vec<Segment>,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    /// Parse `template`, collecting its variables in order of first use
    pub fn new(template: impl Into<String>) -> Result<Self, PromptError> {
        let template = template.into();
        let segments = parse(&template)?;

        let mut input_variables: Vec<String> = Vec::new();
        for segment in &segments {
            if let Segment::Variable(name) = segment {
                if !input_variables.contains(name) {
                    input_variables.push(name.clone());
                }
            }
        }

        Ok(Self {
            template,
            segments,
            input_variables,
        })
    }

    /// Parse `template` and check it uses exactly the expected variables
    pub fn with_variables(
        template: impl Into<String>,
        variables: &[&str],
    ) -> Result<Self, PromptError> {
        let prompt = Self::new(template)?;
        for var in variables {
            if !prompt.input_variables.iter().any(|v| v == var) {
                return Err(PromptError::UnusedVariable(var.to_string()));
            }
        }
        if let Some(extra) = prompt
            .input_variables
            .iter()
            .find(|v| !variables.contains(&v.as_str()))
        {
            return Err(PromptError::MissingVariable(extra.clone()));
        }
        Ok(prompt)
    }

    /// The stock context + question template
    pub fn default_qa() -> Result<Self, PromptError> {
        Self::with_variables(DEFAULT_QA_TEMPLATE, &["context", "question"])
    }

    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, values: &HashMap<&str, &str>) -> Result<String, PromptError> {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = values
                        .get(name.as_str())
                        .ok_or_else(|| PromptError::MissingVariable(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Fill a template that takes `context` and `question`
    pub fn render_qa(&self, context: &str, question: &str) -> Result<String, PromptError> {
        let values = HashMap::from([("context", context), ("question", question)]);
        self.render(&values)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn parse(template: &str) -> Result<Vec<Segment>, PromptError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    literal.push('{');
                    continue;
                }

                let mut name = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    if inner == '{' {
                        return Err(PromptError::UnbalancedBrace { position: pos });
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(PromptError::UnbalancedBrace { position: pos });
                }
                if !is_identifier(&name) {
                    return Err(PromptError::InvalidPlaceholder(name));
                }

                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Variable(name));
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    literal.push('}');
                } else {
                    return Err(PromptError::UnbalancedBrace { position: pos });
                }
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}
